//! Error types for FlagFilter

/// Error type for settings store access.
///
/// The engine treats every write failure as success (writes are best-effort);
/// these only surface to callers that read or write the store directly.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Settings store is read-only")]
    ReadOnly,
    #[error("Storage backend error: {0}")]
    Backend(String),
}
