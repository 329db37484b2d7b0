//! FlagFilter Core Library
//!
//! This crate provides the reconciliation engine behind the FlagFilter content
//! script: it finds posts in a feed whose author name carries one of the
//! selected flag emoji (or whose author is manually blocked) and masks them in
//! place, reversibly.
//!
//! # Architecture
//!
//! The engine is written against the [`Dom`] trait rather than a browser API.
//! The wasm crate implements it over `web_sys`; [`Document`] implements it
//! over an in-memory arena for tests and tooling. Per-post state lives in the
//! [`Engine`], keyed by an id attribute, never on the nodes themselves.
//!
//! # Modules
//!
//! - `dom`: host DOM trait, arena document, traversal helpers
//! - `selectors`: structural contract with the host page
//! - `names`: candidate display-name extraction
//! - `handle`: author handle resolution
//! - `matcher`: flag glyph matching
//! - `snapshot`: structured subtree snapshots for lossless restore
//! - `transform`: mask / clear / info panel
//! - `stats`: per-flag and per-user counters
//! - `settings`: settings schema and store backends
//! - `engine`: the reconciliation loop
//! - `types`: shared type definitions

pub mod dom;
pub mod engine;
pub mod error;
pub mod handle;
pub mod matcher;
pub mod names;
pub mod selectors;
pub mod settings;
pub mod snapshot;
pub mod stats;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use dom::{Document, Dom, MutationKind, MutationRecord, NodeId};
pub use engine::{Engine, FilterConfig, PostRecord, SweepReport};
pub use error::StoreError;
pub use settings::{JsonFileStore, MemoryStore, SettingKey, Settings, SettingsChange, SettingsStore, UserStats};
pub use snapshot::SnapshotNode;
pub use types::{BlockReason, Classification, ControlAction, HandlingMode, OwnedRole, PostId, ProcessingState};
