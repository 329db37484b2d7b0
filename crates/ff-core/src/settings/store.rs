//! Settings store backends
//!
//! [`SettingsStore`] is the key/value interface the engine and the CLI talk
//! to. Change notifications go out over `std::sync::mpsc`: every subscriber
//! gets its own receiver, and dropping the receiver unsubscribes it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use serde_json::{Map, Value};

use super::schema::{Settings, SettingsChange};
use crate::error::StoreError;

/// A persisted key/value settings store with change notification.
pub trait SettingsStore {
    /// Load and decode every key. Missing keys take their defaults.
    fn get_all(&self) -> Result<Settings, StoreError>;

    /// Write the given items. Subscribers are told about every key whose
    /// value actually changed.
    fn set(&mut self, items: Map<String, Value>) -> Result<(), StoreError>;

    /// Register for change notifications.
    fn subscribe(&mut self) -> Receiver<SettingsChange>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Map<String, Value>,
    subscribers: Vec<Sender<SettingsChange>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Map<String, Value>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn with_settings(settings: &Settings) -> Result<Self, StoreError> {
        Ok(Self::with_items(settings.to_items()?))
    }

    /// Raw stored items.
    pub fn items(&self) -> &Map<String, Value> {
        &self.items
    }

    /// Make every subsequent write fail with [`StoreError::ReadOnly`].
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Apply items that changed elsewhere (another context wrote them).
    /// Notifies subscribers but never fails.
    pub fn merge_remote(&mut self, items: Map<String, Value>) {
        self.store_items(items);
    }

    /// Remove a key, notifying subscribers with `new_value: None`.
    pub fn remove(&mut self, key: &str) {
        if self.items.remove(key).is_some() {
            self.notify(SettingsChange {
                key: key.to_string(),
                new_value: None,
            });
        }
    }

    fn store_items(&mut self, items: Map<String, Value>) {
        for (key, value) in items {
            if self.items.get(&key) == Some(&value) {
                continue;
            }
            self.items.insert(key.clone(), value.clone());
            self.notify(SettingsChange {
                key,
                new_value: Some(value),
            });
        }
    }

    fn notify(&mut self, change: SettingsChange) {
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }
}

impl SettingsStore for MemoryStore {
    fn get_all(&self) -> Result<Settings, StoreError> {
        Ok(Settings::from_items(&self.items))
    }

    fn set(&mut self, items: Map<String, Value>) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.store_items(items);
        Ok(())
    }

    fn subscribe(&mut self) -> Receiver<SettingsChange> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }
}

// =============================================================================
// JSON file store
// =============================================================================

/// Store persisted as one pretty-printed JSON object on disk. The whole
/// file is rewritten on every write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let items = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::Backend(format!(
                        "'{}' does not hold a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        log::debug!("opened settings file {} ({} keys)", path.display(), items.len());

        Ok(Self {
            path,
            inner: MemoryStore::with_items(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let text = serde_json::to_string_pretty(&Value::Object(self.inner.items().clone()))?;
        fs::write(&self.path, text).map_err(io_error)
    }
}

impl SettingsStore for JsonFileStore {
    fn get_all(&self) -> Result<Settings, StoreError> {
        self.inner.get_all()
    }

    fn set(&mut self, items: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.set(items)?;
        self.flush()
    }

    fn subscribe(&mut self) -> Receiver<SettingsChange> {
        self.inner.subscribe()
    }
}
