//! Settings store backed by `chrome.storage.sync`.
//!
//! The extension storage API is asynchronous, while [`SettingsStore`] is
//! not. The store keeps an in-memory mirror: reads come from the mirror,
//! writes update the mirror and are sent to `chrome.storage.sync` without
//! waiting. Changes made elsewhere arrive through [`ChromeSyncStore::apply_remote`].

use std::sync::mpsc::Receiver;

use ff_core::{MemoryStore, Settings, SettingsChange, SettingsStore, StoreError};
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    fn sync_set(items: &JsValue) -> Result<JsValue, JsValue>;
}

/// Storage area whose changes the content script reacts to.
pub const SYNC_AREA: &str = "sync";

pub struct ChromeSyncStore {
    mirror: MemoryStore,
}

impl ChromeSyncStore {
    /// Seed the mirror with the items read by the loader script.
    pub fn new(items: Map<String, Value>) -> Self {
        Self {
            mirror: MemoryStore::with_items(items),
        }
    }

    /// Fold a `chrome.storage.onChanged` payload (`{key: {oldValue, newValue}}`)
    /// into the mirror. A change without `newValue` is a removal.
    pub fn apply_remote(&mut self, changes: Map<String, Value>) {
        let mut updated = Map::new();
        for (key, change) in changes {
            match change.get("newValue") {
                Some(value) => {
                    updated.insert(key, value.clone());
                }
                None => self.mirror.remove(&key),
            }
        }
        self.mirror.merge_remote(updated);
    }
}

impl SettingsStore for ChromeSyncStore {
    fn get_all(&self) -> Result<Settings, StoreError> {
        self.mirror.get_all()
    }

    fn set(&mut self, items: Map<String, Value>) -> Result<(), StoreError> {
        let payload = to_js(&Value::Object(items.clone()))?;
        sync_set(&payload).map_err(|e| StoreError::Backend(format!("{:?}", e)))?;
        self.mirror.set(items)
    }

    fn subscribe(&mut self) -> Receiver<SettingsChange> {
        self.mirror.subscribe()
    }
}

/// Convert through JSON text; settings values are plain JSON.
pub fn to_js(value: &Value) -> Result<JsValue, StoreError> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text).map_err(|e| StoreError::Backend(format!("{:?}", e)))
}

pub fn from_js(value: &JsValue) -> Result<Value, StoreError> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let text: String = js_sys::JSON::stringify(value)
        .map_err(|e| StoreError::Backend(format!("{:?}", e)))?
        .into();
    Ok(serde_json::from_str(&text)?)
}

/// Decode a JS object into a JSON map; anything else is empty.
pub fn object_from_js(value: &JsValue) -> Result<Map<String, Value>, StoreError> {
    match from_js(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
