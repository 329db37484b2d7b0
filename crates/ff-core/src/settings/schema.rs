//! Settings schema
//!
//! Stored as a flat key/value map, one key per field, matching the keys the
//! popup reads and writes. Decoding is lenient: a missing or malformed value
//! falls back to the field's default instead of failing the whole load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::StoreError;
use crate::handle::canonicalize;
use crate::types::HandlingMode;

pub const NOTE_MAX_CHARS: usize = 500;
pub const NICKNAME_MAX_CHARS: usize = 40;

// =============================================================================
// Keys
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    SelectedFlags,
    HandlingMode,
    FlagBlockCounts,
    BlockedUsers,
    UserStats,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        Self::SelectedFlags,
        Self::HandlingMode,
        Self::FlagBlockCounts,
        Self::BlockedUsers,
        Self::UserStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelectedFlags => "selectedFlags",
            Self::HandlingMode => "handlingMode",
            Self::FlagBlockCounts => "flagBlockCounts",
            Self::BlockedUsers => "blockedUsers",
            Self::UserStats => "userStats",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }

    /// Changes to these keys invalidate every classification on the page.
    pub fn invalidates_classification(&self) -> bool {
        matches!(self, Self::SelectedFlags | Self::HandlingMode | Self::BlockedUsers)
    }
}

// =============================================================================
// Values
// =============================================================================

/// Per-handle annotations and counters. Created on first match or first
/// manual block and never pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct UserStats {
    pub flag_matches: u32,
    pub manual_blocks: u32,
    pub flags: Vec<String>,
    pub note: String,
    pub nickname: String,
}

/// The full persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct Settings {
    pub selected_flags: Vec<String>,
    pub handling_mode: HandlingMode,
    #[ts(type = "Record<string, number>")]
    pub flag_block_counts: BTreeMap<String, u64>,
    pub blocked_users: Vec<String>,
    pub user_stats: BTreeMap<String, UserStats>,
}

/// One changed key as delivered by the store. `None` means the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsChange {
    pub key: String,
    pub new_value: Option<Value>,
}

impl Settings {
    /// Decode from stored items. Unknown keys are ignored.
    pub fn from_items(items: &Map<String, Value>) -> Self {
        let mut settings = Self::default();
        for key in SettingKey::ALL {
            if let Some(value) = items.get(key.as_str()) {
                settings.decode(key, value);
            }
        }
        settings
    }

    /// Apply one change notification. Returns the key it touched, or `None`
    /// for keys outside the schema.
    pub fn apply_change(&mut self, change: &SettingsChange) -> Option<SettingKey> {
        let key = SettingKey::parse(&change.key)?;
        self.decode(key, change.new_value.as_ref().unwrap_or(&Value::Null));
        Some(key)
    }

    /// Encode the given keys as store items.
    pub fn items(&self, keys: &[SettingKey]) -> Result<Map<String, Value>, StoreError> {
        let mut items = Map::new();
        for key in keys {
            let value = match key {
                SettingKey::SelectedFlags => serde_json::to_value(&self.selected_flags)?,
                SettingKey::HandlingMode => serde_json::to_value(self.handling_mode)?,
                SettingKey::FlagBlockCounts => serde_json::to_value(&self.flag_block_counts)?,
                SettingKey::BlockedUsers => serde_json::to_value(&self.blocked_users)?,
                SettingKey::UserStats => serde_json::to_value(&self.user_stats)?,
            };
            items.insert(key.as_str().to_string(), value);
        }
        Ok(items)
    }

    pub fn to_items(&self) -> Result<Map<String, Value>, StoreError> {
        self.items(&SettingKey::ALL)
    }

    pub fn is_blocked(&self, handle: &str) -> bool {
        self.blocked_users.iter().any(|h| h == handle)
    }

    /// Stats entry for `handle`, created on first use.
    pub fn user_stats_mut(&mut self, handle: &str) -> &mut UserStats {
        self.user_stats.entry(handle.to_string()).or_default()
    }

    fn decode(&mut self, key: SettingKey, value: &Value) {
        match key {
            SettingKey::SelectedFlags => self.selected_flags = decode_flags(value),
            SettingKey::HandlingMode => {
                self.handling_mode = value.as_str().map(HandlingMode::from_str).unwrap_or_default();
            }
            SettingKey::FlagBlockCounts => self.flag_block_counts = decode_counts(value),
            SettingKey::BlockedUsers => self.blocked_users = decode_handles(value),
            SettingKey::UserStats => self.user_stats = decode_user_stats(value),
        }
    }
}

fn decode_flags(value: &Value) -> Vec<String> {
    let mut flags: Vec<String> = Vec::new();
    for flag in value.as_array().into_iter().flatten().filter_map(Value::as_str) {
        if !flag.is_empty() && !flags.iter().any(|f| f == flag) {
            flags.push(flag.to_string());
        }
    }
    flags
}

fn decode_handles(value: &Value) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for raw in value.as_array().into_iter().flatten().filter_map(Value::as_str) {
        let handle = canonicalize(raw);
        if !handle.is_empty() && !handles.contains(&handle) {
            handles.push(handle);
        }
    }
    handles
}

fn decode_counts(value: &Value) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    let Some(object) = value.as_object() else {
        return counts;
    };

    for (flag, count) in object {
        if flag.is_empty() {
            continue;
        }
        let numeric = match count.as_u64() {
            Some(n) => Some(n),
            None => count
                .as_f64()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n.trunc() as u64),
        };
        if let Some(n) = numeric {
            counts.insert(flag.clone(), n);
        }
    }

    counts
}

fn decode_user_stats(value: &Value) -> BTreeMap<String, UserStats> {
    let mut stats = BTreeMap::new();
    let Some(object) = value.as_object() else {
        return stats;
    };

    for (raw_handle, entry) in object {
        let handle = canonicalize(raw_handle);
        if handle.is_empty() {
            continue;
        }
        match serde_json::from_value::<UserStats>(entry.clone()) {
            Ok(mut parsed) => {
                parsed.note = truncate_chars(&parsed.note, NOTE_MAX_CHARS);
                parsed.nickname = truncate_chars(&parsed.nickname, NICKNAME_MAX_CHARS);
                stats.insert(handle, parsed);
            }
            Err(e) => log::debug!("dropping malformed stats for '{}': {}", handle, e),
        }
    }

    stats
}

/// Keep at most `max` characters, never splitting a scalar value.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
