//! Stats Aggregator
//!
//! Every write is a read-modify-write against the store: load the current
//! settings, apply the change, write back only the touched keys. Concurrent
//! writers from other contexts can race; the last write wins.
//!
//! Each store operation has a matching `apply_*` function that performs the
//! same change on an in-memory [`Settings`], so callers can keep a local cache
//! in step when a write fails.

use crate::error::StoreError;
use crate::settings::{
    truncate_chars, SettingKey, Settings, SettingsStore, UserStats, NICKNAME_MAX_CHARS,
    NOTE_MAX_CHARS,
};

/// Weight of one manual block in [`score`].
pub const MANUAL_BLOCK_WEIGHT: u32 = 3;

/// How strongly an author has been flagged: `flag_matches + 3 * manual_blocks`.
pub fn score(stats: &UserStats) -> u32 {
    stats
        .flag_matches
        .saturating_add(stats.manual_blocks.saturating_mul(MANUAL_BLOCK_WEIGHT))
}

/// Per-flag counts, highest first, zero counts dropped. Ties order by glyph.
pub fn sorted_block_counts(settings: &Settings) -> Vec<(String, u64)> {
    let mut counts: Vec<(String, u64)> = settings
        .flag_block_counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(flag, count)| (flag.clone(), *count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

// =============================================================================
// In-memory updates
// =============================================================================

pub fn apply_flag_counts(settings: &mut Settings, flags: &[String]) {
    for flag in flags {
        let count = settings.flag_block_counts.entry(flag.clone()).or_insert(0);
        *count = count.saturating_add(1);
    }
}

pub fn apply_match(settings: &mut Settings, handle: &str, flags: &[String]) {
    if handle.is_empty() {
        return;
    }
    let stats = settings.user_stats_mut(handle);
    stats.flag_matches = stats.flag_matches.saturating_add(1);
    for flag in flags {
        if !stats.flags.contains(flag) {
            stats.flags.push(flag.clone());
        }
    }
}

pub fn apply_manual_block(settings: &mut Settings, handle: &str) {
    if handle.is_empty() {
        return;
    }
    let stats = settings.user_stats_mut(handle);
    stats.manual_blocks = stats.manual_blocks.saturating_add(1);
}

/// Add `handle` to the blocked list and count the manual block. Returns
/// false if it was already blocked.
pub fn apply_block_user(settings: &mut Settings, handle: &str) -> bool {
    if handle.is_empty() || settings.is_blocked(handle) {
        return false;
    }
    settings.blocked_users.push(handle.to_string());
    apply_manual_block(settings, handle);
    true
}

pub fn apply_unblock_user(settings: &mut Settings, handle: &str) -> bool {
    let before = settings.blocked_users.len();
    settings.blocked_users.retain(|h| h != handle);
    settings.blocked_users.len() != before
}

pub fn apply_note(settings: &mut Settings, handle: &str, note: &str) {
    if handle.is_empty() {
        return;
    }
    settings.user_stats_mut(handle).note = truncate_chars(note.trim(), NOTE_MAX_CHARS);
}

pub fn apply_nickname(settings: &mut Settings, handle: &str, nickname: &str) {
    if handle.is_empty() {
        return;
    }
    settings.user_stats_mut(handle).nickname = truncate_chars(nickname.trim(), NICKNAME_MAX_CHARS);
}

// =============================================================================
// Store writes
// =============================================================================

fn update<S, F>(store: &mut S, keys: &[SettingKey], change: F) -> Result<Settings, StoreError>
where
    S: SettingsStore + ?Sized,
    F: FnOnce(&mut Settings) -> bool,
{
    let mut settings = store.get_all()?;
    if change(&mut settings) {
        store.set(settings.items(keys)?)?;
    }
    Ok(settings)
}

/// Add one to the block count of every flag in `flags`.
pub fn increment_flag_counts<S: SettingsStore + ?Sized>(
    store: &mut S,
    flags: &[String],
) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::FlagBlockCounts], |settings| {
        apply_flag_counts(settings, flags);
        !flags.is_empty()
    })
}

/// Count a flag match for `handle` and remember the flags seen on it.
pub fn record_match<S: SettingsStore + ?Sized>(
    store: &mut S,
    handle: &str,
    flags: &[String],
) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::UserStats], |settings| {
        apply_match(settings, handle, flags);
        !handle.is_empty()
    })
}

pub fn record_manual_block<S: SettingsStore + ?Sized>(
    store: &mut S,
    handle: &str,
) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::UserStats], |settings| {
        apply_manual_block(settings, handle);
        !handle.is_empty()
    })
}

/// Block `handle` and record the manual block in a single write.
pub fn block_user<S: SettingsStore + ?Sized>(store: &mut S, handle: &str) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::BlockedUsers, SettingKey::UserStats], |settings| {
        apply_block_user(settings, handle)
    })
}

pub fn unblock_user<S: SettingsStore + ?Sized>(store: &mut S, handle: &str) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::BlockedUsers], |settings| {
        apply_unblock_user(settings, handle)
    })
}

pub fn reset_flag_counts<S: SettingsStore + ?Sized>(store: &mut S) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::FlagBlockCounts], |settings| {
        settings.flag_block_counts.clear();
        true
    })
}

pub fn set_note<S: SettingsStore + ?Sized>(
    store: &mut S,
    handle: &str,
    note: &str,
) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::UserStats], |settings| {
        apply_note(settings, handle, note);
        !handle.is_empty()
    })
}

pub fn set_nickname<S: SettingsStore + ?Sized>(
    store: &mut S,
    handle: &str,
    nickname: &str,
) -> Result<Settings, StoreError> {
    update(store, &[SettingKey::UserStats], |settings| {
        apply_nickname(settings, handle, nickname);
        !handle.is_empty()
    })
}
