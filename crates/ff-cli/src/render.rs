//! Text rendering for CLI output.

use ff_catalog::{find_by_emoji, FlagOption};
use ff_core::stats;
use ff_core::{Settings, UserStats};

pub fn flag_row(option: &FlagOption) -> String {
    format!("{}  {} ({})", option.emoji, option.name, option.code)
}

fn blocked_suffix(count: u64) -> String {
    if count > 0 {
        format!(" — {} blocked", count)
    } else {
        String::new()
    }
}

/// Selected-flag pill: `🇫🇷 FR — 3 blocked`. Flags missing from the catalog
/// show the raw glyph.
pub fn pill(flag: &str, settings: &Settings) -> String {
    let count = settings.flag_block_counts.get(flag).copied().unwrap_or(0);
    match find_by_emoji(flag) {
        Some(option) => format!("{} {}{}", option.emoji, option.code, blocked_suffix(count)),
        None => format!("{}{}", flag, blocked_suffix(count)),
    }
}

pub fn count_row(flag: &str, count: u64) -> String {
    let label = match find_by_emoji(flag) {
        Some(option) => format!("{} {}", option.emoji, option.name),
        None => flag.to_string(),
    };
    format!("{:<32} {}", label, count)
}

pub fn user_row(handle: &str, stats: Option<&UserStats>, blocked: bool) -> String {
    let mut row = format!("@{}", handle);
    let Some(stats) = stats else {
        if blocked {
            row.push_str("  [blocked]");
        }
        return row;
    };

    if !stats.nickname.is_empty() {
        row.push_str(&format!(" ({})", stats.nickname));
    }
    row.push_str(&format!(
        "  score {} ({} matches, {} manual)",
        stats::score(stats),
        stats.flag_matches,
        stats.manual_blocks
    ));
    if blocked {
        row.push_str("  [blocked]");
    }
    if !stats.flags.is_empty() {
        row.push_str(&format!("  {}", stats.flags.join(" ")));
    }
    if !stats.note.is_empty() {
        row.push_str(&format!("\n    note: {}", stats.note));
    }
    row
}

/// Every known user: blocked handles first in list order, then the rest
/// alphabetically.
pub fn user_rows(settings: &Settings) -> Vec<String> {
    let mut rows: Vec<String> = settings
        .blocked_users
        .iter()
        .map(|handle| user_row(handle, settings.user_stats.get(handle), true))
        .collect();

    rows.extend(
        settings
            .user_stats
            .iter()
            .filter(|(handle, _)| !settings.is_blocked(handle))
            .map(|(handle, stats)| user_row(handle, Some(stats), false)),
    );
    rows
}
