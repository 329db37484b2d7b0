//! The assembled flag catalog and lookups over it.

use std::sync::OnceLock;

use crate::data::{COUNTRY_TABLE, CURATED_FLAGS};
use crate::parser::{parse_country_table, FlagOption};

static CATALOG: OnceLock<Vec<FlagOption>> = OnceLock::new();

/// Every known flag, sorted by name ignoring case.
pub fn all_flags() -> &'static [FlagOption] {
    CATALOG.get_or_init(build_catalog)
}

fn build_catalog() -> Vec<FlagOption> {
    let mut options = parse_country_table(COUNTRY_TABLE);
    options.extend(CURATED_FLAGS.iter().map(|(code, name, emoji)| FlagOption {
        code: code.to_string(),
        name: name.to_string(),
        emoji: emoji.to_string(),
    }));
    options.retain(|option| !option.emoji.is_empty());
    options.sort_by_cached_key(|option| option.name.to_lowercase());

    log::debug!("flag catalog built with {} entries", options.len());
    options
}

/// Filter the catalog the way the popup search box does: a blank term
/// returns everything, otherwise the term (trimmed, case-insensitive) must
/// appear in the name or code, or equal the emoji.
pub fn search(term: &str) -> Vec<&'static FlagOption> {
    let term = term.trim();
    if term.is_empty() {
        return all_flags().iter().collect();
    }

    let lowered = term.to_lowercase();
    all_flags()
        .iter()
        .filter(|option| {
            option.name.to_lowercase().contains(&lowered)
                || option.code.to_lowercase().contains(&lowered)
                || option.emoji == term
        })
        .collect()
}

pub fn find_by_emoji(emoji: &str) -> Option<&'static FlagOption> {
    all_flags().iter().find(|option| option.emoji == emoji)
}

/// Case-insensitive lookup by code (`fr`, `PRIDE`).
pub fn find_by_code(code: &str) -> Option<&'static FlagOption> {
    let code = code.trim();
    all_flags()
        .iter()
        .find(|option| option.code.eq_ignore_ascii_case(code))
}
