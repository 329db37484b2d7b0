//! Flag Matcher
//!
//! Exact substring test of every selected glyph against every candidate
//! name. Emoji sequences are compared as opaque strings: no normalization of
//! variation selectors or modifiers, so visually identical flags encoded
//! differently do not match each other.

use std::collections::BTreeSet;

/// Return the selected glyphs that occur in at least one candidate name.
pub fn match_flags<'a, I, F>(names: I, selected: F) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
    F: IntoIterator<Item = &'a String> + Copy,
{
    let mut matched = BTreeSet::new();

    for name in names {
        for flag in selected {
            if !flag.is_empty() && name.contains(flag.as_str()) {
                matched.insert(flag.clone());
            }
        }
    }

    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(flags: &[&str]) -> BTreeSet<String> {
        flags.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_rainbow_flag_scenario() {
        let selected = set(&["🏳️‍🌈"]);
        let matched = match_flags(["Alice 🏳️‍🌈"], &selected);
        assert_eq!(matched, set(&["🏳️‍🌈"]));
    }

    #[test]
    fn test_union_across_names() {
        let selected = set(&["🇫🇷", "🇩🇪", "🇮🇹"]);
        let matched = match_flags(["Bob 🇫🇷", "🇩🇪 fan"], &selected);
        assert_eq!(matched, set(&["🇫🇷", "🇩🇪"]));
    }

    #[test]
    fn test_no_false_positives() {
        let selected = set(&["🇫🇷"]);
        assert!(match_flags(["Carol 🇨🇦", "plain"], &selected).is_empty());
        assert!(match_flags(std::iter::empty(), &selected).is_empty());
    }

    #[test]
    fn test_empty_glyph_ignored() {
        let selected = set(&[""]);
        assert!(match_flags(["anything"], &selected).is_empty());
    }

    #[test]
    fn test_variation_selector_not_normalized() {
        // U+2721 alone vs. U+2721 U+FE0F
        let selected = set(&["\u{2721}\u{FE0F}"]);
        assert!(match_flags(["Dan \u{2721}"], &selected).is_empty());
        assert_eq!(match_flags(["Dan \u{2721}\u{FE0F}"], &selected).len(), 1);
    }

    #[test]
    fn test_multi_glyph_flag_matches_as_sequence() {
        let selected = set(&["💗💜💙"]);
        assert!(match_flags(["Eve 💗💜"], &selected).is_empty());
        assert_eq!(match_flags(["Eve 💗💜💙"], &selected), set(&["💗💜💙"]));
    }
}
