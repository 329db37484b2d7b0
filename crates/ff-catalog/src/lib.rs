//! FlagFilter Flag Catalog
//!
//! This crate holds the list of flags a user can pick from: every ISO 3166
//! country turned into its regional-indicator emoji, plus a handful of
//! curated symbols that are not country flags.

pub mod catalog;
pub mod data;
pub mod parser;

pub use catalog::{all_flags, find_by_code, find_by_emoji, search};
pub use parser::{iso_code_to_emoji, parse_country_table, FlagOption};
