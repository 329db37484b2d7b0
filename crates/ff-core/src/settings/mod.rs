//! Persisted settings
//!
//! The schema shared with the popup and the store interface the engine reads
//! and writes it through.

mod schema;
mod store;

pub use schema::*;
pub use store::*;
