//! Database module for upwatch.
//!
//! Provides SQLite storage with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;

#[cfg(test)]
pub(crate) use store::tests;
