//! Database module for uptrail.
//!
//! Provides the persistence contract and its SQLite implementation.

mod models;
mod repository;
mod store;

pub use models::*;
pub use repository::*;
pub use store::*;
