//! Database module
//!
//! SQLite pool, schema migrations and the `DietStore` backed by them.

pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::{Database, DbError, DbResult};
pub use store::SqliteStore;
