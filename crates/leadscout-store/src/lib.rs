//! Single-writer SQLite persistence for the lead discovery engine.
//!
//! Every table, unique constraint, and idempotent-insert helper the
//! collector and rule processor need lives behind the [`Store`] handle —
//! callers never touch `rusqlite` directly.

pub mod error;
pub mod models;
pub mod schema;
mod store;

pub use error::{StoreError, Result};
pub use store::Store;
