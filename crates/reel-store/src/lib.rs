//! Track record store.
//!
//! This crate provides:
//! - The `TrackStore` trait every pipeline component reads and writes through
//! - `MemoryStore`, an in-process implementation
//! - `SqliteStore`, a SQLite implementation on sqlx

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::TrackStore;
