//! Adapters for the [`Store`](pifleet_common::store::Store) capability.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
