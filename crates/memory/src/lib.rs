//! Context store implementations for Complimenter.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryContextStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteContextStore;
