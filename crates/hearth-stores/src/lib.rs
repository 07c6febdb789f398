//! hearth-stores - Persistent store adapters for hearth.
//!
//! # Supported Backends
//!
//! - **Memory** - process-local ordered map, re-exported from `hearth-core`
//! - **SQLite** - single-file database via `rusqlite`

mod factory;
mod sqlite;

pub use factory::StoreFactory;
pub use hearth_core::stores::MemoryStore;
pub use sqlite::SqliteStore;
