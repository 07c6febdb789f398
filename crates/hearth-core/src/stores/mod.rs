//! Built-in store adapters.
//!
//! Durable adapters live in the `hearth-stores` crate.

mod memory;

pub use memory::MemoryStore;
