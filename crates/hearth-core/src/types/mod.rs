//! Core types for hearth.

mod event;
mod keys;

pub use event::*;
pub use keys::*;
