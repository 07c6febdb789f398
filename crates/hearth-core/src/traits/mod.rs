//! Collaborator traits for hearth.

mod classifier;
mod content_policy;
mod sender;
mod store;

pub use classifier::*;
pub use content_policy::*;
pub use sender::*;
pub use store::*;
