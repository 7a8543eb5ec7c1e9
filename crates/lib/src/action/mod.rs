//! Declared actions: the canonical shape every project file is read into.
//!
//! An [`Action`] is immutable for the length of a run. The mapper turns it,
//! together with the resolved runtime, into a direction-specific
//! [`Executable`](crate::mapper::Executable).

mod kind;
mod types;

pub use kind::{ActionKind, UnknownKind};
pub use types::*;
