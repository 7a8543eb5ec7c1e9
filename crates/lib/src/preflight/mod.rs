//! Pre-flight gates that run before any executable is dispatched.
//!
//! Both gates are fail-fast: a failure aborts the whole batch and no
//! executor `handle()` is ever called.

mod dependency;
mod elevation;

pub use dependency::{DependencyError, check_dependencies};
pub use elevation::{ElevationGate, Prompter};
