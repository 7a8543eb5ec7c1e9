//! Run-once tracking.
//!
//! An executable flagged `run_once` is skipped when it "has run" and was not
//! named explicitly on the command line. "Has run" compares the hash stored
//! after its last success with the hash of the executable as mapped now:
//!
//! | stored record | hashes      | has run | run-once action   |
//! |---------------|-------------|---------|-------------------|
//! | none          | -           | no      | dispatched        |
//! | present       | equal       | no      | dispatched again  |
//! | present       | different   | yes     | skipped           |
//!
//! So an unchanged run-once action is re-dispatched and a changed one is
//! skipped. This reproduces the behavior of the tool devup replaces and is
//! pinned by tests; flipping it is a product decision.

use tracing::{debug, warn};

use crate::executor::ExecutionLog;
use crate::mapper::Executable;
use crate::runtime::Runtime;
use crate::state::{StateError, StateStore};
use crate::util::hash::Hashable;

pub struct Tracker<'a> {
  store: &'a dyn StateStore,
  project_id: &'a str,
}

impl<'a> Tracker<'a> {
  pub fn new(store: &'a dyn StateStore, project_id: &'a str) -> Self {
    Self { store, project_id }
  }

  /// Attach the stored hash of each executable's last success.
  pub fn annotate(&self, executables: &mut [Executable]) -> Result<(), StateError> {
    let state = self.store.get(self.project_id)?;
    for exe in executables {
      exe.last_hash = state.run(&exe.name).map(|record| record.hash.clone());
    }
    Ok(())
  }

  pub fn should_skip(&self, executable: &Executable, runtime: &Runtime) -> bool {
    executable.run_once && has_run(executable) && !runtime.include.names(&executable.name)
  }

  /// Persist the current hash after a `Success` log; other statuses are ignored.
  pub fn update(&self, executable: &Executable, log: &ExecutionLog) -> Result<(), StateError> {
    if !log.is_success() {
      return Ok(());
    }

    let hash = match executable.compute_hash() {
      Ok(hash) => hash,
      Err(err) => {
        warn!(action = %executable.name, error = %err, "cannot hash executable, run not recorded");
        return Ok(());
      }
    };

    debug!(action = %executable.name, %hash, "recording successful run");
    self
      .store
      .update(self.project_id, &mut |state| state.record_run(&executable.name, hash.clone()))
  }
}

/// A stored hash that differs from the current one counts as "has run".
pub fn has_run(executable: &Executable) -> bool {
  let Some(last) = &executable.last_hash else {
    return false;
  };
  match executable.compute_hash() {
    Ok(current) => *last != current,
    Err(_) => false,
  }
}
