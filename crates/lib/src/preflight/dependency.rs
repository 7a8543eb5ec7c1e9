use thiserror::Error;
use tracing::{info, warn};

use crate::action::ActionKind;
use crate::executor::{ExecutionLog, ExecutorNotRegistered, Registry, observe};
use crate::mapper::Executable;

#[derive(Debug, Error)]
pub enum DependencyError {
  #[error(transparent)]
  NotRegistered(#[from] ExecutorNotRegistered),

  #[error("{kind} is not available for action '{action}': {reason}")]
  Unavailable {
    action: String,
    kind: ActionKind,
    reason: String,
  },
}

/// Check the backing tool of every executable and its sub-steps, in order.
///
/// A failed check on a remediable executor triggers one `install()` attempt;
/// any other failure stops the scan. `observer` receives every log produced,
/// tagged with the executable it belongs to.
pub async fn check_dependencies(
  registry: &Registry,
  executables: &[Executable],
  mut observer: impl FnMut(&Executable, &ExecutionLog),
) -> Result<(), DependencyError> {
  for exe in executables.iter().flat_map(Executable::with_steps) {
    let executor = registry.get(exe.kind)?;
    let executor = executor.as_ref();

    let checked = observe(
      |logs| async move { executor.check(exe, &logs).await },
      |event| observer(exe, event),
    )
    .await;
    observer(exe, &checked);

    if !checked.is_error() {
      continue;
    }

    if !executor.remediable() {
      warn!(action = %exe.name, kind = %exe.kind, "dependency unavailable");
      return Err(unavailable(exe, &checked));
    }

    info!(action = %exe.name, kind = %exe.kind, "attempting to install missing dependency");
    let installed = observe(
      |logs| async move { executor.install(exe, &logs).await },
      |event| observer(exe, event),
    )
    .await;
    observer(exe, &installed);

    if installed.is_error() {
      warn!(action = %exe.name, kind = %exe.kind, "dependency installation failed");
      return Err(unavailable(exe, &installed));
    }
  }

  Ok(())
}

fn unavailable(exe: &Executable, log: &ExecutionLog) -> DependencyError {
  DependencyError::Unavailable {
    action: exe.name.clone(),
    kind: exe.kind,
    reason: log.error.clone().unwrap_or_else(|| log.operation.clone()),
  }
}
