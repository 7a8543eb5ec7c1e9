//! Package installer executors (`npm`, `pip`).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{CommandRunner, ExecutionLog, Executor, ExecutorError, Invocation, LogSender, probe_tool, report};
use crate::action::ActionKind;
use crate::mapper::Executable;
use crate::runtime::{Direction, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
  Npm,
  Pip,
}

impl PackageManager {
  fn kind(self) -> ActionKind {
    match self {
      PackageManager::Npm => ActionKind::Npm,
      PackageManager::Pip => ActionKind::Pip,
    }
  }

  fn program(self) -> &'static str {
    match self {
      PackageManager::Npm => "npm",
      PackageManager::Pip => "pip",
    }
  }

  fn install_args(self) -> &'static [&'static str] {
    match self {
      PackageManager::Npm => &["install", "-g"],
      PackageManager::Pip => &["install"],
    }
  }

  fn uninstall_args(self) -> &'static [&'static str] {
    match self {
      PackageManager::Npm => &["uninstall", "-g"],
      PackageManager::Pip => &["uninstall", "-y"],
    }
  }
}

pub struct PackageExecutor {
  manager: PackageManager,
  runner: Arc<dyn CommandRunner>,
}

impl PackageExecutor {
  pub fn new(manager: PackageManager, runner: Arc<dyn CommandRunner>) -> Self {
    Self { manager, runner }
  }

  async fn converge(&self, exe: &Executable, runtime: &Runtime, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    let kind = self.manager.kind();
    let package = exe.fields.package.as_deref().ok_or_else(|| ExecutorError::missing(exe, "package"))?;

    let (args, progress, operation) = match runtime.direction {
      Direction::Up => (self.manager.install_args(), "installing", "installed"),
      Direction::Down => (self.manager.uninstall_args(), "uninstalling", "uninstalled"),
    };

    logs.emit(ExecutionLog::started(kind, progress));
    let invocation = Invocation::new(self.manager.program())
      .args(args.iter().copied())
      .arg(package)
      .current_dir(&exe.location);
    self.runner.run_checked(&invocation).await?;

    info!(package = %package, manager = self.manager.program(), operation, "package converged");
    Ok(ExecutionLog::success(kind, operation))
  }
}

#[async_trait]
impl Executor for PackageExecutor {
  fn kind(&self) -> ActionKind {
    self.manager.kind()
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    let invocation = Invocation::new(self.manager.program()).arg("--version");
    probe_tool(self.runner.as_ref(), self.manager.kind(), invocation).await
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(self.manager.kind(), self.converge(executable, runtime, logs).await)
  }

  fn remediable(&self) -> bool {
    true
  }
}
