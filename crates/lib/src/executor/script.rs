//! `script` and `command` executors.
//!
//! Both run once per dispatch; neither has a meaningful availability check,
//! so `check` always reports available.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{CommandRunner, ExecutionLog, Executor, ExecutorError, Invocation, LogSender, report};
use crate::action::ActionKind;
use crate::mapper::Executable;
use crate::options;
use crate::runtime::Runtime;

/// Runs a script file, appending rendered option insertions as arguments.
pub struct ScriptExecutor {
  runner: Arc<dyn CommandRunner>,
}

impl ScriptExecutor {
  pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
    Self { runner }
  }

  async fn run(&self, exe: &Executable, runtime: &Runtime, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    const KIND: ActionKind = ActionKind::Script;

    let file = exe.fields.file.first().ok_or_else(|| ExecutorError::missing(exe, "file"))?;
    let insertions = options::render(exe, &runtime.args)?;

    let invocation = interpreter(&exe.resolve_path(file))
      .args(insertions.into_iter().map(|insertion| insertion.text))
      .current_dir(&exe.location);

    logs.emit(ExecutionLog::started(KIND, "running"));
    let output = self.runner.run_checked(&invocation).await?;
    if !output.stdout.is_empty() {
      logs.emit(ExecutionLog::progress(KIND, "output"));
    }

    info!(action = %exe.name, script = %file, "script finished");
    Ok(ExecutionLog::success(KIND, "completed"))
  }
}

/// Pick an interpreter from the script extension, or run the file directly.
fn interpreter(script: &Path) -> Invocation {
  let path = script.display().to_string();
  match script.extension().and_then(|ext| ext.to_str()) {
    Some("sh") => Invocation::new("sh").arg(path),
    Some("ps1") => Invocation::new("powershell").args(["-NoProfile", "-File"]).arg(path),
    Some("js") => Invocation::new("node").arg(path),
    Some("py") => Invocation::new("python3").arg(path),
    _ => Invocation::new(path),
  }
}

#[async_trait]
impl Executor for ScriptExecutor {
  fn kind(&self) -> ActionKind {
    ActionKind::Script
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    ExecutionLog::success(ActionKind::Script, "available")
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(ActionKind::Script, self.run(executable, runtime, logs).await)
  }
}

/// Runs a shell command string after `$${opt:<key>}` substitution.
pub struct CommandExecutor {
  runner: Arc<dyn CommandRunner>,
}

impl CommandExecutor {
  pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
    Self { runner }
  }

  async fn run(&self, exe: &Executable, runtime: &Runtime, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    const KIND: ActionKind = ActionKind::Command;

    let template = exe.fields.command.as_deref().ok_or_else(|| ExecutorError::missing(exe, "command"))?;
    let command = options::substitute(exe, &runtime.args, template)?;

    logs.emit(ExecutionLog::started(KIND, "running"));
    self
      .runner
      .run_checked(&Invocation::shell(&command).current_dir(&exe.location))
      .await?;

    info!(action = %exe.name, "command finished");
    Ok(ExecutionLog::success(KIND, "completed"))
  }
}

#[async_trait]
impl Executor for CommandExecutor {
  fn kind(&self) -> ActionKind {
    ActionKind::Command
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    ExecutionLog::success(ActionKind::Command, "available")
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(ActionKind::Command, self.run(executable, runtime, logs).await)
  }
}
