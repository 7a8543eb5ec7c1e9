//! `pm2` executor: process-manager launcher fed ecosystem/config files.
//!
//! The action's `command` field names the pm2 sub-command (`start`, `restart`,
//! `delete`, ...). Without one, Up starts and Down stops.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{CommandRunner, ExecutionLog, Executor, ExecutorError, Invocation, LogSender, probe_tool, report};
use crate::action::ActionKind;
use crate::mapper::Executable;
use crate::runtime::{Direction, Runtime};

const KIND: ActionKind = ActionKind::Pm2;

pub struct Pm2Executor {
  runner: Arc<dyn CommandRunner>,
}

impl Pm2Executor {
  pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
    Self { runner }
  }

  async fn launch(&self, exe: &Executable, runtime: &Runtime, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    if exe.fields.file.is_empty() {
      return Err(ExecutorError::missing(exe, "file"));
    }

    let sub_command = match (exe.fields.command.as_deref(), runtime.direction) {
      (Some(sub_command), _) => sub_command,
      (None, Direction::Up) => "start",
      (None, Direction::Down) => "stop",
    };

    let invocation = Invocation::new("pm2")
      .args(sub_command.split_whitespace())
      .args(exe.fields.file.iter().map(|file| exe.resolve_path(file).display().to_string()))
      .current_dir(&exe.location);

    logs.emit(ExecutionLog::started(KIND, sub_command));
    self.runner.run_checked(&invocation).await?;

    info!(action = %exe.name, sub_command, "pm2 finished");
    Ok(ExecutionLog::success(KIND, sub_command))
  }
}

#[async_trait]
impl Executor for Pm2Executor {
  fn kind(&self) -> ActionKind {
    KIND
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    probe_tool(self.runner.as_ref(), KIND, Invocation::new("pm2").arg("--version")).await
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(KIND, self.launch(executable, runtime, logs).await)
  }
}
