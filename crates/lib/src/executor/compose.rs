//! `docker-compose` executor: a compose project described by one or more files.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::container::Probe;
use super::{CommandRunner, ExecutionLog, Executor, ExecutorError, Invocation, LogSender, probe_tool, report};
use crate::action::ActionKind;
use crate::mapper::Executable;
use crate::runtime::{Direction, Runtime};

const KIND: ActionKind = ActionKind::DockerCompose;

pub struct ComposeExecutor {
  runner: Arc<dyn CommandRunner>,
}

impl ComposeExecutor {
  pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
    Self { runner }
  }

  async fn compose(&self, exe: &Executable, args: &[&str]) -> Result<String, ExecutorError> {
    let output = self.runner.run_checked(&compose(exe).args(args.iter().copied())).await?;
    Ok(output.stdout)
  }

  async fn converge(&self, exe: &Executable, runtime: &Runtime, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    logs.emit(ExecutionLog::started(KIND, "probe"));
    let state = Probe::from_states(&self.compose(exe, &["ps", "--all", "--format", "{{.State}}"]).await?);
    debug!(action = %exe.name, ?state, clean = runtime.clean, "compose project probed");

    let operation = match (runtime.direction, state, runtime.clean) {
      (Direction::Up, Probe::Absent, false) => {
        logs.emit(ExecutionLog::progress(KIND, "creating"));
        self.compose(exe, &["up", "-d"]).await?;
        "created"
      }
      (Direction::Up, Probe::Stopped, false) => {
        logs.emit(ExecutionLog::progress(KIND, "starting"));
        self.compose(exe, &["start"]).await?;
        "started"
      }
      (Direction::Up, _, true) => {
        logs.emit(ExecutionLog::progress(KIND, "recreating"));
        self.compose(exe, &["up", "-d", "--force-recreate"]).await?;
        "recreated"
      }
      (Direction::Up, Probe::Running, false) => "already-running",
      (Direction::Down, Probe::Absent, _) => return Ok(ExecutionLog::warning(KIND, "not-found")),
      (Direction::Down, _, true) => {
        logs.emit(ExecutionLog::progress(KIND, "removing"));
        self.compose(exe, &["down", "-v"]).await?;
        "removed"
      }
      (Direction::Down, Probe::Running, false) => {
        logs.emit(ExecutionLog::progress(KIND, "stopping"));
        self.compose(exe, &["stop"]).await?;
        "stopped"
      }
      (Direction::Down, Probe::Stopped, false) => "already-stopped",
    };

    info!(action = %exe.name, operation, "compose project converged");
    Ok(ExecutionLog::success(KIND, operation))
  }
}

/// `docker compose [-f <file>]..` run from the project directory.
fn compose(exe: &Executable) -> Invocation {
  let mut invocation = Invocation::new("docker").arg("compose").current_dir(&exe.location);
  for file in &exe.fields.file {
    invocation = invocation
      .arg("-f")
      .arg(exe.resolve_path(file).display().to_string());
  }
  invocation
}

#[async_trait]
impl Executor for ComposeExecutor {
  fn kind(&self) -> ActionKind {
    KIND
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    probe_tool(self.runner.as_ref(), KIND, Invocation::new("docker").args(["compose", "version"])).await
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(KIND, self.converge(executable, runtime, logs).await)
  }
}
