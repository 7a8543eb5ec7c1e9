//! `docker` executor: one named container.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{CommandRunner, ExecutionLog, Executor, ExecutorError, Invocation, LogSender, probe_tool, report};
use crate::action::{ActionKind, ContainerSpec};
use crate::mapper::Executable;
use crate::runtime::{Direction, Runtime};

const KIND: ActionKind = ActionKind::Docker;

/// Observed state of a container or compose project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
  Absent,
  Running,
  Stopped,
}

impl Probe {
  /// Fold `{{.State}}` lines: any running entry wins, no entries means absent.
  pub(crate) fn from_states(stdout: &str) -> Self {
    let states: Vec<&str> = stdout.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    if states.is_empty() {
      Probe::Absent
    } else if states.iter().any(|state| state.eq_ignore_ascii_case("running")) {
      Probe::Running
    } else {
      Probe::Stopped
    }
  }
}

pub struct ContainerExecutor {
  runner: Arc<dyn CommandRunner>,
}

impl ContainerExecutor {
  pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
    Self { runner }
  }

  async fn probe(&self, name: &str) -> Result<Probe, ExecutorError> {
    let invocation = docker()
      .args(["ps", "-a", "--filter"])
      .arg(format!("name=^/{name}$"))
      .args(["--format", "{{.State}}"]);
    let output = self.runner.run_checked(&invocation).await?;
    Ok(Probe::from_states(&output.stdout))
  }

  async fn docker(&self, args: &[&str]) -> Result<(), ExecutorError> {
    self.runner.run_checked(&docker().args(args.iter().copied())).await?;
    Ok(())
  }

  async fn create(&self, name: &str, spec: &ContainerSpec) -> Result<(), ExecutorError> {
    self.runner.run_checked(&run_invocation(name, spec)).await?;
    Ok(())
  }

  async fn converge(&self, exe: &Executable, runtime: &Runtime, logs: &LogSender) -> Result<ExecutionLog, ExecutorError> {
    let spec = exe.fields.container.as_ref().ok_or_else(|| ExecutorError::missing(exe, "container"))?;
    let name = spec.name.as_deref().unwrap_or(&exe.name);

    logs.emit(ExecutionLog::started(KIND, "probe"));
    let state = self.probe(name).await?;
    debug!(container = %name, ?state, clean = runtime.clean, "container probed");

    let operation = match (runtime.direction, state, runtime.clean) {
      (Direction::Up, Probe::Absent, _) => {
        logs.emit(ExecutionLog::progress(KIND, "creating"));
        self.create(name, spec).await?;
        "created"
      }
      (Direction::Up, Probe::Stopped, false) => {
        logs.emit(ExecutionLog::progress(KIND, "starting"));
        self.docker(&["start", name]).await?;
        "started"
      }
      (Direction::Up, _, true) => {
        logs.emit(ExecutionLog::progress(KIND, "recreating"));
        self.docker(&["rm", "-f", name]).await?;
        self.create(name, spec).await?;
        "recreated"
      }
      (Direction::Up, Probe::Running, false) => "already-running",
      (Direction::Down, Probe::Running, clean) => {
        logs.emit(ExecutionLog::progress(KIND, "stopping"));
        self.docker(&["stop", name]).await?;
        if clean {
          self.docker(&["rm", "-f", name]).await?;
          "removed"
        } else {
          "stopped"
        }
      }
      (Direction::Down, Probe::Stopped, true) => {
        self.docker(&["rm", "-f", name]).await?;
        "removed"
      }
      (Direction::Down, Probe::Stopped, false) => "already-stopped",
      (Direction::Down, Probe::Absent, _) => return Ok(ExecutionLog::warning(KIND, "not-found")),
    };

    info!(container = %name, operation, "container converged");
    Ok(ExecutionLog::success(KIND, operation))
  }
}

fn docker() -> Invocation {
  Invocation::new("docker")
}

/// `docker run -d --name <name> [-p ..] [-e ..] [-v ..] <image> [args..]`
fn run_invocation(name: &str, spec: &ContainerSpec) -> Invocation {
  let mut invocation = docker().args(["run", "-d", "--name", name]);
  for port in &spec.ports {
    invocation = invocation.args(["-p", port.as_str()]);
  }
  for (key, value) in &spec.env {
    invocation = invocation.arg("-e").arg(format!("{key}={value}"));
  }
  for volume in &spec.volumes {
    invocation = invocation.args(["-v", volume.as_str()]);
  }
  invocation.arg(spec.image.as_str()).args(spec.args.iter().map(String::as_str))
}

#[async_trait]
impl Executor for ContainerExecutor {
  fn kind(&self) -> ActionKind {
    KIND
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    probe_tool(self.runner.as_ref(), KIND, docker().arg("info")).await
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    report(KIND, self.converge(executable, runtime, logs).await)
  }
}
