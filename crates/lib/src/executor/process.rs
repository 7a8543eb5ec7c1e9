//! External process invocation.
//!
//! Executors never spawn processes directly. They describe an [`Invocation`]
//! and hand it to a [`CommandRunner`], which keeps their state machines
//! testable against scripted fakes.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to spawn '{program}'")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("'{command}' exited with code {code:?}: {stderr}")]
  Failed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },
}

/// A fully described process to run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  /// Run `script` through the platform shell.
  pub fn shell(script: &str) -> Self {
    let (program, args) = platform_shell();
    Self::new(program).args(args).arg(script)
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.program)?;
    for arg in &self.args {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Turn a non-zero exit into [`ProcessError::Failed`].
  pub fn check(self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
    if self.success() {
      Ok(self)
    } else {
      Err(ProcessError::Failed {
        command: invocation.to_string(),
        code: self.code,
        stderr: self.stderr.trim().to_string(),
      })
    }
  }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
  /// Run to completion. A non-zero exit is not an error at this level.
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError>;

  /// Run and require a zero exit code.
  async fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
    self.run(invocation).await?.check(invocation)
  }
}

/// Spawns real processes with `tokio::process`, inheriting the caller's environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
    debug!(command = %invocation, cwd = ?invocation.cwd, "spawning process");

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).kill_on_drop(true);
    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    let output = command.output().await.map_err(|source| ProcessError::Spawn {
      program: invocation.program.clone(),
      source,
    })?;

    let result = CommandOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr, "process stderr");
    }

    Ok(result)
  }
}

/// Shell binary and the flags that precede a command string.
///
/// `/bin/sh` rather than `$SHELL` so user profiles are not sourced.
pub fn platform_shell() -> (&'static str, Vec<&'static str>) {
  #[cfg(unix)]
  {
    ("/bin/sh", vec!["-c"])
  }

  #[cfg(windows)]
  {
    ("powershell.exe", vec!["-NoProfile", "-NonInteractive", "-Command"])
  }
}
