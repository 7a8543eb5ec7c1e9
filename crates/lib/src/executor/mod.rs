//! Executor contract, per-call log channels and the executor registry.
//!
//! Every action type is served by one [`Executor`]. Each `check`/`handle`/
//! `install` call receives its own [`LogSender`]; the channel lives exactly as
//! long as the call, so progress events from one action can never leak into
//! another's stream.
//!
//! # Example
//!
//! ```
//! use devup_lib::action::ActionKind;
//! use devup_lib::executor::{ExecutionLog, LogStatus, log_channel};
//!
//! let (logs, mut events) = log_channel();
//! logs.emit(ExecutionLog::started(ActionKind::Command, "run"));
//! drop(logs);
//!
//! let first = events.try_recv().unwrap();
//! assert_eq!(first.status, LogStatus::Started);
//! ```

mod compose;
mod container;
mod database;
mod launcher;
mod package;
pub mod process;
mod script;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::action::ActionKind;
use crate::mapper::Executable;
use crate::options::OptionError;
use crate::runtime::Runtime;

pub use compose::ComposeExecutor;
pub use container::ContainerExecutor;
pub use database::PostgresExecutor;
pub use launcher::Pm2Executor;
pub use package::{PackageExecutor, PackageManager};
pub use process::{CommandOutput, CommandRunner, Invocation, ProcessError, SystemRunner};
pub use script::{CommandExecutor, ScriptExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
  Started,
  Progress,
  Success,
  Error,
  Warning,
}

impl fmt::Display for LogStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      LogStatus::Started => "started",
      LogStatus::Progress => "progress",
      LogStatus::Success => "success",
      LogStatus::Error => "error",
      LogStatus::Warning => "warning",
    };
    f.write_str(s)
  }
}

/// A status event produced by an executor.
///
/// `operation` is a short tag such as `created`, `already-running` or
/// `table-missing` that the responder maps to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
  pub status: LogStatus,
  pub operation: String,
  pub kind: ActionKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ExecutionLog {
  pub fn new(status: LogStatus, kind: ActionKind, operation: impl Into<String>) -> Self {
    Self {
      status,
      operation: operation.into(),
      kind,
      error: None,
    }
  }

  pub fn started(kind: ActionKind, operation: impl Into<String>) -> Self {
    Self::new(LogStatus::Started, kind, operation)
  }

  pub fn progress(kind: ActionKind, operation: impl Into<String>) -> Self {
    Self::new(LogStatus::Progress, kind, operation)
  }

  pub fn success(kind: ActionKind, operation: impl Into<String>) -> Self {
    Self::new(LogStatus::Success, kind, operation)
  }

  pub fn warning(kind: ActionKind, operation: impl Into<String>) -> Self {
    Self::new(LogStatus::Warning, kind, operation)
  }

  pub fn error(kind: ActionKind, operation: impl Into<String>, error: impl fmt::Display) -> Self {
    Self {
      error: Some(error.to_string()),
      ..Self::new(LogStatus::Error, kind, operation)
    }
  }

  /// Formats the full error chain, not just the outermost message.
  pub fn failure(kind: ActionKind, operation: impl Into<String>, error: &(dyn std::error::Error + 'static)) -> Self {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
      message.push_str(": ");
      message.push_str(&cause.to_string());
      source = cause.source();
    }
    Self::error(kind, operation, message)
  }

  pub fn is_error(&self) -> bool {
    self.status == LogStatus::Error
  }

  pub fn is_success(&self) -> bool {
    self.status == LogStatus::Success
  }
}

/// Internal failure of an executor call, reported as an `Error` log.
#[derive(Debug, Error)]
pub enum ExecutorError {
  #[error("action '{action}' has no {field} definition")]
  MissingField { action: String, field: &'static str },

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Option(#[from] OptionError),

  #[error("database error")]
  Database(#[from] sqlx::Error),

  #[error("timed out connecting to {0}")]
  ConnectTimeout(String),
}

impl ExecutorError {
  pub(crate) fn missing(executable: &Executable, field: &'static str) -> Self {
    ExecutorError::MissingField {
      action: executable.name.clone(),
      field,
    }
  }
}

/// Collapse an executor result into the log reported for the call.
pub(crate) fn report(kind: ActionKind, result: Result<ExecutionLog, ExecutorError>) -> ExecutionLog {
  result.unwrap_or_else(|err| ExecutionLog::failure(kind, "failed", &err))
}

/// Availability check shared by the CLI-backed executors.
pub(crate) async fn probe_tool(runner: &dyn CommandRunner, kind: ActionKind, invocation: Invocation) -> ExecutionLog {
  match runner.run_checked(&invocation).await {
    Ok(_) => ExecutionLog::success(kind, "available"),
    Err(err) => ExecutionLog::failure(kind, "unavailable", &err),
  }
}

/// Sending half of a per-call log channel.
#[derive(Debug, Clone)]
pub struct LogSender(mpsc::UnboundedSender<ExecutionLog>);

impl LogSender {
  /// Emit an event. Events sent after the observer went away are dropped.
  pub fn emit(&self, log: ExecutionLog) {
    let _ = self.0.send(log);
  }
}

pub type LogReceiver = mpsc::UnboundedReceiver<ExecutionLog>;

/// Create a channel scoped to one executor call.
pub fn log_channel() -> (LogSender, LogReceiver) {
  let (tx, rx) = mpsc::unbounded_channel();
  (LogSender(tx), rx)
}

/// Run one executor call with its own channel, feeding every event to `observer`
/// while the call is in flight. The final log is returned and not observed.
pub async fn observe<F, Fut>(call: F, mut observer: impl FnMut(&ExecutionLog)) -> ExecutionLog
where
  F: FnOnce(LogSender) -> Fut,
  Fut: Future<Output = ExecutionLog>,
{
  let (logs, mut events) = log_channel();
  let call = call(logs);
  let drain = async {
    while let Some(event) = events.recv().await {
      observer(&event);
    }
  };

  let (result, ()) = tokio::join!(call, drain);
  result
}

/// Handler for one action type.
#[async_trait]
pub trait Executor: Send + Sync {
  fn kind(&self) -> ActionKind;

  /// Verify the backing tool or service is present and reachable. Must not mutate anything.
  async fn check(&self, executable: &Executable, logs: &LogSender) -> ExecutionLog;

  /// Converge to the requested direction. Failures come back as `Error` logs.
  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog;

  /// Whether a failed check may be repaired through [`install`](Self::install).
  fn remediable(&self) -> bool {
    false
  }

  /// Install the backing tool. Extension point: no bundled executor can
  /// install its own toolchain yet, so the default reports an error.
  async fn install(&self, executable: &Executable, logs: &LogSender) -> ExecutionLog {
    let _ = (executable, logs);
    ExecutionLog::error(self.kind(), "install", "automatic installation is not available")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no executor registered for action type '{0}'")]
pub struct ExecutorNotRegistered(pub ActionKind);

/// Maps each [`ActionKind`] to the executor serving it.
#[derive(Clone, Default)]
pub struct Registry {
  executors: HashMap<ActionKind, Arc<dyn Executor>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// All bundled executors, driving external tools through `runner`.
  pub fn with_defaults(runner: Arc<dyn CommandRunner>) -> Self {
    let mut registry = Self::new();
    registry.register(ContainerExecutor::new(runner.clone()));
    registry.register(ComposeExecutor::new(runner.clone()));
    registry.register(PostgresExecutor::new());
    registry.register(PackageExecutor::new(PackageManager::Npm, runner.clone()));
    registry.register(PackageExecutor::new(PackageManager::Pip, runner.clone()));
    registry.register(ScriptExecutor::new(runner.clone()));
    registry.register(CommandExecutor::new(runner.clone()));
    registry.register(Pm2Executor::new(runner));
    registry
  }

  /// Register an executor, replacing any previous one for the same kind.
  pub fn register<E: Executor + 'static>(&mut self, executor: E) {
    self.register_arc(Arc::new(executor));
  }

  pub fn register_arc(&mut self, executor: Arc<dyn Executor>) {
    self.executors.insert(executor.kind(), executor);
  }

  pub fn get(&self, kind: ActionKind) -> Result<Arc<dyn Executor>, ExecutorNotRegistered> {
    self.executors.get(&kind).cloned().ok_or(ExecutorNotRegistered(kind))
  }

  pub fn kinds(&self) -> Vec<ActionKind> {
    let mut kinds: Vec<_> = self.executors.keys().copied().collect();
    kinds.sort();
    kinds
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry").field("kinds", &self.kinds()).finish()
  }
}
