//! Turns executor logs into operator-facing messages.
//!
//! [`describe`] maps an `(executor kind, operation)` pair to a message and
//! takes the severity from the log status. Pairs without an entry, and all
//! `Started`/`Progress` events, produce nothing here; they still reach the
//! session log and the idempotency tracker.

use crate::action::ActionKind;
use crate::executor::{ExecutionLog, LogStatus};
use crate::mapper::Executable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Success,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
  pub severity: Severity,
  pub text: String,
}

/// Output surface for run progress.
pub trait Responder: Send + Sync {
  /// An executable is about to be handed to its executor.
  fn dispatching(&self, executable: &Executable) {
    let _ = executable;
  }

  /// A mapped executor log for `action`.
  fn message(&self, action: &str, message: &Message);

  /// A run-once action was skipped without dispatch.
  fn skipped(&self, action: &str) {
    let _ = action;
  }
}

/// Describe `log` and forward it to `responder` if it maps to a message.
pub fn respond(responder: &dyn Responder, action: &str, log: &ExecutionLog) {
  if let Some(message) = describe(log) {
    responder.message(action, &message);
  }
}

pub fn describe(log: &ExecutionLog) -> Option<Message> {
  let severity = match log.status {
    LogStatus::Success => Severity::Success,
    LogStatus::Warning => Severity::Warning,
    LogStatus::Error => Severity::Error,
    LogStatus::Started | LogStatus::Progress => return None,
  };

  let text = phrase(log.kind, &log.operation)?;
  let text = match &log.error {
    Some(error) => format!("{text}: {error}"),
    None => text,
  };

  Some(Message { severity, text })
}

fn phrase(kind: ActionKind, operation: &str) -> Option<String> {
  use ActionKind::*;

  let text = match (kind, operation) {
    (_, "failed") => format!("{kind} action failed"),
    (_, "unavailable") => format!("{kind} is not available"),
    (_, "install") => format!("could not install {kind}"),

    (Docker, "created") => "container created".into(),
    (Docker, "started") => "container started".into(),
    (Docker, "recreated") => "container recreated".into(),
    (Docker, "already-running") => "container already running".into(),
    (Docker, "stopped") => "container stopped".into(),
    (Docker, "removed") => "container removed".into(),
    (Docker, "already-stopped") => "container already stopped".into(),
    (Docker, "not-found") => "container not found".into(),

    (DockerCompose, "created") => "services created".into(),
    (DockerCompose, "started") => "services started".into(),
    (DockerCompose, "recreated") => "services recreated".into(),
    (DockerCompose, "already-running") => "services already running".into(),
    (DockerCompose, "stopped") => "services stopped".into(),
    (DockerCompose, "removed") => "services removed".into(),
    (DockerCompose, "already-stopped") => "services already stopped".into(),
    (DockerCompose, "not-found") => "no services found".into(),

    (Postgres, "create-database") => "database created".into(),
    (Postgres, "drop-database") => "database dropped".into(),
    (Postgres, "create-table") => "table created".into(),
    (Postgres, "insert") => "rows inserted".into(),
    (Postgres, "database-exists") => "database already exists".into(),
    (Postgres, "database-missing") => "database does not exist".into(),
    (Postgres, "table-exists") => "table already exists".into(),
    (Postgres, "table-missing") => "table does not exist".into(),
    (Postgres, "missing-columns") => "columns do not match the table".into(),

    (Npm | Pip, "installed") => "package installed".into(),
    (Npm | Pip, "uninstalled") => "package uninstalled".into(),

    (Script, "completed") => "script finished".into(),
    (Command, "completed") => "command finished".into(),

    (Pm2, sub_command) if !sub_command.is_empty() => format!("pm2 {sub_command} completed"),

    _ => return None,
  };

  Some(text)
}
