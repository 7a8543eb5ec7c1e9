//! Per-run session log.
//!
//! A [`Session`] is opened when a run starts and closed when it ends. Every
//! executor log of the run is appended as one JSON line to
//! `{logs_dir}/session-<unix_ts>.log`, and errors are counted so the closing
//! summary can point at the file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::action::ActionKind;
use crate::executor::{ExecutionLog, LogStatus};
use crate::util::unix_now;

#[derive(Debug, Error)]
#[error("failed to open session log {path}")]
pub struct SessionError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

#[derive(Serialize)]
struct Entry<'a> {
  timestamp: u64,
  action: &'a str,
  kind: ActionKind,
  status: LogStatus,
  operation: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<&'a str>,
}

#[derive(Debug)]
pub struct Session {
  path: PathBuf,
  file: File,
  errors: usize,
}

/// What remains of a session once it is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
  pub path: PathBuf,
  pub errors: usize,
}

impl Session {
  pub fn open(logs_dir: &Path) -> Result<Self, SessionError> {
    let path = logs_dir.join(format!("session-{}.log", unix_now()));
    let open = || -> io::Result<File> {
      fs::create_dir_all(logs_dir)?;
      OpenOptions::new().create(true).append(true).open(&path)
    };

    match open() {
      Ok(file) => Ok(Self { path, file, errors: 0 }),
      Err(source) => Err(SessionError { path, source }),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Append one log line. Write failures are traced, never fatal to the run.
  pub fn record(&mut self, action: &str, log: &ExecutionLog) {
    if log.is_error() {
      self.errors += 1;
    }

    let entry = Entry {
      timestamp: unix_now(),
      action,
      kind: log.kind,
      status: log.status,
      operation: &log.operation,
      error: log.error.as_deref(),
    };

    let written = serde_json::to_string(&entry)
      .map_err(io::Error::other)
      .and_then(|line| writeln!(self.file, "{line}"));
    if let Err(err) = written {
      warn!(path = %self.path.display(), error = %err, "failed to write session log");
    }
  }

  pub fn close(mut self) -> SessionSummary {
    if let Err(err) = self.file.flush() {
      warn!(path = %self.path.display(), error = %err, "failed to flush session log");
    }
    SessionSummary {
      path: self.path,
      errors: self.errors,
    }
  }
}
