use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::mapper::Executable;

/// Asks the operator a yes/no question.
#[async_trait]
pub trait Prompter: Send + Sync {
  /// `None` when no answer can be obtained (closed or non-interactive input).
  async fn ask(&self, message: &str) -> Option<bool>;
}

/// Confirms that elevated actions may run in an unelevated process.
pub struct ElevationGate<'a> {
  prompter: &'a dyn Prompter,
  elevated: bool,
  timeout: Option<Duration>,
}

impl<'a> ElevationGate<'a> {
  /// `elevated` is whether the current process already has admin/root rights.
  pub fn new(prompter: &'a dyn Prompter, elevated: bool) -> Self {
    Self {
      prompter,
      elevated,
      timeout: None,
    }
  }

  /// Bound the wait for an answer. Without one the prompt waits indefinitely.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// True if the batch may proceed. A declined, unanswered or timed-out prompt yields false.
  pub async fn confirm(&self, skip: bool, executables: &[Executable]) -> bool {
    if skip || self.elevated {
      return true;
    }

    let elevated: Vec<&str> = executables
      .iter()
      .filter(|exe| exe.requires_elevation())
      .map(|exe| exe.name.as_str())
      .collect();
    if elevated.is_empty() {
      return true;
    }

    let message = format!(
      "{} require elevated permissions but devup is not running as administrator. Continue?",
      elevated.join(", ")
    );

    let answer = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, self.prompter.ask(&message)).await {
        Ok(answer) => answer,
        Err(_) => {
          warn!(timeout = ?limit, "elevation confirmation timed out");
          None
        }
      },
      None => self.prompter.ask(&message).await,
    };

    debug!(?answer, actions = ?elevated, "elevation confirmation");
    answer.unwrap_or(false)
  }
}
