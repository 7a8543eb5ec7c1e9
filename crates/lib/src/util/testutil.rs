//! Test doubles shared by the library's unit tests.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::action::ActionKind;
use crate::executor::{CommandOutput, CommandRunner, Invocation, ProcessError};
use crate::mapper::{Executable, Fields};

#[derive(Debug, Clone)]
enum Reply {
  Output(CommandOutput),
  Missing,
}

/// A [`CommandRunner`] that answers from a script instead of spawning processes.
///
/// Rules match on the rendered command line prefix; the most recently added
/// matching rule wins. Unmatched commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
  rules: Vec<(String, Reply)>,
  calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on_ok(mut self, prefix: &str, stdout: &str) -> Self {
    let output = CommandOutput {
      code: Some(0),
      stdout: stdout.to_string(),
      stderr: String::new(),
    };
    self.rules.push((prefix.to_string(), Reply::Output(output)));
    self
  }

  pub fn on_fail(mut self, prefix: &str, code: i32, stderr: &str) -> Self {
    let output = CommandOutput {
      code: Some(code),
      stdout: String::new(),
      stderr: stderr.to_string(),
    };
    self.rules.push((prefix.to_string(), Reply::Output(output)));
    self
  }

  /// Commands starting with `prefix` fail to spawn, as if the binary were absent.
  pub fn on_missing(mut self, prefix: &str) -> Self {
    self.rules.push((prefix.to_string(), Reply::Missing));
    self
  }

  /// Every command line run so far, in order.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
    let line = invocation.to_string();
    self.calls.lock().unwrap().push(line.clone());

    let reply = self
      .rules
      .iter()
      .rev()
      .find(|(prefix, _)| line.starts_with(prefix.as_str()))
      .map(|(_, reply)| reply.clone());

    match reply {
      Some(Reply::Output(output)) => Ok(output),
      Some(Reply::Missing) => Err(ProcessError::Spawn {
        program: invocation.program.clone(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
      }),
      None => Ok(CommandOutput {
        code: Some(0),
        ..Default::default()
      }),
    }
  }
}

/// A bare executable of the given kind rooted at `/work/project`.
pub fn executable(name: &str, kind: ActionKind) -> Executable {
  Executable {
    name: name.to_string(),
    group: Vec::new(),
    kind,
    elevated: false,
    run_once: false,
    fields: Fields::default(),
    options: Vec::new(),
    wait: None,
    before: None,
    after: None,
    location: PathBuf::from("/work/project"),
    last_hash: None,
  }
}
