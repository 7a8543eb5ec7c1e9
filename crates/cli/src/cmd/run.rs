//! Implementation of the default `devup` command: bring actions up or down.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use devup_lib::engine::RunReport;
use devup_lib::executor::{LogStatus, Registry, SystemRunner};
use devup_lib::mapper::Executable;
use devup_lib::responder::{Message, Responder, Severity};
use devup_lib::runtime::{
  ARG_CLEAN, ARG_DOWN, ARG_DOWN_GROUP, ARG_NOT, ARG_NOT_GROUP, ARG_SKIP, ARG_TARGET, ARG_UP, ARG_UP_GROUP,
};
use devup_lib::state::FileStateStore;
use devup_lib::{ArgValue, Engine, EngineConfig, EngineError, Project, RawArgs};

use crate::output::{format_duration, print_error, print_skipped, print_stat, print_step, print_success, print_warning};
use crate::prompts::TerminalPrompter;

/// Selection and behavior flags of a run.
///
/// `--up`/`--down` and their group forms take an optional comma-separated list;
/// given bare, they select everything.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
  /// Bring actions up (all, or the named ones)
  #[arg(long, value_name = "NAMES", num_args = 0..=1, default_missing_value = "")]
  pub up: Option<String>,

  /// Bring actions down (all, or the named ones), in reverse order
  #[arg(long, value_name = "NAMES", num_args = 0..=1, default_missing_value = "")]
  pub down: Option<String>,

  /// Bring up the actions of the named groups
  #[arg(long, value_name = "GROUPS", num_args = 0..=1, default_missing_value = "")]
  pub up_group: Option<String>,

  /// Bring down the actions of the named groups
  #[arg(long, value_name = "GROUPS", num_args = 0..=1, default_missing_value = "")]
  pub down_group: Option<String>,

  /// Exclude actions by name
  #[arg(long, value_name = "NAMES")]
  pub not: Option<String>,

  /// Exclude actions by group
  #[arg(long, value_name = "GROUPS")]
  pub not_group: Option<String>,

  /// Recreate containers going up, remove them going down
  #[arg(long)]
  pub clean: bool,

  /// Do not ask for confirmation when elevated permissions are missing
  #[arg(long)]
  pub skip: bool,

  /// Give up on the elevation prompt after this long (e.g. 30s)
  #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
  pub elevation_timeout: Option<Duration>,

  /// Action (or group, with --up-group/--down-group) to run
  pub target: Option<String>,
}

impl RunArgs {
  /// Flatten into the argument map the engine resolves.
  pub fn raw_args(&self) -> RawArgs {
    let mut args = RawArgs::new();
    let texts = [
      (ARG_UP, &self.up),
      (ARG_DOWN, &self.down),
      (ARG_UP_GROUP, &self.up_group),
      (ARG_DOWN_GROUP, &self.down_group),
      (ARG_NOT, &self.not),
      (ARG_NOT_GROUP, &self.not_group),
      (ARG_TARGET, &self.target),
    ];
    for (key, value) in texts {
      if let Some(value) = value {
        args.insert(key.to_string(), ArgValue::Text(value.clone()));
      }
    }
    args.insert(ARG_CLEAN.to_string(), ArgValue::Flag(self.clean));
    args.insert(ARG_SKIP.to_string(), ArgValue::Flag(self.skip));
    args
  }
}

/// Prints run progress as it happens.
struct TerminalResponder;

impl Responder for TerminalResponder {
  fn dispatching(&self, executable: &Executable) {
    print_step(&executable.name, &format!("({} {})", executable.kind, executable.direction));
  }

  fn message(&self, action: &str, message: &Message) {
    let line = format!("{action}: {}", message.text);
    match message.severity {
      Severity::Success => print_success(&line),
      Severity::Warning => print_warning(&line),
      Severity::Error => print_error(&line),
    }
  }

  fn skipped(&self, action: &str) {
    print_skipped(action, "(run once, already applied)");
  }
}

/// Execute a run of `project` with the given arguments.
///
/// Pre-flight failures print one line and exit with status 1, as does a run
/// that recorded any error.
pub fn cmd_run(project: &Project, args: &RawArgs, elevation_timeout: Option<Duration>) -> Result<ExitCode> {
  let mut config = EngineConfig::from_env();
  config.elevation_timeout = elevation_timeout;

  let engine = Engine::new(
    Registry::with_defaults(Arc::new(SystemRunner)),
    Arc::new(FileStateStore::default_store()),
    Arc::new(TerminalResponder),
    Arc::new(TerminalPrompter),
    config,
  );

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(engine.run(project, args));
  // a timed-out prompt may still be blocked reading stdin
  rt.shutdown_background();

  let report = match result {
    Ok(report) => report,
    Err(
      err @ (EngineError::Validation(_) | EngineError::DependencyUnavailable(_) | EngineError::ElevationDeclined),
    ) => {
      print_error(&err.to_string());
      return Ok(ExitCode::FAILURE);
    }
    Err(err) => return Err(err).context("Run failed"),
  };

  print_summary(&report);

  if report.succeeded() {
    Ok(ExitCode::SUCCESS)
  } else {
    Ok(ExitCode::FAILURE)
  }
}

fn print_summary(report: &RunReport) {
  let failed = report
    .dispatched
    .iter()
    .filter(|action| action.status == LogStatus::Error)
    .count();

  println!();
  print_stat("Direction", &report.direction.to_string());
  print_stat("Dispatched", &report.dispatched.len().to_string());
  print_stat("Skipped", &report.skipped.len().to_string());
  print_stat("Failed", &failed.to_string());
  print_stat("Elapsed", &format_duration(report.elapsed));

  match &report.log_path {
    Some(path) => print_warning(&format!(
      "{} error(s) recorded, see {}",
      report.errors,
      path.display()
    )),
    None => print_success("Done"),
  }
}
