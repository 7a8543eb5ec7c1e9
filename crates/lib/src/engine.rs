//! The run controller.
//!
//! [`Engine::run`] drives one invocation through its states:
//!
//! ```text
//! Validating -> DependencyChecking -> ElevationConfirming -> Running(0..n) -> Done
//! ```
//!
//! Any pre-flight failure returns an [`EngineError`] before a single executor
//! `handle()` is called. Once running, each executable completes its whole
//! `wait(before) -> before -> handle -> after -> wait(after)` lifecycle before
//! the next one starts, and a failing executable never stops the batch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::WaitPhase;
use crate::config::Project;
use crate::executor::{ExecutionLog, LogStatus, Registry, observe};
use crate::idempotency::Tracker;
use crate::mapper::{self, Executable, MapError};
use crate::options::{self, OptionError};
use crate::platform::{self, paths};
use crate::preflight::{DependencyError, ElevationGate, Prompter, check_dependencies};
use crate::responder::{Responder, respond};
use crate::runtime::{Direction, RawArgs, Runtime, RuntimeError};
use crate::session::{Session, SessionError};
use crate::state::{RunRecord, StateError, StateStore};

/// Problems with the request itself; nothing was checked or run.
#[derive(Debug, Error)]
pub enum ValidationError {
  #[error(transparent)]
  Runtime(#[from] RuntimeError),

  #[error(transparent)]
  Map(#[from] MapError),

  #[error("nothing to run: no action matches the given selection")]
  NothingToRun,

  #[error(transparent)]
  Option(#[from] OptionError),
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  DependencyUnavailable(#[from] DependencyError),

  #[error("elevated permissions were not confirmed; rerun as administrator or pass --skip")]
  ElevationDeclined,

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Session(#[from] SessionError),
}

impl From<RuntimeError> for EngineError {
  fn from(err: RuntimeError) -> Self {
    EngineError::Validation(err.into())
  }
}

impl From<MapError> for EngineError {
  fn from(err: MapError) -> Self {
    EngineError::Validation(err.into())
  }
}

impl From<OptionError> for EngineError {
  fn from(err: OptionError) -> Self {
    EngineError::Validation(err.into())
  }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Where session logs are written.
  pub logs_dir: PathBuf,
  /// Whether the process already runs with admin/root rights.
  pub elevated: bool,
  /// Bound on the elevation prompt; `None` waits for an answer indefinitely.
  pub elevation_timeout: Option<Duration>,
}

impl EngineConfig {
  /// Platform log directory and the real elevation state of this process.
  pub fn from_env() -> Self {
    Self {
      logs_dir: paths::logs_dir(),
      elevated: platform::is_elevated(),
      elevation_timeout: None,
    }
  }
}

/// Outcome of one dispatched executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatched {
  pub name: String,
  pub status: LogStatus,
  pub operation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub direction: Direction,
  pub dispatched: Vec<Dispatched>,
  /// Run-once executables skipped without dispatch.
  pub skipped: Vec<String>,
  /// Error logs recorded during the run, sub-steps included.
  pub errors: usize,
  /// The session log, present only when at least one error was recorded.
  pub log_path: Option<PathBuf>,
  pub elapsed: Duration,
}

impl RunReport {
  pub fn succeeded(&self) -> bool {
    self.errors == 0
  }
}

pub struct Engine {
  registry: Registry,
  store: Arc<dyn StateStore>,
  responder: Arc<dyn Responder>,
  prompter: Arc<dyn Prompter>,
  config: EngineConfig,
}

impl Engine {
  pub fn new(
    registry: Registry,
    store: Arc<dyn StateStore>,
    responder: Arc<dyn Responder>,
    prompter: Arc<dyn Prompter>,
    config: EngineConfig,
  ) -> Self {
    Self {
      registry,
      store,
      responder,
      prompter,
      config,
    }
  }

  pub async fn run(&self, project: &Project, args: &RawArgs) -> Result<RunReport, EngineError> {
    let started = Instant::now();

    let runtime = Runtime::resolve(args)?;
    let mut executables = mapper::map(&project.actions, &runtime, &project.location)?;
    if executables.is_empty() {
      return Err(ValidationError::NothingToRun.into());
    }
    options::validate(&executables, &runtime.args)?;

    info!(
      project = %project.name,
      direction = %runtime.direction,
      count = executables.len(),
      "starting run"
    );

    let mut session = Session::open(&self.config.logs_dir)?;

    check_dependencies(&self.registry, &executables, |exe, log| session.record(&exe.name, log)).await?;

    let gate = ElevationGate::new(self.prompter.as_ref(), self.config.elevated)
      .with_timeout(self.config.elevation_timeout);
    if !gate.confirm(runtime.skip, &executables).await {
      warn!(project = %project.name, "elevation not confirmed, aborting run");
      return Err(EngineError::ElevationDeclined);
    }

    let project_id = project.id();
    let tracker = Tracker::new(self.store.as_ref(), &project_id);
    tracker.annotate(&mut executables)?;

    let mut dispatched = Vec::with_capacity(executables.len());
    let mut skipped = Vec::new();

    for exe in &executables {
      if tracker.should_skip(exe, &runtime) {
        info!(action = %exe.name, "run-once action already applied, skipping");
        self.responder.skipped(&exe.name);
        skipped.push(exe.name.clone());
        continue;
      }

      let log = self.lifecycle(exe, &runtime, &tracker, &mut session).await;
      dispatched.push(Dispatched {
        name: exe.name.clone(),
        status: log.status,
        operation: log.operation,
      });
    }

    // Every executable has been dispatched by now; a failed write is logged, not returned.
    let content_hash = project.content_hash.clone();
    if let Err(err) = self
      .store
      .update(&project_id, &mut |state| state.last_hash = Some(content_hash.clone()))
    {
      warn!(project = %project.name, error = %err, "failed to record project hash");
    }

    let summary = session.close();
    let elapsed = started.elapsed();
    info!(
      project = %project.name,
      dispatched = dispatched.len(),
      skipped = skipped.len(),
      errors = summary.errors,
      "run finished"
    );

    Ok(RunReport {
      direction: runtime.direction,
      dispatched,
      skipped,
      errors: summary.errors,
      log_path: (summary.errors > 0).then_some(summary.path),
      elapsed,
    })
  }

  /// One executable from its leading wait to its trailing wait.
  async fn lifecycle(&self, exe: &Executable, runtime: &Runtime, tracker: &Tracker<'_>, session: &mut Session) -> ExecutionLog {
    if let Some(wait) = exe.wait.filter(|wait| wait.when == WaitPhase::Before) {
      pause(exe, wait.seconds).await;
    }

    if let Some(step) = &exe.before {
      self.dispatch(step, runtime, None, session).await;
    }

    self.responder.dispatching(exe);
    let log = self.dispatch(exe, runtime, Some(tracker), session).await;

    if let Some(step) = &exe.after {
      self.dispatch(step, runtime, None, session).await;
    }

    if let Some(wait) = exe.wait.filter(|wait| wait.when == WaitPhase::After) {
      pause(exe, wait.seconds).await;
    }

    log
  }

  /// Call `handle()` on a private log channel. Every event goes to the session
  /// and the responder, and to the tracker when one is given.
  async fn dispatch(
    &self,
    exe: &Executable,
    runtime: &Runtime,
    tracker: Option<&Tracker<'_>>,
    session: &mut Session,
  ) -> ExecutionLog {
    let responder = self.responder.as_ref();
    let mut route = |log: &ExecutionLog| {
      session.record(&exe.name, log);
      respond(responder, &exe.name, log);
      if let Some(tracker) = tracker {
        if let Err(err) = tracker.update(exe, log) {
          warn!(action = %exe.name, error = %err, "failed to record run");
        }
      }
    };

    let log = match self.registry.get(exe.kind) {
      Ok(executor) => {
        debug!(action = %exe.name, kind = %exe.kind, direction = %runtime.direction, "dispatching");
        observe(
          |logs| async move { executor.handle(exe, runtime, &logs).await },
          &mut route,
        )
        .await
      }
      Err(err) => ExecutionLog::failure(exe.kind, "failed", &err),
    };

    route(&log);
    log
  }
}

async fn pause(exe: &Executable, seconds: u64) {
  if seconds == 0 {
    return;
  }
  info!(action = %exe.name, seconds, "waiting");
  tokio::time::sleep(Duration::from_secs(seconds)).await;
}

/// Persisted view of a project for `devup status`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
  pub id: String,
  /// `None` until the project has completed a run.
  pub config_changed: Option<bool>,
  pub runs: Vec<RunRecord>,
}

pub fn status(store: &dyn StateStore, project: &Project) -> Result<ProjectStatus, StateError> {
  let id = project.id();
  let state = store.get(&id)?;

  Ok(ProjectStatus {
    config_changed: state.last_hash.as_ref().map(|hash| *hash != project.content_hash),
    runs: state.runs,
    id,
  })
}
