//! Shared harness: mock executors with call journals, a scripted prompter and
//! a recording responder around a real `Engine`.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use devup_lib::action::ActionKind;
use devup_lib::executor::{ExecutionLog, Executor, LogSender, Registry};
use devup_lib::mapper::Executable;
use devup_lib::preflight::Prompter;
use devup_lib::responder::{Message, Responder};
use devup_lib::runtime::Runtime;
use devup_lib::state::{MemoryStateStore, ProjectState, StateError, StateStore};
use devup_lib::{ArgValue, Engine, EngineConfig, Project, RawArgs};

/// Handle calls across all mock executors, in dispatch order.
pub type Journal = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Clone)]
pub struct Call {
  pub name: String,
  pub direction: devup_lib::Direction,
  pub at: tokio::time::Instant,
}

pub struct MockExecutor {
  kind: ActionKind,
  available: AtomicBool,
  remediable: AtomicBool,
  failing: Mutex<Vec<String>>,
  checks: AtomicUsize,
  installs: AtomicUsize,
  journal: Journal,
}

impl MockExecutor {
  fn new(kind: ActionKind, journal: Journal) -> Self {
    Self {
      kind,
      available: AtomicBool::new(true),
      remediable: AtomicBool::new(false),
      failing: Mutex::new(Vec::new()),
      checks: AtomicUsize::new(0),
      installs: AtomicUsize::new(0),
      journal,
    }
  }

  pub fn checks(&self) -> usize {
    self.checks.load(Ordering::SeqCst)
  }

  pub fn installs(&self) -> usize {
    self.installs.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Executor for MockExecutor {
  fn kind(&self) -> ActionKind {
    self.kind
  }

  async fn check(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    self.checks.fetch_add(1, Ordering::SeqCst);
    if self.available.load(Ordering::SeqCst) {
      ExecutionLog::success(self.kind, "available")
    } else {
      ExecutionLog::error(self.kind, "unavailable", "not installed")
    }
  }

  async fn handle(&self, executable: &Executable, runtime: &Runtime, logs: &LogSender) -> ExecutionLog {
    self.journal.lock().unwrap().push(Call {
      name: executable.name.clone(),
      direction: runtime.direction,
      at: tokio::time::Instant::now(),
    });
    logs.emit(ExecutionLog::started(self.kind, "running"));

    if self.failing.lock().unwrap().contains(&executable.name) {
      ExecutionLog::error(self.kind, "failed", "mock failure")
    } else {
      ExecutionLog::success(self.kind, "completed")
    }
  }

  fn remediable(&self) -> bool {
    self.remediable.load(Ordering::SeqCst)
  }

  async fn install(&self, _executable: &Executable, _logs: &LogSender) -> ExecutionLog {
    self.installs.fetch_add(1, Ordering::SeqCst);
    self.available.store(true, Ordering::SeqCst);
    ExecutionLog::success(self.kind, "installed")
  }
}

/// Answers every prompt the same way and counts how often it was asked.
pub struct ScriptedPrompter {
  answer: Option<bool>,
  asked: AtomicUsize,
}

impl ScriptedPrompter {
  pub fn answering(answer: Option<bool>) -> Self {
    Self {
      answer,
      asked: AtomicUsize::new(0),
    }
  }

  pub fn asked(&self) -> usize {
    self.asked.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
  async fn ask(&self, _message: &str) -> Option<bool> {
    self.asked.fetch_add(1, Ordering::SeqCst);
    self.answer
  }
}

#[derive(Default)]
pub struct RecordingResponder {
  pub messages: Mutex<Vec<(String, Message)>>,
  pub skipped: Mutex<Vec<String>>,
}

impl Responder for RecordingResponder {
  fn message(&self, action: &str, message: &Message) {
    self.messages.lock().unwrap().push((action.to_string(), message.clone()));
  }

  fn skipped(&self, action: &str) {
    self.skipped.lock().unwrap().push(action.to_string());
  }
}

/// Serves reads from memory and fails every write.
#[derive(Default)]
pub struct ReadOnlyStore {
  inner: MemoryStateStore,
}

impl StateStore for ReadOnlyStore {
  fn get(&self, project_id: &str) -> Result<ProjectState, StateError> {
    self.inner.get(project_id)
  }

  fn update(&self, _project_id: &str, _mutate: &mut dyn FnMut(&mut ProjectState)) -> Result<(), StateError> {
    Err(StateError::Write {
      path: PathBuf::from("/read-only/state.json"),
      source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
    })
  }
}

pub struct Harness {
  pub journal: Journal,
  pub store: Arc<MemoryStateStore>,
  pub responder: Arc<RecordingResponder>,
  pub prompter: Arc<ScriptedPrompter>,
  pub logs: TempDir,
  pub elevated: bool,
  mocks: HashMap<ActionKind, Arc<MockExecutor>>,
}

impl Harness {
  pub fn new() -> Self {
    let journal: Journal = Arc::default();
    let mocks = ActionKind::ALL
      .into_iter()
      .map(|kind| (kind, Arc::new(MockExecutor::new(kind, journal.clone()))))
      .collect();

    Self {
      journal,
      store: Arc::new(MemoryStateStore::new()),
      responder: Arc::default(),
      prompter: Arc::new(ScriptedPrompter::answering(Some(true))),
      logs: TempDir::new().unwrap(),
      elevated: false,
      mocks,
    }
  }

  pub fn mock(&self, kind: ActionKind) -> &MockExecutor {
    &self.mocks[&kind]
  }

  pub fn unavailable(self, kind: ActionKind) -> Self {
    self.mock(kind).available.store(false, Ordering::SeqCst);
    self
  }

  pub fn remediable(self, kind: ActionKind) -> Self {
    self.mock(kind).remediable.store(true, Ordering::SeqCst);
    self
  }

  pub fn failing(self, kind: ActionKind, name: &str) -> Self {
    self.mock(kind).failing.lock().unwrap().push(name.to_string());
    self
  }

  pub fn answering(mut self, answer: Option<bool>) -> Self {
    self.prompter = Arc::new(ScriptedPrompter::answering(answer));
    self
  }

  pub fn engine(&self) -> Engine {
    self.engine_with_store(self.store.clone())
  }

  pub fn engine_with_store(&self, store: Arc<dyn StateStore>) -> Engine {
    let mut registry = Registry::new();
    for mock in self.mocks.values() {
      registry.register_arc(mock.clone());
    }

    Engine::new(
      registry,
      store,
      self.responder.clone(),
      self.prompter.clone(),
      EngineConfig {
        logs_dir: self.logs.path().to_path_buf(),
        elevated: self.elevated,
        elevation_timeout: None,
      },
    )
  }

  /// Names passed to `handle()` so far, sub-steps included.
  pub fn handled(&self) -> Vec<String> {
    self.journal.lock().unwrap().iter().map(|call| call.name.clone()).collect()
  }

  pub fn calls(&self) -> Vec<Call> {
    self.journal.lock().unwrap().clone()
  }

  pub fn reset(&self) {
    self.journal.lock().unwrap().clear();
  }
}

pub fn project(actions: Value) -> Project {
  project_at("/work/shop", actions)
}

pub fn project_at(location: &str, actions: Value) -> Project {
  let content = serde_json::json!({ "version": 1, "name": "shop", "actions": actions }).to_string();
  Project::parse(&Path::new(location).join("devup.json"), &content).unwrap()
}

/// `db` (postgres) and `web` (docker), both in group `backend`.
pub fn backend() -> Project {
  project(serde_json::json!([
    {
      "name": "db",
      "type": "postgres",
      "group": ["backend"],
      "sql": { "option": "create-database", "connection": "postgres://localhost/postgres", "database": "shop" }
    },
    {
      "name": "web",
      "type": "docker",
      "group": ["backend"],
      "container": { "image": "nginx:1.27" }
    }
  ]))
}

pub fn args(pairs: &[(&str, ArgValue)]) -> RawArgs {
  pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
}

pub fn flag(key: &str) -> (&str, ArgValue) {
  (key, ArgValue::Flag(true))
}

pub fn text<'a>(key: &'a str, value: &str) -> (&'a str, ArgValue) {
  (key, ArgValue::Text(value.to_string()))
}
