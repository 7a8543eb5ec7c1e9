//! Persisted local project state.
//!
//! The engine reads and writes project state only through [`StateStore`].
//! [`FileStateStore`] keeps every project in one versioned JSON document:
//!
//! ```text
//! {data_dir}/state.json
//! { "version": 1, "projects": { "<project-id>": { "last_hash": ..., "runs": [...] } } }
//! ```
//!
//! Updates are read-modify-write with an atomic rename, but there is no lock
//! across processes: two concurrent invocations may lose one update.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::STATE_VERSION;
use crate::platform::paths;
use crate::util::hash::ObjectHash;
use crate::util::unix_now;

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read state file {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write state file {path}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("state file {path} is not valid")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize state")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported state version {0}")]
  UnsupportedVersion(u32),
}

/// Content hash recorded after an executable last succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
  pub name: String,
  pub hash: ObjectHash,
  /// Seconds since the Unix epoch.
  pub updated_at: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
  /// Hash of the project file as of the last completed run.
  #[serde(default)]
  pub last_hash: Option<ObjectHash>,
  #[serde(default)]
  pub runs: Vec<RunRecord>,
}

impl ProjectState {
  pub fn run(&self, name: &str) -> Option<&RunRecord> {
    self.runs.iter().find(|record| record.name == name)
  }

  /// Record a successful run, replacing any prior record for `name`.
  pub fn record_run(&mut self, name: &str, hash: ObjectHash) {
    self.runs.retain(|record| record.name != name);
    self.runs.push(RunRecord {
      name: name.to_string(),
      hash,
      updated_at: unix_now(),
    });
  }
}

pub trait StateStore: Send + Sync {
  /// State of a project; unknown projects yield the empty state.
  fn get(&self, project_id: &str) -> Result<ProjectState, StateError>;

  /// Apply `mutate` to a project's state and persist the result.
  fn update(&self, project_id: &str, mutate: &mut dyn FnMut(&mut ProjectState)) -> Result<(), StateError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
  version: u32,
  #[serde(default)]
  projects: BTreeMap<String, ProjectState>,
}

impl Default for StateDocument {
  fn default() -> Self {
    Self {
      version: STATE_VERSION,
      projects: BTreeMap::new(),
    }
  }
}

/// All projects in one JSON file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
  path: PathBuf,
}

impl FileStateStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  /// The store at `{data_dir}/state.json`.
  pub fn default_store() -> Self {
    Self::new(paths::state_file())
  }

  pub fn path(&self) -> &PathBuf {
    &self.path
  }

  fn load(&self) -> Result<StateDocument, StateError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateDocument::default()),
      Err(source) => {
        return Err(StateError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    let document: StateDocument = serde_json::from_str(&content).map_err(|source| StateError::Parse {
      path: self.path.clone(),
      source,
    })?;

    if document.version != STATE_VERSION {
      return Err(StateError::UnsupportedVersion(document.version));
    }

    Ok(document)
  }

  fn save(&self, document: &StateDocument) -> Result<(), StateError> {
    let write_err = |source| StateError::Write {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp_path = self.path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(document).map_err(StateError::Serialize)?;
    fs::write(&temp_path, content).map_err(write_err)?;
    fs::rename(&temp_path, &self.path).map_err(write_err)?;

    debug!(path = %self.path.display(), "state saved");
    Ok(())
  }
}

impl StateStore for FileStateStore {
  fn get(&self, project_id: &str) -> Result<ProjectState, StateError> {
    Ok(self.load()?.projects.remove(project_id).unwrap_or_default())
  }

  fn update(&self, project_id: &str, mutate: &mut dyn FnMut(&mut ProjectState)) -> Result<(), StateError> {
    let mut document = self.load()?;
    mutate(document.projects.entry(project_id.to_string()).or_default());
    self.save(&document)
  }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
  projects: Mutex<BTreeMap<String, ProjectState>>,
}

impl MemoryStateStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StateStore for MemoryStateStore {
  fn get(&self, project_id: &str) -> Result<ProjectState, StateError> {
    let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(projects.get(project_id).cloned().unwrap_or_default())
  }

  fn update(&self, project_id: &str, mutate: &mut dyn FnMut(&mut ProjectState)) -> Result<(), StateError> {
    let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
    mutate(projects.entry(project_id.to_string()).or_default());
    Ok(())
  }
}
