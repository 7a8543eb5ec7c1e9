//! Project file discovery and loading.
//!
//! A project is described by a `devup.json` file:
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "shop",
//!   "actions": [
//!     { "name": "db", "type": "docker", "group": "backend", "container": { "image": "postgres:16" } }
//!   ]
//! }
//! ```
//!
//! The file is located from an explicit path, the `DEVUP_CONFIG` environment
//! variable, or by walking up from the working directory. Only schema version 1
//! is accepted; anything older must be migrated before it reaches the engine.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::action::{Action, ActionBody, CustomOption};
use crate::consts::{CONFIG_ENV, CONFIG_FILENAME, CONFIG_VERSION};
use crate::util::hash::{ObjectHash, hash_bytes};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no {name} found in {start} or any parent directory", name = CONFIG_FILENAME)]
  NotFound { start: PathBuf },

  #[error("failed to read {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid project file {path}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported project file version {version} in {path} (expected {expected})", expected = CONFIG_VERSION)]
  UnsupportedVersion { path: PathBuf, version: u32 },

  #[error("action '{name}' is declared more than once in {path}")]
  DuplicateAction { path: PathBuf, name: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
  version: u32,
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  actions: Vec<Action>,
}

/// A loaded project.
#[derive(Debug, Clone)]
pub struct Project {
  pub name: String,
  /// Directory containing the project file.
  pub location: PathBuf,
  /// The project file itself.
  pub path: PathBuf,
  pub actions: Vec<Action>,
  /// Hash of the raw file content.
  pub content_hash: ObjectHash,
}

impl Project {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let path = dunce::canonicalize(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;

    Self::parse(&path, &content)
  }

  /// Build a project from file content; `path` only supplies the location and name.
  pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
    let file: ProjectFile = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    if file.version != CONFIG_VERSION {
      return Err(ConfigError::UnsupportedVersion {
        path: path.to_path_buf(),
        version: file.version,
      });
    }

    let mut seen = BTreeSet::new();
    for name in file.actions.iter().filter_map(|action| action.name.as_deref()) {
      if !seen.insert(name) {
        return Err(ConfigError::DuplicateAction {
          path: path.to_path_buf(),
          name: name.to_string(),
        });
      }
    }

    let location = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = file.name.unwrap_or_else(|| {
      location
        .file_name()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string())
    });

    debug!(project = %name, actions = file.actions.len(), path = %path.display(), "project loaded");

    Ok(Self {
      name,
      location,
      path: path.to_path_buf(),
      actions: file.actions,
      content_hash: hash_bytes(content.as_bytes()),
    })
  }

  /// Key for persisted state: the name plus a hash of the location, so two
  /// checkouts of one project keep separate run records.
  pub fn id(&self) -> String {
    let location = hash_bytes(self.location.to_string_lossy().as_bytes());
    format!("{}-{}", self.name, &location.0[..8])
  }

  /// Every custom option declared anywhere in the project, first declaration per key.
  pub fn custom_options(&self) -> Vec<&CustomOption> {
    let mut seen = BTreeSet::new();
    let mut options = Vec::new();

    for action in &self.actions {
      let bodies = std::iter::once(&action.body)
        .chain(action.up.as_ref())
        .chain(action.down.as_ref());
      for body in bodies {
        collect_options(body, &mut seen, &mut options);
      }
    }

    options
  }
}

fn collect_options<'a>(body: &'a ActionBody, seen: &mut BTreeSet<&'a str>, out: &mut Vec<&'a CustomOption>) {
  for option in body.options.iter().flatten() {
    if seen.insert(option.key.as_str()) {
      out.push(option);
    }
  }
  for step in body.before.iter().chain(body.after.iter()) {
    collect_options(step, seen, out);
  }
}

/// Find the project file: explicit path, then `DEVUP_CONFIG`, then the nearest
/// `devup.json` in `start` or its ancestors.
pub fn locate(explicit: Option<&Path>, start: &Path) -> Result<PathBuf, ConfigError> {
  if let Some(path) = explicit {
    return Ok(path.to_path_buf());
  }

  if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
    return Ok(PathBuf::from(path));
  }

  discover(start).ok_or_else(|| ConfigError::NotFound {
    start: start.to_path_buf(),
  })
}

/// The nearest `devup.json` in `start` or one of its ancestors.
pub fn discover(start: &Path) -> Option<PathBuf> {
  start
    .ancestors()
    .map(|dir| dir.join(CONFIG_FILENAME))
    .find(|candidate| candidate.is_file())
}
