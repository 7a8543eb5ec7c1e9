//! Action filtering and direction-aware mapping.
//!
//! [`map`] is the only way an [`Executable`] comes into existence. For each
//! declared action (in declaration order) it:
//!
//! 1. applies the include allow-list when one was given,
//! 2. drops `optional` actions unless they were named explicitly,
//! 3. drops actions with nothing to execute in the requested direction,
//! 4. applies the exclusion lists,
//!
//! then resolves every field from the selected `up`/`down` override, falling
//! back to the action's own body. Down runs are returned in reverse order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::action::{Action, ActionBody, ActionKind, ContainerSpec, CustomOption, SqlSpec, UnknownKind, Wait};
use crate::runtime::{Direction, Runtime};
use crate::util::hash::{Hashable, ObjectHash};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
  #[error("action #{index} has no name")]
  MissingName { index: usize },

  #[error("action '{name}' has no type")]
  MissingType { name: String },

  #[error("action '{name}': {source}")]
  UnknownType {
    name: String,
    #[source]
    source: UnknownKind,
  },
}

/// Generic execution fields after direction resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fields {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub file: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sql: Option<SqlSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container: Option<ContainerSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub package: Option<String>,
}

/// The unit the engine dispatches: one action with its fields resolved for
/// the requested direction.
///
/// The direction itself lives on the [`Runtime`] handed to executors, so an
/// action whose up and down definitions agree hashes the same both ways.
/// Constructed fresh per invocation; only its content hash is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executable {
  pub name: String,
  pub group: Vec<String>,
  pub kind: ActionKind,
  pub elevated: bool,
  pub run_once: bool,
  pub fields: Fields,
  pub options: Vec<CustomOption>,
  pub wait: Option<Wait>,
  pub before: Option<Box<Executable>>,
  pub after: Option<Box<Executable>>,
  /// Directory relative paths and commands are resolved against.
  pub location: PathBuf,
  /// Hash recorded after the last successful run, filled in by the tracker.
  #[serde(skip)]
  pub last_hash: Option<ObjectHash>,
}

impl Hashable for Executable {}

impl Executable {
  /// True if this executable or one of its sub-steps needs elevation.
  pub fn requires_elevation(&self) -> bool {
    self.elevated
      || self.before.as_ref().is_some_and(|step| step.requires_elevation())
      || self.after.as_ref().is_some_and(|step| step.requires_elevation())
  }

  /// This executable followed by its before/after sub-steps.
  pub fn with_steps(&self) -> Vec<&Executable> {
    let mut all = vec![self];
    all.extend(self.before.as_deref());
    all.extend(self.after.as_deref());
    all
  }

  /// Resolve a possibly relative file reference against the project location.
  pub fn resolve_path(&self, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.location.join(path)
    }
  }
}

/// Filter the declared actions and map the survivors for the runtime's direction.
pub fn map(actions: &[Action], runtime: &Runtime, location: &Path) -> Result<Vec<Executable>, MapError> {
  let mut executables = Vec::new();

  for (index, action) in actions.iter().enumerate() {
    let name = action.name.as_deref().ok_or(MapError::MissingName { index })?;

    if !is_selected(action, name, runtime) {
      debug!(action = %name, direction = %runtime.direction, "action filtered out");
      continue;
    }

    let source = select_source(action, runtime.direction);
    let executable = resolve(
      name,
      &action.group,
      action.run_once,
      source,
      &action.body,
      location,
    )?;
    executables.push(executable);
  }

  if runtime.direction == Direction::Down {
    executables.reverse();
  }

  Ok(executables)
}

fn is_selected(action: &Action, name: &str, runtime: &Runtime) -> bool {
  let include = &runtime.include;

  if !include.is_empty() && !include.matches(name, &action.group) {
    return false;
  }

  if action.optional && !include.names(name) {
    return false;
  }

  if !has_definition(action, runtime.direction) {
    return false;
  }

  !runtime.exclude.matches(name, &action.group)
}

/// A usable definition is a matching override or a generic field on the action.
fn has_definition(action: &Action, direction: Direction) -> bool {
  let matching = match direction {
    Direction::Up => action.up.is_some(),
    Direction::Down => action.down.is_some() || action.up.is_some(),
  };
  matching || action.body.has_execution_fields()
}

/// The override consulted first: `down` for Down, `up` for Up or as the Down fallback.
fn select_source(action: &Action, direction: Direction) -> Option<&ActionBody> {
  match direction {
    Direction::Up => action.up.as_ref(),
    Direction::Down => action.down.as_ref().or(action.up.as_ref()),
  }
}

fn resolve(
  name: &str,
  group: &[String],
  run_once: bool,
  source: Option<&ActionBody>,
  base: &ActionBody,
  location: &Path,
) -> Result<Executable, MapError> {
  macro_rules! pick {
    ($field:ident) => {
      source.and_then(|s| s.$field.clone()).or_else(|| base.$field.clone())
    };
  }

  let kind_name = pick!(kind).ok_or_else(|| MapError::MissingType { name: name.to_string() })?;
  let kind = kind_name.parse::<ActionKind>().map_err(|source| MapError::UnknownType {
    name: name.to_string(),
    source,
  })?;

  let step = |body: Option<Box<ActionBody>>, phase: &str| -> Result<Option<Box<Executable>>, MapError> {
    body
      .map(|body| resolve_step(&format!("{name}:{phase}"), &body, location).map(Box::new))
      .transpose()
  };

  Ok(Executable {
    name: name.to_string(),
    group: group.to_vec(),
    kind,
    elevated: pick!(elevated).unwrap_or(false),
    run_once,
    fields: Fields {
      file: pick!(file).unwrap_or_default(),
      command: pick!(command),
      sql: pick!(sql),
      container: pick!(container),
      package: pick!(package),
    },
    options: pick!(options).unwrap_or_default(),
    wait: pick!(wait),
    before: step(pick!(before), "before")?,
    after: step(pick!(after), "after")?,
    location: location.to_path_buf(),
    last_hash: None,
  })
}

/// Sub-steps carry no name or group of their own and are never run-once.
fn resolve_step(label: &str, body: &ActionBody, location: &Path) -> Result<Executable, MapError> {
  resolve(label, &[], false, None, body, location)
}
