//! Runtime resolution: raw command-line intent into direction and filters.
//!
//! The CLI hands the engine a flat [`RawArgs`] map. [`Runtime::resolve`] turns
//! it into a [`Runtime`] without side effects:
//!
//! - `up` / `up-group` select [`Direction::Up`], `down` / `down-group` select
//!   [`Direction::Down`]; mixing the two families is a caller error.
//! - `up`/`down` values (and the positional `target`) name executions,
//!   `*-group` values name groups.
//! - `not` / `not-group` build the exclusion lists.
//!
//! Values may be comma-separated strings or lists; a bare flag (boolean)
//! contributes an empty list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ARG_UP: &str = "up";
pub const ARG_DOWN: &str = "down";
pub const ARG_UP_GROUP: &str = "up-group";
pub const ARG_DOWN_GROUP: &str = "down-group";
pub const ARG_NOT: &str = "not";
pub const ARG_NOT_GROUP: &str = "not-group";
pub const ARG_CLEAN: &str = "clean";
pub const ARG_SKIP: &str = "skip";
pub const ARG_TARGET: &str = "target";

/// A single raw argument value as produced by the command-line layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
  Flag(bool),
  Text(String),
  List(Vec<String>),
}

impl ArgValue {
  /// Whether the argument counts as given (`false` flags do not).
  pub fn is_set(&self) -> bool {
    !matches!(self, ArgValue::Flag(false))
  }

  /// Normalize to a list of names: strings are split on commas, booleans are empty.
  pub fn to_list(&self) -> Vec<String> {
    match self {
      ArgValue::Flag(_) => Vec::new(),
      ArgValue::Text(text) => split_names(text),
      ArgValue::List(items) => items.iter().flat_map(|item| split_names(item)).collect(),
    }
  }

  /// The value as a single string, if it carries one.
  pub fn as_text(&self) -> Option<String> {
    match self {
      ArgValue::Flag(_) => None,
      ArgValue::Text(text) => Some(text.clone()),
      ArgValue::List(items) => Some(items.join(",")),
    }
  }
}

fn split_names(text: &str) -> Vec<String> {
  text
    .split(',')
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .map(ToString::to_string)
    .collect()
}

/// Flat argument map keyed by long flag name.
pub type RawArgs = BTreeMap<String, ArgValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Up,
  Down,
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Direction::Up => f.write_str("up"),
      Direction::Down => f.write_str("down"),
    }
  }
}

/// Execution and group names used for selection or exclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  pub executions: Vec<String>,
  pub groups: Vec<String>,
}

impl Filter {
  pub fn is_empty(&self) -> bool {
    self.executions.is_empty() && self.groups.is_empty()
  }

  pub fn names(&self, name: &str) -> bool {
    self.executions.iter().any(|n| n == name)
  }

  /// True if the name or any of the groups appear in this filter.
  pub fn matches(&self, name: &str, groups: &[String]) -> bool {
    self.names(name) || groups.iter().any(|g| self.groups.contains(g))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
  #[error("conflicting directions: up and down flags cannot be combined")]
  ConflictingDirection,

  #[error("no direction given: pass --up, --down, --up-group or --down-group")]
  MissingDirection,
}

/// The resolved intent of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
  pub direction: Direction,
  pub include: Filter,
  pub exclude: Filter,
  /// Force recreate instead of reuse.
  pub clean: bool,
  /// Bypass the elevation confirmation.
  pub skip: bool,
  /// The untouched argument map, used for custom option lookup.
  pub args: RawArgs,
}

impl Runtime {
  /// A runtime with no filters, mostly useful for tests and programmatic runs.
  pub fn new(direction: Direction) -> Self {
    Self {
      direction,
      include: Filter::default(),
      exclude: Filter::default(),
      clean: false,
      skip: false,
      args: RawArgs::new(),
    }
  }

  pub fn resolve(args: &RawArgs) -> Result<Self, RuntimeError> {
    let given = |key: &str| args.get(key).filter(|value| value.is_set());

    let up = given(ARG_UP);
    let up_group = given(ARG_UP_GROUP);
    let down = given(ARG_DOWN);
    let down_group = given(ARG_DOWN_GROUP);

    let up_family = up.is_some() || up_group.is_some();
    let down_family = down.is_some() || down_group.is_some();

    let (direction, by_name, by_group) = match (up_family, down_family) {
      (true, true) => return Err(RuntimeError::ConflictingDirection),
      (false, false) => return Err(RuntimeError::MissingDirection),
      (true, false) => (Direction::Up, up, up_group),
      (false, true) => (Direction::Down, down, down_group),
    };

    let mut include = Filter {
      executions: by_name.map(ArgValue::to_list).unwrap_or_default(),
      groups: by_group.map(ArgValue::to_list).unwrap_or_default(),
    };

    // a positional target follows the family that was asked for
    if let Some(target) = given(ARG_TARGET) {
      if by_name.is_none() && by_group.is_some() {
        include.groups.extend(target.to_list());
      } else {
        include.executions.extend(target.to_list());
      }
    }

    let exclude = Filter {
      executions: given(ARG_NOT).map(ArgValue::to_list).unwrap_or_default(),
      groups: given(ARG_NOT_GROUP).map(ArgValue::to_list).unwrap_or_default(),
    };

    Ok(Self {
      direction,
      include,
      exclude,
      clean: given(ARG_CLEAN).is_some(),
      skip: given(ARG_SKIP).is_some(),
      args: args.clone(),
    })
  }
}
