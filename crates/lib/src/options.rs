//! Custom option validation and value insertion.
//!
//! Options are declared per action and surface as extra command-line flags.
//! A value is looked up in the runtime argument map by `key`, then by `alias`.
//! Before anything runs, [`validate`] checks required options and regex rules
//! across the whole batch. Executors then call [`render`] to turn the given
//! values into insertion text, or [`substitute`] to expand `$${opt:<key>}`
//! references in a command string.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::action::CustomOption;
use crate::mapper::Executable;
use crate::placeholder::{self, PlaceholderError, Resolver};
use crate::runtime::RawArgs;

#[derive(Debug, Error)]
pub enum OptionError {
  #[error("action '{action}': option --{key} is required")]
  MissingRequired { action: String, key: String },

  #[error("action '{action}': value '{value}' for --{key} does not match rule {rule}")]
  RuleMismatch {
    action: String,
    key: String,
    value: String,
    rule: String,
  },

  #[error("action '{action}': option --{key} has an invalid rule")]
  InvalidRule {
    action: String,
    key: String,
    #[source]
    source: regex::Error,
  },

  #[error("action '{action}': cannot render option --{key}")]
  Template {
    action: String,
    key: String,
    #[source]
    source: PlaceholderError,
  },

  #[error("action '{action}': cannot expand '{template}'")]
  Command {
    action: String,
    template: String,
    #[source]
    source: PlaceholderError,
  },
}

/// The raw value given for an option, by key first and alias second.
pub fn lookup(option: &CustomOption, args: &RawArgs) -> Option<String> {
  std::iter::once(option.key.as_str())
    .chain(option.alias.as_deref())
    .filter_map(|name| args.get(name))
    .find_map(|value| value.as_text())
}

/// Check required options and rules for every executable and its sub-steps.
pub fn validate(executables: &[Executable], args: &RawArgs) -> Result<(), OptionError> {
  for executable in executables.iter().flat_map(Executable::with_steps) {
    for option in &executable.options {
      validate_option(&executable.name, option, args)?;
    }
  }
  Ok(())
}

fn validate_option(action: &str, option: &CustomOption, args: &RawArgs) -> Result<(), OptionError> {
  let Some(value) = lookup(option, args) else {
    if option.required {
      return Err(OptionError::MissingRequired {
        action: action.to_string(),
        key: option.key.clone(),
      });
    }
    return Ok(());
  };

  if let Some(rule) = &option.rule {
    let regex = Regex::new(rule).map_err(|source| OptionError::InvalidRule {
      action: action.to_string(),
      key: option.key.clone(),
      source,
    })?;
    if !regex.is_match(&value) {
      return Err(OptionError::RuleMismatch {
        action: action.to_string(),
        key: option.key.clone(),
        value,
        rule: rule.clone(),
      });
    }
  }

  Ok(())
}

/// One option's insertion text, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
  pub key: String,
  pub text: String,
}

/// Render the insertion text of every option that was given a value.
///
/// Without an `insert` template the raw value is inserted as-is.
pub fn render(executable: &Executable, args: &RawArgs) -> Result<Vec<Insertion>, OptionError> {
  let mut rendered = Vec::new();

  for option in &executable.options {
    let Some(value) = lookup(option, args) else {
      continue;
    };

    let text = match &option.insert {
      Some(template) => {
        let resolver = InsertResolver {
          value: &value,
          location: &executable.location,
        };
        placeholder::substitute(template, &resolver).map_err(|source| OptionError::Template {
          action: executable.name.clone(),
          key: option.key.clone(),
          source,
        })?
      }
      None => value,
    };

    rendered.push(Insertion {
      key: option.key.clone(),
      text,
    });
  }

  Ok(rendered)
}

/// Expand `$${opt:<key>}` and `$${location}` in a command string.
///
/// Declared options without a value expand to nothing; undeclared keys are an error.
pub fn substitute(executable: &Executable, args: &RawArgs, template: &str) -> Result<String, OptionError> {
  let mut insertions: BTreeMap<String, String> = executable
    .options
    .iter()
    .map(|option| (option.key.clone(), String::new()))
    .collect();
  insertions.extend(render(executable, args)?.into_iter().map(|i| (i.key, i.text)));

  let resolver = CommandResolver {
    insertions: &insertions,
    location: &executable.location,
  };
  placeholder::substitute(template, &resolver).map_err(|source| OptionError::Command {
    action: executable.name.clone(),
    template: template.to_string(),
    source,
  })
}

struct InsertResolver<'a> {
  value: &'a str,
  location: &'a Path,
}

impl Resolver for InsertResolver<'_> {
  fn resolve_value(&self) -> Result<String, PlaceholderError> {
    Ok(self.value.to_string())
  }

  fn resolve_option(&self, key: &str) -> Result<String, PlaceholderError> {
    Err(PlaceholderError::UnresolvedOption(key.to_string()))
  }

  fn resolve_location(&self) -> Result<String, PlaceholderError> {
    Ok(self.location.display().to_string())
  }
}

struct CommandResolver<'a> {
  insertions: &'a BTreeMap<String, String>,
  location: &'a Path,
}

impl Resolver for CommandResolver<'_> {
  fn resolve_value(&self) -> Result<String, PlaceholderError> {
    Err(PlaceholderError::UnresolvedValue)
  }

  fn resolve_option(&self, key: &str) -> Result<String, PlaceholderError> {
    self
      .insertions
      .get(key)
      .cloned()
      .ok_or_else(|| PlaceholderError::UnresolvedOption(key.to_string()))
  }

  fn resolve_location(&self) -> Result<String, PlaceholderError> {
    Ok(self.location.display().to_string())
  }
}
