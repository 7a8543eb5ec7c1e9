//! Placeholder parsing and substitution for option insertion templates.
//!
//! Custom options reach commands and scripts through templates. A template is
//! ordinary text with `$${...}` references that are resolved right before an
//! executor spawns its process.
//!
//! # Placeholder Formats
//!
//! - `$${value}` - the raw value of the option being inserted
//! - `$${opt:<key>}` - the rendered insertion of option `<key>`
//! - `$${location}` - the project directory
//!
//! # Shell Variables
//!
//! Single `$` characters pass through unchanged, so shell variables like
//! `$HOME` and `$PATH` work naturally without any escaping.
//!
//! # Escaping
//!
//! Use `$$$` before `{` to produce a literal `$${` sequence.
//!
//! # Example
//!
//! ```
//! use devup_lib::placeholder::{parse, Segment, Placeholder};
//!
//! let segments = parse("--port=$${value} $HOME").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("--port=".to_string()),
//!     Segment::Placeholder(Placeholder::Value),
//!     Segment::Literal(" $HOME".to_string()),
//! ]);
//! ```

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `$${value}`
  Value,

  /// `$${opt:<key>}`
  Option(String),

  /// `$${location}`
  Location,
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A placeholder to be resolved
  Placeholder(Placeholder),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("no value available for $${{value}}")]
  UnresolvedValue,

  #[error("unknown option referenced: {0}")]
  UnresolvedOption(String),
}

/// Supplies values for placeholders at substitution time.
pub trait Resolver {
  fn resolve_value(&self) -> Result<String, PlaceholderError>;

  fn resolve_option(&self, key: &str) -> Result<String, PlaceholderError>;

  fn resolve_location(&self) -> Result<String, PlaceholderError>;
}

/// Split a template into literal text and placeholder references.
///
/// Exactly two `$` before `{` open a reference and three produce a literal
/// `$${`; any other run of `$` is kept as-is.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut pos = 0;

  while let Some(found) = input[pos..].find('$') {
    let start = pos + found;
    literal.push_str(&input[pos..start]);

    let run = input[start..].bytes().take_while(|b| *b == b'$').count();
    let after = &input[start + run..];

    pos = match (run, after.starts_with('{')) {
      (2, true) => {
        let close = after.find('}').ok_or(PlaceholderError::Unclosed(start))?;
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(parse_reference(&after[1..close])?));
        start + run + close + 1
      }
      (3, true) => {
        literal.push_str("$${");
        start + run + 1
      }
      _ => {
        literal.push_str(&input[start..start + run]);
        start + run
      }
    };
  }

  literal.push_str(&input[pos..]);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn parse_reference(content: &str) -> Result<Placeholder, PlaceholderError> {
  match content {
    "value" => return Ok(Placeholder::Value),
    "location" => return Ok(Placeholder::Location),
    _ => {}
  }

  let (kind, rest) = content
    .split_once(':')
    .ok_or_else(|| PlaceholderError::Malformed(format!("missing colon in '{content}'")))?;

  match kind {
    "opt" if !rest.is_empty() => Ok(Placeholder::Option(rest.to_string())),
    "opt" => Err(PlaceholderError::Malformed(format!("option placeholder missing key: '{content}'"))),
    _ => Err(PlaceholderError::UnknownType(kind.to_string())),
  }
}

/// Substitute all placeholders in a string using the provided resolver.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  let mut result = String::new();

  for segment in &segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Value) => result.push_str(&resolver.resolve_value()?),
      Segment::Placeholder(Placeholder::Option(key)) => result.push_str(&resolver.resolve_option(key)?),
      Segment::Placeholder(Placeholder::Location) => result.push_str(&resolver.resolve_location()?),
    }
  }

  Ok(result)
}
