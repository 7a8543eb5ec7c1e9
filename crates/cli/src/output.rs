//! CLI output formatting utilities.
//!
//! Colored status lines for run progress and the `list`/`status` commands.
//! Success and info go to stdout, warnings and errors to stderr.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const SKIP: &str = "-";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

/// Human-readable duration, rounded to milliseconds.
pub fn format_duration(duration: Duration) -> String {
  let rounded = Duration::from_millis(duration.as_millis() as u64);
  if rounded.is_zero() {
    return "0ms".to_string();
  }
  humantime::format_duration(rounded).to_string()
}

/// RFC 3339 rendering of seconds since the Unix epoch.
pub fn format_timestamp(secs: u64) -> String {
  let time: SystemTime = UNIX_EPOCH + Duration::from_secs(secs);
  humantime::format_rfc3339_seconds(time).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

/// Header line for an action about to run.
pub fn print_step(name: &str, detail: &str) {
  println!(
    "{} {} {}",
    symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.cyan()),
    name.if_supports_color(Stream::Stdout, |s| s.bold()),
    detail.if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_skipped(name: &str, reason: &str) {
  println!(
    "{} {} {}",
    symbols::SKIP.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    name,
    reason.if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
