//! Implementation of the `devup list` command.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use devup_lib::Project;
use devup_lib::action::Action;

use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionEntry<'a> {
  name: &'a str,
  #[serde(rename = "type")]
  kind: Option<&'a str>,
  group: &'a [String],
  optional: bool,
  run_once: bool,
  elevated: bool,
  up: bool,
  down: bool,
}

impl<'a> ActionEntry<'a> {
  fn new(action: &'a Action) -> Self {
    let bodies = || std::iter::once(&action.body).chain(action.up.as_ref()).chain(action.down.as_ref());
    let generic = action.body.has_execution_fields();

    Self {
      name: action.name.as_deref().unwrap_or("<unnamed>"),
      kind: bodies().find_map(|body| body.kind.as_deref()),
      group: &action.group,
      optional: action.optional,
      run_once: action.run_once,
      elevated: bodies().any(|body| body.elevated == Some(true)),
      up: generic || action.up.is_some(),
      down: generic || action.up.is_some() || action.down.is_some(),
    }
  }

  fn flags(&self) -> Vec<&'static str> {
    [
      (self.optional, "optional"),
      (self.run_once, "run-once"),
      (self.elevated, "elevated"),
      (!self.down, "up only"),
      (!self.up, "down only"),
    ]
    .into_iter()
    .filter_map(|(set, flag)| set.then_some(flag))
    .collect()
  }
}

pub fn cmd_list(project: &Project, format: OutputFormat) -> Result<()> {
  let entries: Vec<ActionEntry> = project.actions.iter().map(ActionEntry::new).collect();

  if format.is_json() {
    return print_json(&serde_json::json!({ "project": project.name, "actions": entries }));
  }

  if entries.is_empty() {
    print_info(&format!("Project '{}' declares no actions.", project.name));
    return Ok(());
  }

  print_info(&format!("Project '{}'", project.name));
  print_stat("File", &project.path.display().to_string());
  println!();

  for entry in &entries {
    let mut line = format!(
      "  {} {} {}",
      symbols::INFO,
      entry.name,
      format!("({})", entry.kind.unwrap_or("?")).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    if !entry.group.is_empty() {
      line.push_str(&format!(" [{}]", entry.group.join(", ")));
    }
    let flags = entry.flags();
    if !flags.is_empty() {
      let flags = flags.join(", ");
      line.push_str(&format!(" {}", flags.if_supports_color(Stream::Stdout, |s| s.yellow())));
    }
    println!("{line}");
  }

  Ok(())
}
