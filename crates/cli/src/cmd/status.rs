//! Implementation of the `devup status` command.
//!
//! Shows what devup remembers about the project: the last successful run of
//! each action and whether the project file changed since the last run.

use anyhow::{Context, Result};

use devup_lib::Project;
use devup_lib::engine::status;
use devup_lib::state::FileStateStore;

use crate::output::{
  OutputFormat, format_timestamp, print_info, print_json, print_stat, print_success, print_warning, symbols,
  truncate_hash,
};

pub fn cmd_status(project: &Project, format: OutputFormat) -> Result<()> {
  let store = FileStateStore::default_store();
  let status = status(&store, project).with_context(|| format!("Failed to read {}", store.path().display()))?;


  if format.is_json() {
    return print_json(&status);
  }

  print_success(&format!("Project: {}", project.name));
  print_stat("Id", &status.id);
  print_stat("File", &project.path.display().to_string());

  match status.config_changed {
    None => {
      print_info("No run recorded yet. Run 'devup --up' to bring the project up.");
      return Ok(());
    }
    Some(true) => print_warning("Project file changed since the last run"),
    Some(false) => print_stat("Config", "unchanged since the last run"),
  }

  if status.runs.is_empty() {
    return Ok(());
  }

  println!();
  println!("Runs:");
  for run in &status.runs {
    println!(
      "  {} {} {} {}",
      symbols::INFO,
      run.name,
      truncate_hash(&run.hash.0),
      format_timestamp(run.updated_at)
    );
  }

  Ok(())
}
