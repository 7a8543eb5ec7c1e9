//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own project directory and its own devup home, so state
/// and session logs never leak between tests.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Create from a fixture file, copied to `project/devup.json`.
  pub fn from_fixture(name: &str) -> Self {
    let env = Self::empty();
    env.write_file("project/devup.json", &fixture_content(name));
    env
  }

  /// Create an environment without a project file.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("project").join("devup.json");
    std::fs::create_dir_all(temp.path().join("project")).unwrap();
    Self { temp, config_path }
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Project directory; commands run here.
  pub fn project_path(&self) -> PathBuf {
    let p = self.temp.path().join("project");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// devup home: state file and session logs.
  pub fn home_path(&self) -> PathBuf {
    let p = self.temp.path().join("home");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Read a file the project's commands wrote, if any.
  pub fn project_file(&self, name: &str) -> Option<String> {
    std::fs::read_to_string(self.project_path().join(name)).ok()
  }

  /// Session logs written so far.
  pub fn session_logs(&self) -> Vec<PathBuf> {
    match std::fs::read_dir(self.home_path().join("logs")) {
      Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
      Err(_) => Vec::new(),
    }
  }

  /// Get a pre-configured Command for the devup binary.
  ///
  /// Runs inside the project directory with:
  /// - `DEVUP_HOME`: isolated data directory
  /// - `DEVUP_CONFIG` removed, so discovery starts from the project directory
  pub fn devup_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("devup");
    cmd.current_dir(self.project_path());
    cmd.env("DEVUP_HOME", self.home_path());
    cmd.env_remove("DEVUP_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
