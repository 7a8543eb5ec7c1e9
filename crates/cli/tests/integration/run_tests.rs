//! Run (`--up` / `--down`) integration tests.
//!
//! Actions are shell commands that append to files in the project directory,
//! so the order and selection of what ran can be read back.

#![cfg(unix)]

use predicates::prelude::*;

use super::common::TestEnv;

fn trail(env: &TestEnv) -> Vec<String> {
  env
    .project_file("trail.txt")
    .unwrap_or_default()
    .lines()
    .map(ToString::to_string)
    .collect()
}

// =============================================================================
// Selection and order
// =============================================================================

#[test]
fn up_runs_actions_in_declaration_order() {
  let env = TestEnv::from_fixture("trail.json");

  env
    .devup_cmd()
    .arg("--up")
    .assert()
    .success()
    .stdout(predicate::str::contains("command finished"))
    .stdout(predicate::str::contains("Done"));

  assert_eq!(trail(&env), vec!["first-up", "second-up"]);
}

#[test]
fn down_runs_actions_in_reverse_order() {
  let env = TestEnv::from_fixture("trail.json");

  env.devup_cmd().arg("--down").assert().success();

  assert_eq!(trail(&env), vec!["second-down", "first-down"]);
}

#[test]
fn named_actions_run_alone() {
  let env = TestEnv::from_fixture("trail.json");

  env.devup_cmd().args(["--up", "second"]).assert().success();

  assert_eq!(trail(&env), vec!["second-up"]);
}

#[test]
fn positional_target_names_an_action() {
  let env = TestEnv::from_fixture("trail.json");

  env.devup_cmd().args(["--up", "--", "first"]).assert().success();

  assert_eq!(trail(&env), vec!["first-up"]);
}

#[test]
fn group_selection_with_exclusion() {
  let env = TestEnv::from_fixture("trail.json");

  env
    .devup_cmd()
    .args(["--up-group", "app", "--not", "first"])
    .assert()
    .success();

  assert_eq!(trail(&env), vec!["second-up"]);
}

#[test]
fn optional_action_runs_only_when_named() {
  let env = TestEnv::from_fixture("trail.json");

  env.devup_cmd().args(["--up", "extra"]).assert().success();

  assert_eq!(trail(&env), vec!["extra"]);
}

#[test]
fn explicit_config_path_is_honored() {
  let env = TestEnv::from_fixture("trail.json");

  env
    .devup_cmd()
    .current_dir(env.temp.path())
    .arg("--config")
    .arg(&env.config_path)
    .args(["--up", "first"])
    .assert()
    .success();

  assert_eq!(trail(&env), vec!["first-up"]);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn missing_direction_fails() {
  let env = TestEnv::from_fixture("trail.json");

  env
    .devup_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("no direction given"));

  assert!(trail(&env).is_empty());
}

#[test]
fn conflicting_directions_fail() {
  let env = TestEnv::from_fixture("trail.json");

  env
    .devup_cmd()
    .args(["--up", "--down"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("conflicting directions"));

  assert!(trail(&env).is_empty());
}

#[test]
fn unknown_selection_fails() {
  let env = TestEnv::from_fixture("trail.json");

  env
    .devup_cmd()
    .args(["--up", "nope"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("nothing to run"));
}

#[test]
fn missing_project_file_fails() {
  let env = TestEnv::empty();

  env
    .devup_cmd()
    .arg("--up")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load project"));
}

// =============================================================================
// Custom options
// =============================================================================

#[test]
fn required_option_must_be_given() {
  let env = TestEnv::from_fixture("options.json");

  env
    .devup_cmd()
    .arg("--up")
    .assert()
    .failure()
    .stderr(predicate::str::contains("option --env is required"));

  assert_eq!(env.project_file("env.txt"), None);
}

#[test]
fn option_value_is_substituted() {
  let env = TestEnv::from_fixture("options.json");

  env.devup_cmd().args(["--up", "--env", "dev"]).assert().success();

  assert_eq!(env.project_file("env.txt").as_deref(), Some("dev\n"));
}

#[test]
fn one_character_alias_is_a_short_flag() {
  let env = TestEnv::from_fixture("options.json");

  env.devup_cmd().args(["--up", "-e", "prod"]).assert().success();

  assert_eq!(env.project_file("env.txt").as_deref(), Some("prod\n"));
}

#[test]
fn option_rule_is_enforced() {
  let env = TestEnv::from_fixture("options.json");

  env
    .devup_cmd()
    .args(["--up", "--env", "staging"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not match rule"));

  assert_eq!(env.project_file("env.txt"), None);
}

#[test]
fn custom_options_show_in_help() {
  let env = TestEnv::from_fixture("options.json");

  env
    .devup_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("--env"));
}

// =============================================================================
// Failures and gates
// =============================================================================

#[test]
fn failing_action_does_not_stop_the_run() {
  let env = TestEnv::from_fixture("failing.json");

  env
    .devup_cmd()
    .arg("--up")
    .assert()
    .failure()
    .stderr(predicate::str::contains("command action failed"))
    .stderr(predicate::str::contains("error(s) recorded"));

  assert_eq!(env.project_file("after.txt").as_deref(), Some("cleaned\n"));
  assert_eq!(env.project_file("next.txt").as_deref(), Some("next\n"));
  assert_eq!(env.session_logs().len(), 1);
}

#[test]
fn elevated_action_needs_confirmation() {
  if devup_lib::platform::is_elevated() {
    return;
  }
  let env = TestEnv::from_fixture("elevated.json");

  env
    .devup_cmd()
    .arg("--up")
    .assert()
    .failure()
    .stderr(predicate::str::contains("--skip"));

  assert_eq!(env.project_file("hosts.txt"), None);
}

#[test]
fn skip_flag_bypasses_elevation_prompt() {
  let env = TestEnv::from_fixture("elevated.json");

  env.devup_cmd().args(["--up", "--skip"]).assert().success();

  assert_eq!(env.project_file("hosts.txt").as_deref(), Some("hosts\n"));
}

// =============================================================================
// Run once
// =============================================================================

#[test]
fn unchanged_run_once_action_runs_again() {
  let env = TestEnv::from_fixture("run_once.json");

  env.devup_cmd().arg("--up").assert().success();
  env.devup_cmd().arg("--up").assert().success();

  assert_eq!(env.project_file("seed.txt").as_deref(), Some("seeded\nseeded\n"));
}

#[test]
fn changed_run_once_action_is_skipped() {
  let env = TestEnv::from_fixture("run_once.json");

  env.devup_cmd().arg("--up").assert().success();
  env.write_file(
    "project/devup.json",
    &fixture_with("echo seeded >> seed.txt", "echo reseeded >> seed.txt"),
  );
  env
    .devup_cmd()
    .arg("--up")
    .assert()
    .success()
    .stdout(predicate::str::contains("already applied"));

  assert_eq!(env.project_file("seed.txt").as_deref(), Some("seeded\n"));
}

fn fixture_with(from: &str, to: &str) -> String {
  super::common::fixture_content("run_once.json").replace(from, to)
}
