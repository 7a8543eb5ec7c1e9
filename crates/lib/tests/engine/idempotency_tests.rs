//! Run-once behavior across consecutive runs of the same project.

use std::sync::Arc;

use serde_json::json;
use tracing_test::traced_test;

use devup_lib::engine::status;

use super::common::{Harness, ReadOnlyStore, args, flag, project, text};

fn seeded(command: &str) -> devup_lib::Project {
  project(json!([
    { "name": "web", "type": "docker", "container": { "image": "nginx" } },
    { "name": "seed", "type": "command", "command": command, "runOnce": true }
  ]))
}

#[tokio::test]
async fn first_run_dispatches_run_once_actions() {
  let harness = Harness::new();

  let report = harness.engine().run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["web", "seed"]);
  assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn unchanged_run_once_action_is_dispatched_again() {
  let harness = Harness::new();
  let engine = harness.engine();

  engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();
  harness.reset();
  let report = engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["web", "seed"]);
  assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn changed_run_once_action_is_skipped() {
  let harness = Harness::new();
  let engine = harness.engine();

  engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();
  harness.reset();
  let report = engine.run(&seeded("echo v2"), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["web"]);
  assert_eq!(report.skipped, vec!["seed"]);
  assert_eq!(*harness.responder.skipped.lock().unwrap(), vec!["seed"]);
}

#[tokio::test]
async fn naming_a_run_once_action_forces_it() {
  let harness = Harness::new();
  let engine = harness.engine();

  engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();
  harness.reset();
  engine.run(&seeded("echo v2"), &args(&[text("up", "seed")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["seed"]);
}

#[tokio::test]
async fn failed_runs_are_not_recorded() {
  let harness = Harness::new().failing(devup_lib::action::ActionKind::Command, "seed");
  let engine = harness.engine();

  engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();
  harness.reset();
  let report = engine.run(&seeded("echo v2"), &args(&[flag("up")])).await.unwrap();

  // without a stored record the changed action is still dispatched
  assert_eq!(harness.handled(), vec!["web", "seed"]);
  assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn run_once_action_applied_up_is_dispatched_going_down() {
  let harness = Harness::new();
  let engine = harness.engine();

  engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();
  harness.reset();
  let report = engine.run(&seeded("echo v1"), &args(&[flag("down")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["seed", "web"]);
  assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn sub_steps_are_never_recorded() {
  let project = project(json!([
    {
      "name": "seed",
      "type": "command",
      "command": "echo seed",
      "runOnce": true,
      "before": { "type": "command", "command": "echo prepare" },
      "after": { "type": "command", "command": "echo verify" }
    }
  ]));
  let harness = Harness::new();
  let engine = harness.engine();

  engine.run(&project, &args(&[flag("down")])).await.unwrap();
  harness.reset();
  let report = engine.run(&project, &args(&[flag("down")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["seed:before", "seed", "seed:after"]);
  assert!(report.skipped.is_empty());
  let recorded: Vec<_> = status(harness.store.as_ref(), &project)
    .unwrap()
    .runs
    .into_iter()
    .map(|run| run.name)
    .collect();
  assert_eq!(recorded, vec!["seed"]);
}

#[tokio::test]
#[traced_test]
async fn state_write_failure_keeps_the_report() {
  let harness = Harness::new();
  let engine = harness.engine_with_store(Arc::new(ReadOnlyStore::default()));

  let report = engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["web", "seed"]);
  assert_eq!(report.dispatched.len(), 2);
  assert_eq!(report.errors, 0);
  assert!(logs_contain("failed to record project hash"));
}

#[tokio::test]
async fn status_tracks_config_changes() {
  let harness = Harness::new();
  let engine = harness.engine();

  let before = status(harness.store.as_ref(), &seeded("echo v1")).unwrap();
  assert_eq!(before.config_changed, None);
  assert!(before.runs.is_empty());

  engine.run(&seeded("echo v1"), &args(&[flag("up")])).await.unwrap();

  let same = status(harness.store.as_ref(), &seeded("echo v1")).unwrap();
  assert_eq!(same.config_changed, Some(false));
  let mut names: Vec<_> = same.runs.iter().map(|run| run.name.as_str()).collect();
  names.sort();
  assert_eq!(names, vec!["seed", "web"]);

  let changed = status(harness.store.as_ref(), &seeded("echo v2")).unwrap();
  assert_eq!(changed.config_changed, Some(true));
}
