//! Pre-flight gates: nothing is dispatched unless every check passes.

use serde_json::json;

use devup_lib::EngineError;
use devup_lib::action::ActionKind;
use devup_lib::preflight::DependencyError;

use super::common::{Harness, args, backend, flag, project};

fn elevated_project() -> devup_lib::Project {
  project(json!([
    { "name": "hosts", "type": "command", "command": "echo 127.0.0.1 shop.local", "elevated": true },
    { "name": "web", "type": "docker", "container": { "image": "nginx" } }
  ]))
}

#[tokio::test]
async fn unavailable_dependency_aborts_before_dispatch() {
  let harness = Harness::new().unavailable(ActionKind::Docker);

  let err = harness.engine().run(&backend(), &args(&[flag("up")])).await.unwrap_err();

  match err {
    EngineError::DependencyUnavailable(DependencyError::Unavailable { action, kind, .. }) => {
      assert_eq!(action, "web");
      assert_eq!(kind, ActionKind::Docker);
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(harness.handled().is_empty());
  assert_eq!(harness.mock(ActionKind::Docker).installs(), 0);
}

#[tokio::test]
async fn every_executable_is_checked_before_the_first_dispatch() {
  let harness = Harness::new();

  harness.engine().run(&backend(), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.mock(ActionKind::Postgres).checks(), 1);
  assert_eq!(harness.mock(ActionKind::Docker).checks(), 1);
}

#[tokio::test]
async fn sub_steps_are_checked_too() {
  let project = project(json!([
    {
      "name": "web",
      "type": "docker",
      "container": { "image": "nginx" },
      "before": { "type": "pm2", "command": "stop" }
    }
  ]));
  let harness = Harness::new().unavailable(ActionKind::Pm2);

  let err = harness.engine().run(&project, &args(&[flag("up")])).await.unwrap_err();

  assert!(matches!(err, EngineError::DependencyUnavailable(_)));
  assert!(harness.handled().is_empty());
}

#[tokio::test]
async fn remediable_dependency_is_installed_then_run() {
  let project = project(json!([{ "name": "tsc", "type": "npm", "package": "typescript" }]));
  let harness = Harness::new().unavailable(ActionKind::Npm).remediable(ActionKind::Npm);

  let report = harness.engine().run(&project, &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.mock(ActionKind::Npm).installs(), 1);
  assert_eq!(harness.handled(), vec!["tsc"]);
  assert!(report.succeeded());
}

#[tokio::test]
async fn declined_elevation_aborts_before_dispatch() {
  let harness = Harness::new().answering(Some(false));

  let err = harness
    .engine()
    .run(&elevated_project(), &args(&[flag("up")]))
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::ElevationDeclined));
  assert_eq!(harness.prompter.asked(), 1);
  assert!(harness.handled().is_empty());
}

#[tokio::test]
async fn unanswered_elevation_counts_as_declined() {
  let harness = Harness::new().answering(None);

  let err = harness
    .engine()
    .run(&elevated_project(), &args(&[flag("up")]))
    .await
    .unwrap_err();

  assert!(matches!(err, EngineError::ElevationDeclined));
  assert!(harness.handled().is_empty());
}

#[tokio::test]
async fn confirmed_elevation_runs_everything() {
  let harness = Harness::new().answering(Some(true));

  let report = harness.engine().run(&elevated_project(), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.handled(), vec!["hosts", "web"]);
  assert!(report.succeeded());
}

#[tokio::test]
async fn skip_flag_bypasses_the_prompt() {
  let harness = Harness::new().answering(Some(false));

  harness
    .engine()
    .run(&elevated_project(), &args(&[flag("up"), flag("skip")]))
    .await
    .unwrap();

  assert_eq!(harness.prompter.asked(), 0);
  assert_eq!(harness.handled(), vec!["hosts", "web"]);
}

#[tokio::test]
async fn elevated_process_is_never_prompted() {
  let mut harness = Harness::new().answering(Some(false));
  harness.elevated = true;

  harness.engine().run(&elevated_project(), &args(&[flag("up")])).await.unwrap();

  assert_eq!(harness.prompter.asked(), 0);
  assert_eq!(harness.handled().len(), 2);
}

#[tokio::test]
async fn unselected_elevated_actions_do_not_prompt() {
  let harness = Harness::new().answering(Some(false));

  harness
    .engine()
    .run(&elevated_project(), &args(&[flag("up"), super::common::text("not", "hosts")]))
    .await
    .unwrap();

  assert_eq!(harness.prompter.asked(), 0);
  assert_eq!(harness.handled(), vec!["web"]);
}
