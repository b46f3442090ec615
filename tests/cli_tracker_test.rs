//! Integration tests for ftrack commands that fail before any request.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_projects_missing_credentials() {
    let env = TestEnv::new();

    env.trk()
        .arg("projects")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing credentials: server-url, username, api-key",
        ));
}

#[test]
fn test_tasks_missing_api_key() {
    let env = TestEnv::new();

    env.trk()
        .env("FTRACK_SERVER", "https://studio.ftrackapp.com")
        .env("FTRACK_API_USER", "artist")
        .args(["-H", "tasks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Missing credentials: api-key"));
}

#[test]
fn test_tasks_empty_project_rejected() {
    let env = TestEnv::new();

    env.trk()
        .args(["tasks", "--project", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project id cannot be empty"));
}

#[test]
fn test_task_url() {
    let env = TestEnv::new();

    env.trk()
        .args(["-H", "--server", "https://studio.ftrackapp.com/", "task", "url", "t1", "--project", "p1"])
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "https://studio.ftrackapp.com/#slideEntityId=t1&slideEntityType=task\
             &view=tasks&itemId=projects&entityId=p1&entityType=show\n",
        ));
}

#[test]
fn test_task_url_without_server() {
    let env = TestEnv::new();

    env.trk()
        .args(["task", "url", "t1", "--project", "p1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(r#"{"error":"Missing credentials: server-url"#));
}
