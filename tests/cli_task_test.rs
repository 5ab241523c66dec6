//! Integration tests for task queries and lifecycle via CLI.

mod common;

use common::{TestEnv, batch, parse_stdout, proposed};
use predicates::prelude::*;
use serde_json::{Value, json};

/// TASK-001 (no deps), TASK-002 (deps TASK-001), TASK-003 (deps TASK-001, TASK-002).
fn chain() -> TestEnv {
    let env = TestEnv::init();
    env.ingest(
        "chain.json",
        &batch(
            "chain",
            vec![
                proposed("Schema", json!([])),
                proposed("Repository", json!([0])),
                proposed("Endpoint", json!([0, 1])),
            ],
        ),
    );
    env
}

fn ids(value: &Value) -> Vec<String> {
    value["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect()
}

fn assert_stats_consistent(env: &TestEnv) {
    let manifest = env.manifest();
    let stats = &manifest["stats"];
    let tasks = manifest["tasks"].as_array().unwrap();
    assert_eq!(stats["total_tasks"], tasks.len());
    let sum = ["completed", "in_progress", "pending", "blocked"]
        .iter()
        .map(|k| stats[*k].as_u64().unwrap())
        .sum::<u64>();
    assert_eq!(sum, tasks.len() as u64);
}

#[test]
fn test_ready_and_blocked_follow_completion() {
    let env = chain();

    let ready = parse_stdout(&env.tl().arg("ready").output().unwrap().stdout);
    assert_eq!(ids(&ready), vec!["TASK-001"]);
    let blocked = parse_stdout(&env.tl().arg("blocked").output().unwrap().stdout);
    assert_eq!(ids(&blocked), vec!["TASK-002", "TASK-003"]);
    assert_eq!(blocked["tasks"][1]["waiting_on"], json!(["TASK-001", "TASK-002"]));

    env.tl()
        .args(["task", "complete", "TASK-001", "--tests-pass", "--ac-verified"])
        .assert()
        .success();

    let ready = parse_stdout(&env.tl().arg("ready").output().unwrap().stdout);
    assert_eq!(ids(&ready), vec!["TASK-002"]);
    assert_stats_consistent(&env);
}

#[test]
fn test_start_refuses_open_dependencies_without_force() {
    let env = chain();

    env.tl()
        .args(["task", "start", "TASK-002"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TASK-001"));

    env.tl()
        .args(["task", "start", "TASK-002", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"in-progress\""));

    assert_eq!(env.manifest()["stats"]["in_progress"], 1);
    assert_stats_consistent(&env);
}

#[test]
fn test_complete_records_commits_and_validation() {
    let env = chain();
    env.tl().args(["task", "start", "TASK-001"]).assert().success();
    env.tl()
        .args([
            "task", "complete", "TASK-001", "--tests-pass", "--commit", "abc1234", "--commit",
            "def5678",
        ])
        .assert()
        .success();

    let shown = parse_stdout(&env.tl().args(["task", "show", "TASK-001"]).output().unwrap().stdout);
    assert_eq!(shown["status"], "completed");
    assert_eq!(shown["commits"], json!(["abc1234", "def5678"]));
    assert_eq!(shown["validation"]["tests_pass"], true);
    assert_eq!(shown["validation"]["ac_verified"], false);
    assert!(shown["started_at"].is_string());
    assert!(shown["completed_at"].is_string());
}

#[test]
fn test_block_then_listed_as_blocked() {
    let env = chain();
    env.tl()
        .args(["task", "block", "TASK-001", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending -> blocked"));

    let blocked = parse_stdout(&env.tl().arg("blocked").output().unwrap().stdout);
    assert_eq!(ids(&blocked), vec!["TASK-001", "TASK-002", "TASK-003"]);
    assert_eq!(env.manifest()["stats"]["blocked"], 1);
}

#[test]
fn test_unknown_task_exit_code() {
    let env = chain();
    env.tl()
        .args(["task", "show", "TASK-999"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("\"kind\":\"not_found\""));

    env.tl()
        .args(["task", "show", "TASK-999", "-H"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Error: Not found: task TASK-999"))
        .stderr(predicate::str::contains("Hint:"));
}

#[test]
fn test_summary_shrinks_as_tasks_complete() {
    let env = chain();

    let all = parse_stdout(&env.tl().arg("summary").output().unwrap().stdout);
    assert_eq!(ids(&all).len(), 3);
    assert!(all["tasks"][0].get("description").is_none());

    env.tl().args(["task", "complete", "TASK-001"]).assert().success();

    let open = parse_stdout(&env.tl().args(["summary", "--incomplete"]).output().unwrap().stdout);
    assert_eq!(ids(&open), vec!["TASK-002", "TASK-003"]);
    assert_eq!(open["stats"]["completed"], 1);
}

#[test]
fn test_corrupted_manifest_exit_code() {
    let env = TestEnv::init();
    std::fs::write(env.manifest_path(), "{ \"version\": ").unwrap();

    env.tl()
        .arg("summary")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("\"kind\":\"corruption\""));
}

#[test]
fn test_doctor_reports_dangling_reference() {
    let env = chain();
    env.tl().arg("doctor").assert().success().stdout(predicate::str::contains("\"healthy\":true"));

    let mut manifest = env.manifest();
    manifest["tasks"][0]["dependencies"] = json!(["TASK-404"]);
    std::fs::write(env.manifest_path(), serde_json::to_string(&manifest).unwrap()).unwrap();

    env.tl()
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"healthy\":false"))
        .stdout(predicate::str::contains("TASK-001 depends on missing task TASK-404"));
}
