//! Integration tests for batch ingestion via CLI.
//!
//! These tests verify that:
//! - `tl init` creates the manifest once and leaves it alone afterwards
//! - `tl ingest` previews by default and writes only with `--commit`
//! - Batch indices resolve to freshly assigned ids
//! - Cycles and validation failures leave the manifest byte-identical

mod common;

use common::{TestEnv, batch, parse_stdout, proposed};
use predicates::prelude::*;
use serde_json::json;
use std::fs;

// === Init Tests ===

#[test]
fn test_init_creates_manifest() {
    let env = TestEnv::new();

    env.tl()
        .args(["init", "--name", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"initialized\":true"));

    let manifest = env.manifest();
    assert_eq!(manifest["version"], "1.0");
    assert_eq!(manifest["project"]["name"], "demo");
    assert_eq!(manifest["stats"]["total_tasks"], 0);
}

#[test]
fn test_init_already_initialized() {
    let env = TestEnv::init();

    env.tl()
        .args(["init", "--name", "renamed", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    assert_eq!(env.manifest()["project"]["name"], "demo");
}

#[test]
fn test_commands_require_init() {
    let env = TestEnv::new();

    env.tl()
        .arg("ready")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("\"kind\":\"initialization\""))
        .stderr(predicate::str::contains("tl init"));
}

// === Preview / Commit Tests ===

#[test]
fn test_first_task_is_task_001_and_ready() {
    let env = TestEnv::init();
    let out = env.ingest("b.json", &batch("prd.md", vec![proposed("Setup", json!([]))]));

    assert_eq!(out["committed"], true);
    assert_eq!(out["planned"][0]["id"], "TASK-001");
    assert_eq!(out["stats"]["pending"], 1);

    let ready = env.tl().arg("ready").output().unwrap();
    let ready = parse_stdout(&ready.stdout);
    assert_eq!(ready["count"], 1);
    assert_eq!(ready["tasks"][0]["id"], "TASK-001");
}

#[test]
fn test_preview_is_default_and_writes_nothing() {
    let env = TestEnv::init();
    let before = fs::read(env.manifest_path()).unwrap();
    let path = env.write_batch("b.json", &json!([proposed("Setup", json!([]))]));

    env.tl()
        .args(["ingest", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"committed\":false"))
        .stdout(predicate::str::contains("TASK-001"));

    assert_eq!(fs::read(env.manifest_path()).unwrap(), before);
}

#[test]
fn test_batch_indices_continue_after_existing_ids() {
    let env = TestEnv::init();
    let five: Vec<_> = (1..=5).map(|i| proposed(&format!("Base {}", i), json!([]))).collect();
    env.ingest("base.json", &batch("base", five));

    let out = env.ingest(
        "next.json",
        &batch("next", vec![proposed("Model", json!([])), proposed("Api", json!([0]))]),
    );
    assert_eq!(out["planned"][0]["id"], "TASK-006");
    assert_eq!(out["planned"][1]["id"], "TASK-007");
    assert_eq!(out["planned"][1]["dependencies"], json!(["TASK-006"]));

    let ready = parse_stdout(&env.tl().arg("ready").output().unwrap().stdout);
    let ids: Vec<&str> = ready["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"TASK-006"));
    assert!(!ids.contains(&"TASK-007"));
}

#[test]
fn test_stdin_batch_with_source_flag() {
    let env = TestEnv::init();
    let body = serde_json::to_string(&json!([proposed("From stdin", json!([]))])).unwrap();

    env.tl()
        .args(["ingest", "-", "--commit", "--source", "planner"])
        .write_stdin(body)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source\":\"planner\""));

    assert_eq!(env.manifest()["history"][0]["source"], "planner");
}

#[test]
fn test_human_preview_mentions_commit() {
    let env = TestEnv::init();
    let path = env.write_batch("b.json", &json!([proposed("Setup", json!([]))]));

    env.tl()
        .args(["ingest", path.to_str().unwrap(), "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--commit"))
        .stdout(predicate::str::contains("TASK-001 Setup"));
}

// === Failure Tests ===

#[test]
fn test_mutual_dependency_is_cycle_and_manifest_unchanged() {
    let env = TestEnv::init();
    env.ingest("base.json", &batch("base", vec![proposed("Base", json!([]))]));
    let before = fs::read(env.manifest_path()).unwrap();

    let path = env.write_batch(
        "cycle.json",
        &json!([proposed("A", json!([1])), proposed("B", json!([0]))]),
    );
    env.tl()
        .args(["ingest", path.to_str().unwrap(), "--commit"])
        .assert()
        .code(8)
        .stderr(predicate::str::contains("TASK-002 -> TASK-003 -> TASK-002"));

    assert_eq!(fs::read(env.manifest_path()).unwrap(), before);
}

#[test]
fn test_validation_reports_every_violation() {
    let env = TestEnv::init();
    let before = fs::read(env.manifest_path()).unwrap();
    let path = env.write_batch(
        "bad.json",
        &json!([
            { "title": "", "description": "d", "acceptance_criteria": ["ok"],
              "test_strategy": "Unit", "risk": "low", "estimated_hours": 1 },
            { "title": "t", "description": "d", "acceptance_criteria": [],
              "test_strategy": "Fuzz", "risk": "low", "estimated_hours": 0 }
        ]),
    );

    env.tl()
        .args(["ingest", path.to_str().unwrap(), "--commit"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("tasks[0].title"))
        .stderr(predicate::str::contains("tasks[1].acceptance_criteria"))
        .stderr(predicate::str::contains("tasks[1].test_strategy"))
        .stderr(predicate::str::contains("tasks[1].estimated_hours"));

    assert_eq!(fs::read(env.manifest_path()).unwrap(), before);
}

#[test]
fn test_unknown_dependency_is_dependency_error() {
    let env = TestEnv::init();
    let path = env.write_batch("b.json", &json!([proposed("A", json!(["TASK-042"]))]));

    env.tl()
        .args(["ingest", path.to_str().unwrap(), "--commit"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("TASK-042"));

    let out_of_range = env.write_batch("c.json", &json!([proposed("A", json!([3]))]));
    env.tl()
        .args(["ingest", out_of_range.to_str().unwrap()])
        .assert()
        .code(7);
}

#[test]
fn test_strict_rejects_dependency_on_unfinished_task() {
    let env = TestEnv::init();
    env.ingest("base.json", &batch("base", vec![proposed("Base", json!([]))]));
    let path = env.write_batch("b.json", &json!([proposed("Next", json!(["TASK-001"]))]));

    env.tl()
        .args(["ingest", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("stays blocked until that completes"));

    env.tl()
        .args(["ingest", path.to_str().unwrap(), "--commit", "--strict"])
        .assert()
        .code(6);
    assert_eq!(env.manifest()["stats"]["total_tasks"], 1);
}

#[test]
fn test_missing_batch_file() {
    let env = TestEnv::init();
    env.tl()
        .args(["ingest", "nope.json"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("nope.json"));
}
