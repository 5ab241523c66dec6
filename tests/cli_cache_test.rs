//! Integration tests for the research cache via CLI.

mod common;

use common::{TestEnv, parse_stdout};
use predicates::prelude::*;
use serde_json::{Value, json};

fn run(env: &TestEnv, args: &[&str]) -> Value {
    let out = env.tl().args(args).output().unwrap();
    assert!(
        out.status.success(),
        "tl {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    parse_stdout(&out.stdout)
}

#[test]
fn test_query_variant_hits_same_entry() {
    let env = TestEnv::new();
    run(
        &env,
        &["cache", "set", "OAuth2 Alternatives", "Consider OIDC.", "--tag", "oauth2"],
    );

    let got = run(&env, &["cache", "get", "oauth2  alternatives"]);
    assert_eq!(got["hit"], true);
    assert_eq!(got["result"], "Consider OIDC.");

    env.tl()
        .args(["cache", "get", "OAUTH2 alternatives", "-H"])
        .assert()
        .success()
        .stdout("Consider OIDC.\n");
}

#[test]
fn test_cache_works_without_manifest() {
    let env = TestEnv::new();
    run(&env, &["cache", "set", "q", "r"]);
    assert!(env.cache_dir().is_dir());
    assert!(!env.manifest_path().exists());
}

#[test]
fn test_get_miss_and_has() {
    let env = TestEnv::new();
    let miss = run(&env, &["cache", "get", "nothing here"]);
    assert_eq!(miss["hit"], false);
    assert!(miss["result"].is_null());

    assert_eq!(run(&env, &["cache", "has", "nothing here"])["exists"], false);
    run(&env, &["cache", "set", "Nothing Here", "now there is"]);
    assert_eq!(run(&env, &["cache", "has", "nothing   here"])["exists"], true);
}

#[test]
fn test_search_by_tags() {
    let env = TestEnv::new();
    run(&env, &["cache", "set", "jwt rotation", "r1", "-t", "auth", "-t", "JWT"]);
    run(&env, &["cache", "set", "cookies", "r2", "-t", "auth"]);
    run(&env, &["cache", "set", "indexes", "r3", "-t", "db"]);

    let both = run(&env, &["cache", "search", "-t", "auth", "-t", "jwt"]);
    assert_eq!(both["count"], 1);
    assert_eq!(both["entries"][0]["query"], "jwt rotation");
    assert_eq!(both["entries"][0]["tags"], json!(["auth", "jwt"]));

    assert_eq!(run(&env, &["cache", "search", "-t", "auth"])["count"], 2);
    assert_eq!(run(&env, &["cache", "search"])["count"], 3);
}

#[test]
fn test_expired_entries_are_absent_and_clearable() {
    let env = TestEnv::new();
    let entry = run(&env, &["cache", "set", "old", "stale", "--ttl", "1"]);
    run(&env, &["cache", "set", "new", "fresh"]);

    // Backdate the first entry past its one-minute lifetime.
    let key = entry["key"].as_str().unwrap();
    let path = env.cache_dir().join(format!("{}.json", key));
    let mut stored: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    stored["timestamp"] = json!("2000-01-01T00:00:00Z");
    std::fs::write(&path, serde_json::to_string(&stored).unwrap()).unwrap();

    assert_eq!(run(&env, &["cache", "get", "old"])["hit"], false);
    assert_eq!(run(&env, &["cache", "stats"])["entries_count"], 2);

    let cleared = run(&env, &["cache", "clear", "--expired"]);
    assert_eq!(cleared["removed"], 1);
    assert_eq!(run(&env, &["cache", "stats"])["entries_count"], 1);

    assert_eq!(run(&env, &["cache", "clear"])["removed"], 1);
    assert_eq!(run(&env, &["cache", "stats"])["entries_count"], 0);
}

#[test]
fn test_stats_reports_size_and_default_ttl() {
    let env = TestEnv::new();
    run(&env, &["cache", "set", "q", "some result text"]);

    let stats = run(&env, &["--cache-ttl", "90", "cache", "stats"]);
    assert_eq!(stats["entries_count"], 1);
    assert!(stats["total_size"].as_u64().unwrap() > 0);
    assert_eq!(stats["default_ttl"], 90);
    assert_eq!(stats["hit_rate"], 0.0);
}

#[test]
fn test_cache_dir_override() {
    let env = TestEnv::new();
    let elsewhere = env.path().join("elsewhere");
    env.tl()
        .args(["cache", "set", "q", "r", "--cache-dir", elsewhere.to_str().unwrap()])
        .assert()
        .success();
    assert!(elsewhere.is_dir());
    assert!(!env.cache_dir().exists());
}

#[test]
fn test_empty_query_rejected() {
    let env = TestEnv::new();
    env.tl()
        .args(["cache", "set", "   ", "r"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}
