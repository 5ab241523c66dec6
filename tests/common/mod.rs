//! Common test utilities for taskloom integration tests.
//!
//! Provides `TestEnv` for isolated test environments that never touch the
//! user's config directory or the current working tree.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with an isolated project root and config directory.
///
/// The `tl()` method returns a `Command` running in the project root with
/// `TL_CONFIG_DIR` pointing at an empty directory and every other `TL_*`
/// variable cleared, making tests parallel-safe.
pub struct TestEnv {
    pub root: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment with an initialized manifest.
    pub fn init() -> Self {
        let env = Self::new();
        env.tl()
            .args(["init", "--name", "demo", "--description", "integration tests"])
            .assert()
            .success();
        env
    }

    /// Get a Command for the tl binary with isolated configuration.
    pub fn tl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tl"));
        cmd.current_dir(self.root.path());
        cmd.env("TL_CONFIG_DIR", self.config_dir.path());
        for var in ["TL_ROOT", "TL_MANIFEST", "TL_CACHE_DIR", "TL_CACHE_TTL", "TL_LOG"] {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join(".taskloom").join("manifest.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join(".taskloom").join("research-cache")
    }

    /// Parsed manifest as currently on disk.
    pub fn manifest(&self) -> Value {
        serde_json::from_str(&std::fs::read_to_string(self.manifest_path()).unwrap()).unwrap()
    }

    /// Write a batch file into the project root and return its path.
    pub fn write_batch(&self, name: &str, batch: &Value) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, serde_json::to_string_pretty(batch).unwrap()).unwrap();
        path
    }

    /// Commit a batch and return the parsed JSON output.
    pub fn ingest(&self, name: &str, batch: &Value) -> Value {
        let path = self.write_batch(name, batch);
        let output = self
            .tl()
            .args(["ingest", path.to_str().unwrap(), "--commit"])
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "ingest failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        parse_stdout(&output.stdout)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_stdout(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).unwrap()
}

/// A valid proposed task. `deps` holds batch indices or task ids.
pub fn proposed(title: &str, deps: Value) -> Value {
    json!({
        "title": title,
        "description": format!("Implement {}. Keep it small.", title),
        "acceptance_criteria": [format!("{} works", title), format!("{} is tested", title)],
        "dependencies": deps,
        "test_strategy": "Unit",
        "risk": "low",
        "estimated_hours": 2,
        "files": { "create": [format!("src/{}.rs", title.to_lowercase().replace(' ', "_"))] }
    })
}

/// Batch document with a source label.
pub fn batch(source: &str, tasks: Vec<Value>) -> Value {
    json!({ "source": source, "tasks": tasks })
}
