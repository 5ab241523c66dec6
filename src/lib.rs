//! taskloom - A task-manifest engine for code-generation agents.
//!
//! This library provides the core functionality for the `tl` CLI tool:
//! manifest storage, dependency-graph queries, batch ingestion, bounded
//! context rendering, a research cache and the transaction history.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod history;
pub mod ingest;
pub mod models;
pub mod research_cache;
pub mod storage;

use std::path::PathBuf;


/// Library-level error type for taskloom operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not initialized: no manifest at {}; run `tl init` first", .path.display())]
    NotInitialized { path: PathBuf },

    #[error("Manifest {} is corrupted: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed ({} violation(s)): {}", .violations.len(), .violations.join("; "))]
    Validation { violations: Vec<String> },

    #[error("Task {task} has unresolvable dependency '{reference}'")]
    Dependency { task: String, reference: String },

    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Rollback of {transaction} blocked by dependent tasks: {}", .dependents.join(", "))]
    RollbackBlocked {
        transaction: String,
        dependents: Vec<String>,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotInitialized { .. } => "initialization",
            Error::Corrupted { .. } => "corruption",
            Error::NotFound(_) => "not_found",
            Error::Validation { .. } => "validation",
            Error::Dependency { .. } => "dependency",
            Error::Cycle { .. } => "cycle",
            Error::RollbackBlocked { .. } => "rollback_blocked",
            Error::Write { .. } => "write",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::InvalidInput(_) => "invalid_input",
            Error::Config(_) => "config",
        }
    }

    /// Process exit code for the CLI. Each error kind gets its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotInitialized { .. } => 3,
            Error::Corrupted { .. } => 4,
            Error::NotFound(_) => 5,
            Error::Validation { .. } => 6,
            Error::Dependency { .. } => 7,
            Error::Cycle { .. } => 8,
            Error::RollbackBlocked { .. } => 9,
            Error::Write { .. } => 10,
            _ => 1,
        }
    }

    /// Suggested remedy shown next to the error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::NotInitialized { .. } => {
                Some("Run `tl init --name <project>` to create the manifest.")
            }
            Error::Corrupted { .. } => {
                Some("Restore the manifest from version control or fix the JSON by hand.")
            }
            Error::NotFound(_) => Some("Use `tl summary` or `tl history list` to see valid ids."),
            Error::Validation { .. } => Some("Fix every listed field and re-run the ingestion."),
            Error::Dependency { .. } => {
                Some("Use a zero-based batch index or the id of an existing task.")
            }
            Error::Cycle { .. } => Some("Remove one dependency on the reported path."),
            Error::RollbackBlocked { .. } => Some(concat!(
                "Roll back the dependent transactions first, ",
                "or pass --force and repair the dangling references."
            )),
            Error::Write { .. } => {
                Some("Check permissions and free space; the previous manifest is intact.")
            }
            _ => None,
        }
    }
}

/// Result type alias for taskloom operations.
pub type Result<T> = std::result::Result<T, Error>;
