//! Data models for the task manifest.
//!
//! This module defines the core data structures:
//! - `Task` - Implementation tasks with acceptance criteria, dependencies and status
//! - `Manifest` - The single JSON document holding tasks, stats and history
//! - `Stats` - Status counters derived from a scan of the tasks
//! - `Transaction` - One recorded ingestion or rollback in the history
//! - `TaskPatch` - The only mutation surface for an existing task

pub mod graph;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Current manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Prefix of every task id.
pub const TASK_ID_PREFIX: &str = "TASK-";

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the task is expected to be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStrategy {
    #[serde(rename = "TDD")]
    Tdd,
    Unit,
    Integration,
    Direct,
}

impl TestStrategy {
    pub const ALL: [&'static str; 4] = ["TDD", "Unit", "Integration", "Direct"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStrategy::Tdd => "TDD",
            TestStrategy::Unit => "Unit",
            TestStrategy::Integration => "Integration",
            TestStrategy::Direct => "Direct",
        }
    }
}

impl fmt::Display for TestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Implementation risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub const ALL: [&'static str; 3] = ["low", "medium", "high"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Files a task expects to touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub modify: Vec<String>,
    #[serde(default)]
    pub delete: Vec<String>,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.modify.is_empty() && self.delete.is_empty()
    }
}

/// Verification flags recorded when a task is completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub tests_pass: bool,
    #[serde(default)]
    pub ac_verified: bool,
}

/// Inclusive line range inside a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

/// Pointer back to the planning document a task was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    /// Source document path
    pub source: String,

    /// Relevant line ranges within the source
    #[serde(default)]
    pub lines: Vec<LineRange>,
}

/// An implementation task tracked in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "TASK-007")
    pub id: String,

    /// Task title
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Ordered acceptance criteria
    pub acceptance_criteria: Vec<String>,

    /// Task IDs this task depends on
    #[serde(default)]
    pub dependencies: Vec<String>,

    pub test_strategy: TestStrategy,

    pub risk: Risk,

    pub estimated_hours: f64,

    #[serde(default)]
    pub files: FileChanges,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    /// When work on the task started
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// When the task was completed
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Commits recorded against the task
    #[serde(default)]
    pub commits: Vec<String>,

    #[serde(default)]
    pub validation: Validation,

    /// Optional source document reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TaskContext>,
}

impl Task {
    /// Apply a patch to the mutable fields of this task.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(started_at) = patch.started_at {
            self.started_at = started_at;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = completed_at;
        }
        if let Some(validation) = patch.validation {
            self.validation = validation;
        }
        for commit in &patch.add_commits {
            if !self.commits.contains(commit) {
                self.commits.push(commit.clone());
            }
        }
    }
}

/// Partial update for an existing task.
///
/// Only status, timestamps, validation and commits can change after a task
/// is created; everything else is fixed at ingestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub validation: Option<Validation>,
    pub add_commits: Vec<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Project metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Status counters. Always derived from the task list, never edited directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_tasks: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub blocked: usize,
}

impl Stats {
    /// Count task statuses with a full scan.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = Stats {
            total_tasks: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Blocked => stats.blocked += 1,
            }
        }
        stats
    }
}

/// Kind of history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionAction {
    Ingest,
    Delete,
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionAction::Ingest => write!(f, "ingest"),
            TransactionAction::Delete => write!(f, "delete"),
        }
    }
}

/// One recorded ingestion or rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Identifier (e.g., "TX-20260301-002")
    pub id: String,

    pub action: TransactionAction,

    pub timestamp: DateTime<Utc>,

    /// Where the batch came from (file path, planner name, "rollback:<tx>")
    pub source: String,

    /// Tasks created by this transaction
    #[serde(default)]
    pub tasks_added: Vec<String>,

    /// Tasks removed by this transaction (delete only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks_removed: Vec<String>,

    /// Transaction reverted by this one (delete only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverts: Option<String>,
}

/// The task manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub project: Project,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub history: Vec<Transaction>,
}

impl Manifest {
    /// Create an empty manifest for a project.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            project: Project {
                name: name.into(),
                description: description.into(),
            },
            stats: Stats::default(),
            tasks: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.history.iter().find(|t| t.id == id)
    }

    pub fn recompute_stats(&mut self) {
        self.stats = Stats::from_tasks(&self.tasks);
    }

    /// Next task number to assign, or `None` once the id space is used up.
    ///
    /// Considers ids recorded in history as well as live tasks, so numbers
    /// freed by a rollback are never handed out again.
    pub fn next_task_number(&self) -> Option<u32> {
        let live = self.tasks.iter().filter_map(|t| task_number(&t.id));
        let recorded = self
            .history
            .iter()
            .flat_map(|tx| tx.tasks_added.iter())
            .filter_map(|id| task_number(id));
        live.chain(recorded).max().map_or(Some(1), |max| max.checked_add(1))
    }

    /// Structural checks run when a manifest is loaded.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task_number(&task.id).is_none() {
                return Err(format!("malformed task id '{}'", task.id));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(format!("duplicate task id '{}'", task.id));
            }
        }
        let mut tx_seen = HashSet::new();
        for tx in &self.history {
            if !tx_seen.insert(tx.id.as_str()) {
                return Err(format!("duplicate transaction id '{}'", tx.id));
            }
        }
        Ok(())
    }
}

/// Parse the numeric suffix of a `TASK-NNN` id.
pub fn task_number(id: &str) -> Option<u32> {
    let digits = id.strip_prefix(TASK_ID_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Format a task number as `TASK-NNN`.
pub fn format_task_id(number: u32) -> String {
    format!("{}{:03}", TASK_ID_PREFIX, number)
}
