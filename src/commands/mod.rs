//! Command implementations for the taskloom CLI.
//!
//! Each command resolves its inputs against a [`ResolvedConfig`], calls into
//! the library and returns a result type implementing [`Output`]. Commands
//! are grouped as:
//! - `init`, `task_*` - Manifest creation and task lifecycle
//! - `ready`, `blocked`, `context`, `summary` - Read-only queries
//! - `ingest` - Batch preview and commit
//! - `history_*` - Transaction history and rollback
//! - `cache_*` - Research cache
//! - `config_show`, `doctor` - Diagnostics

use crate::config::{Resolved, ResolvedConfig};
use crate::context::{ContextBuilder, TaskSummary, build_summary};
use crate::history::{RollbackOutcome, RollbackPreview, TransactionDetail, TransactionLog};
use crate::ingest::{IngestPlan, IngestionEngine, parse_batch_document};
use crate::models::graph::{DependencyGraph, detect_cycle};
use crate::models::{
    Manifest, Project, Stats, Task, TaskPatch, TaskStatus, Transaction, TransactionAction,
    Validation,
};
use crate::research_cache::{CacheEntry, CacheStats, ResearchCache};
use crate::storage::ManifestStore;
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Version string including the commit and build time.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("TL_GIT_COMMIT"),
    " ",
    env!("TL_BUILD_TIMESTAMP"),
    ")"
);

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}

fn open_store(config: &ResolvedConfig) -> ManifestStore {
    ManifestStore::new(config.manifest_path())
}

fn load_manifest(config: &ResolvedConfig) -> Result<Manifest> {
    open_store(config).load(false)
}

fn open_cache(config: &ResolvedConfig) -> ResearchCache {
    ResearchCache::new(config.cache_dir(), config.cache_ttl())
}

// === Init ===

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub initialized: bool,
    pub path: PathBuf,
    pub project: Project,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.initialized {
            format!(
                "Initialized taskloom manifest for '{}' at {}",
                self.project.name,
                self.path.display()
            )
        } else {
            format!(
                "Manifest for '{}' already exists at {}",
                self.project.name,
                self.path.display()
            )
        }
    }
}

/// Create the manifest unless one already exists.
pub fn init(config: &ResolvedConfig, name: &str, description: &str) -> Result<InitResult> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("project name must not be empty".to_string()));
    }
    let outcome = ManifestStore::init(config.manifest_path(), name.trim(), description)?;
    Ok(InitResult {
        initialized: outcome.created,
        path: config.manifest_path().to_path_buf(),
        project: outcome.manifest.project,
    })
}

// === Task lifecycle ===

#[derive(Debug, Serialize)]
pub struct TaskShowResult {
    #[serde(flatten)]
    pub task: Task,
}

impl Output for TaskShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let t = &self.task;
        let mut out = format!("{} [{}] {}\n", t.id, t.status, t.title);
        let _ = writeln!(
            out,
            "  Strategy: {} | Risk: {} | Estimate: {}h",
            t.test_strategy, t.risk, t.estimated_hours
        );
        if !t.dependencies.is_empty() {
            let _ = writeln!(out, "  Depends on: {}", t.dependencies.join(", "));
        }
        if let Some(started) = t.started_at {
            let _ = writeln!(out, "  Started: {}", started.to_rfc3339());
        }
        if let Some(completed) = t.completed_at {
            let _ = writeln!(out, "  Completed: {}", completed.to_rfc3339());
        }
        if !t.commits.is_empty() {
            let _ = writeln!(out, "  Commits: {}", t.commits.join(", "));
        }
        let _ = write!(
            out,
            "  Validation: tests_pass={} ac_verified={}",
            t.validation.tests_pass, t.validation.ac_verified
        );
        out
    }
}

pub fn task_show(config: &ResolvedConfig, id: &str) -> Result<TaskShowResult> {
    let manifest = load_manifest(config)?;
    let task = manifest
        .task(id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
    Ok(TaskShowResult { task })
}

#[derive(Debug, Serialize)]
pub struct TaskUpdateResult {
    pub id: String,
    pub title: String,
    pub previous_status: TaskStatus,
    pub status: TaskStatus,
    pub stats: Stats,
}

impl Output for TaskUpdateResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{} {}: {} -> {}",
            self.id, self.title, self.previous_status, self.status
        )
    }
}

fn update_status(
    config: &ResolvedConfig,
    id: &str,
    check: impl FnOnce(&Manifest, &Task) -> Result<()>,
    patch: TaskPatch,
) -> Result<TaskUpdateResult> {
    let mut store = open_store(config);
    let manifest = store.load(true)?;
    let task = manifest
        .task(id)
        .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
    check(&manifest, task)?;
    let previous_status = task.status;

    let updated = store.update_task(id, &patch)?;
    let task = updated
        .task(id)
        .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
    Ok(TaskUpdateResult {
        id: task.id.clone(),
        title: task.title.clone(),
        previous_status,
        status: task.status,
        stats: updated.stats,
    })
}

/// Move a task to in-progress.
///
/// Refuses completed tasks, and tasks with incomplete dependencies unless
/// `force` is set.
pub fn task_start(config: &ResolvedConfig, id: &str, force: bool) -> Result<TaskUpdateResult> {
    let patch = TaskPatch {
        status: Some(TaskStatus::InProgress),
        started_at: Some(Some(Utc::now())),
        ..Default::default()
    };
    update_status(
        config,
        id,
        |manifest, task| {
            match task.status {
                TaskStatus::Completed => {
                    return Err(Error::InvalidInput(format!("task {} is already completed", id)));
                }
                TaskStatus::InProgress => {
                    return Err(Error::InvalidInput(format!("task {} is already in progress", id)));
                }
                _ => {}
            }
            let open = DependencyGraph::new(manifest).open_dependencies(task);
            if !open.is_empty() && !force {
                return Err(Error::InvalidInput(format!(
                    "task {} has incomplete dependencies: {} (use --force to start anyway)",
                    id,
                    open.join(", ")
                )));
            }
            Ok(())
        },
        patch,
    )
}

/// Mark a task completed and record its validation and commits.
pub fn task_complete(
    config: &ResolvedConfig,
    id: &str,
    tests_pass: bool,
    ac_verified: bool,
    commits: Vec<String>,
) -> Result<TaskUpdateResult> {
    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        completed_at: Some(Some(Utc::now())),
        validation: Some(Validation {
            tests_pass,
            ac_verified,
        }),
        add_commits: commits,
        ..Default::default()
    };
    update_status(
        config,
        id,
        |_, task| {
            if task.status == TaskStatus::Completed {
                return Err(Error::InvalidInput(format!("task {} is already completed", id)));
            }
            Ok(())
        },
        patch,
    )
}

pub fn task_block(config: &ResolvedConfig, id: &str) -> Result<TaskUpdateResult> {
    update_status(
        config,
        id,
        |_, task| {
            if task.status == TaskStatus::Completed {
                return Err(Error::InvalidInput(format!(
                    "task {} is completed and cannot be blocked",
                    id
                )));
            }
            Ok(())
        },
        TaskPatch::status(TaskStatus::Blocked),
    )
}

// === Queries ===

#[derive(Debug, Serialize)]
pub struct ReadyResult {
    pub tasks: Vec<TaskSummary>,
    pub count: usize,
}

impl Output for ReadyResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No ready tasks.".to_string();
        }
        let mut out = format!("{} ready task(s):", self.count);
        for t in &self.tasks {
            let _ = write!(out, "\n  {} {}", t.id, t.title);
        }
        out
    }
}

fn summarize(task: &Task) -> TaskSummary {
    TaskSummary {
        id: task.id.clone(),
        title: task.title.clone(),
        status: task.status,
        dependencies: task.dependencies.clone(),
    }
}

pub fn ready(config: &ResolvedConfig) -> Result<ReadyResult> {
    let manifest = load_manifest(config)?;
    let tasks: Vec<TaskSummary> = DependencyGraph::new(&manifest)
        .ready_tasks()
        .into_iter()
        .map(summarize)
        .collect();
    Ok(ReadyResult {
        count: tasks.len(),
        tasks,
    })
}

#[derive(Debug, Serialize)]
pub struct BlockedTask {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    /// Dependencies that are not completed yet
    pub waiting_on: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockedResult {
    pub tasks: Vec<BlockedTask>,
    pub count: usize,
}

impl Output for BlockedResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No blocked tasks.".to_string();
        }
        let mut out = format!("{} blocked task(s):", self.count);
        for t in &self.tasks {
            let _ = write!(out, "\n  {} {} [{}]", t.id, t.title, t.status);
            if !t.waiting_on.is_empty() {
                let _ = write!(out, " waiting on {}", t.waiting_on.join(", "));
            }
        }
        out
    }
}

pub fn blocked(config: &ResolvedConfig) -> Result<BlockedResult> {
    let manifest = load_manifest(config)?;
    let graph = DependencyGraph::new(&manifest);
    let tasks: Vec<BlockedTask> = graph
        .blocked_tasks()
        .into_iter()
        .map(|t| BlockedTask {
            id: t.id.clone(),
            title: t.title.clone(),
            status: t.status,
            waiting_on: graph.open_dependencies(t),
        })
        .collect();
    Ok(BlockedResult {
        count: tasks.len(),
        tasks,
    })
}

#[derive(Debug, Serialize)]
pub struct ContextResult {
    pub id: String,
    pub format: &'static str,
    pub content: String,
}

impl Output for ContextResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        self.content.trim_end().to_string()
    }
}

pub fn context(config: &ResolvedConfig, id: &str, compact: bool) -> Result<ContextResult> {
    let manifest = load_manifest(config)?;
    let builder = ContextBuilder::new(&manifest);
    let (format, content) = if compact {
        ("compact", builder.compact(id)?)
    } else {
        ("minimal", builder.minimal(id)?)
    };
    Ok(ContextResult {
        id: id.to_string(),
        format,
        content,
    })
}

#[derive(Debug, Serialize)]
pub struct SummaryResult {
    pub project: Project,
    pub stats: Stats,
    pub tasks: Vec<TaskSummary>,
}

impl Output for SummaryResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.stats;
        let mut out = format!(
            "{}: {} task(s), {} completed, {} in progress, {} pending, {} blocked",
            self.project.name, s.total_tasks, s.completed, s.in_progress, s.pending, s.blocked
        );
        for t in &self.tasks {
            let _ = write!(out, "\n  {} [{}] {}", t.id, t.status, t.title);
            if !t.dependencies.is_empty() {
                let _ = write!(out, " <- {}", t.dependencies.join(", "));
            }
        }
        out
    }
}

pub fn summary(config: &ResolvedConfig, incomplete_only: bool) -> Result<SummaryResult> {
    let manifest = load_manifest(config)?;
    Ok(SummaryResult {
        tasks: build_summary(&manifest, incomplete_only),
        project: manifest.project,
        stats: manifest.stats,
    })
}

// === Ingest ===

#[derive(Debug, Serialize)]
pub struct IngestResult {
    pub committed: bool,
    pub source: String,
    #[serde(flatten)]
    pub plan: IngestPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
}

impl Output for IngestResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = if self.plan.planned.is_empty() {
            "Batch is empty; nothing to ingest.".to_string()
        } else if self.committed {
            match &self.transaction {
                Some(tx) => format!(
                    "Ingested {} task(s) from {} as {}:",
                    self.plan.planned.len(),
                    self.source,
                    tx.id
                ),
                None => format!("Ingested {} task(s):", self.plan.planned.len()),
            }
        } else {
            format!(
                "Preview: {} task(s) would be added (run with --commit to write):",
                self.plan.planned.len()
            )
        };
        for p in &self.plan.planned {
            let _ = write!(out, "\n  {} {}", p.id, p.title);
            if !p.dependencies.is_empty() {
                let _ = write!(out, " <- {}", p.dependencies.join(", "));
            }
        }
        for w in &self.plan.warnings {
            let _ = write!(out, "\n  warning: {}", w);
        }
        out
    }
}

fn read_batch_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    std::fs::read_to_string(file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("batch file {}", file))
        } else {
            Error::Io(e)
        }
    })
}

/// Preview or commit a batch file (`-` reads stdin).
///
/// The recorded source is `--source`, else the document's `source`, else the
/// file path.
pub fn ingest(
    config: &ResolvedConfig,
    file: &str,
    commit: bool,
    source: Option<String>,
    strict: bool,
) -> Result<IngestResult> {
    let input = read_batch_input(file)?;
    let document = parse_batch_document(&input)?;
    let source = source
        .or(document.source)
        .unwrap_or_else(|| if file == "-" { "stdin".to_string() } else { file.to_string() });

    let mut store = open_store(config);
    let mut engine = IngestionEngine::new(&mut store);
    if commit {
        let outcome = engine.commit(&document.tasks, &source, strict)?;
        Ok(IngestResult {
            committed: outcome.transaction.is_some(),
            source,
            plan: outcome.plan,
            transaction: outcome.transaction,
            stats: Some(outcome.stats),
        })
    } else {
        let plan = engine.plan(&document.tasks, strict)?;
        Ok(IngestResult {
            committed: false,
            source,
            plan,
            transaction: None,
            stats: None,
        })
    }
}

// === History ===

#[derive(Debug, Serialize)]
pub struct HistoryListResult {
    pub transactions: Vec<Transaction>,
    pub count: usize,
}

fn describe_transaction(tx: &Transaction) -> String {
    match tx.action {
        TransactionAction::Ingest => format!(
            "{} {} ingest +{} from {}",
            tx.id,
            tx.timestamp.format("%Y-%m-%d %H:%M"),
            tx.tasks_added.len(),
            tx.source
        ),
        TransactionAction::Delete => format!(
            "{} {} delete -{} reverts {}",
            tx.id,
            tx.timestamp.format("%Y-%m-%d %H:%M"),
            tx.tasks_removed.len(),
            tx.reverts.as_deref().unwrap_or("?")
        ),
    }
}

impl Output for HistoryListResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.transactions.is_empty() {
            return "No transactions recorded.".to_string();
        }
        self.transactions
            .iter()
            .map(describe_transaction)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn history_list(config: &ResolvedConfig, limit: usize) -> Result<HistoryListResult> {
    let mut store = open_store(config);
    let transactions = TransactionLog::new(&mut store).list(limit)?;
    Ok(HistoryListResult {
        count: transactions.len(),
        transactions,
    })
}

#[derive(Debug, Serialize)]
pub struct HistoryShowResult {
    #[serde(flatten)]
    pub detail: TransactionDetail,
}

impl Output for HistoryShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let d = &self.detail;
        let mut out = describe_transaction(&d.transaction);
        if let Some(by) = &d.reverted_by {
            let _ = write!(out, "\n  reverted by {}", by);
        }
        for t in &d.tasks {
            match (&t.title, t.status) {
                (Some(title), Some(status)) => {
                    let _ = write!(out, "\n  {} [{}] {}", t.id, status, title);
                }
                _ => {
                    let _ = write!(out, "\n  {} (removed)", t.id);
                }
            }
        }
        out
    }
}

pub fn history_show(config: &ResolvedConfig, tx_id: &str) -> Result<HistoryShowResult> {
    let mut store = open_store(config);
    let detail = TransactionLog::new(&mut store).detail(tx_id)?;
    Ok(HistoryShowResult { detail })
}

#[derive(Debug, Serialize)]
pub struct RollbackPreviewResult {
    pub dry_run: bool,
    #[serde(flatten)]
    pub preview: RollbackPreview,
}

impl Output for RollbackPreviewResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let p = &self.preview;
        let ids = |refs: &[crate::history::TaskRef]| {
            refs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>().join(", ")
        };
        let mut out = format!(
            "Rollback of {} would remove {} task(s)",
            p.transaction_id,
            p.tasks_to_remove.len()
        );
        if !p.tasks_to_remove.is_empty() {
            let _ = write!(out, ": {}", ids(&p.tasks_to_remove));
        }
        if p.is_blocked() {
            let _ = write!(
                out,
                "\n  blocked by dependents: {} (use --force to proceed)",
                ids(&p.blocking_dependents)
            );
        }
        for w in &p.in_progress_warnings {
            let _ = write!(out, "\n  warning: {}", w);
        }
        out
    }
}

pub fn history_rollback_preview(
    config: &ResolvedConfig,
    tx_id: &str,
) -> Result<RollbackPreviewResult> {
    let mut store = open_store(config);
    let preview = TransactionLog::new(&mut store).rollback_preview(tx_id)?;
    Ok(RollbackPreviewResult {
        dry_run: true,
        preview,
    })
}

#[derive(Debug, Serialize)]
pub struct RollbackResult {
    #[serde(flatten)]
    pub outcome: RollbackOutcome,
}

impl Output for RollbackResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let o = &self.outcome;
        let mut out = format!(
            "Rolled back {} as {}: removed {}",
            o.transaction.reverts.as_deref().unwrap_or("?"),
            o.transaction.id,
            if o.removed.is_empty() {
                "nothing".to_string()
            } else {
                o.removed.join(", ")
            }
        );
        if !o.dangling_references.is_empty() {
            let _ = write!(
                out,
                "\n  dangling references left in: {}",
                o.dangling_references.join(", ")
            );
        }
        for w in &o.warnings {
            let _ = write!(out, "\n  warning: {}", w);
        }
        out
    }
}

pub fn history_rollback(
    config: &ResolvedConfig,
    tx_id: &str,
    force: bool,
) -> Result<RollbackResult> {
    let mut store = open_store(config);
    let outcome = TransactionLog::new(&mut store).rollback(tx_id, force)?;
    Ok(RollbackResult { outcome })
}

// === Research cache ===

#[derive(Debug, Serialize)]
pub struct CacheSetResult {
    #[serde(flatten)]
    pub entry: CacheEntry,
}

impl Output for CacheSetResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Cached '{}' as {} (ttl {} min)",
            self.entry.query, self.entry.key, self.entry.ttl
        );
        if !self.entry.tags.is_empty() {
            let _ = write!(out, " tags: {}", self.entry.tags.join(", "));
        }
        out
    }
}

pub fn cache_set(
    config: &ResolvedConfig,
    query: &str,
    result: &str,
    tags: &[String],
    ttl: Option<u64>,
) -> Result<CacheSetResult> {
    let cache = open_cache(config);
    let entry = match ttl {
        Some(ttl) => cache.set_with_ttl(query, result, tags, ttl)?,
        None => cache.set(query, result, tags)?,
    };
    Ok(CacheSetResult { entry })
}

#[derive(Debug, Serialize)]
pub struct CacheGetResult {
    pub query: String,
    pub hit: bool,
    pub result: Option<String>,
}

impl Output for CacheGetResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.result {
            Some(result) => result.clone(),
            None => format!("No cached result for '{}'", self.query),
        }
    }
}

pub fn cache_get(config: &ResolvedConfig, query: &str) -> Result<CacheGetResult> {
    let result = open_cache(config).get(query)?;
    Ok(CacheGetResult {
        query: query.to_string(),
        hit: result.is_some(),
        result,
    })
}

#[derive(Debug, Serialize)]
pub struct CacheHasResult {
    pub query: String,
    pub exists: bool,
}

impl Output for CacheHasResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.exists {
            format!("Cached: '{}'", self.query)
        } else {
            format!("Not cached: '{}'", self.query)
        }
    }
}

pub fn cache_has(config: &ResolvedConfig, query: &str) -> Result<CacheHasResult> {
    Ok(CacheHasResult {
        query: query.to_string(),
        exists: open_cache(config).has(query)?,
    })
}

#[derive(Debug, Serialize)]
pub struct CacheSearchResult {
    pub tags: Vec<String>,
    pub entries: Vec<CacheEntry>,
    pub count: usize,
}

impl Output for CacheSearchResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No matching cache entries.".to_string();
        }
        let noun = if self.count == 1 { "entry" } else { "entries" };
        let mut out = format!("{} {}:", self.count, noun);
        for e in &self.entries {
            let _ = write!(out, "\n  {} '{}' [{}]", e.key, e.query, e.tags.join(", "));
        }
        out
    }
}

pub fn cache_search(config: &ResolvedConfig, tags: Vec<String>) -> Result<CacheSearchResult> {
    let entries = open_cache(config).search(&tags)?;
    Ok(CacheSearchResult {
        tags,
        count: entries.len(),
        entries,
    })
}

#[derive(Debug, Serialize)]
pub struct CacheClearResult {
    pub removed: usize,
    pub expired_only: bool,
}

impl Output for CacheClearResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let what = if self.expired_only { "expired " } else { "" };
        let noun = if self.removed == 1 { "entry" } else { "entries" };
        format!("Removed {} {}cache {}", self.removed, what, noun)
    }
}

pub fn cache_clear(config: &ResolvedConfig, expired_only: bool) -> Result<CacheClearResult> {
    let cache = open_cache(config);
    let removed = if expired_only {
        cache.clear_expired()?
    } else {
        cache.clear()?
    };
    Ok(CacheClearResult {
        removed,
        expired_only,
    })
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResult {
    pub dir: PathBuf,
    pub default_ttl: u64,
    #[serde(flatten)]
    pub stats: CacheStats,
}

impl Output for CacheStatsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Research cache at {}\n  entries: {}\n  size: {} bytes\n  default ttl: {} min",
            self.dir.display(),
            self.stats.entries_count,
            self.stats.total_size,
            self.default_ttl
        )
    }
}

/// Hit and miss counters only cover lookups made by this process.
pub fn cache_stats(config: &ResolvedConfig) -> Result<CacheStatsResult> {
    let cache = open_cache(config);
    Ok(CacheStatsResult {
        dir: cache.dir().to_path_buf(),
        default_ttl: cache.default_ttl(),
        stats: cache.stats()?,
    })
}

// === Config & doctor ===

#[derive(Debug, Serialize)]
pub struct SettingView {
    pub value: String,
    pub source: String,
}

impl SettingView {
    fn from_path(resolved: &Resolved<PathBuf>) -> Self {
        Self {
            value: resolved.value.display().to_string(),
            source: resolved.source.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigShowResult {
    pub root: PathBuf,
    pub manifest_path: SettingView,
    pub cache_dir: SettingView,
    pub cache_ttl: SettingView,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "root: {}\nmanifest-path: {} ({})\ncache-dir: {} ({})\ncache-ttl: {} ({})",
            self.root.display(),
            self.manifest_path.value,
            self.manifest_path.source,
            self.cache_dir.value,
            self.cache_dir.source,
            self.cache_ttl.value,
            self.cache_ttl.source
        )
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult {
        root: config.root.clone(),
        manifest_path: SettingView::from_path(&config.manifest_path),
        cache_dir: SettingView::from_path(&config.cache_dir),
        cache_ttl: SettingView {
            value: config.cache_ttl.value.to_string(),
            source: config.cache_ttl.source.to_string(),
        },
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub stats: Stats,
}

impl Output for DoctorResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.healthy {
            return format!("Manifest is healthy ({} task(s)).", self.stats.total_tasks);
        }
        let mut out = format!("{} issue(s) found:", self.issues.len());
        for issue in &self.issues {
            let _ = write!(out, "\n  - {}", issue);
        }
        out
    }
}

/// Consistency problems in a manifest that loaded successfully.
///
/// Duplicate ids never reach here: `ManifestStore::load` rejects them as
/// corruption.
pub fn check_integrity(manifest: &Manifest) -> Vec<String> {
    let mut issues = Vec::new();

    let actual = Stats::from_tasks(&manifest.tasks);
    if manifest.stats != actual {
        issues.push(format!(
            "stats out of date: recorded {:?}, actual {:?}",
            manifest.stats, actual
        ));
    }

    let graph = DependencyGraph::new(manifest);
    for task in graph.tasks() {
        for dep in &task.dependencies {
            if graph.task(dep).is_none() {
                issues.push(format!("{} depends on missing task {}", task.id, dep));
            }
        }
    }

    if let Some(path) = detect_cycle(&graph.edges()) {
        issues.push(format!("dependency cycle: {}", path.join(" -> ")));
    }

    let reverted: HashSet<&str> = manifest
        .history
        .iter()
        .filter_map(|tx| tx.reverts.as_deref())
        .collect();
    for tx in &manifest.history {
        if tx.action != TransactionAction::Ingest || reverted.contains(tx.id.as_str()) {
            continue;
        }
        for id in &tx.tasks_added {
            if manifest.task(id).is_none() {
                issues.push(format!("{} recorded {} but the task is missing", tx.id, id));
            }
        }
    }

    issues
}

pub fn doctor(config: &ResolvedConfig) -> Result<DoctorResult> {
    let manifest = open_store(config).load(true)?;
    let issues = check_integrity(&manifest);
    Ok(DoctorResult {
        healthy: issues.is_empty(),
        issues,
        stats: manifest.stats,
    })
}

/// Whether `path` is an existing directory usable as a project root.
pub fn validate_root(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "project root does not exist: {}",
            path.display()
        )))
    }
}
