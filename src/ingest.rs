//! Batch ingestion of proposed tasks.
//!
//! A planner proposes an ordered batch of tasks without ids. Each proposed
//! dependency is either a zero-based index into the same batch or the id of
//! a task that already exists. Ingestion validates the whole batch, assigns
//! ids, resolves references, rejects cycles and only then performs a single
//! atomic write, so a batch is merged completely or not at all.

use crate::history::next_transaction_id;
use crate::models::graph::{DependencyGraph, detect_cycle};
use crate::models::{
    FileChanges, Manifest, Risk, Stats, Task, TaskContext, TaskStatus, TestStrategy, Transaction,
    TransactionAction, Validation, format_task_id, task_number,
};
use crate::storage::ManifestStore;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Dependency reference inside a proposed batch.
///
/// In JSON an index is a non-negative integer and a literal is a task id string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyRef {
    /// Zero-based position of another task in the same batch
    Index(usize),
    /// Id of a task already in the manifest
    Literal(String),
}

/// A task as proposed by a planner, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTask {
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    pub test_strategy: TestStrategy,
    pub risk: Risk,
    pub estimated_hours: f64,
    #[serde(default)]
    pub files: FileChanges,
    #[serde(default)]
    pub context: Option<TaskContext>,
}

/// A batch file: its optional source label and the raw proposed tasks.
#[derive(Debug, Clone, Default)]
pub struct BatchDocument {
    pub source: Option<String>,
    pub tasks: Vec<Value>,
}

/// Parse a batch document: either a bare array of tasks or
/// `{"source": "...", "tasks": [...]}`.
pub fn parse_batch_document(input: &str) -> Result<BatchDocument> {
    let value: Value = serde_json::from_str(input)?;
    match value {
        Value::Array(tasks) => Ok(BatchDocument { source: None, tasks }),
        Value::Object(mut obj) => {
            let source = obj
                .get("source")
                .and_then(Value::as_str)
                .map(str::to_string);
            match obj.remove("tasks") {
                Some(Value::Array(tasks)) => Ok(BatchDocument { source, tasks }),
                _ => Err(Error::Validation {
                    violations: vec!["batch: object must contain a 'tasks' array".to_string()],
                }),
            }
        }
        _ => Err(Error::Validation {
            violations: vec![
                "batch: expected an array of tasks or an object with a 'tasks' array".to_string(),
            ],
        }),
    }
}

/// Check every proposed task and return all violations found.
pub fn validate_batch(tasks: &[Value]) -> Vec<String> {
    let mut violations = Vec::new();
    for (i, value) in tasks.iter().enumerate() {
        let at = format!("tasks[{}]", i);
        match value.as_object() {
            Some(obj) => validate_task(&at, obj, &mut violations),
            None => violations.push(format!("{}: expected an object", at)),
        }
    }
    violations
}

fn validate_task(at: &str, obj: &Map<String, Value>, violations: &mut Vec<String>) {
    if obj.contains_key("id") {
        violations.push(format!("{}.id: ids are assigned during ingestion", at));
    }

    require_text(at, obj, "title", violations);
    require_text(at, obj, "description", violations);

    match obj.get("acceptance_criteria") {
        None => violations.push(format!("{}.acceptance_criteria: required", at)),
        Some(Value::Array(items)) if items.is_empty() => violations.push(format!(
            "{}.acceptance_criteria: at least one criterion is required",
            at
        )),
        Some(Value::Array(items)) => {
            for (j, item) in items.iter().enumerate() {
                if !item.as_str().is_some_and(|s| !s.trim().is_empty()) {
                    violations.push(format!(
                        "{}.acceptance_criteria[{}]: expected a non-empty string",
                        at, j
                    ));
                }
            }
        }
        Some(_) => violations.push(format!("{}.acceptance_criteria: expected an array", at)),
    }

    match obj.get("dependencies") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (j, item) in items.iter().enumerate() {
                let ok = match item {
                    Value::Number(n) => n.as_u64().is_some(),
                    Value::String(s) => task_number(s).is_some(),
                    _ => false,
                };
                if !ok {
                    violations.push(format!(
                        "{}.dependencies[{}]: expected a batch index or a task id, got {}",
                        at, j, item
                    ));
                }
            }
        }
        Some(_) => violations.push(format!("{}.dependencies: expected an array", at)),
    }

    require_choice(at, obj, "test_strategy", &TestStrategy::ALL, violations);
    require_choice(at, obj, "risk", &Risk::ALL, violations);

    match obj.get("estimated_hours") {
        None => violations.push(format!("{}.estimated_hours: required", at)),
        Some(v) => match v.as_f64() {
            Some(h) if h.is_finite() && h > 0.0 => {}
            _ => violations.push(format!(
                "{}.estimated_hours: expected a number greater than 0",
                at
            )),
        },
    }

    match obj.get("files") {
        None | Some(Value::Null) => {}
        Some(Value::Object(files)) => {
            for key in ["create", "modify", "delete"] {
                match files.get(key) {
                    None => {}
                    Some(Value::Array(paths)) if paths.iter().all(Value::is_string) => {}
                    Some(_) => violations.push(format!(
                        "{}.files.{}: expected an array of paths",
                        at, key
                    )),
                }
            }
        }
        Some(_) => violations.push(format!("{}.files: expected an object", at)),
    }

    match obj.get("context") {
        None | Some(Value::Null) => {}
        Some(Value::Object(ctx)) => {
            if !ctx.get("source").is_some_and(Value::is_string) {
                violations.push(format!("{}.context.source: expected a string", at));
            }
            if let Some(lines) = ctx.get("lines") {
                let valid = lines.as_array().is_some_and(|ranges| {
                    ranges.iter().all(|r| {
                        let start = r.get("start").and_then(Value::as_u64);
                        let end = r.get("end").and_then(Value::as_u64);
                        matches!((start, end), (Some(s), Some(e)) if s <= e && e <= u32::MAX as u64)
                    })
                });
                if !valid {
                    violations.push(format!(
                        "{}.context.lines: expected ranges of {{start, end}} with start <= end",
                        at
                    ));
                }
            }
        }
        Some(_) => violations.push(format!("{}.context: expected an object", at)),
    }
}

fn require_text(at: &str, obj: &Map<String, Value>, field: &str, violations: &mut Vec<String>) {
    match obj.get(field) {
        None => violations.push(format!("{}.{}: required", at, field)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            violations.push(format!("{}.{}: must not be empty", at, field))
        }
        Some(Value::String(_)) => {}
        Some(_) => violations.push(format!("{}.{}: expected a string", at, field)),
    }
}

fn require_choice(
    at: &str,
    obj: &Map<String, Value>,
    field: &str,
    allowed: &[&str],
    violations: &mut Vec<String>,
) {
    match obj.get(field).map(Value::as_str) {
        None => violations.push(format!("{}.{}: required", at, field)),
        Some(Some(v)) if allowed.contains(&v) => {}
        Some(_) => violations.push(format!(
            "{}.{}: expected one of {}",
            at,
            field,
            allowed.join(", ")
        )),
    }
}

/// Preview line for one task of a planned batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTask {
    pub id: String,
    pub title: String,
    pub dependencies: Vec<String>,
}

/// Result of planning a batch: the tasks that would be appended.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestPlan {
    pub planned: Vec<PlannedTask>,
    /// Non-fatal notes, e.g. dependencies on tasks that are not completed yet
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub tasks: Vec<Task>,
}

impl IngestPlan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Result of committing a batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    #[serde(flatten)]
    pub plan: IngestPlan,
    /// None when the batch was empty and nothing was written
    pub transaction: Option<Transaction>,
    pub stats: Stats,
}

/// Fresh ids for `count` new tasks, continuing after the highest ever used.
fn allocate_ids(manifest: &Manifest, count: usize) -> Result<Vec<String>> {
    let exhausted = || Error::Validation {
        violations: vec![format!("no task ids left to assign {} new task(s)", count)],
    };
    let first = manifest.next_task_number().ok_or_else(exhausted)?;
    (0..count)
        .map(|offset| {
            u32::try_from(offset)
                .ok()
                .and_then(|offset| first.checked_add(offset))
                .map(format_task_id)
                .ok_or_else(exhausted)
        })
        .collect()
}

/// Plan a batch against a manifest without touching storage.
///
/// Runs validation, id assignment, dependency resolution, cycle detection and
/// the readiness warnings. `strict` turns warnings into a validation error.
pub fn plan_batch(manifest: &Manifest, batch: &[Value], strict: bool) -> Result<IngestPlan> {
    let violations = validate_batch(batch);
    if !violations.is_empty() {
        return Err(Error::Validation { violations });
    }

    let proposed = batch
        .iter()
        .map(|v| serde_json::from_value::<ProposedTask>(v.clone()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Validation {
            violations: vec![e.to_string()],
        })?;

    if proposed.is_empty() {
        return Ok(IngestPlan::default());
    }

    let ids = allocate_ids(manifest, proposed.len())?;

    let mut tasks = Vec::with_capacity(proposed.len());
    for (i, p) in proposed.into_iter().enumerate() {
        let dependencies = resolve_dependencies(manifest, &ids, i, &p.dependencies)?;
        tasks.push(Task {
            id: ids[i].clone(),
            title: p.title,
            description: p.description,
            acceptance_criteria: p.acceptance_criteria,
            dependencies,
            test_strategy: p.test_strategy,
            risk: p.risk,
            estimated_hours: p.estimated_hours,
            files: p.files,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            commits: Vec::new(),
            validation: Validation::default(),
            context: p.context,
        });
    }

    let graph = DependencyGraph::new(manifest);
    let mut edges = graph.edges();
    for task in &tasks {
        edges.insert(task.id.clone(), task.dependencies.clone());
    }
    if let Some(path) = detect_cycle(&edges) {
        return Err(Error::Cycle { path });
    }

    let mut warnings = Vec::new();
    for task in &tasks {
        for dep in &task.dependencies {
            if let Some(existing) = graph.task(dep) {
                if existing.status != TaskStatus::Completed {
                    warnings.push(format!(
                        "{} depends on {} which is {}; it stays blocked until that completes",
                        task.id, existing.id, existing.status
                    ));
                }
            }
        }
    }

    if strict && !warnings.is_empty() {
        return Err(Error::Validation {
            violations: warnings,
        });
    }

    let planned = tasks
        .iter()
        .map(|t| PlannedTask {
            id: t.id.clone(),
            title: t.title.clone(),
            dependencies: t.dependencies.clone(),
        })
        .collect();

    Ok(IngestPlan {
        planned,
        warnings,
        tasks,
    })
}

fn resolve_dependencies(
    manifest: &Manifest,
    ids: &[String],
    position: usize,
    refs: &[DependencyRef],
) -> Result<Vec<String>> {
    let mut resolved: Vec<String> = Vec::with_capacity(refs.len());
    for r in refs {
        let id = match r {
            DependencyRef::Index(n) => ids.get(*n).cloned().ok_or_else(|| Error::Dependency {
                task: ids[position].clone(),
                reference: format!("index {}", n),
            })?,
            DependencyRef::Literal(id) => {
                if manifest.task(id).is_none() {
                    return Err(Error::Dependency {
                        task: ids[position].clone(),
                        reference: id.clone(),
                    });
                }
                id.clone()
            }
        };
        if !resolved.contains(&id) {
            resolved.push(id);
        }
    }
    Ok(resolved)
}

/// Validates and merges proposed batches into the manifest.
pub struct IngestionEngine<'a> {
    store: &'a mut ManifestStore,
}

impl<'a> IngestionEngine<'a> {
    pub fn new(store: &'a mut ManifestStore) -> Self {
        Self { store }
    }

    /// Dry run: everything except the write. Never touches disk or history.
    pub fn plan(&mut self, batch: &[Value], strict: bool) -> Result<IngestPlan> {
        let manifest = self.store.load(true)?;
        plan_batch(&manifest, batch, strict)
    }

    /// Merge the batch and record an `ingest` transaction in one atomic write.
    pub fn commit(&mut self, batch: &[Value], source: &str, strict: bool) -> Result<IngestOutcome> {
        let mut manifest = self.store.load(true)?;
        let plan = plan_batch(&manifest, batch, strict)?;

        if plan.is_empty() {
            return Ok(IngestOutcome {
                plan,
                transaction: None,
                stats: manifest.stats,
            });
        }

        let now = Utc::now();
        let transaction = Transaction {
            id: next_transaction_id(&manifest.history, now)?,
            action: TransactionAction::Ingest,
            timestamp: now,
            source: source.to_string(),
            tasks_added: plan.tasks.iter().map(|t| t.id.clone()).collect(),
            tasks_removed: Vec::new(),
            reverts: None,
        };

        manifest.tasks.extend(plan.tasks.iter().cloned());
        manifest.recompute_stats();
        manifest.history.push(transaction.clone());
        self.store.write(&manifest)?;

        info!(
            transaction = %transaction.id,
            source,
            added = transaction.tasks_added.len(),
            "ingested batch"
        );
        Ok(IngestOutcome {
            plan,
            transaction: Some(transaction),
            stats: manifest.stats,
        })
    }
}
