//! Transaction history and rollback.
//!
//! Every successful ingestion appends an `ingest` transaction to the
//! manifest history. Rolling one back removes the tasks it created and
//! appends a `delete` transaction pointing at it; earlier entries are never
//! edited or removed.

use crate::models::graph::DependencyGraph;
use crate::models::{Manifest, Stats, TaskStatus, Transaction, TransactionAction};
use crate::storage::ManifestStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Default number of transactions returned by [`TransactionLog::list`].
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Highest per-day sequence number. Three digits keep ids sorting as strings.
pub const MAX_DAILY_TRANSACTIONS: u32 = 999;

/// Build the next transaction id for `now`: `TX-YYYYMMDD-NNN`, where `NNN`
/// continues the highest sequence already used on that date.
///
/// Fails once the day's sequence passes [`MAX_DAILY_TRANSACTIONS`].
pub fn next_transaction_id(history: &[Transaction], now: DateTime<Utc>) -> Result<String> {
    let date = now.format("%Y%m%d");
    let prefix = format!("TX-{}-", date);
    let next = history
        .iter()
        .filter_map(|tx| tx.id.strip_prefix(&prefix))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .map_or(1, |max| max.saturating_add(1));
    if next > MAX_DAILY_TRANSACTIONS {
        return Err(Error::InvalidInput(format!(
            "transaction limit of {} per day reached for {}",
            MAX_DAILY_TRANSACTIONS, date
        )));
    }
    Ok(format!("{}{:03}", prefix, next))
}

/// Current view of a task referenced by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub id: String,
    /// None when the task no longer exists
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskRef {
    fn resolve(manifest: &Manifest, id: &str) -> Self {
        let task = manifest.task(id);
        Self {
            id: id.to_string(),
            title: task.map(|t| t.title.clone()),
            status: task.map(|t| t.status),
        }
    }
}

/// A transaction together with the current state of its tasks.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub tasks: Vec<TaskRef>,
    /// Delete transaction that reverted this one, if any
    pub reverted_by: Option<String>,
}

/// What a rollback would change.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackPreview {
    pub transaction_id: String,
    pub tasks_to_remove: Vec<TaskRef>,
    /// Tasks outside the transaction that depend on it, directly or transitively
    pub blocking_dependents: Vec<TaskRef>,
    pub in_progress_warnings: Vec<String>,
}

impl RollbackPreview {
    pub fn is_blocked(&self) -> bool {
        !self.blocking_dependents.is_empty()
    }
}

/// Result of a completed rollback.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutcome {
    /// The appended delete transaction
    pub transaction: Transaction,
    pub removed: Vec<String>,
    /// Remaining tasks whose dependency lists now name removed tasks
    pub dangling_references: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: Stats,
}

/// Compute the rollback preview for `tx_id` against a manifest.
pub fn preview_rollback(manifest: &Manifest, tx_id: &str) -> Result<RollbackPreview> {
    let tx = manifest
        .transaction(tx_id)
        .ok_or_else(|| Error::NotFound(format!("transaction {}", tx_id)))?;

    if tx.action == TransactionAction::Delete {
        return Err(Error::InvalidInput(format!(
            "{} is a delete transaction and cannot be rolled back",
            tx_id
        )));
    }
    if let Some(by) = reverted_by(manifest, tx_id) {
        return Err(Error::InvalidInput(format!(
            "{} was already rolled back by {}",
            tx_id, by
        )));
    }

    let graph = DependencyGraph::new(manifest);
    let in_tx: HashSet<&str> = tx.tasks_added.iter().map(String::as_str).collect();

    let mut tasks_to_remove = Vec::new();
    let mut in_progress_warnings = Vec::new();
    let mut blocking: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for id in &tx.tasks_added {
        let Some(task) = graph.task(id) else {
            continue;
        };
        tasks_to_remove.push(TaskRef::resolve(manifest, id));
        match task.status {
            TaskStatus::InProgress => in_progress_warnings
                .push(format!("{} is in progress and will be removed", task.id)),
            TaskStatus::Completed => in_progress_warnings
                .push(format!("{} is already completed and will be removed", task.id)),
            _ => {}
        }
        for dependent in graph.transitive_dependents(id) {
            let dep_id = dependent.id.as_str();
            if !in_tx.contains(dep_id) && seen.insert(dep_id) {
                blocking.push(dep_id);
            }
        }
    }

    blocking.sort_by_key(|id| crate::models::graph::id_sort_key(id));
    let blocking_dependents = blocking
        .into_iter()
        .map(|id| TaskRef::resolve(manifest, id))
        .collect();

    Ok(RollbackPreview {
        transaction_id: tx.id.clone(),
        tasks_to_remove,
        blocking_dependents,
        in_progress_warnings,
    })
}

fn reverted_by<'m>(manifest: &'m Manifest, tx_id: &str) -> Option<&'m str> {
    manifest
        .history
        .iter()
        .find(|t| t.action == TransactionAction::Delete && t.reverts.as_deref() == Some(tx_id))
        .map(|t| t.id.as_str())
}

/// Read access to the history plus dependency-aware rollback.
pub struct TransactionLog<'a> {
    store: &'a mut ManifestStore,
}

impl<'a> TransactionLog<'a> {
    pub fn new(store: &'a mut ManifestStore) -> Self {
        Self { store }
    }

    /// The most recent `limit` transactions, newest first.
    pub fn list(&mut self, limit: usize) -> Result<Vec<Transaction>> {
        let manifest = self.store.load(false)?;
        Ok(manifest.history.iter().rev().take(limit).cloned().collect())
    }

    /// A transaction with the current title and status of each of its tasks.
    pub fn detail(&mut self, tx_id: &str) -> Result<TransactionDetail> {
        let manifest = self.store.load(false)?;
        let tx = manifest
            .transaction(tx_id)
            .ok_or_else(|| Error::NotFound(format!("transaction {}", tx_id)))?;

        let ids = match tx.action {
            TransactionAction::Ingest => &tx.tasks_added,
            TransactionAction::Delete => &tx.tasks_removed,
        };
        Ok(TransactionDetail {
            tasks: ids.iter().map(|id| TaskRef::resolve(&manifest, id)).collect(),
            reverted_by: reverted_by(&manifest, tx_id).map(str::to_string),
            transaction: tx.clone(),
        })
    }

    /// Side-effect-free description of what `rollback` would do.
    pub fn rollback_preview(&mut self, tx_id: &str) -> Result<RollbackPreview> {
        let manifest = self.store.load(true)?;
        preview_rollback(&manifest, tx_id)
    }

    /// Remove the tasks created by `tx_id` and append a delete transaction.
    ///
    /// Refuses when other tasks depend on the batch unless `force` is set;
    /// forced removals leave those dependents with dangling references.
    pub fn rollback(&mut self, tx_id: &str, force: bool) -> Result<RollbackOutcome> {
        let mut manifest = self.store.load(true)?;
        let preview = preview_rollback(&manifest, tx_id)?;

        if preview.is_blocked() && !force {
            return Err(Error::RollbackBlocked {
                transaction: tx_id.to_string(),
                dependents: preview
                    .blocking_dependents
                    .iter()
                    .map(|t| t.id.clone())
                    .collect(),
            });
        }

        let removed: Vec<String> = preview.tasks_to_remove.iter().map(|t| t.id.clone()).collect();
        let removed_set: HashSet<&str> = removed.iter().map(String::as_str).collect();
        manifest
            .tasks
            .retain(|t| !removed_set.contains(t.id.as_str()));
        manifest.recompute_stats();

        let dangling_references: Vec<String> = manifest
            .tasks
            .iter()
            .filter(|t| t.dependencies.iter().any(|d| removed_set.contains(d.as_str())))
            .map(|t| t.id.clone())
            .collect();

        let now = Utc::now();
        let transaction = Transaction {
            id: next_transaction_id(&manifest.history, now)?,
            action: TransactionAction::Delete,
            timestamp: now,
            source: format!("rollback:{}", tx_id),
            tasks_added: Vec::new(),
            tasks_removed: removed.clone(),
            reverts: Some(tx_id.to_string()),
        };
        manifest.history.push(transaction.clone());
        self.store.write(&manifest)?;

        if !dangling_references.is_empty() {
            warn!(
                transaction = tx_id,
                dependents = ?dangling_references,
                "forced rollback left dangling dependency references"
            );
        }
        info!(
            transaction = tx_id,
            delete = %transaction.id,
            removed = removed.len(),
            "rolled back transaction"
        );

        Ok(RollbackOutcome {
            transaction,
            removed,
            dangling_references,
            warnings: preview.in_progress_warnings,
            stats: manifest.stats,
        })
    }
}
