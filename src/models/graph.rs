//! Graph algorithms for task dependency analysis.
//!
//! This module answers read-only questions about the dependency graph held in
//! a [`Manifest`]: which tasks are ready, which are blocked, which tasks
//! depend (transitively) on a given task, and whether a set of edges contains
//! a cycle.
//!
//! The graph stored in a manifest is assumed acyclic; cycle detection only
//! runs when edges are about to be added (ingestion) or on explicit request
//! (`tl doctor`).

use super::{Manifest, Task, TaskStatus, task_number};
use std::collections::{HashMap, HashSet, VecDeque};

/// Adjacency map from a task id to the ids it depends on.
pub type Edges = HashMap<String, Vec<String>>;

/// Ordering key for task ids: numeric suffix first, raw id as tie breaker.
pub fn id_sort_key(id: &str) -> (u32, &str) {
    (task_number(id).unwrap_or(u32::MAX), id)
}

/// Indexed, read-only view over the tasks of a manifest.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    /// Tasks by id
    by_id: HashMap<&'a str, &'a Task>,

    /// Tasks in ascending numeric-id order
    ordered: Vec<&'a Task>,

    /// Reverse edges: task id -> ids of tasks that list it as a dependency
    dependents: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the index for a manifest.
    pub fn new(manifest: &'a Manifest) -> Self {
        let mut ordered: Vec<&Task> = manifest.tasks.iter().collect();
        ordered.sort_by(|a, b| id_sort_key(&a.id).cmp(&id_sort_key(&b.id)));

        let mut by_id = HashMap::with_capacity(ordered.len());
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &ordered {
            by_id.insert(task.id.as_str(), *task);
            for dep in &task.dependencies {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(task.id.as_str());
            }
        }

        Self {
            by_id,
            ordered,
            dependents,
        }
    }

    /// Look up a task by id.
    pub fn task(&self, id: &str) -> Option<&'a Task> {
        self.by_id.get(id).copied()
    }

    /// All tasks in ascending numeric-id order.
    pub fn tasks(&self) -> &[&'a Task] {
        &self.ordered
    }

    /// Whether `id` resolves to a completed task. Unknown ids are not completed.
    pub fn is_completed(&self, id: &str) -> bool {
        self.task(id)
            .is_some_and(|t| t.status == TaskStatus::Completed)
    }

    /// Direct dependencies of a task, each paired with the task it resolves to.
    pub fn dependencies_of(&self, task: &'a Task) -> Vec<(&'a str, Option<&'a Task>)> {
        task.dependencies
            .iter()
            .map(|dep| (dep.as_str(), self.task(dep)))
            .collect()
    }

    /// Pending tasks whose every dependency is completed.
    pub fn ready_tasks(&self) -> Vec<&'a Task> {
        self.ordered
            .iter()
            .copied()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| t.dependencies.iter().all(|dep| self.is_completed(dep)))
            .collect()
    }

    /// Pending tasks waiting on at least one dependency, plus tasks explicitly
    /// marked blocked.
    pub fn blocked_tasks(&self) -> Vec<&'a Task> {
        self.ordered
            .iter()
            .copied()
            .filter(|t| match t.status {
                TaskStatus::Pending => t.dependencies.iter().any(|dep| !self.is_completed(dep)),
                TaskStatus::Blocked => true,
                _ => false,
            })
            .collect()
    }

    /// Incomplete dependencies of a task (unknown ids included).
    pub fn open_dependencies(&self, task: &Task) -> Vec<String> {
        task.dependencies
            .iter()
            .filter(|dep| !self.is_completed(dep))
            .cloned()
            .collect()
    }

    /// Every task whose dependency closure includes `id`, excluding `id`.
    pub fn transitive_dependents(&self, id: &str) -> Vec<&'a Task> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.dependents.get(current) {
                for &child in children {
                    if child != id && seen.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
        }

        let mut result: Vec<&Task> = seen.into_iter().filter_map(|d| self.task(d)).collect();
        result.sort_by(|a, b| id_sort_key(&a.id).cmp(&id_sort_key(&b.id)));
        result
    }

    /// Adjacency map of the whole graph.
    pub fn edges(&self) -> Edges {
        self.ordered
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Find a cycle in `edges` with an iterative depth-first search.
///
/// Returns the offending path with its first node repeated at the end
/// (`[A, B, A]` means A depends on B which depends on A). Edges pointing at
/// ids absent from the map are ignored.
pub fn detect_cycle(edges: &Edges) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(edges.len());

    let mut roots: Vec<&str> = edges.keys().map(String::as_str).collect();
    roots.sort_by_key(|id| id_sort_key(id));

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }

        // Each frame is (node, index of the next dependency to visit)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Visiting);

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let children = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);

            if frame.1 >= children.len() {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            }

            let child = children[frame.1].as_str();
            frame.1 += 1;

            if !edges.contains_key(child) {
                continue;
            }

            match marks.get(child) {
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                    path.push(child.to_string());
                    return Some(path);
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Visiting);
                    stack.push((child, 0));
                }
            }
        }
    }

    None
}
