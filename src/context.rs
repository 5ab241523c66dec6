//! Bounded task context for code-generation agents.
//!
//! An agent working on one task needs that task in full and only a glimpse
//! of its neighbours. [`ContextBuilder`] renders the task itself plus the
//! title and status of each direct dependency; it never walks further up the
//! graph and never renders a dependency's criteria or description. Size is
//! controlled by leaving sections out, not by cutting text.

use crate::models::graph::{DependencyGraph, id_sort_key};
use crate::models::{Manifest, Task, TaskStatus};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write;

/// Placeholder for a dependency id that no longer resolves.
const UNKNOWN: &str = "unknown";

/// Renders context documents for single tasks.
pub struct ContextBuilder<'a> {
    graph: DependencyGraph<'a>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self {
            graph: DependencyGraph::new(manifest),
        }
    }

    fn find(&self, id: &str) -> Result<&'a Task> {
        self.graph
            .task(id)
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }

    /// Markdown context: the full task plus one line per direct dependency.
    pub fn minimal(&self, id: &str) -> Result<String> {
        let task = self.find(id)?;
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "# {}: {}", task.id, task.title);
        let _ = writeln!(
            out,
            "Status: {} | Risk: {} | Test strategy: {} | Estimate: {}h",
            task.status,
            task.risk,
            task.test_strategy,
            format_hours(task.estimated_hours)
        );

        let _ = write!(out, "\n## Description\n{}\n", task.description.trim());

        if !task.acceptance_criteria.is_empty() {
            out.push_str("\n## Acceptance Criteria\n");
            for (i, criterion) in task.acceptance_criteria.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, criterion);
            }
        }

        if !task.files.is_empty() {
            out.push_str("\n## Files\n");
            for (label, paths) in [
                ("Create", &task.files.create),
                ("Modify", &task.files.modify),
                ("Delete", &task.files.delete),
            ] {
                if !paths.is_empty() {
                    let _ = writeln!(out, "- {}: {}", label, paths.join(", "));
                }
            }
        }

        if let Some(ctx) = &task.context {
            out.push_str("\n## Source\n");
            if ctx.lines.is_empty() {
                let _ = writeln!(out, "{}", ctx.source);
            } else {
                let ranges: Vec<String> = ctx
                    .lines
                    .iter()
                    .map(|r| format!("{}-{}", r.start, r.end))
                    .collect();
                let _ = writeln!(out, "{} (lines {})", ctx.source, ranges.join(", "));
            }
        }

        if !task.dependencies.is_empty() {
            out.push_str("\n## Dependencies\n");
            for (dep_id, dep) in self.graph.dependencies_of(task) {
                match dep {
                    Some(dep) => {
                        let _ = writeln!(out, "- {}: {} [{}]", dep.id, dep.title, dep.status);
                    }
                    None => {
                        let _ = writeln!(out, "- {}: {} [{}]", dep_id, UNKNOWN, UNKNOWN);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Single-paragraph context for low-risk or `Direct` tasks.
    ///
    /// Keeps the first sentence of the description and only the number of
    /// acceptance criteria.
    pub fn compact(&self, id: &str) -> Result<String> {
        let task = self.find(id)?;
        let mut out = format!(
            "{} {} ({}, {}, {} risk, {}h). {}",
            task.id,
            task.title,
            task.status,
            task.test_strategy,
            task.risk,
            format_hours(task.estimated_hours),
            first_sentence(&task.description)
        );

        let n = task.acceptance_criteria.len();
        let _ = write!(
            out,
            " {} acceptance criteri{}.",
            n,
            if n == 1 { "on" } else { "a" }
        );

        let mut touched = Vec::new();
        for (verb, paths) in [
            ("create", &task.files.create),
            ("modify", &task.files.modify),
            ("delete", &task.files.delete),
        ] {
            if !paths.is_empty() {
                touched.push(format!("{} {}", verb, paths.join(", ")));
            }
        }
        if !touched.is_empty() {
            let _ = write!(out, " Files: {}.", touched.join("; "));
        }

        if !task.dependencies.is_empty() {
            let deps: Vec<String> = self
                .graph
                .dependencies_of(task)
                .into_iter()
                .map(|(dep_id, dep)| match dep {
                    Some(dep) => format!("{} ({})", dep.id, dep.status),
                    None => format!("{} ({})", dep_id, UNKNOWN),
                })
                .collect();
            let _ = write!(out, " Depends on: {}.", deps.join(", "));
        }

        Ok(out)
    }
}

/// Lightweight listing entry used by planners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub dependencies: Vec<String>,
}

/// List tasks without descriptions, criteria or files.
///
/// With `incomplete_only`, only pending and in-progress tasks are listed,
/// so the listing shrinks as the project completes.
pub fn build_summary(manifest: &Manifest, incomplete_only: bool) -> Vec<TaskSummary> {
    let mut tasks: Vec<&Task> = manifest
        .tasks
        .iter()
        .filter(|t| {
            !incomplete_only || matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress)
        })
        .collect();
    tasks.sort_by(|a, b| id_sort_key(&a.id).cmp(&id_sort_key(&b.id)));

    tasks
        .into_iter()
        .map(|t| TaskSummary {
            id: t.id.clone(),
            title: t.title.clone(),
            status: t.status,
            dependencies: t.dependencies.clone(),
        })
        .collect()
}

fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as u64)
    } else {
        format!("{}", hours)
    }
}

/// Text up to and including the first sentence terminator followed by
/// whitespace, or the whole first line when there is none.
fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let line = text.lines().next().unwrap_or("");
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?')
            && bytes.get(i + 1).is_none_or(|next| next.is_ascii_whitespace())
        {
            return &line[..=i];
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{manifest, task};
    use crate::models::{FileChanges, LineRange, TaskContext, TestStrategy};

    fn rich_manifest() -> Manifest {
        let mut dep1 = task("TASK-001", TaskStatus::Completed, &[]);
        dep1.acceptance_criteria = vec!["SECRET dependency criterion".to_string()];
        dep1.description = "Dependency description that must stay hidden.".to_string();
        let dep2 = task("TASK-002", TaskStatus::InProgress, &[]);
        let dep3 = task("TASK-003", TaskStatus::Pending, &["TASK-001"]);

        let mut main = task("TASK-004", TaskStatus::Pending, &["TASK-001", "TASK-002", "TASK-003"]);
        main.title = "Add login endpoint".to_string();
        main.description =
            "Expose POST /login. Validate credentials against the user store.".to_string();
        main.acceptance_criteria = vec![
            "Returns 200 with a token".to_string(),
            "Returns 401 on bad password".to_string(),
        ];
        main.test_strategy = TestStrategy::Tdd;
        main.estimated_hours = 3.5;
        main.files = FileChanges {
            create: vec!["src/login.rs".to_string()],
            modify: vec!["src/routes.rs".to_string()],
            delete: Vec::new(),
        };
        main.context = Some(TaskContext {
            source: "docs/prd.md".to_string(),
            lines: vec![LineRange { start: 10, end: 24 }],
        });

        manifest(vec![dep1, dep2, dep3, main])
    }

    #[test]
    fn test_minimal_renders_task_and_dependency_headlines() {
        let m = rich_manifest();
        let text = ContextBuilder::new(&m).minimal("TASK-004").unwrap();

        assert!(text.starts_with("# TASK-004: Add login endpoint\n"));
        assert!(text.contains("Test strategy: TDD"));
        assert!(text.contains("Estimate: 3.5h"));
        assert!(text.contains("1. Returns 200 with a token"));
        assert!(text.contains("2. Returns 401 on bad password"));
        assert!(text.contains("- Create: src/login.rs"));
        assert!(text.contains("- Modify: src/routes.rs"));
        assert!(!text.contains("Delete:"));
        assert!(text.contains("docs/prd.md (lines 10-24)"));
        assert!(text.contains("- TASK-001: Title of TASK-001 [completed]"));
        assert!(text.contains("- TASK-002: Title of TASK-002 [in-progress]"));
        assert!(text.contains("- TASK-003: Title of TASK-003 [pending]"));
    }

    #[test]
    fn test_minimal_never_renders_dependency_details() {
        let m = rich_manifest();
        let text = ContextBuilder::new(&m).minimal("TASK-004").unwrap();
        assert!(!text.contains("SECRET dependency criterion"));
        assert!(!text.contains("must stay hidden"));
    }

    #[test]
    fn test_minimal_is_one_level_deep() {
        let m = rich_manifest();
        let text = ContextBuilder::new(&m).minimal("TASK-003").unwrap();
        assert!(text.contains("- TASK-001:"));
        assert!(!text.contains("TASK-002"));
    }

    #[test]
    fn test_minimal_omits_empty_sections() {
        let m = manifest(vec![task("TASK-001", TaskStatus::Pending, &[])]);
        let text = ContextBuilder::new(&m).minimal("TASK-001").unwrap();
        assert!(!text.contains("## Files"));
        assert!(!text.contains("## Dependencies"));
        assert!(!text.contains("## Source"));
    }

    #[test]
    fn test_dangling_dependency_renders_unknown() {
        let m = manifest(vec![task("TASK-002", TaskStatus::Pending, &["TASK-001"])]);
        let builder = ContextBuilder::new(&m);
        let text = builder.minimal("TASK-002").unwrap();
        assert!(text.contains("- TASK-001: unknown [unknown]"));
        let compact = builder.compact("TASK-002").unwrap();
        assert!(compact.contains("TASK-001 (unknown)"));
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let m = manifest(vec![]);
        let builder = ContextBuilder::new(&m);
        assert!(matches!(builder.minimal("TASK-009"), Err(Error::NotFound(_))));
        assert!(matches!(builder.compact("TASK-009"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_compact_is_single_paragraph_without_criteria() {
        let m = rich_manifest();
        let builder = ContextBuilder::new(&m);
        let compact = builder.compact("TASK-004").unwrap();
        let minimal = builder.minimal("TASK-004").unwrap();

        assert!(!compact.contains('\n'));
        assert!(compact.starts_with("TASK-004 Add login endpoint (pending, TDD, low risk, 3.5h)."));
        assert!(compact.contains("Expose POST /login."));
        assert!(!compact.contains("Validate credentials"));
        assert!(compact.contains("2 acceptance criteria."));
        assert!(!compact.contains("Returns 401"));
        assert!(compact.contains("Files: create src/login.rs; modify src/routes.rs."));
        assert!(compact.contains("Depends on: TASK-001 (completed), TASK-002 (in-progress)"));
        assert!(compact.len() < minimal.len());
    }

    #[test]
    fn test_summary_all_and_incomplete() {
        let m = manifest(vec![
            task("TASK-002", TaskStatus::Completed, &[]),
            task("TASK-001", TaskStatus::Pending, &[]),
            task("TASK-003", TaskStatus::InProgress, &["TASK-002"]),
            task("TASK-004", TaskStatus::Blocked, &[]),
        ]);

        let all = build_summary(&m, false);
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["TASK-001", "TASK-002", "TASK-003", "TASK-004"]);

        let open = build_summary(&m, true);
        let ids: Vec<&str> = open.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["TASK-001", "TASK-003"]);
        assert_eq!(open[1].dependencies, vec!["TASK-002"]);
    }

    #[test]
    fn test_summary_json_has_no_heavy_fields() {
        let m = manifest(vec![task("TASK-001", TaskStatus::Pending, &[])]);
        let json = serde_json::to_value(build_summary(&m, false)).unwrap();
        let entry = json[0].as_object().unwrap();
        let mut keys: Vec<&str> = entry.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["dependencies", "id", "status", "title"]);
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("One. Two."), "One.");
        assert_eq!(first_sentence("Version 1.2 ships! Later."), "Version 1.2 ships!");
        assert_eq!(first_sentence("No terminator"), "No terminator");
        assert_eq!(first_sentence("Line one\nLine two."), "Line one");
    }
}
