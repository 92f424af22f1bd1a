//! Dependency cycle detection
//!
//! Each task's transitive dependency closure is computed once and memoized,
//! so validating a whole document costs O(V + E).

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, instrument};

use crate::error::DocumentError;

use super::task::Task;

/// Fail with [`DocumentError::CircularDependency`] if the graph has a cycle.
///
/// Dependency names with no matching task are treated as leaves; callers
/// check for them separately.
#[instrument(skip_all, fields(task_count = tasks.len()))]
pub fn validate_acyclic(tasks: &BTreeMap<String, Task>) -> Result<(), DocumentError> {
    let mut detector = CycleDetector {
        tasks,
        closures: HashMap::with_capacity(tasks.len()),
    };

    let mut history = Vec::with_capacity(tasks.len());
    for call in tasks.keys() {
        history.clear();
        detector.resolve(call, &mut history)?;
    }

    debug!("dependency graph is acyclic");
    Ok(())
}

struct CycleDetector<'a> {
    tasks: &'a BTreeMap<String, Task>,
    closures: HashMap<&'a str, HashSet<&'a str>>,
}

impl<'a> CycleDetector<'a> {
    fn resolve(&mut self, call: &'a str, history: &mut Vec<&'a str>) -> Result<(), DocumentError> {
        if self.closures.contains_key(call) {
            return Ok(());
        }

        history.push(call);
        let mut closure: HashSet<&'a str> = HashSet::new();

        if let Some(task) = self.tasks.get(call) {
            for dep in &task.depends {
                let dep = dep.as_str();
                closure.insert(dep);

                if history.contains(&dep) {
                    return Err(cycle_error(history, &[dep]));
                }

                if !self.closures.contains_key(dep) {
                    self.resolve(dep, history)?;
                }

                if let Some(indirect) = self.closures.get(dep) {
                    if let Some(member) = indirect.iter().copied().find(|d| history.contains(d)) {
                        return Err(cycle_error(history, &[dep, member]));
                    }
                    closure.extend(indirect.iter().copied());
                }
            }
        }

        history.pop();
        self.closures.insert(call, closure);
        Ok(())
    }
}

/// Build the error path starting at the first repeated history member.
fn cycle_error(history: &[&str], tail: &[&str]) -> DocumentError {
    let repeated = tail.last().copied().unwrap_or_default();
    let start = history.iter().position(|h| *h == repeated).unwrap_or(0);

    let path: Vec<&str> = history[start..].iter().chain(tail.iter()).copied().collect();

    DocumentError::CircularDependency {
        path: path.join(" -> "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, Task> {
        edges
            .iter()
            .map(|(call, deps)| {
                let task = deps
                    .iter()
                    .fold(Task::new(*call), |task, dep| task.with_depends_on(*dep));
                (call.to_string(), task)
            })
            .collect()
    }

    fn cycle_path(err: DocumentError) -> String {
        match err {
            DocumentError::CircularDependency { path } => path,
            other => panic!("expected circular dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let tasks = graph(&[
            ("task-1-1", &["task-2"]),
            ("task-1-2", &["task-3-1", "task-4"]),
            ("task-2", &["task-3-1", "task-3-2"]),
            ("task-3-1", &["task-4"]),
            ("task-3-2", &["task-4"]),
            ("task-4", &[]),
        ]);

        assert!(validate_acyclic(&tasks).is_ok());
    }

    #[test]
    fn test_two_node_cycle() {
        let tasks = graph(&[("A", &["B"]), ("B", &["A"])]);

        let path = cycle_path(validate_acyclic(&tasks).unwrap_err());
        assert_eq!(path, "A -> B -> A");
    }

    #[test]
    fn test_long_cycle_names_every_member() {
        let tasks = graph(&[
            ("task-1-1", &["task-2"]),
            ("task-1-2", &["task-3-1", "task-4"]),
            ("task-2", &["task-3-1", "task-3-2"]),
            ("task-3-1", &["task-4"]),
            ("task-3-2", &["task-4"]),
            ("task-4", &["task-2"]),
        ]);

        let path = cycle_path(validate_acyclic(&tasks).unwrap_err());
        for member in ["task-2", "task-3-1", "task-4"] {
            assert!(path.contains(member), "{member} missing from {path}");
        }
        assert!(!path.contains("task-1-1"));
    }

    #[test]
    fn test_self_dependency() {
        let tasks = graph(&[("A", &["A"])]);
        assert_eq!(cycle_path(validate_acyclic(&tasks).unwrap_err()), "A -> A");
    }

    #[test]
    fn test_unknown_dependency_is_a_leaf() {
        let tasks = graph(&[("A", &["missing"])]);
        assert!(validate_acyclic(&tasks).is_ok());
    }
}
