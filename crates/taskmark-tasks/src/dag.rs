//! Selection of the tasks a run needs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, instrument, warn};

use taskmark_core::Document;

/// Tasks selected for execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    tasks: BTreeSet<String>,
    unknown: Vec<String>,
}

impl Selection {
    /// Selected task names
    pub fn tasks(&self) -> &BTreeSet<String> {
        &self.tasks
    }

    /// Requested names that matched no task
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    /// Whether `call` was selected
    pub fn contains(&self, call: &str) -> bool {
        self.tasks.contains(call)
    }

    /// Number of selected tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Compute the transitive dependency closure of the requested tasks.
///
/// Unknown names are logged and dropped. The result contains each
/// requested task that exists together with everything it depends on.
#[instrument(skip(document), fields(tasks = document.len()))]
pub fn select_tasks(document: &Document, requested: &[String]) -> Selection {
    let mut selection = Selection::default();
    let mut queue: VecDeque<&str> = VecDeque::new();

    for call in requested {
        if document.task(call).is_some() {
            queue.push_back(call.as_str());
        } else {
            warn!("{}", DagError::UnknownTask(call.clone()));
            selection.unknown.push(call.clone());
        }
    }

    while let Some(call) = queue.pop_front() {
        if !selection.tasks.insert(call.to_string()) {
            continue;
        }
        let Some(task) = document.task(call) else {
            continue;
        };
        for dep in &task.depends {
            if !selection.tasks.contains(dep) {
                queue.push_back(dep.as_str());
            }
        }
    }

    debug!(selected = selection.len(), "task selection complete");
    selection
}

/// Errors during task selection
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("Task not found: {0}")]
    UnknownTask(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmark_core::{DocumentBuilder, Task};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn document() -> Document {
        DocumentBuilder::new("/project")
            .unwrap()
            .task(Task::new("A").with_depends_on("B").with_depends_on("C"))
            .unwrap()
            .task(Task::new("B").with_depends_on("D"))
            .unwrap()
            .task(Task::new("C").with_depends_on("D"))
            .unwrap()
            .task(Task::new("D"))
            .unwrap()
            .task(Task::new("E"))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_selects_transitive_dependencies() {
        let selection = select_tasks(&document(), &names(&["A"]));
        let selected: Vec<&str> = selection.tasks().iter().map(String::as_str).collect();
        assert_eq!(selected, vec!["A", "B", "C", "D"]);
        assert!(!selection.contains("E"));
    }

    #[test]
    fn test_leaf_selects_only_itself() {
        let selection = select_tasks(&document(), &names(&["D"]));
        assert_eq!(selection.len(), 1);
        assert!(selection.contains("D"));
    }

    #[test]
    fn test_multiple_requests_union() {
        let selection = select_tasks(&document(), &names(&["B", "E", "B"]));
        assert_eq!(selection.len(), 3);
        assert!(selection.contains("B"));
        assert!(selection.contains("D"));
        assert!(selection.contains("E"));
    }

    #[test]
    fn test_unknown_names_dropped() {
        let selection = select_tasks(&document(), &names(&["nope", "E"]));
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.unknown(), &["nope".to_string()]);
    }

    #[test]
    fn test_empty_request() {
        let selection = select_tasks(&document(), &[]);
        assert!(selection.is_empty());
    }
}
