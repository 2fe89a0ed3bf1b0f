//! Playbooks and their tasks
//!
//! A playbook is attached to exactly one ticket. Its tasks and their `next`
//! edges form a DAG; `order` is the position of a task in the topological
//! order computed when the playbook is attached, so the task with order 0 is
//! the entry point.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Manual step
    #[default]
    Task,
    /// Form input from an analyst
    Input,
    /// Automated step
    Automation,
}

/// Task as declared in a playbook template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Dependent task ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<String>,
}

impl TaskTemplate {
    /// Manual task without successors
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Task,
            automation: None,
            data: None,
            next: Vec::new(),
        }
    }

    /// With successor task ids
    #[must_use]
    pub fn with_next<I, S>(mut self, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next = next.into_iter().map(Into::into).collect();
        self
    }

    /// With automation
    #[inline]
    #[must_use]
    pub fn with_automation(mut self, automation: impl Into<String>) -> Self {
        self.kind = TaskKind::Automation;
        self.automation = Some(automation.into());
        self
    }

    /// With opaque payload
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Playbook template: a name and tasks in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookTemplate {
    pub name: String,
    pub tasks: IndexMap<String, TaskTemplate>,
}

impl PlaybookTemplate {
    /// Empty template
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: IndexMap::new(),
        }
    }

    /// Append a task
    #[must_use]
    pub fn with_task(mut self, id: impl Into<String>, task: TaskTemplate) -> Self {
        self.tasks.insert(id.into(), task);
        self
    }
}

/// Playbook template as submitted with a ticket, in YAML form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookTemplateForm {
    /// Requested playbook id; derived from the name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub yaml: String,
}

impl PlaybookTemplateForm {
    /// Form without explicit id
    #[inline]
    #[must_use]
    pub fn new(yaml: impl Into<String>) -> Self {
        Self {
            id: None,
            yaml: yaml.into(),
        }
    }
}

/// Task attached to a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Position in topological order, 0 for the root
    pub order: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<String>,
    /// Set by the job-completion callback
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Playbook attached to a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    pub tasks: IndexMap<String, Task>,
}

impl Playbook {
    /// Entry task (order 0)
    #[must_use]
    pub fn root_task(&self) -> Option<(&str, &Task)> {
        self.tasks
            .iter()
            .find(|(_, task)| task.order == 0)
            .map(|(id, task)| (id.as_str(), task))
    }

    /// Task by id
    #[inline]
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Task ids sorted by execution order
    #[must_use]
    pub fn ordered_task_ids(&self) -> Vec<&str> {
        let mut ids: Vec<(&str, u32)> = self
            .tasks
            .iter()
            .map(|(id, task)| (id.as_str(), task.order))
            .collect();
        ids.sort_by_key(|(_, order)| *order);
        ids.into_iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(order: u32) -> Task {
        Task {
            name: format!("t{order}"),
            kind: TaskKind::Task,
            automation: None,
            data: None,
            order,
            next: Vec::new(),
            done: false,
            output: None,
        }
    }

    #[test]
    fn root_is_order_zero() {
        let mut tasks = IndexMap::new();
        tasks.insert("b".to_string(), task(1));
        tasks.insert("a".to_string(), task(0));
        let playbook = Playbook {
            name: "p".into(),
            tasks,
        };

        assert_eq!(playbook.root_task().map(|(id, _)| id), Some("a"));
        assert_eq!(playbook.ordered_task_ids(), vec!["a", "b"]);
    }

    #[test]
    fn done_flag_is_omitted_until_set() {
        let json = serde_json::to_value(task(0)).unwrap();
        assert!(json.get("done").is_none());
        assert_eq!(json["type"], "task");
    }
}
