//! Error types for playbook workflows

/// Task graph contains a cycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("playbook contains a cycle between tasks: {}", .tasks.join(", "))]
pub struct CycleError {
    /// Tasks that could not be ordered
    pub tasks: Vec<String>,
}

/// Workflow errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// Task graph is not acyclic
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A `next` entry or a completion names a task that does not exist
    #[error("unknown task {task:?} referenced by {referenced_by:?}")]
    UnknownTask {
        /// Missing task id
        task: String,
        /// Task or operation that referenced it
        referenced_by: String,
    },

    /// Playbook has no tasks
    #[error("playbook {0:?} has no tasks")]
    EmptyPlaybook(String),

    /// Playbook has no task with order 0
    #[error("playbook {0:?} has no root task")]
    MissingRoot(String),

    /// Playbook template is not valid YAML for a playbook
    #[error("invalid playbook template: {0}")]
    Template(String),

    /// Job sink refused a job
    #[error("job dispatch failed: {0}")]
    Dispatch(String),
}

impl From<serde_yaml::Error> for WorkflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Template(err.to_string())
    }
}
