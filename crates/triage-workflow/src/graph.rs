//! Task graph ordering
//!
//! Kahn's algorithm over a petgraph `DiGraph` whose node indices are the
//! declaration positions of the tasks. Ready tasks are released smallest
//! declaration index first, so the order is deterministic for a given
//! template.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use triage_model::PlaybookTemplate;

use crate::error::{CycleError, WorkflowError};

/// Task ids of a template in execution order
///
/// # Errors
/// - `WorkflowError::UnknownTask` when a `next` entry names no task
/// - `WorkflowError::Cycle` listing the tasks that could not be ordered
pub fn topological_order(template: &PlaybookTemplate) -> Result<Vec<String>, WorkflowError> {
    let count = template.tasks.len();
    let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(count, count);
    let nodes: Vec<NodeIndex> = template
        .tasks
        .keys()
        .map(|id| graph.add_node(id.as_str()))
        .collect();

    for (from, (id, task)) in template.tasks.iter().enumerate() {
        for next in &task.next {
            let to = template
                .tasks
                .get_index_of(next)
                .ok_or_else(|| WorkflowError::UnknownTask {
                    task: next.clone(),
                    referenced_by: id.clone(),
                })?;
            graph.update_edge(nodes[from], nodes[to], ());
        }
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(i)) = ready.pop() {
        let node = NodeIndex::new(i);
        order.push(graph[node].to_string());
        for succ in graph.neighbors_directed(node, Direction::Outgoing) {
            let degree = &mut in_degree[succ.index()];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(succ.index()));
            }
        }
    }

    if order.len() < count {
        let tasks: Vec<String> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(i, _)| graph[NodeIndex::new(i)].to_string())
            .collect();
        tracing::debug!(playbook = %template.name, ?tasks, "task graph has a cycle");
        return Err(CycleError { tasks }.into());
    }

    Ok(order)
}
