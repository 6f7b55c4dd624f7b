#![allow(dead_code)]

use std::error::Error;

use taskdispatch::batch::{BatchGraph, BatchId};

pub use taskdispatch_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Task names of the root's direct pre-tasks, in edge order.
pub fn root_tasks(graph: &BatchGraph) -> Vec<String> {
    graph
        .batch(graph.root())
        .pre_tasks()
        .iter()
        .map(|id| graph.batch(*id).label().to_string())
        .collect()
}

/// Every reachable, non-root batch for `task`.
pub fn batches_of(graph: &BatchGraph, task: &str) -> Vec<BatchId> {
    graph
        .reachable()
        .into_iter()
        .filter(|id| !graph.batch(*id).is_root() && graph.batch(*id).label() == task)
        .collect()
}

/// Task names of `id`'s pre-tasks, in edge order.
pub fn pre_task_names(graph: &BatchGraph, id: BatchId) -> Vec<String> {
    graph
        .batch(id)
        .pre_tasks()
        .iter()
        .map(|pre| graph.batch(*pre).label().to_string())
        .collect()
}
