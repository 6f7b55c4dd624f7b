// src/batch/plan.rs

//! Read-only views of a finished batch graph, used for dry runs and logs.

use std::fmt::Write as _;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::batch::task_batch::{BatchGraph, BatchId};
use crate::errors::{DispatchError, Result};

/// Summary of one batch in a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBatch {
    pub id: BatchId,
    pub task: String,
    pub frames: Vec<f32>,
    pub pre_tasks: Vec<BatchId>,
    pub immediate: bool,
}

/// Batches reachable from the root (root excluded), ordered so that every
/// batch comes after all of its pre-tasks.
pub fn execution_order(graph: &BatchGraph) -> Result<Vec<BatchId>> {
    // Edge direction: pre-task -> dependent.
    let mut dag: DiGraphMap<BatchId, ()> = DiGraphMap::new();
    for id in graph.reachable() {
        dag.add_node(id);
        for pre in graph.batch(id).pre_tasks() {
            dag.add_edge(*pre, id, ());
        }
    }

    let order = toposort(&dag, None).map_err(|cycle| DispatchError::GraphCycle {
        task: graph.batch(cycle.node_id()).label().to_string(),
    })?;

    Ok(order.into_iter().filter(|id| *id != graph.root()).collect())
}

pub fn describe(graph: &BatchGraph) -> Result<Vec<PlannedBatch>> {
    let order = execution_order(graph)?;
    Ok(order
        .into_iter()
        .map(|id| {
            let batch = graph.batch(id);
            PlannedBatch {
                id,
                task: batch.label().to_string(),
                frames: batch.frames().to_vec(),
                pre_tasks: batch.pre_tasks().to_vec(),
                immediate: batch.is_immediate(),
            }
        })
        .collect())
}

/// Human-readable listing, one batch per line.
pub fn render(plan: &[PlannedBatch]) -> String {
    let mut out = String::new();
    for entry in plan {
        let _ = write!(out, "{} {} frames={:?}", entry.id, entry.task, entry.frames);
        if !entry.pre_tasks.is_empty() {
            let pre: Vec<String> = entry.pre_tasks.iter().map(ToString::to_string).collect();
            let _ = write!(out, " after=[{}]", pre.join(", "));
        }
        out.push('\n');
    }
    out
}
