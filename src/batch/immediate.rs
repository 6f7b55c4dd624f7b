// src/batch/immediate.rs

//! Eager execution of batches marked `immediate`.

use tracing::{debug, info};

use crate::batch::task_batch::{BatchGraph, BatchId};
use crate::errors::Result;

/// Execute every immediate batch reachable from `batch`, together with
/// everything it depends on, and prune executed batches from their
/// dependents' pre-tasks.
///
/// Immediacy is inherited downward through pre-task edges only: the
/// pre-tasks of an immediate batch are executed as well, its dependents are
/// not. A batch first reached from a non-immediate dependent is walked again
/// when an immediate dependent reaches it later. The root is walked but never
/// executed, since it has no task.
pub fn execute_and_prune_immediate(graph: &mut BatchGraph, batch: BatchId, inherited: bool) -> Result<()> {
    walk(graph, batch, inherited)?;
    prune_executed(graph);
    Ok(())
}

fn walk(graph: &mut BatchGraph, batch: BatchId, inherited: bool) -> Result<()> {
    let immediate = inherited || graph.batch(batch).immediate;
    {
        let state = graph.batch(batch);
        if state.visited && (!immediate || state.executed) {
            return Ok(());
        }
    }

    let mut index = 0;
    while index < graph.batch(batch).pre_tasks.len() {
        let pre_task = graph.batch(batch).pre_tasks[index];
        walk(graph, pre_task, immediate)?;

        if graph.batch(pre_task).executed {
            debug!(batch = %batch, pre_task = %pre_task, "pruning executed pre-task");
            graph.batch_mut(batch).remove_pre_task_at(index);
        } else {
            index += 1;
        }
    }

    if immediate && !graph.batch(batch).is_root() {
        info!(
            batch = %batch,
            task = %graph.batch(batch).label(),
            frames = ?graph.batch(batch).frames(),
            "executing immediate batch"
        );
        graph.execute(batch)?;
        graph.batch_mut(batch).executed = true;
    }

    graph.batch_mut(batch).visited = true;
    Ok(())
}

/// Drop executed pre-tasks that an earlier part of the walk had already
/// passed over.
fn prune_executed(graph: &mut BatchGraph) {
    for id in (0..graph.len()).map(BatchId) {
        let mut index = 0;
        while index < graph.batch(id).pre_tasks.len() {
            let pre_task = graph.batch(id).pre_tasks[index];
            if graph.batch(pre_task).executed {
                debug!(batch = %id, pre_task = %pre_task, "pruning pre-task executed later in the walk");
                graph.batch_mut(id).remove_pre_task_at(index);
            } else {
                index += 1;
            }
        }
    }
}
