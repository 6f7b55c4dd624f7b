// src/batch/builder.rs

//! Construction of the batch graph from task requests.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::batch::keys::{dedup_key, group_key};
use crate::batch::task_batch::{BatchGraph, BatchId, TaskBatch};
use crate::errors::{DispatchError, Result};
use crate::hash::TaskHash;
use crate::task::TaskRequest;

/// Single-use builder turning task requests into a [`BatchGraph`].
///
/// Requests are walked depth-first through their pre- and post-tasks.
/// Post-tasks are rewritten as pre-task edges ("A has post-task B" becomes
/// "B has pre-task A"), so consumers of the finished graph only ever see
/// pre-tasks.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: BatchGraph,
    /// Dedup key -> batch the task was placed in.
    tasks_to_batches: HashMap<TaskHash, BatchId>,
    /// Group key -> batch currently accepting more frames.
    current_batches: HashMap<TaskHash, BatchId>,
    /// Dedup keys of the requests currently being resolved.
    in_progress: HashSet<TaskHash>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `request` (and everything it depends on) into the graph and
    /// make it reachable from the root.
    pub fn add_request(&mut self, request: TaskRequest) -> Result<()> {
        let batch = self.resolve(&request, &HashSet::new())?;
        let root = self.graph.root();
        self.add_pre_task(root, batch, false)
    }

    pub fn root_batch(&self) -> BatchId {
        self.graph.root()
    }

    pub fn graph(&self) -> &BatchGraph {
        &self.graph
    }

    pub fn into_graph(self) -> BatchGraph {
        self.graph
    }

    /// Hash of every task placed so far. Insensitive to request order and to
    /// the dependencies between tasks.
    pub fn hash(&self) -> TaskHash {
        self.tasks_to_batches
            .keys()
            .fold(TaskHash::NULL, |acc, key| acc.combine_unordered(*key))
    }

    fn resolve(&mut self, request: &TaskRequest, ancestors: &HashSet<BatchId>) -> Result<BatchId> {
        let (batch, key) = self.acquire_batch(request);
        if ancestors.contains(&batch) {
            return Err(DispatchError::GraphCycle {
                task: request.node().name().to_string(),
            });
        }

        // Re-entered through a post-task: the outer call finishes this
        // request's edges.
        if !self.in_progress.insert(key) {
            return Ok(batch);
        }
        let result = self.resolve_dependencies(request, batch, ancestors);
        self.in_progress.remove(&key);
        result.map(|()| batch)
    }

    fn resolve_dependencies(
        &mut self,
        request: &TaskRequest,
        batch: BatchId,
        ancestors: &HashSet<BatchId>,
    ) -> Result<()> {
        let pre_requests = request.pre_task_requests();
        let post_requests = request.post_task_requests();

        // A post-task depends on `batch`, so finding it among our ancestors
        // is not a cycle: each post-task starts a fresh walk. Cycles closed
        // by post-task edges are caught in `add_pre_task`. Post batches must
        // be known before the pre-tasks are walked, so that a pre-task that
        // is also a post-task is caught.
        let mut post_batches = Vec::with_capacity(post_requests.len());
        for post in &post_requests {
            post_batches.push(self.resolve(post, &HashSet::new())?);
        }

        let mut pre_ancestors = ancestors.clone();
        pre_ancestors.insert(batch);
        pre_ancestors.extend(post_batches.iter().copied());

        for pre in &pre_requests {
            let pre_batch = self.resolve(pre, &pre_ancestors)?;
            self.add_pre_task(batch, pre_batch, false)?;
        }

        let root = self.graph.root();
        for post_batch in post_batches {
            self.add_pre_task(post_batch, batch, true)?;
            self.add_pre_task(root, post_batch, false)?;
        }

        Ok(())
    }

    fn acquire_batch(&mut self, request: &TaskRequest) -> (BatchId, TaskHash) {
        let content_hash = request.content_hash();
        let dedup = dedup_key(request, &content_hash);
        if let Some(&existing) = self.tasks_to_batches.get(&dedup) {
            trace!(task = %request.node().name(), frame = request.frame(), "request already batched");
            return (existing, dedup);
        }

        let sequence = request.requires_sequence_execution();
        let settings = request.settings();
        let batch_size = settings.batch_size.max(1);
        let group = group_key(request, &content_hash);

        let open = self
            .current_batches
            .get(&group)
            .copied()
            .filter(|id| sequence || self.graph.batch(*id).size < batch_size);

        let id = match open {
            Some(id) => id,
            None => {
                let id = self.graph.insert(TaskBatch::for_request(request));
                self.current_batches.insert(group, id);
                debug!(batch = %id, task = %request.node().name(), "opened new batch");
                id
            }
        };

        let batch = self.graph.batch_mut(id);
        if !content_hash.is_null() {
            let frame = request.frame();
            if sequence {
                if let Err(pos) = batch.frames.binary_search_by(|f| f.total_cmp(&frame)) {
                    batch.frames.insert(pos, frame);
                }
            } else if !batch.frames.contains(&frame) {
                batch.frames.push(frame);
            }
        }
        batch.size += 1;

        if settings.immediate {
            batch.immediate = true;
        }

        self.tasks_to_batches.insert(dedup, id);
        (id, dedup)
    }

    /// Whether `batch` transitively has `target` as a pre-task.
    fn depends_on(&self, batch: BatchId, target: BatchId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![batch];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for pre in self.graph.batch(id).pre_tasks() {
                if *pre == target {
                    return true;
                }
                stack.push(*pre);
            }
        }
        false
    }

    /// Make `pre_task` a pre-task of `batch`.
    ///
    /// Edges created by post-tasks are checked for reachability, since the
    /// ancestor sets cannot see cycles they close. Plain pre-task edges are
    /// already covered by the ancestor sets, so they skip the walk.
    fn add_pre_task(&mut self, batch: BatchId, pre_task: BatchId, for_post_task: bool) -> Result<()> {
        if self.graph.batch(batch).pre_task_set.contains(&pre_task) {
            return Ok(());
        }
        let closes_cycle =
            pre_task == batch || (for_post_task && self.depends_on(pre_task, batch));
        if batch != self.graph.root() && closes_cycle {
            return Err(DispatchError::GraphCycle {
                task: self.graph.batch(batch).label().to_string(),
            });
        }

        let batch = self.graph.batch_mut(batch);
        batch.pre_task_set.insert(pre_task);
        if for_post_task {
            // Post-task edges stay ahead of the batch's own pre-tasks.
            // The order is cosmetic and never needed for correctness.
            batch.pre_tasks.insert(batch.post_task_index, pre_task);
            batch.post_task_index += 1;
        } else {
            batch.pre_tasks.push(pre_task);
        }
        Ok(())
    }
}
