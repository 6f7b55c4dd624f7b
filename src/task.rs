// src/task.rs

//! The task interface consumed by the dispatcher.
//!
//! The evaluation engine that owns the node graph implements [`TaskNode`];
//! the dispatcher only ever talks to nodes through a [`TaskRequest`], which
//! pairs a node with the [`Context`] it is evaluated in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::context::{Context, ContextValue, DEFAULT_FRAME};
use crate::hash::TaskHash;

/// Shared handle to a task node.
pub type NodeRef = Arc<dyn TaskNode>;

/// Per-node dispatch settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Maximum number of frames coalesced into one batch for tasks that do
    /// not require sequence execution.
    pub batch_size: usize,
    /// Execute this task (and everything it depends on) while the plan is
    /// being built, before the backend sees it.
    pub immediate: bool,
    /// Backend-specific settings added by registered setup callbacks.
    pub extra: BTreeMap<String, ContextValue>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 1,
            immediate: false,
            extra: BTreeMap::new(),
        }
    }
}

/// A schedulable unit of external work.
pub trait TaskNode: fmt::Debug + Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Name of the session (script) owning this node, if any.
    fn session(&self) -> Option<&str>;

    /// Whether this node can be dispatched at all. Graph nodes that are not
    /// tasks report `false` and are rejected by validation.
    fn is_task(&self) -> bool {
        true
    }

    fn settings(&self) -> DispatchSettings {
        DispatchSettings::default()
    }

    /// Hash of the work this task would do in `context`; [`TaskHash::NULL`]
    /// when there is nothing to do.
    fn hash(&self, context: &Context) -> TaskHash;

    /// Tasks that must complete before this one.
    fn pre_tasks(&self, context: &Context) -> Vec<TaskRequest>;

    /// Tasks that must run after this one. Nodes without post-task support
    /// keep the default.
    fn post_tasks(&self, _context: &Context) -> Vec<TaskRequest> {
        Vec::new()
    }

    /// When true, all frames of a batch are executed as one ordered
    /// sequence and batches are never split by size.
    fn requires_sequence_execution(&self) -> bool {
        false
    }

    /// Execute the task for `frames` in `context` (which has no frame set).
    fn execute_sequence(&self, context: &Context, frames: &[f32]) -> anyhow::Result<()>;
}

/// A task node evaluated in a specific context (and therefore frame).
#[derive(Clone)]
pub struct TaskRequest {
    node: NodeRef,
    context: Context,
}

impl TaskRequest {
    pub fn new(node: NodeRef, context: Context) -> Self {
        Self { node, context }
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn frame(&self) -> f32 {
        self.context.frame().unwrap_or(DEFAULT_FRAME)
    }

    /// Stable identity of the underlying node for the lifetime of the
    /// allocation.
    pub fn node_identity(&self) -> u64 {
        Arc::as_ptr(&self.node) as *const () as usize as u64
    }

    pub fn content_hash(&self) -> TaskHash {
        self.node.hash(&self.context)
    }

    pub fn pre_task_requests(&self) -> Vec<TaskRequest> {
        self.node.pre_tasks(&self.context)
    }

    pub fn post_task_requests(&self) -> Vec<TaskRequest> {
        self.node.post_tasks(&self.context)
    }

    pub fn requires_sequence_execution(&self) -> bool {
        self.node.requires_sequence_execution()
    }

    pub fn settings(&self) -> DispatchSettings {
        self.node.settings()
    }

    pub fn is_immediate(&self) -> bool {
        self.node.settings().immediate
    }

    /// Execute `frames` in this request's context with the frame removed.
    pub fn execute_frames(&self, frames: &[f32]) -> anyhow::Result<()> {
        self.node
            .execute_sequence(&self.context.without_frame(), frames)
    }
}

impl fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("node", &self.node.name())
            .field("frame", &self.frame())
            .finish_non_exhaustive()
    }
}
