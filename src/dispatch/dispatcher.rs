// src/dispatch/dispatcher.rs

//! The dispatch controller.
//!
//! [`Dispatcher::dispatch`] drives one dispatch end-to-end:
//!
//! 1. validate the requested nodes,
//! 2. resolve the frame list,
//! 3. choose the job directory and publish it into the job context,
//! 4. fire pre-dispatch hooks (which may cancel) and dispatch hooks,
//! 5. build the batch graph, frame by frame and node by node,
//! 6. create the job directory on disk,
//! 7. execute and prune `immediate` batches,
//! 8. hand whatever is left to the backend.
//!
//! Validation and cycle errors leave nothing on disk. Post-dispatch hooks
//! fire exactly once for every dispatch that got past step 3, whatever the
//! outcome. A dispatch nested inside another one (its base context already
//! names a job directory) fires no hooks at all.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::batch::{BatchGraph, GraphBuilder, execute_and_prune_immediate, plan};
use crate::context::Context;
use crate::dispatch::frames::FramesMode;
use crate::dispatch::hooks::{DispatchHooks, DispatchInfo, PostDispatchGuard};
use crate::dispatch::job_directory::{JOB_DIRECTORY_ENTRY, JobDirectory};
use crate::errors::{DispatchError, Result};
use crate::exec::Backend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::hash::TaskHash;
use crate::task::{NodeRef, TaskRequest};

/// Where the dispatcher currently is in a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Resolving,
    Building,
    Pruning,
    Dispatching,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatcherSettings {
    pub job_name: String,
    /// Parent of the per-job directories. Empty means the current directory.
    pub jobs_directory: PathBuf,
}

pub struct Dispatcher {
    backend: Box<dyn Backend>,
    hooks: Arc<DispatchHooks>,
    fs: Arc<dyn FileSystem>,
    settings: DispatcherSettings,
    context: Context,
    state: DispatchState,
    job_directory: Option<PathBuf>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backend", &self.backend.name())
            .field("hooks", &self.hooks)
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("job_directory", &self.job_directory)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            hooks: Arc::new(DispatchHooks::new()),
            fs: Arc::new(RealFileSystem),
            settings: DispatcherSettings::default(),
            context: Context::new(),
            state: DispatchState::Idle,
            job_directory: None,
        }
    }

    pub fn with_hooks(mut self, hooks: DispatchHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Base context every job context is derived from.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Job directory of the most recent dispatch, once it exists on disk.
    pub fn job_directory(&self) -> Option<&Path> {
        self.job_directory.as_deref()
    }

    /// Dispatch `nodes` over the frames selected by `frames`.
    ///
    /// Returns `Ok(())` both on success and when a pre-dispatch hook
    /// cancelled; hooks see the difference through the `successful` flag.
    pub fn dispatch(&mut self, nodes: &[NodeRef], frames: &FramesMode) -> Result<()> {
        self.job_directory = None;
        let result = self.dispatch_inner(nodes, frames);
        self.transition(DispatchState::Idle);
        if let Err(err) = &result {
            info!(error = %err, "dispatch failed");
        }
        result
    }

    /// Build the batch graph for `nodes` without creating a job directory,
    /// firing hooks or executing anything.
    pub fn plan(&self, nodes: &[NodeRef], frames: &FramesMode) -> Result<BatchGraph> {
        validate_nodes(nodes)?;
        let frames = frames.resolve(&self.context)?;
        let builder = build_graph(nodes, &frames, &self.context)?;
        Ok(builder.into_graph())
    }

    /// Order-independent hash of everything `dispatch` would place in the
    /// graph for these nodes and frames.
    pub fn plan_hash(&self, nodes: &[NodeRef], frames: &FramesMode) -> Result<TaskHash> {
        validate_nodes(nodes)?;
        let frames = frames.resolve(&self.context)?;
        let builder = build_graph(nodes, &frames, &self.context)?;
        Ok(builder.hash())
    }

    fn dispatch_inner(&mut self, nodes: &[NodeRef], frames: &FramesMode) -> Result<()> {
        validate_nodes(nodes)?;

        self.transition(DispatchState::Resolving);
        let frames = frames.resolve(&self.context)?;

        let mut job_directory = self.choose_job_directory()?;
        let mut job_context = self.context.clone();
        job_directory.publish(&mut job_context);

        let hooks = if self.is_nested() {
            debug!("nested dispatch; hooks are not fired");
            Arc::new(DispatchHooks::new())
        } else {
            self.hooks.clone()
        };

        let info = DispatchInfo {
            backend: self.backend.name().to_string(),
            job_name: self.settings.job_name.clone(),
            job_directory: Some(job_directory.path().to_path_buf()),
            frames: frames.clone(),
        };
        let mut guard = PostDispatchGuard::new(hooks.clone(), info, nodes);

        if hooks.emit_pre_dispatch(guard.info(), nodes) {
            return Ok(());
        }
        hooks.emit_dispatch(guard.info(), nodes);

        self.transition(DispatchState::Building);
        let mut graph = loop {
            let graph = build_graph(nodes, &frames, &job_context)?.into_graph();
            if job_directory.create(self.fs.as_ref())? {
                break graph;
            }
            // Another process took the number; the graph captured the old
            // path, so it is rebuilt against the next one.
            job_directory = self.choose_job_directory()?;
            job_directory.publish(&mut job_context);
            guard.info_mut().job_directory = Some(job_directory.path().to_path_buf());
        };
        self.job_directory = Some(job_directory.path().to_path_buf());

        self.transition(DispatchState::Pruning);
        let root = graph.root();
        execute_and_prune_immediate(&mut graph, root, false)?;

        if graph.batch(root).pre_tasks().is_empty() {
            info!("nothing left to dispatch after immediate execution");
            guard.succeed();
            return Ok(());
        }

        self.transition(DispatchState::Dispatching);
        info!(
            backend = %self.backend.name(),
            batches = graph.batch(root).pre_tasks().len(),
            "handing batches to backend"
        );
        self.backend.run_batches(&mut graph)?;

        guard.succeed();
        Ok(())
    }

    fn choose_job_directory(&self) -> Result<JobDirectory> {
        JobDirectory::choose(
            self.fs.as_ref(),
            &self.settings.jobs_directory,
            &self.settings.job_name,
            &self.context,
        )
    }

    fn is_nested(&self) -> bool {
        self.context
            .get_str(JOB_DIRECTORY_ENTRY)
            .is_some_and(|dir| !dir.is_empty())
    }

    fn transition(&mut self, next: DispatchState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "dispatcher state");
            self.state = next;
        }
    }
}

fn validate_nodes(nodes: &[NodeRef]) -> Result<()> {
    let Some(first) = nodes.first() else {
        return Err(DispatchError::Validation("no nodes to dispatch".to_string()));
    };

    if let Some(node) = nodes.iter().find(|n| !n.is_task()) {
        return Err(DispatchError::Validation(format!(
            "'{}' is not a dispatchable task",
            node.name()
        )));
    }

    let Some(session) = first.session() else {
        return Err(DispatchError::Validation(format!(
            "'{}' does not belong to a session",
            first.name()
        )));
    };

    if let Some(node) = nodes.iter().find(|n| n.session() != Some(session)) {
        return Err(DispatchError::Validation(format!(
            "nodes must belong to a single session, but '{}' is not in '{session}'",
            node.name()
        )));
    }

    Ok(())
}

fn build_graph(nodes: &[NodeRef], frames: &[f32], context: &Context) -> Result<GraphBuilder> {
    let mut builder = GraphBuilder::new();
    for &frame in frames {
        let frame_context = context.with_frame(frame);
        for node in nodes {
            builder.add_request(TaskRequest::new(node.clone(), frame_context.clone()))?;
        }
    }
    // Coalesced frames can join batches into a cycle that no single request
    // walk sees.
    plan::execution_order(builder.graph())?;
    debug!(batches = builder.graph().len() - 1, "batch graph built");
    Ok(builder)
}
