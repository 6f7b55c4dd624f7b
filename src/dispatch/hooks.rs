// src/dispatch/hooks.rs

//! Dispatch lifecycle hooks.
//!
//! Three subscriber lists are notified around every dispatch:
//! - pre-dispatch, which may cancel the dispatch,
//! - dispatch, fired once the job directory exists,
//! - post-dispatch, fired exactly once with the outcome.
//!
//! Errors returned by handlers are logged and discarded; they never change
//! the outcome of the dispatch itself.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::task::NodeRef;

/// What hooks get to know about the dispatch in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchInfo {
    pub backend: String,
    pub job_name: String,
    pub job_directory: Option<PathBuf>,
    pub frames: Vec<f32>,
}

type PreDispatchHandler =
    Box<dyn Fn(&DispatchInfo, &[NodeRef]) -> anyhow::Result<bool> + Send + Sync>;
type DispatchHandler = Box<dyn Fn(&DispatchInfo, &[NodeRef]) -> anyhow::Result<()> + Send + Sync>;
type PostDispatchHandler =
    Box<dyn Fn(&DispatchInfo, &[NodeRef], bool) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct DispatchHooks {
    pre_dispatch: Vec<PreDispatchHandler>,
    dispatch: Vec<DispatchHandler>,
    post_dispatch: Vec<PostDispatchHandler>,
}

impl fmt::Debug for DispatchHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHooks")
            .field("pre_dispatch", &self.pre_dispatch.len())
            .field("dispatch", &self.dispatch.len())
            .field("post_dispatch", &self.post_dispatch.len())
            .finish()
    }
}

impl DispatchHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to pre-dispatch. Returning `Ok(true)` cancels the dispatch.
    pub fn on_pre_dispatch<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&DispatchInfo, &[NodeRef]) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.pre_dispatch.push(Box::new(handler));
        self
    }

    pub fn on_dispatch<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&DispatchInfo, &[NodeRef]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatch.push(Box::new(handler));
        self
    }

    /// Subscribe to post-dispatch. The flag tells whether the dispatch
    /// completed successfully.
    pub fn on_post_dispatch<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&DispatchInfo, &[NodeRef], bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_dispatch.push(Box::new(handler));
        self
    }

    /// Returns `true` if a handler cancelled. Handlers after the cancelling
    /// one are not called; a failing handler does not cancel.
    pub fn emit_pre_dispatch(&self, info: &DispatchInfo, nodes: &[NodeRef]) -> bool {
        for handler in &self.pre_dispatch {
            match handler(info, nodes) {
                Ok(true) => {
                    info!("dispatch cancelled by pre-dispatch hook");
                    return true;
                }
                Ok(false) => {}
                Err(err) => error!(error = %err, "pre-dispatch hook failed; ignoring"),
            }
        }
        false
    }

    pub fn emit_dispatch(&self, info: &DispatchInfo, nodes: &[NodeRef]) {
        for handler in &self.dispatch {
            if let Err(err) = handler(info, nodes) {
                error!(error = %err, "dispatch hook failed; ignoring");
            }
        }
    }

    pub fn emit_post_dispatch(&self, info: &DispatchInfo, nodes: &[NodeRef], successful: bool) {
        for handler in &self.post_dispatch {
            if let Err(err) = handler(info, nodes, successful) {
                error!(error = %err, "post-dispatch hook failed; ignoring");
            }
        }
    }
}

/// Fires post-dispatch when dropped.
///
/// The dispatch counts as successful only if [`PostDispatchGuard::succeed`]
/// was called; early returns, errors and panics all report failure.
pub(crate) struct PostDispatchGuard {
    hooks: Arc<DispatchHooks>,
    info: DispatchInfo,
    nodes: Vec<NodeRef>,
    successful: bool,
}

impl PostDispatchGuard {
    pub(crate) fn new(hooks: Arc<DispatchHooks>, info: DispatchInfo, nodes: &[NodeRef]) -> Self {
        Self {
            hooks,
            info,
            nodes: nodes.to_vec(),
            successful: false,
        }
    }

    pub(crate) fn info(&self) -> &DispatchInfo {
        &self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut DispatchInfo {
        &mut self.info
    }

    pub(crate) fn succeed(mut self) {
        self.successful = true;
    }
}

impl Drop for PostDispatchGuard {
    fn drop(&mut self) {
        let successful = self.successful && !std::thread::panicking();
        self.hooks
            .emit_post_dispatch(&self.info, &self.nodes, successful);
    }
}
