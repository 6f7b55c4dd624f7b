// src/exec/command.rs

use std::fmt;
use std::process::Command;
use std::sync::{Arc, OnceLock, Weak};

use anyhow::{Context as _, Result, bail};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::hash::TaskHash;
use crate::task::{DispatchSettings, TaskNode, TaskRequest};

/// Dependencies of a [`CommandNode`], set once after every node of a session
/// exists. Held weakly so that cyclic configurations do not leak.
#[derive(Debug, Default)]
struct NodeLinks {
    pre_tasks: Vec<Weak<CommandNode>>,
    post_tasks: Vec<Weak<CommandNode>>,
}

/// A task that runs a shell command once per frame.
///
/// The command may reference context variables as `${name}`, and runs of
/// `#` expand to the zero-padded frame number.
pub struct CommandNode {
    name: String,
    session: String,
    cmd: String,
    settings: DispatchSettings,
    sequence: bool,
    links: OnceLock<NodeLinks>,
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("session", &self.session)
            .field("cmd", &self.cmd)
            .field("settings", &self.settings)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl CommandNode {
    pub fn new(
        name: impl Into<String>,
        session: impl Into<String>,
        cmd: impl Into<String>,
        settings: DispatchSettings,
        sequence: bool,
    ) -> Self {
        Self {
            name: name.into(),
            session: session.into(),
            cmd: cmd.into(),
            settings,
            sequence,
            links: OnceLock::new(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// Attach dependencies. Only the first call has an effect.
    pub fn link(&self, pre_tasks: &[Arc<CommandNode>], post_tasks: &[Arc<CommandNode>]) {
        let links = NodeLinks {
            pre_tasks: pre_tasks.iter().map(Arc::downgrade).collect(),
            post_tasks: post_tasks.iter().map(Arc::downgrade).collect(),
        };
        if self.links.set(links).is_err() {
            warn!(task = %self.name, "dependencies already linked; ignoring");
        }
    }

    fn requests(&self, nodes: &[Weak<CommandNode>], context: &Context) -> Vec<TaskRequest> {
        nodes
            .iter()
            .filter_map(|weak| match weak.upgrade() {
                Some(node) => Some(TaskRequest::new(node, context.clone())),
                None => {
                    warn!(task = %self.name, "linked task no longer exists; skipping");
                    None
                }
            })
            .collect()
    }

    fn run_frame(&self, context: &Context, frame: f32) -> Result<()> {
        let frame_context = context.with_frame(frame);
        let line = frame_context.substitute(&self.cmd);
        info!(task = %self.name, frame, cmd = %line, "running command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };

        let output = cmd
            .output()
            .with_context(|| format!("spawning process for task '{}'", self.name))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(task = %self.name, "stdout: {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(task = %self.name, "stderr: {}", line);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            bail!("command exited with status {code} on frame {frame}");
        }
        Ok(())
    }
}

impl TaskNode for CommandNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn session(&self) -> Option<&str> {
        Some(self.session.as_str())
    }

    fn settings(&self) -> DispatchSettings {
        self.settings.clone()
    }

    fn hash(&self, context: &Context) -> TaskHash {
        if self.cmd.trim().is_empty() {
            return TaskHash::NULL;
        }
        TaskHash::of(context.substitute(&self.cmd).as_bytes())
    }

    fn pre_tasks(&self, context: &Context) -> Vec<TaskRequest> {
        match self.links.get() {
            Some(links) => self.requests(&links.pre_tasks, context),
            None => Vec::new(),
        }
    }

    fn post_tasks(&self, context: &Context) -> Vec<TaskRequest> {
        match self.links.get() {
            Some(links) => self.requests(&links.post_tasks, context),
            None => Vec::new(),
        }
    }

    fn requires_sequence_execution(&self) -> bool {
        self.sequence
    }

    fn execute_sequence(&self, context: &Context, frames: &[f32]) -> Result<()> {
        for &frame in frames {
            self.run_frame(context, frame)?;
        }
        Ok(())
    }
}
