// src/config/session.rs

//! Turning a validated job file into dispatchable nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::context::Context;
use crate::dispatch::frames::{FRAME_RANGE_END, FRAME_RANGE_START, FramesMode};
use crate::dispatch::{BackendRegistry, DispatcherSettings};
use crate::errors::{DispatchError, Result};
use crate::exec::CommandNode;
use crate::task::{DispatchSettings, NodeRef};

/// All nodes of one job file, sharing a session name.
#[derive(Debug)]
pub struct Session {
    name: String,
    nodes: BTreeMap<String, Arc<CommandNode>>,
    /// Names listed as a pre-task by some other node.
    referenced: BTreeSet<String>,
    context: Context,
    frames_mode: FramesMode,
    backend: Option<String>,
    settings: DispatcherSettings,
}

impl Session {
    /// Build the session's nodes. `default_name` is used when the file does
    /// not name its session; `config_dir` anchors a relative jobs directory.
    pub fn from_config(
        cfg: &ConfigFile,
        default_name: &str,
        config_dir: &Path,
        registry: &BackendRegistry,
    ) -> Self {
        let name = cfg
            .dispatch
            .session
            .clone()
            .unwrap_or_else(|| default_name.to_string());

        let nodes: BTreeMap<String, Arc<CommandNode>> = cfg
            .node
            .iter()
            .map(|(node_name, node_cfg)| {
                let mut settings = DispatchSettings {
                    batch_size: node_cfg.batch_size,
                    immediate: node_cfg.immediate,
                    ..DispatchSettings::default()
                };
                registry.setup_settings(&mut settings);
                let node = CommandNode::new(
                    node_name.clone(),
                    name.clone(),
                    node_cfg.cmd.clone(),
                    settings,
                    node_cfg.sequence,
                );
                (node_name.clone(), Arc::new(node))
            })
            .collect();

        // References were checked during validation.
        let lookup = |names: &[String]| -> Vec<Arc<CommandNode>> {
            names.iter().filter_map(|n| nodes.get(n).cloned()).collect()
        };
        for (node_name, node_cfg) in cfg.node.iter() {
            if let Some(node) = nodes.get(node_name) {
                node.link(&lookup(&node_cfg.pre_tasks), &lookup(&node_cfg.post_tasks));
            }
        }

        let referenced = cfg
            .node
            .values()
            .flat_map(|n| n.pre_tasks.iter().cloned())
            .collect();

        let mut context = Context::new();
        for (key, value) in cfg.context.iter() {
            context.set(key.clone(), value.clone());
        }
        if let Some(frame) = cfg.dispatch.frame {
            context.set_frame(frame);
        }
        if let Some([start, end]) = cfg.dispatch.frame_range {
            context.set(FRAME_RANGE_START, start);
            context.set(FRAME_RANGE_END, end);
        }

        let jobs_directory = match &cfg.dispatch.jobs_directory {
            Some(dir) if dir.is_relative() => config_dir.join(dir),
            Some(dir) => dir.clone(),
            None => config_dir.to_path_buf(),
        };

        debug!(session = %name, nodes = nodes.len(), "session created");

        Self {
            name,
            nodes,
            referenced,
            context,
            frames_mode: FramesMode::from_kind(cfg.dispatch.frames_mode, &cfg.dispatch.frames),
            backend: cfg.dispatch.backend.clone(),
            settings: DispatcherSettings {
                job_name: cfg.dispatch.job_name.clone(),
                jobs_directory,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, name: &str) -> Option<NodeRef> {
        self.nodes.get(name).map(|n| n.clone() as NodeRef)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Look up several nodes, failing on the first unknown name.
    pub fn nodes_named(&self, names: &[String]) -> Result<Vec<NodeRef>> {
        names
            .iter()
            .map(|name| {
                self.node(name).ok_or_else(|| {
                    DispatchError::Validation(format!("unknown node '{name}'"))
                })
            })
            .collect()
    }

    /// Nodes no other node lists as a pre-task, in name order.
    pub fn terminal_nodes(&self) -> Vec<NodeRef> {
        self.nodes
            .iter()
            .filter(|(name, _)| !self.referenced.contains(*name))
            .map(|(_, node)| node.clone() as NodeRef)
            .collect()
    }

    /// Base context built from `[context]` and the frame settings.
    pub fn base_context(&self) -> &Context {
        &self.context
    }

    pub fn frames_mode(&self) -> &FramesMode {
        &self.frames_mode
    }

    /// Backend named in the file, if any.
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    pub fn dispatcher_settings(&self) -> &DispatcherSettings {
        &self.settings
    }
}
