// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::context::ContextValue;
use crate::types::FramesModeKind;

/// Job file exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [dispatch]
/// backend = "local"
/// frames_mode = "full"
/// frame_range = [1, 10]
/// job_name = "shot010"
/// jobs_directory = "jobs"
///
/// [context]
/// shot = "sh010"
///
/// [node.render]
/// cmd = "render ${shot} ####"
/// pre_tasks = ["prep"]
/// batch_size = 5
///
/// [node.prep]
/// cmd = "mkdir -p ${dispatcher:jobDirectory}/out"
/// immediate = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub dispatch: DispatchSection,

    /// Variables of the base context.
    #[serde(default)]
    pub context: BTreeMap<String, ContextValue>,

    /// All nodes from `[node.<name>]`, keyed by name.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// Validated job file. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub dispatch: DispatchSection,
    pub context: BTreeMap<String, ContextValue>,
    pub node: BTreeMap<String, NodeConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        dispatch: DispatchSection,
        context: BTreeMap<String, ContextValue>,
        node: BTreeMap<String, NodeConfig>,
    ) -> Self {
        Self {
            dispatch,
            context,
            node,
        }
    }
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DispatchSection {
    /// Backend name; the registry default when unset.
    #[serde(default)]
    pub backend: Option<String>,

    #[serde(default)]
    pub frames_mode: FramesModeKind,

    /// Explicit frames for `frames_mode = "custom"`.
    #[serde(default)]
    pub frames: Vec<f32>,

    /// Current frame of the base context.
    #[serde(default)]
    pub frame: Option<f32>,

    /// Inclusive `[start, end]` for `frames_mode = "full"`.
    #[serde(default)]
    pub frame_range: Option<[i64; 2]>,

    #[serde(default)]
    pub job_name: String,

    /// Parent of the numbered job directories. Relative paths are resolved
    /// against the config file's directory.
    #[serde(default)]
    pub jobs_directory: Option<PathBuf>,

    /// Session owning the nodes. Defaults to the config file stem.
    #[serde(default)]
    pub session: Option<String>,
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Shell command run once per frame. Empty means the node does no work
    /// itself and only groups its dependencies.
    #[serde(default)]
    pub cmd: String,

    #[serde(default)]
    pub pre_tasks: Vec<String>,

    #[serde(default)]
    pub post_tasks: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub immediate: bool,

    /// Run all frames of a batch as one ordered sequence.
    #[serde(default)]
    pub sequence: bool,
}

fn default_batch_size() -> usize {
    1
}
