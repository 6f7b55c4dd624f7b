#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use taskdispatch::config::{ConfigFile, DispatchSection, NodeConfig, RawConfigFile};
use taskdispatch::context::{Context, ContextValue};
use taskdispatch::hash::{TaskHash, TaskHasher};
use taskdispatch::task::{DispatchSettings, NodeRef, TaskNode, TaskRequest};
use taskdispatch::types::FramesModeKind;

/// One call to `execute_sequence`, as seen by a [`TestNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub task: String,
    pub frames: Vec<f32>,
}

/// Shared, ordered record of executions across test nodes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<Execution>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task: &str, frames: &[f32]) {
        self.entries.lock().unwrap().push(Execution {
            task: task.to_string(),
            frames: frames.to_vec(),
        });
    }

    pub fn entries(&self) -> Vec<Execution> {
        self.entries.lock().unwrap().clone()
    }

    /// Task names in execution order.
    pub fn tasks(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.task).collect()
    }

    /// Frames executed for `task`, one entry per call.
    pub fn frames_of(&self, task: &str) -> Vec<Vec<f32>> {
        self.entries()
            .into_iter()
            .filter(|e| e.task == task)
            .map(|e| e.frames)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// Hash of name, context and frame: every frame is distinct work.
    PerFrame,
    /// Hash of the name only: all frames are the same work.
    Constant,
    /// Null hash: nothing to do.
    NoOp,
}

/// Configurable in-memory task used throughout the tests.
///
/// Dependencies are held weakly so tests can build cycles without leaking;
/// the test keeps the `Arc`s alive.
pub struct TestNode {
    name: String,
    session: Option<String>,
    is_task: bool,
    hash_mode: HashMode,
    settings: DispatchSettings,
    sequence: bool,
    fail: bool,
    log: ExecutionLog,
    pre_tasks: Mutex<Vec<Weak<TestNode>>>,
    post_tasks: Mutex<Vec<Weak<TestNode>>>,
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestNode")
            .field("name", &self.name)
            .field("hash_mode", &self.hash_mode)
            .finish_non_exhaustive()
    }
}

impl TestNode {
    pub fn add_pre_task(&self, node: &Arc<TestNode>) {
        self.pre_tasks.lock().unwrap().push(Arc::downgrade(node));
    }

    pub fn add_post_task(&self, node: &Arc<TestNode>) {
        self.post_tasks.lock().unwrap().push(Arc::downgrade(node));
    }

    fn requests(list: &Mutex<Vec<Weak<TestNode>>>, context: &Context) -> Vec<TaskRequest> {
        list.lock()
            .unwrap()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|node| TaskRequest::new(node, context.clone()))
            .collect()
    }
}

impl TaskNode for TestNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn is_task(&self) -> bool {
        self.is_task
    }

    fn settings(&self) -> DispatchSettings {
        self.settings.clone()
    }

    fn hash(&self, context: &Context) -> TaskHash {
        match self.hash_mode {
            HashMode::NoOp => TaskHash::NULL,
            HashMode::Constant => TaskHasher::new().update_str(&self.name).finish(),
            HashMode::PerFrame => TaskHasher::new()
                .update_str(&self.name)
                .update_hash(&context.hash())
                .finish(),
        }
    }

    fn pre_tasks(&self, context: &Context) -> Vec<TaskRequest> {
        Self::requests(&self.pre_tasks, context)
    }

    fn post_tasks(&self, context: &Context) -> Vec<TaskRequest> {
        Self::requests(&self.post_tasks, context)
    }

    fn requires_sequence_execution(&self) -> bool {
        self.sequence
    }

    fn execute_sequence(&self, _context: &Context, frames: &[f32]) -> anyhow::Result<()> {
        self.log.record(&self.name, frames);
        if self.fail {
            anyhow::bail!("{} failed on frames {:?}", self.name, frames);
        }
        Ok(())
    }
}

/// Builder for [`TestNode`]. Nodes default to session `"test"`, one frame
/// per batch, and a per-frame hash.
pub struct TestNodeBuilder {
    name: String,
    session: Option<String>,
    is_task: bool,
    hash_mode: HashMode,
    settings: DispatchSettings,
    sequence: bool,
    fail: bool,
    log: ExecutionLog,
}

impl TestNodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            session: Some("test".to_string()),
            is_task: true,
            hash_mode: HashMode::PerFrame,
            settings: DispatchSettings::default(),
            sequence: false,
            fail: false,
            log: ExecutionLog::new(),
        }
    }

    pub fn log(mut self, log: &ExecutionLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn session(mut self, session: Option<&str>) -> Self {
        self.session = session.map(str::to_string);
        self
    }

    pub fn not_a_task(mut self) -> Self {
        self.is_task = false;
        self
    }

    pub fn hash_mode(mut self, mode: HashMode) -> Self {
        self.hash_mode = mode;
        self
    }

    pub fn no_op(self) -> Self {
        self.hash_mode(HashMode::NoOp)
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.settings.batch_size = size;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.settings.immediate = true;
        self
    }

    pub fn sequence(mut self) -> Self {
        self.sequence = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn build(self) -> Arc<TestNode> {
        Arc::new(TestNode {
            name: self.name,
            session: self.session,
            is_task: self.is_task,
            hash_mode: self.hash_mode,
            settings: self.settings,
            sequence: self.sequence,
            fail: self.fail,
            log: self.log,
            pre_tasks: Mutex::new(Vec::new()),
            post_tasks: Mutex::new(Vec::new()),
        })
    }
}

/// Upcast test nodes for the dispatcher API.
pub fn node_refs(nodes: &[&Arc<TestNode>]) -> Vec<NodeRef> {
    nodes.iter().map(|n| (*n).clone() as NodeRef).collect()
}

/// A request for `node` at `frame` in an otherwise empty context.
pub fn request(node: &Arc<TestNode>, frame: f32) -> TaskRequest {
    TaskRequest::new(node.clone(), Context::empty().with_frame(frame))
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                dispatch: DispatchSection::default(),
                context: BTreeMap::new(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.config.node.insert(name.to_string(), node);
        self
    }

    pub fn with_context(mut self, name: &str, value: impl Into<ContextValue>) -> Self {
        self.config.context.insert(name.to_string(), value.into());
        self
    }

    pub fn with_frames(mut self, frames: &[f32]) -> Self {
        self.config.dispatch.frames_mode = FramesModeKind::Custom;
        self.config.dispatch.frames = frames.to_vec();
        self
    }

    pub fn with_frame_range(mut self, start: i64, end: i64) -> Self {
        self.config.dispatch.frames_mode = FramesModeKind::Full;
        self.config.dispatch.frame_range = Some([start, end]);
        self
    }

    pub fn with_job_name(mut self, name: &str) -> Self {
        self.config.dispatch.job_name = name.to_string();
        self
    }

    pub fn with_backend(mut self, name: &str) -> Self {
        self.config.dispatch.backend = Some(name.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            node: NodeConfig {
                cmd: cmd.to_string(),
                pre_tasks: vec![],
                post_tasks: vec![],
                batch_size: 1,
                immediate: false,
                sequence: false,
            },
        }
    }

    pub fn pre_task(mut self, dep: &str) -> Self {
        self.node.pre_tasks.push(dep.to_string());
        self
    }

    pub fn post_task(mut self, dep: &str) -> Self {
        self.node.post_tasks.push(dep.to_string());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.node.batch_size = size;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.node.immediate = true;
        self
    }

    pub fn sequence(mut self) -> Self {
        self.node.sequence = true;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}
