mod common;
use crate::common::{TestResult, init_tracing};

use std::sync::Arc;

use taskdispatch::batch::GraphBuilder;
use taskdispatch::context::Context;
use taskdispatch::dispatch::BackendRegistry;
use taskdispatch::errors::DispatchError;
use taskdispatch::exec::{Backend, CommandNode, LOCAL_EXECUTED, LocalBackend, NullBackend};
use taskdispatch::hash::TaskHash;
use taskdispatch::task::{DispatchSettings, TaskNode};
use taskdispatch_test_utils::builders::{ExecutionLog, TestNodeBuilder, request};
use taskdispatch_test_utils::fake_backend::RecordingBackend;

#[test]
fn builtin_registry_offers_local_and_null() -> TestResult {
    init_tracing();

    let registry = BackendRegistry::with_builtin();
    assert_eq!(registry.registered(), vec!["local", "null"]);
    assert_eq!(registry.default_backend(), Some("local"));
    assert_eq!(registry.create("null")?.name(), "null");
    assert_eq!(registry.create("local")?.name(), "local");
    Ok(())
}

#[test]
fn registry_register_replace_and_deregister() -> TestResult {
    init_tracing();

    let mut registry = BackendRegistry::new();
    assert!(registry.default_backend().is_none());

    registry.register("farm", || Box::new(NullBackend), None);
    registry.register("farm", || Box::new(RecordingBackend::new()), None);
    assert_eq!(registry.registered(), vec!["farm"]);
    assert_eq!(registry.create("farm")?.name(), "recording");

    registry.set_default_backend("farm")?;
    assert_eq!(registry.default_backend(), Some("farm"));

    registry.deregister("farm");
    registry.deregister("never-registered");
    assert!(!registry.contains("farm"));
    assert!(registry.default_backend().is_none());
    Ok(())
}

#[test]
fn unknown_backends_are_config_errors() {
    init_tracing();

    let mut registry = BackendRegistry::with_builtin();
    match registry.create("tractor") {
        Err(DispatchError::Config(msg)) => {
            assert!(msg.contains("tractor"));
            assert!(msg.contains("local, null"));
        }
        Err(other) => panic!("expected Config error, got {other:?}"),
        Ok(_) => panic!("expected Config error, got a backend"),
    }
    assert!(matches!(
        registry.set_default_backend("tractor"),
        Err(DispatchError::Config(_))
    ));
    assert_eq!(registry.default_backend(), Some("local"));
}

#[test]
fn local_backend_runs_pre_tasks_first_and_each_batch_once() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let shared = TestNodeBuilder::new("Shared").log(&log).build();
    let a = TestNodeBuilder::new("A").log(&log).build();
    let b = TestNodeBuilder::new("B").log(&log).build();
    a.add_pre_task(&shared);
    b.add_pre_task(&shared);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&a, 1.0))?;
    builder.add_request(request(&b, 1.0))?;
    let mut graph = builder.into_graph();

    let mut backend = LocalBackend::new();
    backend.run_batches(&mut graph)?;

    assert_eq!(log.tasks(), vec!["Shared", "A", "B"]);
    assert_eq!(backend.batches_run(), 3);

    for id in graph.reachable() {
        assert!(graph.batch(id).blind_data().contains_key(LOCAL_EXECUTED));
    }

    // Batches already marked are not run again.
    backend.run_batches(&mut graph)?;
    assert_eq!(log.tasks().len(), 3);
    assert_eq!(backend.batches_run(), 3);
    Ok(())
}

#[test]
fn local_backend_skips_no_op_batches() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let group = TestNodeBuilder::new("Group").no_op().log(&log).build();
    let leaf = TestNodeBuilder::new("Leaf").log(&log).build();
    group.add_pre_task(&leaf);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&group, 1.0))?;
    builder.add_request(request(&group, 2.0))?;
    let mut graph = builder.into_graph();

    let mut backend = LocalBackend::new();
    backend.run_batches(&mut graph)?;

    assert_eq!(log.tasks(), vec!["Leaf", "Leaf"]);
    assert_eq!(backend.batches_run(), 2);
    Ok(())
}

#[test]
fn local_backend_stops_on_the_first_failure() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let bad = TestNodeBuilder::new("Bad").failing().log(&log).build();
    let after = TestNodeBuilder::new("After").log(&log).build();
    after.add_pre_task(&bad);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&after, 1.0))?;
    let mut graph = builder.into_graph();

    let result = LocalBackend::new().run_batches(&mut graph);

    match result {
        Err(DispatchError::Execution { task, .. }) => assert_eq!(task, "Bad"),
        other => panic!("expected Execution error, got {other:?}"),
    }
    assert_eq!(log.tasks(), vec!["Bad"]);
    Ok(())
}

#[test]
fn null_backend_executes_nothing() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let node = TestNodeBuilder::new("N").log(&log).build();

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&node, 1.0))?;
    let mut graph = builder.into_graph();

    NullBackend.run_batches(&mut graph)?;
    assert!(log.is_empty());
    Ok(())
}

fn command(name: &str, cmd: &str) -> Arc<CommandNode> {
    Arc::new(CommandNode::new(
        name,
        "session",
        cmd,
        DispatchSettings::default(),
        false,
    ))
}

#[test]
fn command_hash_follows_the_substituted_command() {
    init_tracing();

    let mut context = Context::new();
    context.set("shot", "sh010");

    let per_frame = command("render", "render ${shot} ####");
    assert_ne!(
        per_frame.hash(&context.with_frame(1.0)),
        per_frame.hash(&context.with_frame(2.0))
    );

    let once = command("notify", "notify ${shot}");
    assert_eq!(
        once.hash(&context.with_frame(1.0)),
        once.hash(&context.with_frame(2.0))
    );

    let blank = command("group", "   ");
    assert_eq!(blank.hash(&context), TaskHash::NULL);
}

#[test]
fn command_links_become_requests_in_the_same_context() {
    init_tracing();

    let prep = command("prep", "echo prep");
    let render = command("render", "echo render");
    let movie = command("movie", "echo movie");
    render.link(&[prep.clone()], &[movie.clone()]);
    // Later links are ignored.
    render.link(&[], &[]);

    let context = Context::new().with_frame(4.0);
    let pre = render.pre_tasks(&context);
    let post = render.post_tasks(&context);

    assert_eq!(pre.len(), 1);
    assert_eq!(pre[0].node().name(), "prep");
    assert_eq!(pre[0].frame(), 4.0);
    assert_eq!(post.len(), 1);
    assert_eq!(post[0].node().name(), "movie");
    assert!(prep.pre_tasks(&context).is_empty());
}

#[cfg(unix)]
#[test]
fn command_node_runs_through_the_shell() -> TestResult {
    init_tracing();

    let tmp = tempfile::tempdir()?;
    let mut context = Context::new();
    context.set("out", tmp.path().to_string_lossy().into_owned());

    let touch = command("touch", "touch ${out}/frame.##");
    touch.execute_sequence(&context, &[1.0, 2.0])?;

    assert!(tmp.path().join("frame.01").exists());
    assert!(tmp.path().join("frame.02").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn failing_command_reports_its_frame() {
    init_tracing();

    let fail = command("fail", "exit 3");
    let err = fail.execute_sequence(&Context::new(), &[5.0]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("status 3"), "{msg}");
    assert!(msg.contains("frame 5"), "{msg}");
}
