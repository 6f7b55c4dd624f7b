mod common;
use crate::common::{TestResult, batches_of, init_tracing, pre_task_names, root_tasks};

use taskdispatch::batch::{GraphBuilder, execute_and_prune_immediate};
use taskdispatch::errors::DispatchError;
use taskdispatch_test_utils::builders::{ExecutionLog, TestNodeBuilder, request};

#[test]
fn immediate_batch_and_its_pre_tasks_run_once_and_are_pruned() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let p = TestNodeBuilder::new("P").log(&log).build();
    let x = TestNodeBuilder::new("X").immediate().log(&log).build();
    let n = TestNodeBuilder::new("N").log(&log).build();
    x.add_pre_task(&p);
    n.add_pre_task(&x);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&n, 1.0))?;
    let mut graph = builder.into_graph();

    let root = graph.root();
    execute_and_prune_immediate(&mut graph, root, false)?;

    assert_eq!(log.tasks(), vec!["P", "X"]);
    assert_eq!(root_tasks(&graph), vec!["N"]);

    let n_batch = batches_of(&graph, "N")[0];
    assert!(pre_task_names(&graph, n_batch).is_empty());
    assert!(batches_of(&graph, "X").is_empty(), "X is no longer reachable");
    Ok(())
}

#[test]
fn shared_pre_task_of_two_immediate_batches_runs_once() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let p = TestNodeBuilder::new("P").log(&log).build();
    let x = TestNodeBuilder::new("X").immediate().log(&log).build();
    let y = TestNodeBuilder::new("Y").immediate().log(&log).build();
    let n = TestNodeBuilder::new("N").log(&log).build();
    x.add_pre_task(&p);
    y.add_pre_task(&p);
    n.add_pre_task(&x);
    n.add_pre_task(&y);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&n, 1.0))?;
    let mut graph = builder.into_graph();

    let root = graph.root();
    execute_and_prune_immediate(&mut graph, root, false)?;

    assert_eq!(log.tasks(), vec!["P", "X", "Y"]);
    let n_batch = batches_of(&graph, "N")[0];
    assert!(pre_task_names(&graph, n_batch).is_empty());
    Ok(())
}

#[test]
fn dependents_of_an_immediate_batch_are_not_forced() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let x = TestNodeBuilder::new("X").immediate().log(&log).build();
    let after = TestNodeBuilder::new("After").log(&log).build();
    x.add_post_task(&after);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&x, 1.0))?;
    let mut graph = builder.into_graph();

    let root = graph.root();
    execute_and_prune_immediate(&mut graph, root, false)?;

    assert_eq!(log.tasks(), vec!["X"]);
    assert_eq!(root_tasks(&graph), vec!["After"]);
    let after_batch = batches_of(&graph, "After")[0];
    assert!(pre_task_names(&graph, after_batch).is_empty());
    Ok(())
}

#[test]
fn all_immediate_graph_leaves_an_empty_root() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let x = TestNodeBuilder::new("X").immediate().batch_size(2).log(&log).build();

    let mut builder = GraphBuilder::new();
    for frame in [1.0, 2.0, 3.0] {
        builder.add_request(request(&x, frame))?;
    }
    let mut graph = builder.into_graph();

    let root = graph.root();
    execute_and_prune_immediate(&mut graph, root, false)?;

    assert!(graph.batch(root).pre_tasks().is_empty());
    assert_eq!(log.frames_of("X"), vec![vec![1.0, 2.0], vec![3.0]]);
    Ok(())
}

#[test]
fn no_op_immediate_batches_execute_without_calling_the_task() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let x = TestNodeBuilder::new("X").immediate().no_op().log(&log).build();

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&x, 1.0))?;
    let mut graph = builder.into_graph();

    let root = graph.root();
    execute_and_prune_immediate(&mut graph, root, false)?;

    assert!(log.is_empty());
    assert!(graph.batch(root).pre_tasks().is_empty());
    Ok(())
}

#[test]
fn failing_immediate_task_stops_the_walk() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let bad = TestNodeBuilder::new("Bad").immediate().failing().log(&log).build();
    let later = TestNodeBuilder::new("Later").immediate().log(&log).build();

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&bad, 1.0))?;
    builder.add_request(request(&later, 1.0))?;
    let mut graph = builder.into_graph();

    let root = graph.root();
    match execute_and_prune_immediate(&mut graph, root, false) {
        Err(DispatchError::Execution { task, .. }) => assert_eq!(task, "Bad"),
        other => panic!("expected Execution error, got {other:?}"),
    }
    assert_eq!(log.tasks(), vec!["Bad"]);
    Ok(())
}

#[test]
fn shared_pre_task_first_reached_from_a_regular_batch_still_runs_early() -> TestResult {
    init_tracing();

    let log = ExecutionLog::new();
    let p = TestNodeBuilder::new("P").log(&log).build();
    let y = TestNodeBuilder::new("Y").log(&log).build();
    let x = TestNodeBuilder::new("X").immediate().log(&log).build();
    y.add_pre_task(&p);
    x.add_pre_task(&p);

    let mut builder = GraphBuilder::new();
    builder.add_request(request(&y, 1.0))?;
    builder.add_request(request(&x, 1.0))?;
    let mut graph = builder.into_graph();

    let root = graph.root();
    execute_and_prune_immediate(&mut graph, root, false)?;

    assert_eq!(log.tasks(), vec!["P", "X"]);
    assert_eq!(root_tasks(&graph), vec!["Y"]);
    let y_batch = batches_of(&graph, "Y")[0];
    assert!(pre_task_names(&graph, y_batch).is_empty());
    Ok(())
}
