mod common;
use crate::common::{TestResult, init_tracing};

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tempfile::tempdir;

use taskdispatch::cli::CliArgs;
use taskdispatch::errors::DispatchError;
use taskdispatch::run;

fn write_job(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("shot.toml");
    fs::write(&path, contents).expect("write job file");
    path
}

fn args(config: &Path, extra: &[&str]) -> CliArgs {
    let mut argv = vec!["taskdispatch", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(extra);
    CliArgs::try_parse_from(argv).expect("valid arguments")
}

fn dispatch_error(err: &anyhow::Error) -> &DispatchError {
    err.downcast_ref::<DispatchError>()
        .unwrap_or_else(|| panic!("expected a DispatchError, got {err:?}"))
}

#[test]
fn cyclic_job_file_fails_with_a_graph_cycle() -> TestResult {
    init_tracing();

    let tmp = tempdir()?;
    let path = write_job(
        tmp.path(),
        r#"
[node.a]
cmd = "echo a"
pre_tasks = ["b"]

[node.b]
cmd = "echo b"
pre_tasks = ["a"]
"#,
    );

    let err = run(args(&path, &["--node", "a", "--backend", "null"])).unwrap_err();
    match dispatch_error(&err) {
        DispatchError::GraphCycle { task } => assert!(task == "a" || task == "b"),
        other => panic!("expected GraphCycle, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_node_or_backend_is_rejected() -> TestResult {
    init_tracing();

    let tmp = tempdir()?;
    let path = write_job(tmp.path(), "[node.a]\ncmd = \"echo a\"\n");

    let err = run(args(&path, &["--node", "missing"])).unwrap_err();
    assert!(matches!(dispatch_error(&err), DispatchError::Validation(_)));

    let err = run(args(&path, &["--backend", "tractor"])).unwrap_err();
    assert!(matches!(dispatch_error(&err), DispatchError::Config(_)));
    Ok(())
}

#[test]
fn dry_run_creates_no_job_directory() -> TestResult {
    init_tracing();

    let tmp = tempdir()?;
    let path = write_job(
        tmp.path(),
        r#"
[dispatch]
job_name = "shot"

[node.a]
cmd = "echo a ####"
batch_size = 2
"#,
    );

    run(args(&path, &["--dry-run", "--frames", "1,2,3"]))?;
    assert!(!tmp.path().join("shot").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn local_dispatch_runs_commands_inside_the_job_directory() -> TestResult {
    init_tracing();

    let tmp = tempdir()?;
    let path = write_job(
        tmp.path(),
        r#"
[dispatch]
job_name = "shot"
frames_mode = "custom"
frames = [1.0, 2.0]

[context]
prefix = "beauty"

[node.prep]
cmd = "mkdir -p ${dispatcher:jobDirectory}/out"
immediate = true

[node.render]
cmd = "touch ${dispatcher:jobDirectory}/out/${prefix}.####"
pre_tasks = ["prep"]
batch_size = 2
"#,
    );

    run(args(&path, &[]))?;

    let out = tmp.path().join("shot").join("000000").join("out");
    assert!(out.join("beauty.0001").exists());
    assert!(out.join("beauty.0002").exists());

    // A second dispatch gets the next job directory.
    run(args(&path, &["--frames", "3"]))?;
    let out = tmp.path().join("shot").join("000001").join("out");
    assert!(out.join("beauty.0003").exists());
    Ok(())
}
