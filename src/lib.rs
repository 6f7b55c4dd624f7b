// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod task;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::batch::plan;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::Session;
use crate::dispatch::{BackendRegistry, DispatchHooks, Dispatcher, FramesMode};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - job file loading and validation
/// - session and node construction
/// - backend selection from the registry
/// - the dispatcher itself (or a plan printout for `--dry-run`)
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let registry = BackendRegistry::with_builtin();
    let session = Session::from_config(
        &cfg,
        &session_name(&config_path),
        &config_root_dir(&config_path),
        &registry,
    );

    let nodes = if args.nodes.is_empty() {
        session.terminal_nodes()
    } else {
        session.nodes_named(&args.nodes)?
    };
    let frames = frames_mode(&args, &cfg, &session);

    let backend_name = args
        .backend
        .as_deref()
        .or(session.backend())
        .or(registry.default_backend())
        .ok_or_else(|| anyhow!("no backend configured and no default registered"))?
        .to_string();
    let backend = registry.create(&backend_name)?;

    let mut hooks = DispatchHooks::new();
    hooks.on_post_dispatch(|info, nodes, successful| {
        if successful {
            info!(job_directory = ?info.job_directory, nodes = nodes.len(), "dispatch succeeded");
        } else {
            warn!(job_directory = ?info.job_directory, "dispatch did not complete");
        }
        Ok(())
    });

    let mut dispatcher = Dispatcher::new(backend)
        .with_hooks(hooks)
        .with_settings(session.dispatcher_settings().clone())
        .with_context(session.base_context().clone());

    if args.dry_run {
        print_dry_run(&dispatcher, &session, &nodes, &frames, &backend_name)?;
        return Ok(());
    }

    info!(
        session = %session.name(),
        backend = %backend_name,
        nodes = nodes.len(),
        "starting dispatch"
    );
    dispatcher.dispatch(&nodes, &frames)?;
    Ok(())
}

/// Session name: the config file stem, e.g. `shot010` for `shot010.toml`.
fn session_name(config_path: &Path) -> String {
    config_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "taskdispatch".to_string())
}

/// Directory relative `jobs_directory` entries are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "jobs/shot.toml"), that
///   directory is used.
/// - A bare filename like "Taskdispatch.toml" falls back to the current
///   working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// `--frames` wins over `--frames-mode`, which wins over the job file.
fn frames_mode(args: &CliArgs, cfg: &ConfigFile, session: &Session) -> FramesMode {
    if !args.frames.is_empty() {
        return FramesMode::CustomRange(args.frames.clone());
    }
    match args.frames_mode {
        Some(kind) => FramesMode::from_kind(kind, &cfg.dispatch.frames),
        None => session.frames_mode().clone(),
    }
}

fn print_dry_run(
    dispatcher: &Dispatcher,
    session: &Session,
    nodes: &[task::NodeRef],
    frames: &FramesMode,
    backend_name: &str,
) -> Result<()> {
    let graph = dispatcher.plan(nodes, frames)?;
    let planned = plan::describe(&graph)?;
    let hash = dispatcher.plan_hash(nodes, frames)?;

    println!("taskdispatch dry-run");
    println!("  session = {}", session.name());
    println!("  backend = {backend_name}");
    println!(
        "  nodes = [{}]",
        nodes.iter().map(|n| n.name()).collect::<Vec<_>>().join(", ")
    );
    println!("  frames = {:?}", frames.resolve(dispatcher.context())?);
    println!("  plan hash = {hash}");
    println!();
    println!("batches ({}):", planned.len());
    for line in plan::render(&planned).lines() {
        println!("  {line}");
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
