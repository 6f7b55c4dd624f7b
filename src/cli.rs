// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::FramesModeKind;

/// Command-line arguments for `taskdispatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdispatch",
    version,
    about = "Batch per-frame tasks into a dependency graph and dispatch it to a backend.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the job file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Taskdispatch.toml")]
    pub config: String,

    /// Node to dispatch. Repeatable.
    ///
    /// Default: every node that no other node lists in `pre_tasks`.
    #[arg(long = "node", value_name = "NAME")]
    pub nodes: Vec<String>,

    /// Override `[dispatch].frames_mode` (current, full, custom).
    #[arg(long, value_name = "MODE")]
    pub frames_mode: Option<FramesModeKind>,

    /// Explicit comma-separated frame list. Implies `--frames-mode custom`.
    #[arg(long, value_name = "LIST", value_delimiter = ',', num_args = 1..)]
    pub frames: Vec<f32>,

    /// Override `[dispatch].backend`.
    #[arg(long, value_name = "NAME")]
    pub backend: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDISPATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and print the batch plan without executing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
