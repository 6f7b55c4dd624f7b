mod common;
use crate::common::{TestResult, init_tracing};

use clap::Parser;
use tracing::Level;

use taskdispatch::cli::{CliArgs, LogLevel};
use taskdispatch::context::{Context, ContextValue};
use taskdispatch::dispatch::FramesMode;
use taskdispatch::dispatch::frames::{FRAME_RANGE_END, FRAME_RANGE_START};
use taskdispatch::errors::DispatchError;
use taskdispatch::hash::TaskHash;
use taskdispatch::logging::effective_level;
use taskdispatch::types::FramesModeKind;

#[test]
fn substitution_expands_variables_and_frame_padding() {
    init_tracing();

    let mut context = Context::new().with_frame(7.0);
    context.set("shot", "sh010");
    context.set("take", 3_i64);
    context.set("dispatcher:jobDirectory", "/jobs/000002");

    assert_eq!(
        context.substitute("${dispatcher:jobDirectory}/${shot}_t${take}.####.exr"),
        "/jobs/000002/sh010_t3.0007.exr"
    );
    assert_eq!(context.substitute("frame #"), "frame 7");
    assert_eq!(context.substitute("${missing}x"), "x");
    assert_eq!(context.with_frame(-4.0).substitute("###"), "-004");
}

#[test]
fn ui_entries_never_affect_hashes() {
    init_tracing();

    let mut plain = Context::new();
    plain.set("shot", "sh010");

    let mut decorated = plain.clone();
    decorated.set("ui:nodeColour", "red");

    assert_eq!(plain.hash(), decorated.hash());
    assert_eq!(plain.hash_without_frame(), decorated.hash_without_frame());

    let mut other = plain.clone();
    other.set("shot", "sh020");
    assert_ne!(plain.hash(), other.hash());
}

#[test]
fn frame_only_affects_the_full_hash() {
    init_tracing();

    let one = Context::new().with_frame(1.0);
    let two = Context::new().with_frame(2.0);

    assert_ne!(one.hash(), two.hash());
    assert_eq!(one.hash_without_frame(), two.hash_without_frame());
    assert!(two.without_frame().frame().is_none());
}

#[test]
fn context_accessors_handle_missing_and_mistyped_values() {
    init_tracing();

    let mut context = Context::empty();
    context.set("count", 4_i64);
    context.set("ratio", 2.5_f64);
    context.set("name", "hero");

    assert_eq!(context.get_int("count", 0), 4);
    assert_eq!(context.get_int("ratio", 0), 2);
    assert_eq!(context.get_int("name", 9), 9);
    assert_eq!(context.get_int("absent", 9), 9);
    assert_eq!(context.get_str("count"), None);
    assert!(context.frame().is_none());

    assert_eq!(context.remove("name"), Some(ContextValue::String("hero".into())));
    assert!(!context.contains("name"));
    assert_eq!(context.names().collect::<Vec<_>>(), vec!["count", "ratio"]);
}

#[test]
fn current_frame_mode_uses_the_context_frame() -> TestResult {
    init_tracing();

    assert_eq!(FramesMode::CurrentFrame.resolve(&Context::new())?, vec![1.0]);
    assert_eq!(
        FramesMode::CurrentFrame.resolve(&Context::new().with_frame(12.0))?,
        vec![12.0]
    );
    // A context without a frame falls back to frame 1.
    assert_eq!(FramesMode::CurrentFrame.resolve(&Context::empty())?, vec![1.0]);
    Ok(())
}

#[test]
fn full_range_mode_reads_the_frame_range_entries() -> TestResult {
    init_tracing();

    let defaults = FramesMode::FullRange.resolve(&Context::new())?;
    assert_eq!(defaults.len(), 100);
    assert_eq!(defaults.first(), Some(&1.0));
    assert_eq!(defaults.last(), Some(&100.0));

    let mut context = Context::new();
    context.set(FRAME_RANGE_START, 10_i64);
    context.set(FRAME_RANGE_END, 12_i64);
    assert_eq!(FramesMode::FullRange.resolve(&context)?, vec![10.0, 11.0, 12.0]);

    context.set(FRAME_RANGE_END, 5_i64);
    assert!(matches!(
        FramesMode::FullRange.resolve(&context),
        Err(DispatchError::Validation(_))
    ));
    Ok(())
}

#[test]
fn custom_mode_keeps_the_given_order() -> TestResult {
    init_tracing();

    let mode = FramesMode::CustomRange(vec![5.0, 1.0, 3.0]);
    assert_eq!(mode.resolve(&Context::new())?, vec![5.0, 1.0, 3.0]);

    let empty = FramesMode::CustomRange(Vec::new());
    assert!(matches!(
        empty.resolve(&Context::new()),
        Err(DispatchError::Validation(_))
    ));
    Ok(())
}

#[test]
fn frames_mode_kinds_parse_from_text() {
    init_tracing();

    assert_eq!(" Full ".parse::<FramesModeKind>(), Ok(FramesModeKind::Full));
    assert_eq!("custom".parse::<FramesModeKind>(), Ok(FramesModeKind::Custom));
    assert!("every".parse::<FramesModeKind>().is_err());
    assert_eq!(FramesModeKind::default(), FramesModeKind::Current);
    assert_eq!(
        FramesMode::from_kind(FramesModeKind::Custom, &[2.0, 4.0]),
        FramesMode::CustomRange(vec![2.0, 4.0])
    );
    assert_eq!(
        FramesMode::from_kind(FramesModeKind::Current, &[2.0]),
        FramesMode::CurrentFrame
    );
}

#[test]
fn hashes_combine_independently_of_order() {
    init_tracing();

    let a = TaskHash::of(b"a");
    let b = TaskHash::of(b"b");
    let c = TaskHash::of(b"c");

    assert_eq!(
        a.combine_unordered(b).combine_unordered(c),
        c.combine_unordered(a).combine_unordered(b)
    );
    assert_eq!(TaskHash::NULL.combine_unordered(a), a);
    assert!(TaskHash::NULL.is_null());
    assert_eq!(a.to_hex().len(), 64);
}

#[test]
fn cli_flag_wins_over_environment_for_log_level() {
    init_tracing();

    assert_eq!(effective_level(Some(LogLevel::Debug), Some("error")), Level::DEBUG);
    assert_eq!(effective_level(None, Some("warning")), Level::WARN);
    assert_eq!(effective_level(None, Some(" TRACE ")), Level::TRACE);
    assert_eq!(effective_level(None, Some("loud")), Level::INFO);
    assert_eq!(effective_level(None, None), Level::INFO);
}

#[test]
fn cli_parses_dispatch_overrides() -> TestResult {
    init_tracing();

    let args = CliArgs::try_parse_from([
        "taskdispatch",
        "--config",
        "shot.toml",
        "--node",
        "render",
        "--node",
        "movie",
        "--frames",
        "1,5,9",
        "--backend",
        "null",
        "--dry-run",
    ])?;

    assert_eq!(args.config, "shot.toml");
    assert_eq!(args.nodes, vec!["render", "movie"]);
    assert_eq!(args.frames, vec![1.0, 5.0, 9.0]);
    assert_eq!(args.backend.as_deref(), Some("null"));
    assert!(args.dry_run);
    assert!(args.frames_mode.is_none());

    let defaults = CliArgs::try_parse_from(["taskdispatch", "--frames-mode", "full"])?;
    assert_eq!(defaults.config, "Taskdispatch.toml");
    assert_eq!(defaults.frames_mode, Some(FramesModeKind::Full));
    assert!(defaults.nodes.is_empty());
    Ok(())
}
