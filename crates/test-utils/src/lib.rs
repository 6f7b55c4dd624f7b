//! Shared helpers for the `taskdispatch` integration tests.
//!
//! - [`builders`]: in-memory task nodes and job file builders.
//! - [`fake_backend`]: backends that record or reject what they are handed.

pub mod builders;
pub mod fake_backend;

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests or with `--nocapture`. `RUST_LOG` overrides the default of
/// `taskdispatch=debug`, e.g. `RUST_LOG=taskdispatch::batch=trace`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,taskdispatch=debug"));

        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
