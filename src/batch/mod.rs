// src/batch/mod.rs

//! Batch graph construction.
//!
//! - [`task_batch`] holds the batch arena ([`BatchGraph`]) and its nodes.
//! - [`keys`] computes the dedup and grouping keys for task requests.
//! - [`builder`] walks task requests into a graph of batches.
//! - [`immediate`] executes and prunes `immediate` batches before hand-off.
//! - [`plan`] provides ordered, read-only views for dry runs.

pub mod builder;
pub mod immediate;
pub mod keys;
pub mod plan;
pub mod task_batch;

pub use builder::GraphBuilder;
pub use immediate::execute_and_prune_immediate;
pub use plan::PlannedBatch;
pub use task_batch::{BatchGraph, BatchId, TaskBatch};
