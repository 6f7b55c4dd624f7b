// src/batch/keys.rs

//! Keys used by the graph builder to deduplicate and group requests.
//!
//! Both keys incorporate the node identity, so identical work requested from
//! two different nodes is never merged.

use crate::hash::{TaskHash, TaskHasher};
use crate::task::TaskRequest;

/// Identifies "already resolved work".
///
/// Requests with equal dedup keys resolve to the same batch. For no-op
/// requests (null `content_hash`) the full context, frame included, stands
/// in for the content hash; otherwise every no-op of a node would alias a
/// single entry.
pub fn dedup_key(request: &TaskRequest, content_hash: &TaskHash) -> TaskHash {
    let mut hasher = TaskHasher::new();
    hasher.update_hash(content_hash);
    if content_hash.is_null() {
        hasher.update_hash(&request.context().hash());
    }
    hasher.update_u64(request.node_identity());
    hasher.finish()
}

/// Identifies "may share a physical batch".
///
/// Covers every context variable except the frame and `ui:` entries. No-op
/// requests keep the frame, so that no-ops on different frames don't
/// collapse into one batch and couple otherwise independent frames
/// downstream.
pub fn group_key(request: &TaskRequest, content_hash: &TaskHash) -> TaskHash {
    let mut hasher = TaskHasher::new();
    hasher.update_hash(&request.context().hash_without_frame());
    hasher.update_u64(request.node_identity());
    if content_hash.is_null() {
        hasher.update_f32(request.frame());
    }
    hasher.finish()
}
