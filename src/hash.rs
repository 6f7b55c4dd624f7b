// src/hash.rs

//! Task hashes.
//!
//! Every task reports a [`TaskHash`] describing the effect it would have in a
//! given context. The all-zero hash is reserved as the "null" hash: a task
//! reporting it is a no-op for that context.

use std::fmt;

use blake3::Hasher;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHash([u8; 32]);

impl TaskHash {
    /// Hash reported by tasks that have nothing to do.
    pub const NULL: TaskHash = TaskHash([0; 32]);

    pub fn of(bytes: &[u8]) -> Self {
        blake3::hash(bytes).into()
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Order-independent combination: lane-wise wrapping addition of the
    /// four 64-bit words.
    pub fn combine_unordered(self, other: TaskHash) -> TaskHash {
        let mut out = [0u8; 32];
        for lane in 0..4 {
            let range = lane * 8..lane * 8 + 8;
            let a = u64::from_le_bytes(self.0[range.clone()].try_into().unwrap_or([0; 8]));
            let b = u64::from_le_bytes(other.0[range.clone()].try_into().unwrap_or([0; 8]));
            out[range].copy_from_slice(&a.wrapping_add(b).to_le_bytes());
        }
        TaskHash(out)
    }
}

impl From<blake3::Hash> for TaskHash {
    fn from(h: blake3::Hash) -> Self {
        TaskHash(*h.as_bytes())
    }
}

impl fmt::Debug for TaskHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TaskHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental builder for [`TaskHash`] values.
///
/// Fields are length-prefixed so that `("ab", "c")` and `("a", "bc")` hash
/// differently.
#[derive(Debug, Clone, Default)]
pub struct TaskHasher {
    inner: Hasher,
}

impl TaskHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(&(bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.update(s.as_bytes())
    }

    pub fn update_u64(&mut self, v: u64) -> &mut Self {
        self.update(&v.to_le_bytes())
    }

    pub fn update_f32(&mut self, v: f32) -> &mut Self {
        self.update(&v.to_bits().to_le_bytes())
    }

    pub fn update_hash(&mut self, h: &TaskHash) -> &mut Self {
        self.update(h.as_bytes())
    }

    pub fn finish(&self) -> TaskHash {
        self.inner.finalize().into()
    }
}
