// src/context.rs

//! Evaluation contexts.
//!
//! A [`Context`] is the set of named variables a task is evaluated in. The
//! current frame is stored like any other variable, under [`FRAME`].
//! Variables whose name starts with [`UI_PREFIX`] are for presentation only
//! and never affect hashes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::hash::{TaskHash, TaskHasher};

/// Name of the frame variable.
pub const FRAME: &str = "frame";

/// Prefix of variables ignored by hashing.
pub const UI_PREFIX: &str = "ui:";

/// Frame used when a context has none.
pub const DEFAULT_FRAME: f32 = 1.0;

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_:]+)\}").expect("valid variable regex"));

static FRAME_PADDING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#+").expect("valid padding regex"));

/// A single context variable value.
///
/// Deserialized untagged so TOML tables map naturally onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ContextValue {
    fn hash_into(&self, hasher: &mut TaskHasher) {
        match self {
            ContextValue::Bool(b) => hasher.update(&[0, *b as u8]),
            ContextValue::Int(i) => hasher.update(&[1]).update(&i.to_le_bytes()),
            ContextValue::Float(f) => hasher.update(&[2]).update(&f.to_bits().to_le_bytes()),
            ContextValue::String(s) => hasher.update(&[3]).update_str(s),
        };
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ContextValue::Int(i) => Some(*i as f64),
            ContextValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Bool(b) => write!(f, "{b}"),
            ContextValue::Int(i) => write!(f, "{i}"),
            ContextValue::Float(v) => write!(f, "{v}"),
            ContextValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        ContextValue::Bool(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Int(v)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        ContextValue::Float(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::String(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::String(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, ContextValue>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context holding only `frame = 1`.
    pub fn new() -> Self {
        let mut ctx = Self::empty();
        ctx.set_frame(DEFAULT_FRAME);
        ctx
    }

    /// A context without any variables, not even a frame.
    pub fn empty() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    pub fn from_vars(vars: BTreeMap<String, ContextValue>) -> Self {
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ContextValue>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<ContextValue> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(|s| s.as_str())
    }

    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        match self.vars.get(name) {
            Some(ContextValue::Int(i)) => *i,
            Some(ContextValue::Float(f)) => *f as i64,
            _ => default,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.vars.get(name) {
            Some(ContextValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn frame(&self) -> Option<f32> {
        self.vars
            .get(FRAME)
            .and_then(ContextValue::as_f64)
            .map(|f| f as f32)
    }

    pub fn set_frame(&mut self, frame: f32) {
        self.vars
            .insert(FRAME.to_string(), ContextValue::Float(f64::from(frame)));
    }

    pub fn with_frame(&self, frame: f32) -> Context {
        let mut ctx = self.clone();
        ctx.set_frame(frame);
        ctx
    }

    pub fn without_frame(&self) -> Context {
        let mut ctx = self.clone();
        ctx.vars.remove(FRAME);
        ctx
    }

    /// Hash of every non-`ui:` variable, frame included.
    pub fn hash(&self) -> TaskHash {
        self.hash_filtered(false)
    }

    /// Hash of every non-`ui:` variable except the frame.
    pub fn hash_without_frame(&self) -> TaskHash {
        self.hash_filtered(true)
    }

    fn hash_filtered(&self, skip_frame: bool) -> TaskHash {
        let mut hasher = TaskHasher::new();
        for (name, value) in &self.vars {
            if name.starts_with(UI_PREFIX) || (skip_frame && name == FRAME) {
                continue;
            }
            hasher.update_str(name);
            value.hash_into(&mut hasher);
        }
        hasher.finish()
    }

    /// Expand `${name}` references and `#` frame padding in `text`.
    ///
    /// A run of N `#` characters becomes the integer frame zero-padded to N
    /// digits. Unknown variables expand to the empty string.
    pub fn substitute(&self, text: &str) -> String {
        let expanded = VARIABLE_RE.replace_all(text, |caps: &Captures| {
            self.vars
                .get(&caps[1])
                .map(|v| v.to_string())
                .unwrap_or_default()
        });

        let frame = self.frame().unwrap_or(DEFAULT_FRAME).round() as i64;
        FRAME_PADDING_RE
            .replace_all(&expanded, |caps: &Captures| {
                let width = caps[0].len();
                if frame < 0 {
                    format!("-{:0width$}", -frame, width = width)
                } else {
                    format!("{:0width$}", frame, width = width)
                }
            })
            .into_owned()
    }
}
