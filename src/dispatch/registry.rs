// src/dispatch/registry.rs

//! Name-keyed registry of backend factories.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{DispatchError, Result};
use crate::exec::{Backend, LocalBackend, NullBackend};
use crate::task::DispatchSettings;

type Creator = Arc<dyn Fn() -> Box<dyn Backend> + Send + Sync>;
pub type SetupFn = Arc<dyn Fn(&mut DispatchSettings) + Send + Sync>;

#[derive(Clone)]
struct Registration {
    creator: Creator,
    setup: Option<SetupFn>,
}

/// Backends available to a session, by name.
///
/// Registering under an existing name replaces the previous entry.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    entries: BTreeMap<String, Registration>,
    default_backend: Option<String>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.entries.keys().collect::<Vec<_>>())
            .field("default_backend", &self.default_backend)
            .finish()
    }
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `local` and `null` backends, with `local` as
    /// the default.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("local", || Box::new(LocalBackend::new()), None);
        registry.register("null", || Box::new(NullBackend), None);
        registry.default_backend = Some("local".to_string());
        registry
    }

    /// Register a backend factory, with an optional callback that adds
    /// backend-specific entries to each node's dispatch settings.
    pub fn register<F>(&mut self, name: &str, creator: F, setup: Option<SetupFn>)
    where
        F: Fn() -> Box<dyn Backend> + Send + Sync + 'static,
    {
        debug!(backend = name, "registering backend");
        self.entries.insert(
            name.to_string(),
            Registration {
                creator: Arc::new(creator),
                setup,
            },
        );
    }

    /// Remove a backend. Unknown names are ignored.
    pub fn deregister(&mut self, name: &str) {
        if self.entries.remove(name).is_none() {
            debug!(backend = name, "deregistering unknown backend; ignoring");
        }
        if self.default_backend.as_deref() == Some(name) {
            warn!(backend = name, "default backend deregistered");
            self.default_backend = None;
        }
    }

    /// Registered names, sorted.
    pub fn registered(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Backend>> {
        let registration = self.entries.get(name).ok_or_else(|| {
            DispatchError::Config(format!(
                "unknown backend '{name}' (registered: {})",
                self.registered().join(", ")
            ))
        })?;
        Ok((registration.creator)())
    }

    pub fn default_backend(&self) -> Option<&str> {
        self.default_backend.as_deref()
    }

    pub fn set_default_backend(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            return Err(DispatchError::Config(format!(
                "cannot make unregistered backend '{name}' the default"
            )));
        }
        self.default_backend = Some(name.to_string());
        Ok(())
    }

    /// Apply every registered setup callback to `settings`, in name order.
    pub fn setup_settings(&self, settings: &mut DispatchSettings) {
        for registration in self.entries.values() {
            if let Some(setup) = &registration.setup {
                setup(settings);
            }
        }
    }
}
