// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interfaces the host application provides to running scripts.

use crate::pin::ObjectRef;
use indexmap::IndexMap;

/// Lookup of engine singletons by name
pub trait SingletonRegistry {
    /// Resolve a singleton, `None` if the host has no singleton by that name
    fn lookup(&self, name: &str) -> Option<ObjectRef>;
}

/// Services a host offers to script instances
pub trait ScriptHost: SingletonRegistry {
    /// Receive text printed by a script
    fn print(&self, text: &str) {
        tracing::info!(target: "ordoplay_script::print", "{text}");
    }
}

/// In-memory singleton registry
#[derive(Debug, Clone, Default)]
pub struct HostSingletons {
    singletons: IndexMap<String, ObjectRef>,
}

impl HostSingletons {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a singleton, returning the one it replaced
    pub fn register(&mut self, name: impl Into<String>, object: ObjectRef) -> Option<ObjectRef> {
        self.singletons.insert(name.into(), object)
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, name: impl Into<String>, object: ObjectRef) -> Self {
        self.register(name, object);
        self
    }

    /// Remove a singleton
    pub fn unregister(&mut self, name: &str) -> Option<ObjectRef> {
        self.singletons.shift_remove(name)
    }

    /// Registered singleton names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.singletons.keys().map(String::as_str)
    }

    /// Number of registered singletons
    pub fn len(&self) -> usize {
        self.singletons.len()
    }

    /// Whether no singleton is registered
    pub fn is_empty(&self) -> bool {
        self.singletons.is_empty()
    }
}

impl SingletonRegistry for HostSingletons {
    fn lookup(&self, name: &str) -> Option<ObjectRef> {
        self.singletons.get(name).cloned()
    }
}

impl ScriptHost for HostSingletons {}
