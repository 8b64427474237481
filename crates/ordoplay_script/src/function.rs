// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script functions and their registry.

use crate::graph::GraphId;
use crate::node::NodeId;
use crate::script::ScriptError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named function backed by a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    name: String,
    graph: GraphId,
    /// The entry node in `graph` that defines the function
    owning_node: NodeId,
}

impl Function {
    /// Create a function record
    pub fn new(name: impl Into<String>, graph: GraphId, owning_node: NodeId) -> Self {
        Self {
            name: name.into(),
            graph,
            owning_node,
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Graph implementing the function
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Entry node of the function
    pub fn owning_node(&self) -> NodeId {
        self.owning_node
    }
}

/// Functions of a script, keyed by name in creation order
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Function>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function
    pub fn register(&mut self, function: Function) -> Result<(), ScriptError> {
        if self.functions.contains_key(function.name()) {
            return Err(ScriptError::NameCollision(function.name.clone()));
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Get a function by name
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Whether a function with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Function backed by `graph`
    pub fn find_by_graph(&self, graph: GraphId) -> Option<&Function> {
        self.functions.values().find(|f| f.graph == graph)
    }

    /// Function names in creation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// All functions in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Rename a function in place, keeping its position
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), ScriptError> {
        if old_name == new_name {
            return if self.contains(old_name) {
                Ok(())
            } else {
                Err(ScriptError::FunctionNotFound(old_name.to_owned()))
            };
        }
        if self.contains(new_name) {
            return Err(ScriptError::NameCollision(new_name.to_owned()));
        }
        if !self.contains(old_name) {
            return Err(ScriptError::FunctionNotFound(old_name.to_owned()));
        }
        self.functions = std::mem::take(&mut self.functions)
            .into_iter()
            .map(|(name, mut function)| {
                if name == old_name {
                    function.name = new_name.to_owned();
                    (new_name.to_owned(), function)
                } else {
                    (name, function)
                }
            })
            .collect();
        Ok(())
    }

    /// Remove a function
    pub fn remove(&mut self, name: &str) -> Option<Function> {
        self.functions.shift_remove(name)
    }

    /// Number of functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> Function {
        Function::new(name, GraphId::new(), NodeId(1))
    }

    #[test]
    fn test_register_rejects_collision() {
        let mut registry = FunctionRegistry::new();
        registry.register(function("jump")).unwrap();
        let err = registry.register(function("jump")).unwrap_err();
        assert!(matches!(err, ScriptError::NameCollision(name) if name == "jump"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rename_keeps_order() {
        let mut registry = FunctionRegistry::new();
        for name in ["a", "b", "c"] {
            registry.register(function(name)).unwrap();
        }
        let graph = registry.get("b").unwrap().graph();

        registry.rename("b", "beta").unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "beta", "c"]);
        assert_eq!(registry.get("beta").unwrap().name(), "beta");
        assert_eq!(registry.get("beta").unwrap().graph(), graph);
        assert!(!registry.contains("b"));
    }

    #[test]
    fn test_rename_failures_leave_registry_untouched() {
        let mut registry = FunctionRegistry::new();
        registry.register(function("a")).unwrap();
        registry.register(function("b")).unwrap();

        assert!(matches!(registry.rename("a", "b"), Err(ScriptError::NameCollision(_))));
        assert!(matches!(registry.rename("zzz", "y"), Err(ScriptError::FunctionNotFound(_))));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_find_by_graph() {
        let mut registry = FunctionRegistry::new();
        let f = function("walk");
        let graph = f.graph();
        registry.register(f).unwrap();
        registry.register(function("run")).unwrap();

        assert_eq!(registry.find_by_graph(graph).map(Function::name), Some("walk"));
        assert!(registry.find_by_graph(GraphId::new()).is_none());
        assert_eq!(registry.remove("walk").map(|f| f.graph()), Some(graph));
        assert!(registry.find_by_graph(graph).is_none());
    }
}
