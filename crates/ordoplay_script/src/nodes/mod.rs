// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.

pub mod constants;
pub mod events;
pub mod flow_control;
pub mod functions;
pub mod utilities;

pub use constants::LiteralNode;
pub use events::EventNode;
pub use flow_control::SequenceNode;
pub use functions::{CallFunctionNode, FunctionEntryNode, FunctionResultNode};
pub use utilities::{EngineSingletonNode, PrintNode};

use crate::node::{NodeBehavior, NodeCategory};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind-specific configuration of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Event entry point
    Event(EventNode),
    /// Function entry point
    FunctionEntry(FunctionEntryNode),
    /// Function return
    FunctionResult(FunctionResultNode),
    /// Call to a script function
    CallFunction(CallFunctionNode),
    /// Sequential flow control
    Sequence(SequenceNode),
    /// Engine singleton reference
    EngineSingleton(EngineSingletonNode),
    /// Print to the host output
    Print(PrintNode),
    /// Constant value
    Literal(LiteralNode),
}

impl NodeKind {
    /// Shared behavior of this kind
    pub fn behavior(&self) -> &dyn NodeBehavior {
        match self {
            Self::Event(node) => node,
            Self::FunctionEntry(node) => node,
            Self::FunctionResult(node) => node,
            Self::CallFunction(node) => node,
            Self::Sequence(node) => node,
            Self::EngineSingleton(node) => node,
            Self::Print(node) => node,
            Self::Literal(node) => node,
        }
    }

    /// Mutable behavior of this kind
    pub fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        match self {
            Self::Event(node) => node,
            Self::FunctionEntry(node) => node,
            Self::FunctionResult(node) => node,
            Self::CallFunction(node) => node,
            Self::Sequence(node) => node,
            Self::EngineSingleton(node) => node,
            Self::Print(node) => node,
            Self::Literal(node) => node,
        }
    }

    /// Event name, for event entry points
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::Event(node) => Some(&node.event_name),
            _ => None,
        }
    }

    /// Name of the function this node enters or calls
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::FunctionEntry(node) => Some(&node.function_name),
            Self::CallFunction(node) => Some(&node.function_name),
            _ => None,
        }
    }
}

/// Palette entry describing a node type
#[derive(Debug, Clone)]
pub struct NodeTypeInfo {
    /// Unique type identifier
    pub type_name: &'static str,
    /// Display name
    pub title: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub tooltip: String,
    /// Search keywords
    pub keywords: &'static [&'static str],
    factory: fn() -> NodeKind,
}

impl NodeTypeInfo {
    /// Describe a node type from its default configuration
    pub fn from_factory(factory: fn() -> NodeKind) -> Self {
        let kind = factory();
        let behavior = kind.behavior();
        Self {
            type_name: behavior.type_name(),
            title: behavior.title(),
            category: behavior.category(),
            tooltip: behavior.tooltip(),
            keywords: behavior.keywords(),
            factory,
        }
    }

    /// Create a default-configured node kind
    pub fn create(&self) -> NodeKind {
        (self.factory)()
    }
}

/// Registry of node types offered to the user
pub struct NodeRegistry {
    /// Registered node types by type name
    types: IndexMap<&'static str, NodeTypeInfo>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Create a registry holding every built-in node type that users place by hand.
    ///
    /// Function entry nodes are created together with their function graph and
    /// are not offered here.
    pub fn with_builtin_nodes() -> Self {
        let mut registry = Self::new();
        registry.register(NodeTypeInfo::from_factory(|| NodeKind::Event(EventNode::default())));
        registry.register(NodeTypeInfo::from_factory(|| {
            NodeKind::Sequence(SequenceNode::default())
        }));
        registry.register(NodeTypeInfo::from_factory(|| {
            NodeKind::EngineSingleton(EngineSingletonNode::default())
        }));
        registry.register(NodeTypeInfo::from_factory(|| NodeKind::Print(PrintNode::default())));
        registry.register(NodeTypeInfo::from_factory(|| {
            NodeKind::Literal(LiteralNode::default())
        }));
        registry.register(NodeTypeInfo::from_factory(|| {
            NodeKind::CallFunction(CallFunctionNode::default())
        }));
        registry.register(NodeTypeInfo::from_factory(|| {
            NodeKind::FunctionResult(FunctionResultNode::default())
        }));
        registry
    }

    /// Register a node type
    pub fn register(&mut self, info: NodeTypeInfo) {
        self.types.insert(info.type_name, info);
    }

    /// Get a node type by name
    pub fn get(&self, type_name: &str) -> Option<&NodeTypeInfo> {
        self.types.get(type_name)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Find types whose title or keywords contain `term` (case-insensitive)
    pub fn search<'a>(&'a self, term: &str) -> impl Iterator<Item = &'a NodeTypeInfo> + 'a {
        let term = term.to_lowercase();
        self.types.values().filter(move |t| {
            t.title.to_lowercase().contains(&term) || t.keywords.iter().any(|k| k.contains(&term))
        })
    }

    /// Create a default-configured node kind by type name
    pub fn create_kind(&self, type_name: &str) -> Option<NodeKind> {
        self.get(type_name).map(NodeTypeInfo::create)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
