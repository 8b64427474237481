// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scripts: the authoring-time container of graphs and functions.
//!
//! A [`Script`] owns its graphs and its [`FunctionRegistry`]. Every function
//! is backed by a graph of the same name carrying [`GraphFlags::FUNCTION`]
//! and starting at a [`FunctionEntryNode`]. Mutations that affect open views
//! are published as [`ScriptEvent`]s to subscribers.

use crate::config::FunctionRemovalPolicy;
use crate::events::{EventChannel, ScriptEvent};
use crate::function::{Function, FunctionRegistry};
use crate::graph::{Graph, GraphError, GraphFlags, GraphId};
use crate::node::{Node, NodeId};
use crate::nodes::{FunctionEntryNode, NodeKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use thiserror::Error;

/// Current persisted script format version
pub const SCRIPT_FORMAT_VERSION: u32 = 1;

/// Name of the event graph every new script starts with
pub const DEFAULT_EVENT_GRAPH: &str = "EventGraph";

/// Descriptive data about a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    /// Script name
    pub name: String,
    /// Class of host object the script attaches to
    pub base_type: String,
}

/// An authored visual script
#[derive(Debug)]
pub struct Script {
    pub(crate) metadata: ScriptMetadata,
    pub(crate) graphs: IndexMap<GraphId, Graph>,
    pub(crate) functions: FunctionRegistry,
    pub(crate) next_node_id: u64,
    function_removal: FunctionRemovalPolicy,
    events: EventChannel,
}

impl Script {
    /// Create a script with a single empty event graph
    pub fn new(name: impl Into<String>, base_type: impl Into<String>) -> Self {
        let mut script = Self::empty(ScriptMetadata {
            name: name.into(),
            base_type: base_type.into(),
        });
        let graph = Graph::new(DEFAULT_EVENT_GRAPH, GraphFlags::EVENT);
        script.graphs.insert(graph.id(), graph);
        script
    }

    pub(crate) fn empty(metadata: ScriptMetadata) -> Self {
        Self {
            metadata,
            graphs: IndexMap::new(),
            functions: FunctionRegistry::new(),
            next_node_id: 1,
            function_removal: FunctionRemovalPolicy::default(),
            events: EventChannel::new(),
        }
    }

    /// Script metadata
    pub fn metadata(&self) -> &ScriptMetadata {
        &self.metadata
    }

    /// Policy applied by [`remove_function`](Self::remove_function)
    pub fn function_removal_policy(&self) -> FunctionRemovalPolicy {
        self.function_removal
    }

    /// Set the policy applied by [`remove_function`](Self::remove_function)
    pub fn set_function_removal_policy(&mut self, policy: FunctionRemovalPolicy) {
        self.function_removal = policy;
    }

    /// Subscribe to script notifications
    pub fn subscribe(&mut self) -> mpsc::Receiver<ScriptEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Graphs
    // ========================================================================

    /// Graphs in order
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// Number of graphs
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Get a graph by name
    pub fn graph(&self, name: &str) -> Option<&Graph> {
        self.graphs.values().find(|g| g.name() == name)
    }

    /// Get a mutable graph by name
    pub fn graph_mut(&mut self, name: &str) -> Option<&mut Graph> {
        self.graphs.values_mut().find(|g| g.name() == name)
    }

    /// Get a graph by ID
    pub fn graph_by_id(&self, id: GraphId) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    fn graph_id(&self, name: &str) -> Result<GraphId, ScriptError> {
        self.graph(name)
            .map(Graph::id)
            .ok_or_else(|| ScriptError::GraphNotFound(name.to_owned()))
    }

    fn name_in_use(&self, name: &str) -> bool {
        self.functions.contains(name) || self.graph(name).is_some()
    }

    /// Add an empty graph.
    ///
    /// Function graphs are made through [`create_function`](Self::create_function).
    pub fn add_graph(&mut self, name: &str, flags: GraphFlags) -> Result<GraphId, ScriptError> {
        validate_name(name)?;
        if flags.contains(GraphFlags::FUNCTION) {
            return Err(GraphError::StructuralViolation(
                "function graphs are created through create_function".to_string(),
            )
            .into());
        }
        if self.name_in_use(name) {
            return Err(ScriptError::NameCollision(name.to_owned()));
        }
        let graph = Graph::new(name, flags);
        let id = graph.id();
        self.graphs.insert(id, graph);
        tracing::debug!(script = %self.metadata.name, graph = name, "Added graph");
        Ok(id)
    }

    /// Remove a graph, along with the function it backs
    pub fn remove_graph(&mut self, name: &str) -> Result<Graph, ScriptError> {
        let id = self.graph_id(name)?;
        self.events.emit(ScriptEvent::GraphClosed {
            graph_name: name.to_owned(),
        });
        if let Some(function) = self.functions.find_by_graph(id).map(|f| f.name().to_owned()) {
            self.functions.remove(&function);
        }
        let graph = self
            .graphs
            .shift_remove(&id)
            .ok_or_else(|| ScriptError::GraphNotFound(name.to_owned()))?;
        tracing::debug!(script = %self.metadata.name, graph = name, "Removed graph");
        Ok(graph)
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    /// Create a node in the named graph
    pub fn create_node(&mut self, graph_name: &str, kind: NodeKind) -> Result<NodeId, ScriptError> {
        if matches!(kind, NodeKind::FunctionEntry(_)) {
            return Err(GraphError::StructuralViolation(
                "function entry nodes are created with their function".to_string(),
            )
            .into());
        }
        kind.behavior().validate()?;
        let graph_id = self.graph_id(graph_name)?;
        let id = self.allocate_node_id();
        let graph = self
            .graphs
            .get_mut(&graph_id)
            .ok_or_else(|| ScriptError::GraphNotFound(graph_name.to_owned()))?;
        graph.add_node(Node::new(id, kind))?;
        tracing::debug!(graph = graph_name, node = %id, "Created node");
        Ok(id)
    }

    /// Remove a node and its connections.
    ///
    /// The entry node of a function cannot be removed on its own.
    pub fn remove_node(&mut self, graph_name: &str, node_id: NodeId) -> Result<Node, ScriptError> {
        let graph_id = self.graph_id(graph_name)?;
        if self
            .functions
            .find_by_graph(graph_id)
            .is_some_and(|f| f.owning_node() == node_id)
        {
            return Err(GraphError::StructuralViolation(format!(
                "node {node_id} is the entry of function '{graph_name}'"
            ))
            .into());
        }
        self.graphs
            .get_mut(&graph_id)
            .and_then(|g| g.remove_node(node_id))
            .ok_or_else(|| GraphError::NodeNotFound(node_id).into())
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Create a function: a flagged graph with an entry node, registered by name.
    ///
    /// Returns the ID of the new graph.
    pub fn create_function(&mut self, name: &str) -> Result<GraphId, ScriptError> {
        validate_name(name)?;
        if self.name_in_use(name) {
            return Err(ScriptError::NameCollision(name.to_owned()));
        }

        let mut graph = Graph::new(name, GraphFlags::FUNCTION);
        let entry = self.allocate_node_id();
        graph.add_node(Node::new(entry, NodeKind::FunctionEntry(FunctionEntryNode::new(name))))?;
        let graph_id = graph.id();
        self.functions.register(Function::new(name, graph_id, entry))?;
        self.graphs.insert(graph_id, graph);

        tracing::info!(script = %self.metadata.name, function = name, "Created function");
        Ok(graph_id)
    }

    /// Names of graphs flagged as functions, in graph order
    pub fn function_names(&self) -> Vec<String> {
        self.graphs
            .values()
            .filter(|g| g.is_function())
            .map(|g| g.name().to_owned())
            .collect()
    }

    /// Registered functions in creation order
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Look up a function by name
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Entry node of a function
    pub fn function_node_id(&self, name: &str) -> Option<NodeId> {
        self.functions.get(name).map(Function::owning_node)
    }

    /// Rename a function and its graph.
    ///
    /// Fails without side effects if `new_name` is taken by any function or
    /// graph. Renaming to the current name is a no-op.
    pub fn rename_function(&mut self, old_name: &str, new_name: &str) -> Result<(), ScriptError> {
        let function = self
            .functions
            .get(old_name)
            .cloned()
            .ok_or_else(|| ScriptError::FunctionNotFound(old_name.to_owned()))?;
        if old_name == new_name {
            return Ok(());
        }
        validate_name(new_name)?;
        if self.name_in_use(new_name) {
            return Err(ScriptError::NameCollision(new_name.to_owned()));
        }

        self.functions.rename(old_name, new_name)?;
        if let Some(graph) = self.graphs.get_mut(&function.graph()) {
            graph.set_name(new_name);
            if let Some(NodeKind::FunctionEntry(entry)) =
                graph.node_mut(function.owning_node()).map(Node::kind_mut)
            {
                entry.function_name = new_name.to_owned();
            }
        }

        tracing::info!(old = old_name, new = new_name, "Renamed function");
        self.events.emit(ScriptEvent::GraphRenamed {
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned(),
        });
        Ok(())
    }

    /// Remove a function.
    ///
    /// Its graph loses the function flag or is deleted, depending on the
    /// removal policy. Call sites elsewhere are left in place; see
    /// [`function_call_sites`](Self::function_call_sites).
    pub fn remove_function(&mut self, name: &str) -> Result<Function, ScriptError> {
        if !self.functions.contains(name) {
            return Err(ScriptError::FunctionNotFound(name.to_owned()));
        }
        self.events.emit(ScriptEvent::GraphClosed {
            graph_name: name.to_owned(),
        });
        let function = self
            .functions
            .remove(name)
            .ok_or_else(|| ScriptError::FunctionNotFound(name.to_owned()))?;

        match self.function_removal {
            FunctionRemovalPolicy::ClearFlag => {
                if let Some(graph) = self.graphs.get_mut(&function.graph()) {
                    graph.flags_mut().remove(GraphFlags::FUNCTION);
                }
            }
            FunctionRemovalPolicy::DeleteGraph => {
                self.graphs.shift_remove(&function.graph());
            }
        }

        tracing::info!(function = name, policy = ?self.function_removal, "Removed function");
        Ok(function)
    }

    /// Nodes anywhere in the script that call `name`, as `(graph name, node)`
    pub fn function_call_sites(&self, name: &str) -> Vec<(String, NodeId)> {
        self.graphs
            .values()
            .flat_map(|graph| {
                graph
                    .nodes()
                    .filter(|node| matches!(node.kind(), NodeKind::CallFunction(call) if call.function_name == name))
                    .map(move |node| (graph.name().to_owned(), node.id()))
            })
            .collect()
    }

    /// Ask views to show a function's graph and focus its entry node
    pub fn show_function_graph(&mut self, name: &str) -> Result<(), ScriptError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ScriptError::FunctionNotFound(name.to_owned()))?;
        let node_id = function.owning_node().0;
        self.events.emit(ScriptEvent::GraphShown {
            graph_name: name.to_owned(),
        });
        self.events.emit(ScriptEvent::NodeFocusRequested {
            graph_name: name.to_owned(),
            node_id,
        });
        Ok(())
    }

    /// Ask the editor to offer overridable functions
    pub fn request_override(&mut self) {
        self.events.emit(ScriptEvent::OverrideRequested);
    }
}

/// Graph and function names must be identifiers
pub(crate) fn validate_name(name: &str) -> Result<(), ScriptError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ScriptError::InvalidName(name.to_owned()))
    }
}

/// Script-level errors
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Name already used by a function or graph
    #[error("Name already in use: {0}")]
    NameCollision(String),

    /// Name is not a valid identifier
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// No graph with this name
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// No function with this name
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Graph-level failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Document written by a newer format
    #[error("Script format version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Malformed RON document
    #[error("Failed to parse script: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// RON encoding failure
    #[error("Failed to encode script: {0}")]
    RonEncode(#[from] ron::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
