// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.

use crate::connection::{Connection, PinRef};
use crate::node::{Node, NodeId};
use crate::pin::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use uuid::Uuid;

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

/// Set of graph flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphFlags(u32);

impl GraphFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Graph holds event handlers
    pub const EVENT: Self = Self(1 << 0);
    /// Graph represents a callable function
    pub const FUNCTION: Self = Self(1 << 1);

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for GraphFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A script graph
#[derive(Debug, Clone)]
pub struct Graph {
    id: GraphId,
    name: String,
    flags: GraphFlags,
    /// Nodes in the graph, in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes, in insertion order
    connections: Vec<Connection>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, flags: GraphFlags) -> Self {
        Self::with_id(GraphId::new(), name, flags)
    }

    pub(crate) fn with_id(id: GraphId, name: impl Into<String>, flags: GraphFlags) -> Self {
        Self {
            id,
            name: name.into(),
            flags,
            nodes: IndexMap::new(),
            connections: Vec::new(),
        }
    }

    /// Graph ID
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Graph flags
    pub fn flags(&self) -> GraphFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut GraphFlags {
        &mut self.flags
    }

    /// Whether the graph represents a callable function
    pub fn is_function(&self) -> bool {
        self.flags.contains(GraphFlags::FUNCTION)
    }

    /// Whether the graph holds event handlers
    pub fn is_event_graph(&self) -> bool {
        self.flags.contains(GraphFlags::EVENT)
    }

    /// Add a node to the graph
    pub(crate) fn add_node(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        node.set_graph(self.id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node and its connections
    pub(crate) fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|c| !c.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Move a node in the editor
    pub fn set_node_position(&mut self, node_id: NodeId, position: [f32; 2]) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.position = position;
        Ok(())
    }

    /// Connect an output pin to an input pin
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_pin: usize,
        to_node: NodeId,
        to_pin: usize,
    ) -> Result<(), GraphError> {
        let source_node = self
            .nodes
            .get(&from_node)
            .ok_or(GraphError::NodeNotFound(from_node))?;
        let target_node = self
            .nodes
            .get(&to_node)
            .ok_or(GraphError::NodeNotFound(to_node))?;

        let source_pin = source_node
            .pin(from_pin)
            .ok_or(GraphError::InvalidPinReference { node: from_node, pin: from_pin })?;
        let target_pin = target_node
            .pin(to_pin)
            .ok_or(GraphError::InvalidPinReference { node: to_node, pin: to_pin })?;

        if from_node == to_node {
            return Err(GraphError::SelfLoop);
        }

        if !source_pin.can_connect(target_pin) {
            return Err(GraphError::IncompatiblePins {
                from: source_pin.name.clone(),
                to: target_pin.name.clone(),
            });
        }

        let connection = Connection::new(from_node, from_pin, to_node, to_pin);
        if self.connections.contains(&connection) {
            return Err(GraphError::DuplicateConnection);
        }

        if !source_pin.accepts_multiple_links() && self.is_linked(connection.from) {
            return Err(GraphError::PinAlreadyConnected { node: from_node, pin: from_pin });
        }
        if !target_pin.accepts_multiple_links() && self.is_linked(connection.to) {
            return Err(GraphError::PinAlreadyConnected { node: to_node, pin: to_pin });
        }

        self.connections.push(connection);
        Ok(())
    }

    /// Remove a connection, returning whether it existed
    pub fn disconnect(&mut self, from_node: NodeId, from_pin: usize, to_node: NodeId, to_pin: usize) -> bool {
        let connection = Connection::new(from_node, from_pin, to_node, to_pin);
        let before = self.connections.len();
        self.connections.retain(|c| *c != connection);
        before != self.connections.len()
    }

    /// Remove every connection on a pin, returning how many were removed
    pub fn disconnect_pin(&mut self, node_id: NodeId, pin: usize) -> usize {
        let pin = PinRef::new(node_id, pin);
        let before = self.connections.len();
        self.connections.retain(|c| !c.involves_pin(pin));
        before - self.connections.len()
    }

    /// Get all connections
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Get connections leaving an output pin
    pub fn connections_from(&self, node_id: NodeId, pin: usize) -> impl Iterator<Item = &Connection> {
        let pin = PinRef::new(node_id, pin);
        self.connections.iter().filter(move |c| c.from == pin)
    }

    /// Get connections arriving at an input pin
    pub fn connections_to(&self, node_id: NodeId, pin: usize) -> impl Iterator<Item = &Connection> {
        let pin = PinRef::new(node_id, pin);
        self.connections.iter().filter(move |c| c.to == pin)
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn is_linked(&self, pin: PinRef) -> bool {
        self.connections.iter().any(|c| c.involves_pin(pin))
    }

    /// Append a dynamic pin to a node and return its index
    pub fn add_dynamic_pin(&mut self, node_id: NodeId) -> Result<usize, GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let index = node.add_dynamic_pin()?;
        tracing::debug!(graph = %self.name, node = %node_id, pin = index, "Added dynamic pin");
        Ok(index)
    }

    /// Remove a dynamic pin from a node.
    ///
    /// Connections on the removed pin are dropped; connections on later pins
    /// follow their pin to its new index.
    pub fn remove_dynamic_pin(&mut self, node_id: NodeId, pin: usize) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.remove_dynamic_pin(pin)?;

        let removed = PinRef::new(node_id, pin);
        self.connections.retain(|c| !c.involves_pin(removed));
        for connection in &mut self.connections {
            connection.shift_after_removal(node_id, pin);
        }
        tracing::debug!(graph = %self.name, node = %node_id, pin, "Removed dynamic pin");
        Ok(())
    }

    /// Set a node configuration property.
    ///
    /// The node's pins are reallocated; connections that no longer fit the
    /// new pin set are dropped.
    pub fn set_node_property(&mut self, node_id: NodeId, name: &str, value: Value) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.set_property(name, value)?;

        let nodes = &self.nodes;
        let before = self.connections.len();
        self.connections
            .retain(|c| !c.involves_node(node_id) || Self::link_is_valid(nodes, c));
        let dropped = before - self.connections.len();
        if dropped > 0 {
            tracing::debug!(graph = %self.name, node = %node_id, dropped, "Dropped connections after property change");
        }
        Ok(())
    }

    fn link_is_valid(nodes: &IndexMap<NodeId, Node>, connection: &Connection) -> bool {
        let source = nodes
            .get(&connection.from.node)
            .and_then(|n| n.pin(connection.from.pin));
        let target = nodes
            .get(&connection.to.node)
            .and_then(|n| n.pin(connection.to.pin));
        match (source, target) {
            (Some(source), Some(target)) => source.can_connect(target),
            _ => false,
        }
    }
}

/// Error when editing a graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node ID already used
    #[error("Node {0} already exists")]
    DuplicateNode(NodeId),

    /// Pin index out of range
    #[error("Node {node} has no pin at index {pin}")]
    InvalidPinReference {
        /// Node addressed
        node: NodeId,
        /// Pin index addressed
        pin: usize,
    },

    /// Operation would leave a node structurally invalid
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// Incompatible pin kinds, directions or types
    #[error("Cannot connect pin '{from}' to pin '{to}'")]
    IncompatiblePins {
        /// Source pin name
        from: String,
        /// Target pin name
        to: String,
    },

    /// Pin only takes a single link and already has one
    #[error("Pin {pin} of node {node} is already connected")]
    PinAlreadyConnected {
        /// Node addressed
        node: NodeId,
        /// Pin index addressed
        pin: usize,
    },

    /// Connection already exists
    #[error("Connection already exists")]
    DuplicateConnection,

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Node has no dynamic pins
    #[error("Node {0} does not support dynamic pins")]
    NotEditable(NodeId),

    /// Property is not part of the node's schema
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    /// Property value rejected
    #[error("Invalid value for property '{name}': {reason}")]
    InvalidPropertyValue {
        /// Property name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeKind, PrintNode, SequenceNode};

    fn sequence_graph(steps: usize) -> (Graph, NodeId, Vec<NodeId>) {
        let mut graph = Graph::new("EventGraph", GraphFlags::EVENT);
        let sequence = graph
            .add_node(Node::new(NodeId(1), NodeKind::Sequence(SequenceNode::with_steps(steps))))
            .unwrap();
        let mut targets = Vec::new();
        for step in 0..steps {
            let id = NodeId(10 + step as u64);
            graph
                .add_node(Node::new(id, NodeKind::Print(PrintNode::new(format!("step {step}")))))
                .unwrap();
            graph.connect(sequence, 1 + step, id, 0).unwrap();
            targets.push(id);
        }
        (graph, sequence, targets)
    }

    #[test]
    fn test_graph_flags() {
        let mut flags = GraphFlags::EVENT | GraphFlags::FUNCTION;
        assert!(flags.contains(GraphFlags::FUNCTION));
        flags.remove(GraphFlags::FUNCTION);
        assert!(!flags.contains(GraphFlags::FUNCTION));
        assert!(flags.contains(GraphFlags::EVENT));
    }

    #[test]
    fn test_connect_rejects_invalid_pin_index() {
        let (mut graph, sequence, targets) = sequence_graph(2);
        let err = graph.connect(sequence, 9, targets[0], 0).unwrap_err();
        assert_eq!(err, GraphError::InvalidPinReference { node: sequence, pin: 9 });
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_exec_output_takes_single_link() {
        let (mut graph, sequence, targets) = sequence_graph(2);
        let err = graph.connect(sequence, 1, targets[1], 0).unwrap_err();
        assert!(matches!(err, GraphError::PinAlreadyConnected { pin: 1, .. }));
    }

    #[test]
    fn test_connect_rejects_mismatched_kinds() {
        let (mut graph, sequence, targets) = sequence_graph(2);
        // Execution output into the print node's text input
        graph.disconnect_pin(targets[0], 0);
        let err = graph.connect(sequence, 1, targets[0], 1).unwrap_err();
        assert!(matches!(err, GraphError::IncompatiblePins { .. }));
    }

    #[test]
    fn test_remove_dynamic_pin_remaps_connections() {
        let (mut graph, sequence, targets) = sequence_graph(4);

        graph.remove_dynamic_pin(sequence, 2).unwrap();

        let node = graph.node(sequence).unwrap();
        let names: Vec<_> = node.outputs().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(names, ["then_0", "then_1", "then_2"]);

        // then_0 kept, then_1 dropped, then_2/then_3 shifted down
        let links: Vec<_> = graph
            .connections()
            .iter()
            .map(|c| (c.from.pin, c.to.node))
            .collect();
        assert_eq!(links, [(1, targets[0]), (2, targets[2]), (3, targets[3])]);
    }

    #[test]
    fn test_remove_first_step_shifts_all_links() {
        let (mut graph, sequence, targets) = sequence_graph(3);

        graph.remove_dynamic_pin(sequence, 1).unwrap();

        let links: Vec<_> = graph
            .connections()
            .iter()
            .map(|c| (c.from.pin, c.to.node))
            .collect();
        assert_eq!(links, [(1, targets[1]), (2, targets[2])]);
    }

    #[test]
    fn test_remove_last_step_keeps_earlier_links() {
        let (mut graph, sequence, targets) = sequence_graph(3);

        graph.remove_dynamic_pin(sequence, 3).unwrap();

        let node = graph.node(sequence).unwrap();
        let names: Vec<_> = node.outputs().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(names, ["then_0", "then_1"]);
        let links: Vec<_> = graph
            .connections()
            .iter()
            .map(|c| (c.from.pin, c.to.node))
            .collect();
        assert_eq!(links, [(1, targets[0]), (2, targets[1])]);
    }

    #[test]
    fn test_oversized_step_property_is_rejected() {
        let (mut graph, sequence, _) = sequence_graph(2);
        let err = graph
            .set_node_property(sequence, "steps", Value::Int(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, GraphError::StructuralViolation(_)));
        assert_eq!(graph.node(sequence).unwrap().pins().len(), 3);
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_remove_dynamic_pin_at_minimum_is_rejected() {
        let (mut graph, sequence, _) = sequence_graph(2);
        let err = graph.remove_dynamic_pin(sequence, 1).unwrap_err();
        assert!(matches!(err, GraphError::StructuralViolation(_)));
        assert_eq!(graph.node(sequence).unwrap().pins().len(), 3);
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_add_dynamic_pin_appends() {
        let (mut graph, sequence, _) = sequence_graph(2);
        let index = graph.add_dynamic_pin(sequence).unwrap();
        assert_eq!(index, 3);
        assert_eq!(graph.node(sequence).unwrap().pin(index).unwrap().name, "then_2");
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_dynamic_pins_on_fixed_node() {
        let (mut graph, _, targets) = sequence_graph(2);
        let err = graph.add_dynamic_pin(targets[0]).unwrap_err();
        assert_eq!(err, GraphError::NotEditable(targets[0]));
    }

    #[test]
    fn test_property_change_prunes_connections() {
        let (mut graph, sequence, targets) = sequence_graph(4);
        graph.set_node_property(sequence, "steps", Value::Int(2)).unwrap();
        assert_eq!(graph.node(sequence).unwrap().pins().len(), 3);
        let remaining: Vec<_> = graph.connections().iter().map(|c| c.to.node).collect();
        assert_eq!(remaining, [targets[0], targets[1]]);
    }

    #[test]
    fn test_remove_node_drops_connections() {
        let (mut graph, sequence, targets) = sequence_graph(3);
        graph.remove_node(targets[1]);
        assert_eq!(graph.connection_count(), 2);
        assert_eq!(graph.connections_from(sequence, 2).count(), 0);
    }
}
