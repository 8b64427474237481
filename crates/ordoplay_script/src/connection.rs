// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A pin addressed by node and pin index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef {
    /// Node owning the pin
    pub node: NodeId,
    /// Index into the node's pin list
    pub pin: usize,
}

impl PinRef {
    /// Create a new pin reference
    pub fn new(node: NodeId, pin: usize) -> Self {
        Self { node, pin }
    }
}

/// A connection from an output pin to an input pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source output pin
    pub from: PinRef,
    /// Target input pin
    pub to: PinRef,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: NodeId, from_pin: usize, to_node: NodeId, to_pin: usize) -> Self {
        Self {
            from: PinRef::new(from_node, from_pin),
            to: PinRef::new(to_node, to_pin),
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }

    /// Check if this connection involves a specific pin
    pub fn involves_pin(&self, pin: PinRef) -> bool {
        self.from == pin || self.to == pin
    }

    /// Shift pin indices on `node` above `removed` down by one
    pub(crate) fn shift_after_removal(&mut self, node: NodeId, removed: usize) {
        for end in [&mut self.from, &mut self.to] {
            if end.node == node && end.pin > removed {
                end.pin -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_after_removal() {
        let mut connection = Connection::new(NodeId(1), 3, NodeId(2), 0);
        connection.shift_after_removal(NodeId(1), 1);
        assert_eq!(connection.from, PinRef::new(NodeId(1), 2));
        assert_eq!(connection.to, PinRef::new(NodeId(2), 0));

        // Pins below the removed one and other nodes are untouched
        connection.shift_after_removal(NodeId(1), 2);
        connection.shift_after_removal(NodeId(3), 0);
        assert_eq!(connection.from.pin, 2);
    }
}
