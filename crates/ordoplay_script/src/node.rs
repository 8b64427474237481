// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the script graph.

use crate::editable::EditablePins;
use crate::graph::{GraphError, GraphId};
use crate::instance::{InstantiateContext, NodeInstance};
use crate::nodes::NodeKind;
use crate::pin::{Pin, PinType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Stable identifier for a node, unique within its script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Graph entry points
    Events,
    /// Flow control
    FlowControl,
    /// Function entry, result and calls
    Functions,
    /// Utility nodes
    Utilities,
    /// Constant values
    Constants,
}

impl NodeCategory {
    /// Theme color name used for the node title
    pub fn color_name(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::FlowControl => "flow_control",
            Self::Functions => "function_call",
            Self::Utilities => "variable",
            Self::Constants => "constants",
        }
    }
}

/// Reflected configuration property of a node kind
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    /// Property name
    pub name: &'static str,
    /// Expected value type
    pub value_type: PinType,
}

/// Behavior shared by every node kind
pub trait NodeBehavior {
    /// Unique type identifier
    fn type_name(&self) -> &'static str;

    /// Display title
    fn title(&self) -> String;

    /// Tooltip text
    fn tooltip(&self) -> String;

    /// Category
    fn category(&self) -> NodeCategory;

    /// Search keywords
    fn keywords(&self) -> &'static [&'static str] {
        &[]
    }

    /// Check the configuration is structurally valid
    fn validate(&self) -> Result<(), GraphError> {
        Ok(())
    }

    /// Canonical pin set for the current configuration
    fn allocate_default_pins(&self) -> Vec<Pin>;

    /// Class name of an object pin
    fn resolve_type_class(&self, pin: &Pin) -> Option<String> {
        pin.pin_type.class_name().map(str::to_owned)
    }

    /// Configuration schema
    fn properties(&self) -> &'static [PropertyInfo] {
        &[]
    }

    /// Read a configuration property by name
    fn get_property(&self, name: &str) -> Option<Value> {
        let _ = name;
        None
    }

    /// Write a configuration property by name.
    ///
    /// Implementations validate before mutating.
    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        let _ = value;
        Err(GraphError::UnknownProperty(name.to_owned()))
    }

    /// Compile into a runtime instance
    fn instantiate(&self, ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance>;

    /// Editable-pin capability, if supported
    fn editable(&self) -> Option<&dyn EditablePins> {
        None
    }

    /// Mutable editable-pin capability, if supported
    fn editable_mut(&mut self) -> Option<&mut dyn EditablePins> {
        None
    }
}

/// A node in a script graph
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    graph: Option<GraphId>,
    kind: NodeKind,
    /// Position in the graph editor
    pub position: [f32; 2],
    pins: Vec<Pin>,
}

impl Node {
    /// Create a node and allocate its default pins
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        let mut node = Self {
            id,
            graph: None,
            kind,
            position: [0.0, 0.0],
            pins: Vec::new(),
        };
        node.allocate_default_pins();
        node
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Graph that owns this node
    pub fn graph(&self) -> Option<GraphId> {
        self.graph
    }

    pub(crate) fn set_graph(&mut self, graph: GraphId) {
        self.graph = Some(graph);
    }

    /// Kind-specific configuration
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Shared behavior of this node's kind
    pub fn behavior(&self) -> &dyn NodeBehavior {
        self.kind.behavior()
    }

    /// Type identifier
    pub fn type_name(&self) -> &'static str {
        self.behavior().type_name()
    }

    /// Display title
    pub fn title(&self) -> String {
        self.behavior().title()
    }

    /// Tooltip text
    pub fn tooltip(&self) -> String {
        self.behavior().tooltip()
    }

    /// All pins in declaration order
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Get a pin by index
    pub fn pin(&self, index: usize) -> Option<&Pin> {
        self.pins.get(index)
    }

    /// Find a pin index by name
    pub fn pin_index(&self, name: &str) -> Option<usize> {
        self.pins.iter().position(|p| p.name == name)
    }

    /// Input pins with their indices
    pub fn inputs(&self) -> impl Iterator<Item = (usize, &Pin)> {
        self.pins.iter().enumerate().filter(|(_, p)| p.is_input())
    }

    /// Output pins with their indices
    pub fn outputs(&self) -> impl Iterator<Item = (usize, &Pin)> {
        self.pins.iter().enumerate().filter(|(_, p)| p.is_output())
    }

    /// Rebuild the canonical pin set from the configuration.
    ///
    /// Replaces the pin list, so calling it on a valid node is a no-op.
    pub fn allocate_default_pins(&mut self) {
        self.pins = self.kind.behavior().allocate_default_pins();
    }

    /// Check the configuration is structurally valid
    pub fn validate(&self) -> Result<(), GraphError> {
        self.behavior().validate()
    }

    /// Class name behind an object pin
    pub fn resolve_type_class(&self, pin_index: usize) -> Option<String> {
        let pin = self.pins.get(pin_index)?;
        self.behavior().resolve_type_class(pin)
    }

    /// Configuration schema
    pub fn properties(&self) -> &'static [PropertyInfo] {
        self.behavior().properties()
    }

    /// Read a configuration property
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.behavior().get_property(name)
    }

    pub(crate) fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        self.kind.behavior_mut().set_property(name, value)?;
        self.allocate_default_pins();
        Ok(())
    }

    /// Whether this node supports dynamic pins
    pub fn is_editable(&self) -> bool {
        self.behavior().editable().is_some()
    }

    /// Prefix of the dynamic pin family
    pub fn pin_prefix(&self) -> Option<&str> {
        self.kind.behavior().editable().map(|editable| editable.pin_prefix())
    }

    /// Whether a dynamic pin may be appended
    pub fn can_add_dynamic_pin(&self) -> bool {
        self.behavior()
            .editable()
            .is_some_and(|editable| editable.can_add_dynamic_pin())
    }

    /// Whether the pin at `pin_index` may be removed
    pub fn can_remove_dynamic_pin(&self, pin_index: usize) -> bool {
        match (self.behavior().editable(), self.pins.get(pin_index)) {
            (Some(editable), Some(pin)) => editable.can_remove_dynamic_pin(pin),
            _ => false,
        }
    }

    /// Append a dynamic pin and return its index
    pub(crate) fn add_dynamic_pin(&mut self) -> Result<usize, GraphError> {
        let id = self.id;
        let editable = self
            .kind
            .behavior_mut()
            .editable_mut()
            .ok_or(GraphError::NotEditable(id))?;
        if !editable.can_add_dynamic_pin() {
            return Err(GraphError::StructuralViolation(format!(
                "node {id} cannot take another dynamic pin"
            )));
        }
        editable.add_dynamic_pin();
        self.allocate_default_pins();
        self.pins
            .iter()
            .rposition(|p| p.dynamic)
            .ok_or_else(|| GraphError::StructuralViolation(format!("node {id} has no dynamic pins")))
    }

    /// Remove the dynamic pin at `pin_index`; later pins shift down by one
    pub(crate) fn remove_dynamic_pin(&mut self, pin_index: usize) -> Result<(), GraphError> {
        let id = self.id;
        let pin = self
            .pins
            .get(pin_index)
            .cloned()
            .ok_or(GraphError::InvalidPinReference { node: id, pin: pin_index })?;
        let editable = self
            .kind
            .behavior_mut()
            .editable_mut()
            .ok_or(GraphError::NotEditable(id))?;
        if !editable.can_remove_dynamic_pin(&pin) {
            return Err(GraphError::StructuralViolation(format!(
                "pin '{}' of node {id} cannot be removed",
                pin.name
            )));
        }
        editable.remove_dynamic_pin(&pin);
        self.allocate_default_pins();
        Ok(())
    }
}
