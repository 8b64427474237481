// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a pin carries control flow or a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinKind {
    /// Execution flow, carries no value
    Execution,
    /// Data flow, values are pulled on demand
    Data,
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    /// Input pin
    Input,
    /// Output pin
    Output,
}

/// Declared type of a pin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinType {
    /// Execution flow
    Exec,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// String value
    String,
    /// Host object of the named class
    Object(String),
    /// Any type (for generic pins)
    Any,
}

impl PinType {
    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PinType) -> bool {
        match (self, other) {
            (Self::Exec, Self::Exec) => true,
            (Self::Exec, _) | (_, Self::Exec) => false,
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            // A generic object input accepts any class
            (Self::Object(_), Self::Object(class)) if class == "Object" => true,
            _ => self == other,
        }
    }

    /// Class name of an object type
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Object(class) => Some(class),
            _ => None,
        }
    }
}

/// Reference to an object owned by the host engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Host-assigned object id
    pub id: u64,
    /// Class name of the object
    pub class: String,
}

impl ObjectRef {
    /// Create a new object reference
    pub fn new(id: u64, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
        }
    }
}

/// Value that can flow through a data pin
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Empty value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Host object
    Object(ObjectRef),
}

impl Value {
    /// Get the pin type for this value
    pub fn pin_type(&self) -> PinType {
        match self {
            Self::Nil => PinType::Any,
            Self::Bool(_) => PinType::Bool,
            Self::Int(_) => PinType::Int,
            Self::Float(_) => PinType::Float,
            Self::String(_) => PinType::String,
            Self::Object(object) => PinType::Object(object.class.clone()),
        }
    }

    /// Whether this is the empty value
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// String payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Object payload, if any
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::Object(object) => write!(f, "<{}#{}>", object.class, object.id),
        }
    }
}

/// A pin on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// Pin name, unique within the node
    pub name: String,
    /// Execution or data
    pub kind: PinKind,
    /// Pin direction
    pub direction: PinDirection,
    /// Declared type
    pub pin_type: PinType,
    /// Value used when an input is left unconnected
    pub default_value: Option<Value>,
    /// Whether the pin belongs to a dynamic pin family
    pub dynamic: bool,
}

impl Pin {
    /// Create a new pin
    pub fn new(
        name: impl Into<String>,
        kind: PinKind,
        direction: PinDirection,
        pin_type: PinType,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            direction,
            pin_type,
            default_value: None,
            dynamic: false,
        }
    }

    /// Create an execution input
    pub fn exec_input(name: impl Into<String>) -> Self {
        Self::new(name, PinKind::Execution, PinDirection::Input, PinType::Exec)
    }

    /// Create an execution output
    pub fn exec_output(name: impl Into<String>) -> Self {
        Self::new(name, PinKind::Execution, PinDirection::Output, PinType::Exec)
    }

    /// Create a data input
    pub fn data_input(name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(name, PinKind::Data, PinDirection::Input, pin_type)
    }

    /// Create a data output
    pub fn data_output(name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(name, PinKind::Data, PinDirection::Output, pin_type)
    }

    /// Set the default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Mark as part of a dynamic pin family
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Whether this is an execution pin
    pub fn is_execution(&self) -> bool {
        self.kind == PinKind::Execution
    }

    /// Whether this is an input pin
    pub fn is_input(&self) -> bool {
        self.direction == PinDirection::Input
    }

    /// Whether this is an output pin
    pub fn is_output(&self) -> bool {
        self.direction == PinDirection::Output
    }

    /// Whether the pin may take part in more than one connection.
    ///
    /// An execution output continues into exactly one node and a data input
    /// reads from exactly one source.
    pub fn accepts_multiple_links(&self) -> bool {
        !matches!(
            (self.kind, self.direction),
            (PinKind::Execution, PinDirection::Output) | (PinKind::Data, PinDirection::Input)
        )
    }

    /// Check if a connection from this pin to `other` is valid
    pub fn can_connect(&self, other: &Pin) -> bool {
        self.is_output()
            && other.is_input()
            && self.kind == other.kind
            && self.pin_type.can_connect_to(&other.pin_type)
    }
}
