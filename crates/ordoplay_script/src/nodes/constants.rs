// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant value nodes.

use crate::graph::GraphError;
use crate::instance::{ExecutionContext, ExecutionError, InstantiateContext, NodeInstance};
use crate::node::{NodeBehavior, NodeCategory, PropertyInfo};
use crate::pin::{Pin, PinType, Value};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

const PROPERTIES: &[PropertyInfo] = &[PropertyInfo {
    name: "value",
    value_type: PinType::Any,
}];

/// Outputs a constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralNode {
    /// The constant
    pub value: Value,
}

impl LiteralNode {
    /// Output the given value
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Default for LiteralNode {
    fn default() -> Self {
        Self::new(Value::Int(0))
    }
}

impl NodeBehavior for LiteralNode {
    fn type_name(&self) -> &'static str {
        "Literal"
    }

    fn title(&self) -> String {
        "Literal".to_string()
    }

    fn tooltip(&self) -> String {
        format!("Outputs the constant {}", self.value)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Constants
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["constant", "literal", "value"]
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![Pin::data_output("value", self.value.pin_type())]
    }

    fn properties(&self) -> &'static [PropertyInfo] {
        PROPERTIES
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        (name == "value").then(|| self.value.clone())
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        if name != "value" {
            return Err(GraphError::UnknownProperty(name.to_owned()));
        }
        self.value = value;
        Ok(())
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(LiteralInstance {
            value: self.value.clone(),
        })
    }
}

struct LiteralInstance {
    value: Value,
}

impl NodeInstance for LiteralInstance {
    fn evaluate(&self, _ctx: &ExecutionContext<'_>, _output_pin: usize) -> Result<Value, ExecutionError> {
        Ok(self.value.clone())
    }
}
