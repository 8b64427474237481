// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function entry, result and call nodes.
//!
//! A function graph has a single entry node, owned by the function's
//! registry entry, and any number of result nodes. Call nodes refer to
//! functions by name only, so renaming or removing a function leaves them
//! for a collaborator to fix up.

use crate::graph::GraphError;
use crate::instance::{ExecutionContext, ExecutionError, InstantiateContext, NodeInstance};
use crate::node::{NodeBehavior, NodeCategory, PropertyInfo};
use crate::nodes::events::EntryInstance;
use crate::pin::{Pin, PinType, Value};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Entry point of a function graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntryNode {
    /// Name of the function
    pub function_name: String,
}

impl FunctionEntryNode {
    /// Entry for the named function
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }
}

impl NodeBehavior for FunctionEntryNode {
    fn type_name(&self) -> &'static str {
        "FunctionEntry"
    }

    fn title(&self) -> String {
        self.function_name.clone()
    }

    fn tooltip(&self) -> String {
        format!("Entry point of function '{}'", self.function_name)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Functions
    }

    fn validate(&self) -> Result<(), GraphError> {
        if self.function_name.is_empty() {
            return Err(GraphError::StructuralViolation(
                "function entry has no function name".to_string(),
            ));
        }
        Ok(())
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![Pin::exec_output("exec")]
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(EntryInstance)
    }
}

const RESULT_VALUE_PIN: usize = 1;

/// Returns a value to the caller of the function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionResultNode {
    /// Declared type of the return value
    pub return_type: PinType,
}

impl Default for FunctionResultNode {
    fn default() -> Self {
        Self {
            return_type: PinType::Any,
        }
    }
}

impl NodeBehavior for FunctionResultNode {
    fn type_name(&self) -> &'static str {
        "FunctionResult"
    }

    fn title(&self) -> String {
        "Return Node".to_string()
    }

    fn tooltip(&self) -> String {
        "Finishes the function and hands its value back to the caller".to_string()
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Functions
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["return", "result", "function"]
    }

    fn validate(&self) -> Result<(), GraphError> {
        if self.return_type == PinType::Exec {
            return Err(GraphError::StructuralViolation(
                "a function cannot return an execution pin".to_string(),
            ));
        }
        Ok(())
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![
            Pin::exec_input("execute"),
            Pin::data_input("return_value", self.return_type.clone()),
        ]
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(FunctionResultInstance)
    }
}

struct FunctionResultInstance;

impl NodeInstance for FunctionResultInstance {
    fn execute(&self, ctx: &ExecutionContext<'_>, _input_pin: usize) -> Result<(), ExecutionError> {
        let value = ctx.input(RESULT_VALUE_PIN)?;
        ctx.set_return_value(value);
        Ok(())
    }
}

const CALL_THEN_PIN: usize = 1;

const CALL_PROPERTIES: &[PropertyInfo] = &[PropertyInfo {
    name: "function_name",
    value_type: PinType::String,
}];

/// Calls a script function by name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallFunctionNode {
    /// Name of the called function
    pub function_name: String,
}

impl CallFunctionNode {
    /// Call the named function
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }
}

impl NodeBehavior for CallFunctionNode {
    fn type_name(&self) -> &'static str {
        "CallFunction"
    }

    fn title(&self) -> String {
        if self.function_name.is_empty() {
            "Call Function".to_string()
        } else {
            format!("Call {}", self.function_name)
        }
    }

    fn tooltip(&self) -> String {
        "Calls a function defined in this script".to_string()
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Functions
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["call", "function", "invoke"]
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![
            Pin::exec_input("execute"),
            Pin::exec_output("then"),
            Pin::data_output("result", PinType::Any),
        ]
    }

    fn properties(&self) -> &'static [PropertyInfo] {
        CALL_PROPERTIES
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        (name == "function_name").then(|| Value::String(self.function_name.clone()))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        if name != "function_name" {
            return Err(GraphError::UnknownProperty(name.to_owned()));
        }
        match value {
            Value::String(function_name) => {
                self.function_name = function_name;
                Ok(())
            }
            other => Err(GraphError::InvalidPropertyValue {
                name: name.to_owned(),
                reason: format!("expected a function name, found {other}"),
            }),
        }
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(CallFunctionInstance {
            function_name: self.function_name.clone(),
            last_result: RefCell::new(Value::Nil),
        })
    }
}

struct CallFunctionInstance {
    function_name: String,
    last_result: RefCell<Value>,
}

impl NodeInstance for CallFunctionInstance {
    fn execute(&self, ctx: &ExecutionContext<'_>, _input_pin: usize) -> Result<(), ExecutionError> {
        let result = ctx.call_function(&self.function_name)?;
        *self.last_result.borrow_mut() = result;
        ctx.fire(CALL_THEN_PIN)
    }

    fn evaluate(&self, _ctx: &ExecutionContext<'_>, _output_pin: usize) -> Result<Value, ExecutionError> {
        Ok(self.last_result.borrow().clone())
    }
}
