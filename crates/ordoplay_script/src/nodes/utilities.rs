// SPDX-License-Identifier: MIT OR Apache-2.0
//! Utility nodes: engine singletons and printing.

use crate::graph::GraphError;
use crate::instance::{ExecutionContext, ExecutionError, InstantiateContext, NodeInstance};
use crate::node::{NodeBehavior, NodeCategory, PropertyInfo};
use crate::pin::{Pin, PinType, Value};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Singleton referenced by a freshly placed node
pub const DEFAULT_SINGLETON: &str = "Engine";

const SINGLETON_PROPERTIES: &[PropertyInfo] = &[PropertyInfo {
    name: "singleton",
    value_type: PinType::String,
}];

/// Provides a reference to an engine singleton object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSingletonNode {
    /// Singleton name, also its class name
    pub singleton: String,
}

impl EngineSingletonNode {
    /// Reference the named singleton
    pub fn new(singleton: impl Into<String>) -> Self {
        Self {
            singleton: singleton.into(),
        }
    }
}

impl Default for EngineSingletonNode {
    fn default() -> Self {
        Self::new(DEFAULT_SINGLETON)
    }
}

impl NodeBehavior for EngineSingletonNode {
    fn type_name(&self) -> &'static str {
        "EngineSingleton"
    }

    fn title(&self) -> String {
        "Engine Singleton".to_string()
    }

    fn tooltip(&self) -> String {
        format!("Returns a reference to the engine singleton '{}'", self.singleton)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Utilities
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["engine", "singleton", "global"]
    }

    fn validate(&self) -> Result<(), GraphError> {
        if self.singleton.trim().is_empty() {
            return Err(GraphError::StructuralViolation(
                "engine singleton name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![Pin::data_output("singleton", PinType::Object(self.singleton.clone()))]
    }

    fn resolve_type_class(&self, pin: &Pin) -> Option<String> {
        pin.is_output().then(|| self.singleton.clone())
    }

    fn properties(&self) -> &'static [PropertyInfo] {
        SINGLETON_PROPERTIES
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        (name == "singleton").then(|| Value::String(self.singleton.clone()))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        if name != "singleton" {
            return Err(GraphError::UnknownProperty(name.to_owned()));
        }
        match value {
            Value::String(singleton) if !singleton.trim().is_empty() => {
                self.singleton = singleton;
                Ok(())
            }
            other => Err(GraphError::InvalidPropertyValue {
                name: name.to_owned(),
                reason: format!("expected a non-empty singleton name, found {other}"),
            }),
        }
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(EngineSingletonInstance {
            singleton: self.singleton.clone(),
        })
    }
}

struct EngineSingletonInstance {
    singleton: String,
}

impl NodeInstance for EngineSingletonInstance {
    fn evaluate(&self, ctx: &ExecutionContext<'_>, _output_pin: usize) -> Result<Value, ExecutionError> {
        // An unknown singleton degrades to null
        Ok(ctx
            .singleton(&self.singleton)
            .map(Value::Object)
            .unwrap_or_default())
    }
}

const PRINT_TEXT_PIN: usize = 1;
const PRINT_THEN_PIN: usize = 2;

const PRINT_PROPERTIES: &[PropertyInfo] = &[PropertyInfo {
    name: "text",
    value_type: PinType::String,
}];

/// Sends text to the host output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrintNode {
    /// Text printed when the input is left unconnected
    pub text: String,
}

impl PrintNode {
    /// Print a fixed text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl NodeBehavior for PrintNode {
    fn type_name(&self) -> &'static str {
        "Print"
    }

    fn title(&self) -> String {
        "Print String".to_string()
    }

    fn tooltip(&self) -> String {
        "Prints the text to the host output".to_string()
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Utilities
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["print", "log", "debug"]
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![
            Pin::exec_input("execute"),
            Pin::data_input("text", PinType::String).with_default(Value::String(self.text.clone())),
            Pin::exec_output("then"),
        ]
    }

    fn properties(&self) -> &'static [PropertyInfo] {
        PRINT_PROPERTIES
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        (name == "text").then(|| Value::String(self.text.clone()))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        if name != "text" {
            return Err(GraphError::UnknownProperty(name.to_owned()));
        }
        match value {
            Value::String(text) => {
                self.text = text;
                Ok(())
            }
            other => Err(GraphError::InvalidPropertyValue {
                name: name.to_owned(),
                reason: format!("expected a string, found {other}"),
            }),
        }
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(PrintInstance)
    }
}

struct PrintInstance;

impl NodeInstance for PrintInstance {
    fn execute(&self, ctx: &ExecutionContext<'_>, _input_pin: usize) -> Result<(), ExecutionError> {
        let text = ctx.input(PRINT_TEXT_PIN)?;
        ctx.print(&text.to_string());
        ctx.fire(PRINT_THEN_PIN)
    }
}
