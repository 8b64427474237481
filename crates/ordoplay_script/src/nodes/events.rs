// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event entry points.

use crate::graph::GraphError;
use crate::instance::{ExecutionContext, ExecutionError, InstantiateContext, NodeInstance};
use crate::node::{NodeBehavior, NodeCategory, PropertyInfo};
use crate::pin::{Pin, PinType, Value};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Event dispatched once the host object enters the scene
pub const READY_EVENT: &str = "_ready";

const PROPERTIES: &[PropertyInfo] = &[PropertyInfo {
    name: "event_name",
    value_type: PinType::String,
}];

/// Starts execution when the host dispatches the named event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNode {
    /// Event that triggers this node
    pub event_name: String,
}

impl EventNode {
    /// Listen for the named event
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
        }
    }
}

impl Default for EventNode {
    fn default() -> Self {
        Self::new(READY_EVENT)
    }
}

impl NodeBehavior for EventNode {
    fn type_name(&self) -> &'static str {
        "Event"
    }

    fn title(&self) -> String {
        format!("Event {}", self.event_name)
    }

    fn tooltip(&self) -> String {
        format!("Entry point run when the host dispatches '{}'", self.event_name)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Events
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["event", "entry", "ready", "process"]
    }

    fn validate(&self) -> Result<(), GraphError> {
        if self.event_name.is_empty() {
            return Err(GraphError::StructuralViolation("event name must not be empty".to_string()));
        }
        Ok(())
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        vec![Pin::exec_output("exec")]
    }

    fn properties(&self) -> &'static [PropertyInfo] {
        PROPERTIES
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        (name == "event_name").then(|| Value::String(self.event_name.clone()))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        if name != "event_name" {
            return Err(GraphError::UnknownProperty(name.to_owned()));
        }
        match value {
            Value::String(event_name) if !event_name.is_empty() => {
                self.event_name = event_name;
                Ok(())
            }
            other => Err(GraphError::InvalidPropertyValue {
                name: name.to_owned(),
                reason: format!("expected a non-empty event name, found {other}"),
            }),
        }
    }

    fn instantiate(&self, _ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(EntryInstance)
    }
}

/// Fires the single execution output of an entry node
pub(crate) struct EntryInstance;

impl NodeInstance for EntryInstance {
    fn execute(&self, ctx: &ExecutionContext<'_>, _input_pin: usize) -> Result<(), ExecutionError> {
        ctx.fire(0)
    }
}
