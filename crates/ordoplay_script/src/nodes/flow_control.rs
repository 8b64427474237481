// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow control nodes.

use crate::config::SequenceFailurePolicy;
use crate::editable::{dynamic_pin_index, dynamic_pin_name, EditablePins};
use crate::graph::GraphError;
use crate::instance::{ExecutionContext, ExecutionError, InstantiateContext, NodeInstance};
use crate::node::{NodeBehavior, NodeCategory, PropertyInfo};
use crate::pin::{Pin, PinType, Value};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Fewest steps a sequence may have
pub const MIN_STEPS: usize = 2;

/// Most steps a sequence may have
pub const MAX_STEPS: usize = 256;

const PIN_PREFIX: &str = "then";

/// Index of `then_0`; the execution input sits at 0
const FIRST_STEP_PIN: usize = 1;

const PROPERTIES: &[PropertyInfo] = &[PropertyInfo {
    name: "steps",
    value_type: PinType::Int,
}];

/// Fires each output execution pin in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNode {
    steps: usize,
}

impl SequenceNode {
    /// Create a sequence with `steps` outputs, clamped to
    /// [`MIN_STEPS`]..=[`MAX_STEPS`]
    pub fn with_steps(steps: usize) -> Self {
        Self {
            steps: steps.clamp(MIN_STEPS, MAX_STEPS),
        }
    }

    /// Number of configured steps
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl Default for SequenceNode {
    fn default() -> Self {
        Self { steps: MIN_STEPS }
    }
}

impl NodeBehavior for SequenceNode {
    fn type_name(&self) -> &'static str {
        "Sequence"
    }

    fn title(&self) -> String {
        "Sequence".to_string()
    }

    fn tooltip(&self) -> String {
        "Executes a series of pins in order".to_string()
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::FlowControl
    }

    fn keywords(&self) -> &'static [&'static str] {
        &["sequence", "order", "then"]
    }

    fn validate(&self) -> Result<(), GraphError> {
        check_steps(self.steps)
    }

    fn allocate_default_pins(&self) -> Vec<Pin> {
        // Unvalidated configurations never allocate past the bound
        let steps = self.steps.min(MAX_STEPS);
        let mut pins = Vec::with_capacity(FIRST_STEP_PIN + steps);
        pins.push(Pin::exec_input("execute"));
        pins.extend((0..steps).map(|i| Pin::exec_output(dynamic_pin_name(PIN_PREFIX, i)).dynamic()));
        pins
    }

    fn properties(&self) -> &'static [PropertyInfo] {
        PROPERTIES
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "steps" => i64::try_from(self.steps).ok().map(Value::Int),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        if name != "steps" {
            return Err(GraphError::UnknownProperty(name.to_owned()));
        }
        let steps = value.as_int().ok_or_else(|| GraphError::InvalidPropertyValue {
            name: name.to_owned(),
            reason: format!("expected an integer, found {value}"),
        })?;
        let steps = usize::try_from(steps).map_err(|_| {
            GraphError::StructuralViolation(format!("a sequence needs at least {MIN_STEPS} steps, got {steps}"))
        })?;
        check_steps(steps)?;
        self.steps = steps;
        Ok(())
    }

    fn instantiate(&self, ctx: &InstantiateContext<'_>) -> Rc<dyn NodeInstance> {
        Rc::new(SequenceInstance {
            steps: self.steps,
            policy: ctx.config.sequence_failure,
        })
    }

    fn editable(&self) -> Option<&dyn EditablePins> {
        Some(self)
    }

    fn editable_mut(&mut self) -> Option<&mut dyn EditablePins> {
        Some(self)
    }
}

impl EditablePins for SequenceNode {
    fn pin_prefix(&self) -> &str {
        PIN_PREFIX
    }

    fn can_add_dynamic_pin(&self) -> bool {
        self.steps < MAX_STEPS
    }

    fn add_dynamic_pin(&mut self) {
        self.steps += 1;
    }

    fn can_remove_dynamic_pin(&self, pin: &Pin) -> bool {
        self.steps > MIN_STEPS && pin.dynamic && dynamic_pin_index(PIN_PREFIX, &pin.name).is_some()
    }

    fn remove_dynamic_pin(&mut self, _pin: &Pin) {
        // Steps are interchangeable; the graph renumbers and remaps the survivors
        if self.steps > MIN_STEPS {
            self.steps -= 1;
        }
    }
}

fn check_steps(steps: usize) -> Result<(), GraphError> {
    if steps < MIN_STEPS {
        return Err(GraphError::StructuralViolation(format!(
            "a sequence needs at least {MIN_STEPS} steps, got {steps}"
        )));
    }
    if steps > MAX_STEPS {
        return Err(GraphError::StructuralViolation(format!(
            "a sequence takes at most {MAX_STEPS} steps, got {steps}"
        )));
    }
    Ok(())
}

struct SequenceInstance {
    steps: usize,
    policy: SequenceFailurePolicy,
}

impl NodeInstance for SequenceInstance {
    fn execute(&self, ctx: &ExecutionContext<'_>, _input_pin: usize) -> Result<(), ExecutionError> {
        for step in 0..self.steps {
            // Each step returns before the next one fires
            if let Err(err) = ctx.fire(FIRST_STEP_PIN + step) {
                if self.policy == SequenceFailurePolicy::Halt || !err.is_recoverable() {
                    return Err(err);
                }
                tracing::warn!(
                    node = %ctx.node_id(),
                    step,
                    error = %err,
                    "Sequence step failed, continuing with the next step"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeId};
    use crate::nodes::NodeKind;
    use crate::pin::{PinDirection, PinKind};

    #[test]
    fn test_sequence_pins_for_step_counts() {
        for steps in MIN_STEPS..=16 {
            let node = Node::new(NodeId(1), NodeKind::Sequence(SequenceNode::with_steps(steps)));
            assert_eq!(node.inputs().count(), 1);

            let outputs: Vec<_> = node.outputs().collect();
            assert_eq!(outputs.len(), steps);
            for (step, (index, pin)) in outputs.into_iter().enumerate() {
                assert_eq!(index, FIRST_STEP_PIN + step);
                assert_eq!(pin.name, format!("then_{step}"));
                assert_eq!(pin.kind, PinKind::Execution);
                assert_eq!(pin.direction, PinDirection::Output);
            }
        }
    }

    #[test]
    fn test_allocate_default_pins_is_idempotent() {
        let mut node = Node::new(NodeId(1), NodeKind::Sequence(SequenceNode::with_steps(3)));
        let before = node.pins().to_vec();
        node.allocate_default_pins();
        node.allocate_default_pins();
        assert_eq!(node.pins(), before.as_slice());
    }

    #[test]
    fn test_with_steps_clamps_to_minimum() {
        assert_eq!(SequenceNode::with_steps(0).steps(), MIN_STEPS);
    }

    #[test]
    fn test_remove_capability_at_minimum() {
        let node = Node::new(NodeId(1), NodeKind::Sequence(SequenceNode::default()));
        assert!(node.can_add_dynamic_pin());
        assert!(!node.can_remove_dynamic_pin(1));
        assert_eq!(node.pin_prefix(), Some("then"));
    }

    #[test]
    fn test_input_pin_is_not_removable() {
        let node = Node::new(NodeId(1), NodeKind::Sequence(SequenceNode::with_steps(4)));
        assert!(!node.can_remove_dynamic_pin(0));
        assert!(node.can_remove_dynamic_pin(2));
    }

    #[test]
    fn test_steps_property() {
        let mut sequence = SequenceNode::default();
        assert_eq!(sequence.get_property("steps"), Some(Value::Int(2)));

        sequence.set_property("steps", Value::Int(5)).unwrap();
        assert_eq!(sequence.steps(), 5);

        let err = sequence.set_property("steps", Value::Int(1)).unwrap_err();
        assert!(matches!(err, GraphError::StructuralViolation(_)));
        assert_eq!(sequence.steps(), 5);

        let err = sequence.set_property("steps", Value::String("3".into())).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPropertyValue { .. }));
    }

    #[test]
    fn test_steps_above_maximum_rejected() {
        let mut sequence = SequenceNode::default();
        for steps in [MAX_STEPS as i64 + 1, i64::MAX, -1] {
            let err = sequence.set_property("steps", Value::Int(steps)).unwrap_err();
            assert!(matches!(err, GraphError::StructuralViolation(_)));
        }
        assert_eq!(sequence.steps(), MIN_STEPS);

        sequence.set_property("steps", Value::Int(MAX_STEPS as i64)).unwrap();
        assert_eq!(sequence.steps(), MAX_STEPS);
        assert!(!sequence.can_add_dynamic_pin());
    }

    #[test]
    fn test_oversized_configuration_fails_validation() {
        let sequence = SequenceNode { steps: usize::MAX };
        assert!(matches!(sequence.validate(), Err(GraphError::StructuralViolation(_))));
        assert_eq!(sequence.allocate_default_pins().len(), FIRST_STEP_PIN + MAX_STEPS);
        assert_eq!(SequenceNode::with_steps(usize::MAX).steps(), MAX_STEPS);
    }
}
