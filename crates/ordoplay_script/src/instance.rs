// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node instances and their execution context.

use crate::config::EngineConfig;
use crate::node::NodeId;
use crate::pin::{ObjectRef, Value};
use crate::runtime::{CallFrame, CompiledGraph, CompiledNode, ScriptInstance, ScriptInstanceId};

/// Inputs available to a node while it compiles
pub struct InstantiateContext<'a> {
    /// Script instance the node instance will belong to
    pub instance: ScriptInstanceId,
    /// Node being compiled
    pub node: NodeId,
    /// Engine settings in effect
    pub config: &'a EngineConfig,
}

/// Runtime counterpart of a node.
///
/// Instances are created once per script instance activation and never
/// change afterwards except for internal execution state.
pub trait NodeInstance {
    /// Run the node after one of its execution inputs fired
    fn execute(&self, ctx: &ExecutionContext<'_>, input_pin: usize) -> Result<(), ExecutionError> {
        let _ = (ctx, input_pin);
        Ok(())
    }

    /// Produce the value of a data output
    fn evaluate(&self, ctx: &ExecutionContext<'_>, output_pin: usize) -> Result<Value, ExecutionError> {
        let _ = (ctx, output_pin);
        Ok(Value::Nil)
    }
}

/// Context for running one node
pub struct ExecutionContext<'a> {
    runtime: &'a ScriptInstance,
    graph: &'a CompiledGraph,
    frame: &'a CallFrame,
    node: NodeId,
    depth: usize,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        runtime: &'a ScriptInstance,
        graph: &'a CompiledGraph,
        frame: &'a CallFrame,
        node: NodeId,
        depth: usize,
    ) -> Self {
        Self {
            runtime,
            graph,
            frame,
            node,
            depth,
        }
    }

    /// Node being run
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Script instance driving execution
    pub fn instance_id(&self) -> ScriptInstanceId {
        self.runtime.id()
    }

    /// Name of the graph being run
    pub fn graph_name(&self) -> &str {
        &self.graph.name
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn current(&self) -> Result<&'a CompiledNode, ExecutionError> {
        self.graph
            .nodes
            .get(&self.node)
            .ok_or(ExecutionError::NodeNotFound(self.node))
    }

    fn enter(&self, node: NodeId) -> Result<ExecutionContext<'a>, ExecutionError> {
        let depth = self.depth + 1;
        if depth > self.runtime.config().max_stack_depth {
            return Err(ExecutionError::StackOverflow { depth });
        }
        Ok(Self::new(self.runtime, self.graph, self.frame, node, depth))
    }

    /// Run this context's node as if `input_pin` fired
    pub(crate) fn run(&self, input_pin: usize) -> Result<(), ExecutionError> {
        let compiled = self.current()?;
        debug_assert_eq!(compiled.owner, self.runtime.id());
        tracing::trace!(graph = %self.graph.name, node = %self.node, input_pin, "Executing node");
        compiled.instance.execute(self, input_pin)
    }

    /// Fire an execution output.
    ///
    /// Returns once the downstream chain has finished. An unconnected output
    /// is a no-op.
    pub fn fire(&self, output_pin: usize) -> Result<(), ExecutionError> {
        let Some(&(target, input_pin)) = self.graph.exec_links.get(&(self.node, output_pin)) else {
            return Ok(());
        };
        self.enter(target)?.run(input_pin)
    }

    /// Read a data input: the connected source's value, else the pin default, else `Nil`
    pub fn input(&self, input_pin: usize) -> Result<Value, ExecutionError> {
        let compiled = self.current()?;
        let pin = compiled
            .pins
            .get(input_pin)
            .ok_or(ExecutionError::InvalidPinReference { node: self.node, pin: input_pin })?;
        match self.graph.data_links.get(&(self.node, input_pin)) {
            Some(&(source, output_pin)) => self.pull(source, output_pin),
            None => Ok(pin.default_value.clone().unwrap_or_default()),
        }
    }

    /// Evaluate a data output of `source`
    pub(crate) fn pull(&self, source: NodeId, output_pin: usize) -> Result<Value, ExecutionError> {
        let key = (source, output_pin);
        if self.frame.pulls.borrow().contains(&key) {
            return Err(ExecutionError::DataCycle(source));
        }
        let child = self.enter(source)?;
        let compiled = child.current()?;
        if !compiled.pins.get(output_pin).is_some_and(|p| p.is_output() && !p.is_execution()) {
            return Err(ExecutionError::InvalidPinReference { node: source, pin: output_pin });
        }

        self.frame.pulls.borrow_mut().push(key);
        let value = compiled.instance.evaluate(&child, output_pin);
        self.frame.pulls.borrow_mut().pop();
        value
    }

    /// Call a script function and return its result
    pub fn call_function(&self, name: &str) -> Result<Value, ExecutionError> {
        self.runtime.invoke(name, self.depth + 1)
    }

    /// Store the value the current function returns
    pub fn set_return_value(&self, value: Value) {
        *self.frame.result.borrow_mut() = value;
    }

    /// Resolve an engine singleton through the script instance
    pub fn singleton(&self, name: &str) -> Option<ObjectRef> {
        self.runtime.resolve_singleton(name)
    }

    /// Send text to the host output
    pub fn print(&self, text: &str) {
        self.runtime.host().print(text);
    }
}

/// Error during execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// Nesting exceeded the configured limit
    #[error("Stack overflow: depth {depth} exceeds the configured limit")]
    StackOverflow {
        /// Depth reached
        depth: usize,
    },

    /// No function with this name
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// No graph with this name
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Pin index out of range or of the wrong kind
    #[error("Node {node} has no usable pin at index {pin}")]
    InvalidPinReference {
        /// Node addressed
        node: NodeId,
        /// Pin index addressed
        pin: usize,
    },

    /// A data pull reached itself
    #[error("Data cycle detected at node {0}")]
    DataCycle(NodeId),
}

impl ExecutionError {
    /// Whether flow control may absorb this error and carry on.
    ///
    /// A stack overflow always unwinds the whole activation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StackOverflow { .. })
    }
}
