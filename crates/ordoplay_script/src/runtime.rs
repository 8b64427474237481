// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script instances: scripts compiled and bound to a host object.
//!
//! A [`ScriptInstance`] compiles every node of a [`Script`] into a
//! [`NodeInstance`] when it is created and owns them until it is dropped.
//! It keeps no reference to the script, so the design-time graphs may be
//! edited or dropped while the instance runs.
//!
//! Instances share their node instances through `Rc` and are therefore
//! bound to the thread that created them.

use crate::config::EngineConfig;
use crate::graph::Graph;
use crate::host::ScriptHost;
use crate::instance::{ExecutionContext, ExecutionError, InstantiateContext, NodeInstance};
use crate::node::NodeId;
use crate::pin::{ObjectRef, Pin, Value};
use crate::script::Script;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptInstanceId(pub Uuid);

impl ScriptInstanceId {
    /// Create a new random instance ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScriptInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScriptInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct CompiledNode {
    /// Script instance the node was compiled for
    pub(crate) owner: ScriptInstanceId,
    /// Pin bindings captured at compile time
    pub(crate) pins: Vec<Pin>,
    pub(crate) instance: Rc<dyn NodeInstance>,
}

pub(crate) struct CompiledGraph {
    pub(crate) name: String,
    pub(crate) nodes: HashMap<NodeId, CompiledNode>,
    /// Execution output -> execution input
    pub(crate) exec_links: HashMap<(NodeId, usize), (NodeId, usize)>,
    /// Data input -> data output
    pub(crate) data_links: HashMap<(NodeId, usize), (NodeId, usize)>,
    /// Event entry points in node order
    pub(crate) entry_points: Vec<(String, NodeId)>,
}

impl CompiledGraph {
    fn compile(graph: &Graph, owner: ScriptInstanceId, config: &EngineConfig) -> Self {
        let mut nodes = HashMap::with_capacity(graph.node_count());
        let mut entry_points = Vec::new();
        for node in graph.nodes() {
            let ctx = InstantiateContext {
                instance: owner,
                node: node.id(),
                config,
            };
            nodes.insert(
                node.id(),
                CompiledNode {
                    owner,
                    pins: node.pins().to_vec(),
                    instance: node.behavior().instantiate(&ctx),
                },
            );
            if let Some(event) = node.kind().event_name() {
                entry_points.push((event.to_owned(), node.id()));
            }
        }

        let mut exec_links = HashMap::new();
        let mut data_links = HashMap::new();
        for connection in graph.connections() {
            let is_execution = graph
                .node(connection.from.node)
                .and_then(|n| n.pin(connection.from.pin))
                .is_some_and(Pin::is_execution);
            let from = (connection.from.node, connection.from.pin);
            let to = (connection.to.node, connection.to.pin);
            if is_execution {
                exec_links.insert(from, to);
            } else {
                data_links.insert(to, from);
            }
        }

        tracing::debug!(
            graph = graph.name(),
            nodes = nodes.len(),
            exec_links = exec_links.len(),
            data_links = data_links.len(),
            "Compiled graph"
        );

        Self {
            name: graph.name().to_owned(),
            nodes,
            exec_links,
            data_links,
            entry_points,
        }
    }
}

/// Per-call state: the return value and the data pulls in progress
#[derive(Default)]
pub(crate) struct CallFrame {
    pub(crate) result: RefCell<Value>,
    pub(crate) pulls: RefCell<Vec<(NodeId, usize)>>,
}

/// A script bound to a running host object
pub struct ScriptInstance {
    id: ScriptInstanceId,
    script_name: String,
    owner: ObjectRef,
    host: Rc<dyn ScriptHost>,
    config: EngineConfig,
    graphs: IndexMap<String, CompiledGraph>,
    /// Function name -> (graph name, entry node)
    functions: HashMap<String, (String, NodeId)>,
    singletons: RefCell<HashMap<String, ObjectRef>>,
}

impl ScriptInstance {
    /// Compile `script` and bind it to `owner`
    pub fn new(script: &Script, owner: ObjectRef, host: Rc<dyn ScriptHost>, config: EngineConfig) -> Self {
        let id = ScriptInstanceId::new();
        let graphs: IndexMap<String, CompiledGraph> = script
            .graphs()
            .map(|graph| (graph.name().to_owned(), CompiledGraph::compile(graph, id, &config)))
            .collect();
        let functions = script
            .functions()
            .filter_map(|function| {
                let graph = script.graph_by_id(function.graph())?;
                Some((
                    function.name().to_owned(),
                    (graph.name().to_owned(), function.owning_node()),
                ))
            })
            .collect();

        tracing::info!(
            instance = %id,
            script = %script.metadata().name,
            owner = owner.id,
            graphs = graphs.len(),
            "Activated script instance"
        );

        Self {
            id,
            script_name: script.metadata().name.clone(),
            owner,
            host,
            config,
            graphs,
            functions,
            singletons: RefCell::new(HashMap::new()),
        }
    }

    /// Instance ID
    pub fn id(&self) -> ScriptInstanceId {
        self.id
    }

    /// Name of the compiled script
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Host object the script is bound to
    pub fn owner(&self) -> &ObjectRef {
        &self.owner
    }

    /// Engine settings in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn host(&self) -> &dyn ScriptHost {
        self.host.as_ref()
    }

    /// Names of the compiled graphs
    pub fn graph_names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    /// Number of node instances owned by this script instance
    pub fn node_instance_count(&self) -> usize {
        self.graphs.values().map(|g| g.nodes.len()).sum()
    }

    /// Run every event node listening for `event_name`, in graph order.
    ///
    /// Returns how many entry points ran.
    pub fn dispatch(&self, event_name: &str) -> Result<usize, ExecutionError> {
        let mut dispatched = 0;
        for graph in self.graphs.values() {
            for (event, node) in &graph.entry_points {
                if event != event_name {
                    continue;
                }
                let frame = CallFrame::default();
                ExecutionContext::new(self, graph, &frame, *node, 0).run(0)?;
                dispatched += 1;
            }
        }
        tracing::debug!(instance = %self.id, event = event_name, dispatched, "Dispatched event");
        Ok(dispatched)
    }

    /// Call a script function and return its result
    pub fn call(&self, function: &str) -> Result<Value, ExecutionError> {
        self.invoke(function, 0)
    }

    pub(crate) fn invoke(&self, name: &str, depth: usize) -> Result<Value, ExecutionError> {
        let (graph_name, entry) = self
            .functions
            .get(name)
            .ok_or_else(|| ExecutionError::FunctionNotFound(name.to_owned()))?;
        if depth > self.config.max_stack_depth {
            return Err(ExecutionError::StackOverflow { depth });
        }
        let graph = self
            .graphs
            .get(graph_name)
            .ok_or_else(|| ExecutionError::GraphNotFound(graph_name.clone()))?;

        let frame = CallFrame::default();
        ExecutionContext::new(self, graph, &frame, *entry, depth).run(0)?;
        Ok(frame.result.into_inner())
    }

    /// Pull the value of a data output directly
    pub fn evaluate(&self, graph_name: &str, node: NodeId, output_pin: usize) -> Result<Value, ExecutionError> {
        let graph = self
            .graphs
            .get(graph_name)
            .ok_or_else(|| ExecutionError::GraphNotFound(graph_name.to_owned()))?;
        let frame = CallFrame::default();
        ExecutionContext::new(self, graph, &frame, node, 0).pull(node, output_pin)
    }

    /// Resolve an engine singleton, consulting the cache before the host.
    ///
    /// Only successful lookups are cached. A miss is logged and yields `None`.
    pub fn resolve_singleton(&self, name: &str) -> Option<ObjectRef> {
        if let Some(object) = self.singletons.borrow().get(name) {
            return Some(object.clone());
        }
        match self.host.lookup(name) {
            Some(object) => {
                self.singletons
                    .borrow_mut()
                    .insert(name.to_owned(), object.clone());
                Some(object)
            }
            None => {
                tracing::warn!(instance = %self.id, singleton = name, "Engine singleton not found, yielding null");
                None
            }
        }
    }

    /// Number of cached singleton references
    pub fn cached_singleton_count(&self) -> usize {
        self.singletons.borrow().len()
    }

    /// Forget cached singleton references
    pub fn clear_singleton_cache(&self) {
        self.singletons.borrow_mut().clear();
    }
}

impl fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("id", &self.id)
            .field("script_name", &self.script_name)
            .field("owner", &self.owner)
            .field("graphs", &self.graphs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Drop for ScriptInstance {
    fn drop(&mut self) {
        tracing::debug!(
            instance = %self.id,
            nodes = self.node_instance_count(),
            "Script instance torn down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequenceFailurePolicy;
    use crate::host::{HostSingletons, SingletonRegistry};
    use crate::node::Node;
    use crate::nodes::events::READY_EVENT;
    use crate::nodes::{
        CallFunctionNode, EngineSingletonNode, EventNode, FunctionResultNode, LiteralNode, NodeKind, PrintNode,
        SequenceNode,
    };
    use crate::script::DEFAULT_EVENT_GRAPH;
    use std::cell::Cell;

    #[derive(Default)]
    struct RecordingHost {
        singletons: HostSingletons,
        printed: RefCell<Vec<String>>,
        lookups: Cell<usize>,
    }

    impl SingletonRegistry for RecordingHost {
        fn lookup(&self, name: &str) -> Option<ObjectRef> {
            self.lookups.set(self.lookups.get() + 1);
            self.singletons.lookup(name)
        }
    }

    impl ScriptHost for RecordingHost {
        fn print(&self, text: &str) {
            self.printed.borrow_mut().push(text.to_owned());
        }
    }

    fn activate(script: &Script, host: &Rc<RecordingHost>, config: EngineConfig) -> ScriptInstance {
        ScriptInstance::new(script, ObjectRef::new(1, "Node"), host.clone(), config)
    }

    fn add(script: &mut Script, graph: &str, kind: NodeKind) -> NodeId {
        script.create_node(graph, kind).unwrap()
    }

    fn link(script: &mut Script, graph: &str, from: (NodeId, usize), to: (NodeId, usize)) {
        script
            .graph_mut(graph)
            .unwrap()
            .connect(from.0, from.1, to.0, to.1)
            .unwrap();
    }

    /// Event -> Sequence whose steps each lead to the given kinds
    fn sequence_script(steps: Vec<NodeKind>) -> Script {
        let mut script = Script::new("Test", "Node");
        let event = add(&mut script, DEFAULT_EVENT_GRAPH, NodeKind::Event(EventNode::default()));
        let sequence = add(
            &mut script,
            DEFAULT_EVENT_GRAPH,
            NodeKind::Sequence(SequenceNode::with_steps(steps.len())),
        );
        link(&mut script, DEFAULT_EVENT_GRAPH, (event, 0), (sequence, 0));
        for (step, kind) in steps.into_iter().enumerate() {
            let target = add(&mut script, DEFAULT_EVENT_GRAPH, kind);
            link(&mut script, DEFAULT_EVENT_GRAPH, (sequence, 1 + step), (target, 0));
        }
        script
    }

    fn print(text: &str) -> NodeKind {
        NodeKind::Print(PrintNode::new(text))
    }

    #[test]
    fn test_sequence_fires_each_step_once_in_order() {
        for n in 2..=8 {
            let expected: Vec<String> = (0..n).map(|k| format!("step {k}")).collect();
            let script = sequence_script(expected.iter().map(|text| print(text)).collect());
            let host = Rc::new(RecordingHost::default());
            let instance = activate(&script, &host, EngineConfig::default());

            assert_eq!(instance.dispatch(READY_EVENT).unwrap(), 1);
            assert_eq!(*host.printed.borrow(), expected);
        }
    }

    #[test]
    fn test_step_completes_before_next_step() {
        let mut script = sequence_script(vec![print("a"), print("b")]);
        let graph = script.graph(DEFAULT_EVENT_GRAPH).unwrap();
        let first = graph.nodes().find(|n| n.title() == "Print String").map(Node::id).unwrap();
        let chained = add(&mut script, DEFAULT_EVENT_GRAPH, print("a2"));
        link(&mut script, DEFAULT_EVENT_GRAPH, (first, 2), (chained, 0));

        let host = Rc::new(RecordingHost::default());
        activate(&script, &host, EngineConfig::default())
            .dispatch(READY_EVENT)
            .unwrap();
        assert_eq!(*host.printed.borrow(), vec!["a", "a2", "b"]);
    }

    #[test]
    fn test_continue_policy_fires_remaining_steps() {
        let script = sequence_script(vec![
            print("a"),
            NodeKind::CallFunction(CallFunctionNode::new("Missing")),
            print("c"),
        ]);
        let host = Rc::new(RecordingHost::default());
        let instance = activate(&script, &host, EngineConfig::default());

        assert_eq!(instance.dispatch(READY_EVENT).unwrap(), 1);
        assert_eq!(*host.printed.borrow(), vec!["a", "c"]);
    }

    #[test]
    fn test_halt_policy_stops_at_failure() {
        let script = sequence_script(vec![
            print("a"),
            NodeKind::CallFunction(CallFunctionNode::new("Missing")),
            print("c"),
        ]);
        let host = Rc::new(RecordingHost::default());
        let config = EngineConfig {
            sequence_failure: SequenceFailurePolicy::Halt,
            ..EngineConfig::default()
        };
        let instance = activate(&script, &host, config);

        let err = instance.dispatch(READY_EVENT).unwrap_err();
        assert_eq!(err, ExecutionError::FunctionNotFound("Missing".to_string()));
        assert_eq!(*host.printed.borrow(), vec!["a"]);
    }

    #[test]
    fn test_missing_singleton_yields_nil() {
        let mut script = Script::new("Test", "Node");
        let node = add(
            &mut script,
            DEFAULT_EVENT_GRAPH,
            NodeKind::EngineSingleton(EngineSingletonNode::new("Nowhere")),
        );
        let host = Rc::new(RecordingHost::default());
        let instance = activate(&script, &host, EngineConfig::default());

        assert_eq!(instance.evaluate(DEFAULT_EVENT_GRAPH, node, 0).unwrap(), Value::Nil);
        assert_eq!(instance.cached_singleton_count(), 0);
    }

    #[test]
    fn test_missing_singleton_does_not_abort_function() {
        let mut script = Script::new("Test", "Node");
        script.create_function("Lookup").unwrap();
        let entry = script.function_node_id("Lookup").unwrap();
        let singleton = add(
            &mut script,
            "Lookup",
            NodeKind::EngineSingleton(EngineSingletonNode::new("Nowhere")),
        );
        let result = add(&mut script, "Lookup", NodeKind::FunctionResult(FunctionResultNode::default()));
        link(&mut script, "Lookup", (entry, 0), (result, 0));
        link(&mut script, "Lookup", (singleton, 0), (result, 1));

        let host = Rc::new(RecordingHost::default());
        let instance = activate(&script, &host, EngineConfig::default());
        assert_eq!(instance.call("Lookup").unwrap(), Value::Nil);
    }

    #[test]
    fn test_singleton_lookups_are_cached() {
        let mut script = Script::new("Test", "Node");
        let node = add(
            &mut script,
            DEFAULT_EVENT_GRAPH,
            NodeKind::EngineSingleton(EngineSingletonNode::default()),
        );
        let engine = ObjectRef::new(7, "Engine");
        let host = Rc::new(RecordingHost {
            singletons: HostSingletons::new().with("Engine", engine.clone()),
            ..RecordingHost::default()
        });
        let instance = activate(&script, &host, EngineConfig::default());

        for _ in 0..3 {
            let value = instance.evaluate(DEFAULT_EVENT_GRAPH, node, 0).unwrap();
            assert_eq!(value, Value::Object(engine.clone()));
        }
        assert_eq!(host.lookups.get(), 1);

        instance.clear_singleton_cache();
        instance.evaluate(DEFAULT_EVENT_GRAPH, node, 0).unwrap();
        assert_eq!(host.lookups.get(), 2);
    }

    #[test]
    fn test_function_returns_value_to_call_site() {
        let mut script = Script::new("Test", "Node");
        script.create_function("Answer").unwrap();
        let entry = script.function_node_id("Answer").unwrap();
        let literal = add(&mut script, "Answer", NodeKind::Literal(LiteralNode::new(Value::Int(42))));
        let result = add(&mut script, "Answer", NodeKind::FunctionResult(FunctionResultNode::default()));
        link(&mut script, "Answer", (entry, 0), (result, 0));
        link(&mut script, "Answer", (literal, 0), (result, 1));

        let event = add(&mut script, DEFAULT_EVENT_GRAPH, NodeKind::Event(EventNode::default()));
        let call = add(
            &mut script,
            DEFAULT_EVENT_GRAPH,
            NodeKind::CallFunction(CallFunctionNode::new("Answer")),
        );
        let printer = add(&mut script, DEFAULT_EVENT_GRAPH, print(""));
        link(&mut script, DEFAULT_EVENT_GRAPH, (event, 0), (call, 0));
        link(&mut script, DEFAULT_EVENT_GRAPH, (call, 1), (printer, 0));
        link(&mut script, DEFAULT_EVENT_GRAPH, (call, 2), (printer, 1));

        let host = Rc::new(RecordingHost::default());
        let instance = activate(&script, &host, EngineConfig::default());

        assert_eq!(instance.call("Answer").unwrap(), Value::Int(42));
        instance.dispatch(READY_EVENT).unwrap();
        assert_eq!(*host.printed.borrow(), vec!["42"]);
    }

    #[test]
    fn test_recursion_overflows_without_crashing() {
        let mut script = Script::new("Test", "Node");
        script.create_function("Recurse").unwrap();
        let entry = script.function_node_id("Recurse").unwrap();
        let call = add(&mut script, "Recurse", NodeKind::CallFunction(CallFunctionNode::new("Recurse")));
        link(&mut script, "Recurse", (entry, 0), (call, 0));

        let host = Rc::new(RecordingHost::default());
        let config = EngineConfig {
            max_stack_depth: 32,
            ..EngineConfig::default()
        };
        let instance = activate(&script, &host, config);

        let err = instance.call("Recurse").unwrap_err();
        assert!(matches!(err, ExecutionError::StackOverflow { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_overflow_unwinds_continue_sequence() {
        let mut script = sequence_script(vec![
            NodeKind::CallFunction(CallFunctionNode::new("Recurse")),
            print("after"),
        ]);
        script.create_function("Recurse").unwrap();
        let entry = script.function_node_id("Recurse").unwrap();
        let call = add(&mut script, "Recurse", NodeKind::CallFunction(CallFunctionNode::new("Recurse")));
        link(&mut script, "Recurse", (entry, 0), (call, 0));

        let host = Rc::new(RecordingHost::default());
        let config = EngineConfig {
            max_stack_depth: 32,
            ..EngineConfig::default()
        };
        let instance = activate(&script, &host, config);

        assert!(matches!(
            instance.dispatch(READY_EVENT),
            Err(ExecutionError::StackOverflow { .. })
        ));
        assert!(host.printed.borrow().is_empty());
    }

    #[test]
    fn test_instance_outlives_script() {
        let script = sequence_script(vec![print("a"), print("b")]);
        let host = Rc::new(RecordingHost::default());
        let instance = activate(&script, &host, EngineConfig::default());
        assert_eq!(instance.node_instance_count(), 4);
        drop(script);

        assert_eq!(instance.dispatch(READY_EVENT).unwrap(), 1);
        assert_eq!(instance.dispatch("_process").unwrap(), 0);
        assert_eq!(host.printed.borrow().len(), 2);
    }

    #[test]
    fn test_unknown_graph_and_function() {
        let script = Script::new("Test", "Node");
        let host = Rc::new(RecordingHost::default());
        let instance = activate(&script, &host, EngineConfig::default());

        assert!(matches!(instance.call("Nope"), Err(ExecutionError::FunctionNotFound(_))));
        assert!(matches!(
            instance.evaluate("Nope", NodeId(1), 0),
            Err(ExecutionError::GraphNotFound(_))
        ));
    }
}
