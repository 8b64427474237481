// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end tests: author a script, persist it, reload it and run it.

use ordoplay_script::nodes::events::READY_EVENT;
use ordoplay_script::nodes::{CallFunctionNode, EngineSingletonNode, EventNode, PrintNode, SequenceNode};
use ordoplay_script::script::DEFAULT_EVENT_GRAPH;
use ordoplay_script::{
    EngineConfig, HostSingletons, NodeId, NodeKind, ObjectRef, Script, ScriptEvent, ScriptHost, ScriptInstance,
    SingletonRegistry, Value,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Default)]
struct TestHost {
    singletons: HostSingletons,
    printed: RefCell<Vec<String>>,
}

impl SingletonRegistry for TestHost {
    fn lookup(&self, name: &str) -> Option<ObjectRef> {
        self.singletons.lookup(name)
    }
}

impl ScriptHost for TestHost {
    fn print(&self, text: &str) {
        self.printed.borrow_mut().push(text.to_owned());
    }
}

fn run(script: &Script, event: &str) -> Vec<String> {
    let host = Rc::new(TestHost::default());
    let instance = ScriptInstance::new(script, ObjectRef::new(1, "Node"), host.clone(), EngineConfig::default());
    instance.dispatch(event).unwrap();
    host.printed.take()
}

fn temp_path(extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ordoplay_script_{}.{extension}", uuid::Uuid::new_v4()))
}

/// `_ready` -> Sequence(steps) with step k printing "k"; returns the sequence node
fn build_sequence_script(steps: usize) -> (Script, NodeId) {
    let mut script = Script::new("Player", "Node");
    let event = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::Event(EventNode::default()))
        .unwrap();
    let sequence = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::Sequence(SequenceNode::with_steps(steps)))
        .unwrap();
    let printers: Vec<NodeId> = (0..steps)
        .map(|k| {
            script
                .create_node(DEFAULT_EVENT_GRAPH, NodeKind::Print(PrintNode::new(k.to_string())))
                .unwrap()
        })
        .collect();

    let graph = script.graph_mut(DEFAULT_EVENT_GRAPH).unwrap();
    graph.connect(event, 0, sequence, 0).unwrap();
    for (k, printer) in printers.into_iter().enumerate() {
        graph.connect(sequence, 1 + k, printer, 0).unwrap();
    }
    (script, sequence)
}

#[test]
fn test_removed_step_keeps_remaining_order_after_reload() {
    let (mut script, sequence) = build_sequence_script(4);
    script
        .graph_mut(DEFAULT_EVENT_GRAPH)
        .unwrap()
        .remove_dynamic_pin(sequence, 2)
        .unwrap();

    let node = script.graph(DEFAULT_EVENT_GRAPH).unwrap().node(sequence).unwrap();
    let names: Vec<_> = node.outputs().map(|(_, pin)| pin.name.clone()).collect();
    assert_eq!(names, vec!["then_0", "then_1", "then_2"]);
    assert_eq!(run(&script, READY_EVENT), vec!["0", "2", "3"]);

    let path = temp_path("ron");
    script.save(&path).unwrap();
    let loaded = Script::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.to_document(), script.to_document());
    assert_eq!(run(&loaded, READY_EVENT), vec!["0", "2", "3"]);
}

#[test]
fn test_removing_first_and_last_steps() {
    let (mut script, sequence) = build_sequence_script(4);
    let graph = script.graph_mut(DEFAULT_EVENT_GRAPH).unwrap();
    graph.remove_dynamic_pin(sequence, 1).unwrap();
    assert_eq!(run(&script, READY_EVENT), vec!["1", "2", "3"]);

    let graph = script.graph_mut(DEFAULT_EVENT_GRAPH).unwrap();
    graph.remove_dynamic_pin(sequence, 3).unwrap();
    let names: Vec<_> = graph
        .node(sequence)
        .unwrap()
        .outputs()
        .map(|(_, pin)| pin.name.clone())
        .collect();
    assert_eq!(names, vec!["then_0", "then_1"]);
    assert_eq!(run(&script, READY_EVENT), vec!["1", "2"]);
}

#[test]
fn test_added_step_fires_last() {
    let (mut script, sequence) = build_sequence_script(2);
    let printer = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::Print(PrintNode::new("new")))
        .unwrap();
    let graph = script.graph_mut(DEFAULT_EVENT_GRAPH).unwrap();
    let pin = graph.add_dynamic_pin(sequence).unwrap();
    assert_eq!(graph.node(sequence).unwrap().pin(pin).unwrap().name, "then_2");
    graph.connect(sequence, pin, printer, 0).unwrap();

    assert_eq!(run(&script, READY_EVENT), vec!["0", "1", "new"]);
}

#[test]
fn test_minimum_steps_survive_removal_attempt() {
    let (mut script, sequence) = build_sequence_script(2);
    let graph = script.graph_mut(DEFAULT_EVENT_GRAPH).unwrap();
    assert!(graph.remove_dynamic_pin(sequence, 1).is_err());
    assert_eq!(graph.node(sequence).unwrap().outputs().count(), 2);
    assert_eq!(graph.connection_count(), 3);
}

#[test]
fn test_json_file_round_trip_runs_functions() {
    let mut script = Script::new("Player", "Node");
    script.create_function("Greet").unwrap();
    let entry = script.function_node_id("Greet").unwrap();
    let hello = script
        .create_node("Greet", NodeKind::Print(PrintNode::new("hello")))
        .unwrap();
    script
        .graph_mut("Greet")
        .unwrap()
        .connect(entry, 0, hello, 0)
        .unwrap();

    let event = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::Event(EventNode::default()))
        .unwrap();
    let call = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::CallFunction(CallFunctionNode::new("Greet")))
        .unwrap();
    script
        .graph_mut(DEFAULT_EVENT_GRAPH)
        .unwrap()
        .connect(event, 0, call, 0)
        .unwrap();

    let path = temp_path("json");
    script.save(&path).unwrap();
    let loaded = Script::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.function_names(), vec!["Greet".to_string()]);
    assert_eq!(run(&loaded, READY_EVENT), vec!["hello"]);
}

#[test]
fn test_renamed_function_is_reported_and_call_sites_found() {
    let mut script = Script::new("Player", "Node");
    script.create_function("DoThing").unwrap();
    let call = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::CallFunction(CallFunctionNode::new("DoThing")))
        .unwrap();
    let events = script.subscribe();

    script.rename_function("DoThing", "DoOther").unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        ScriptEvent::GraphRenamed {
            old_name: "DoThing".to_string(),
            new_name: "DoOther".to_string(),
        }
    );
    // Call sites still name the old function for a collaborator to update
    assert_eq!(
        script.function_call_sites("DoThing"),
        vec![(DEFAULT_EVENT_GRAPH.to_string(), call)]
    );
}

#[test]
fn test_singleton_resolution_through_host() {
    let mut script = Script::new("Player", "Node");
    let known = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::EngineSingleton(EngineSingletonNode::new("Input")))
        .unwrap();
    let unknown = script
        .create_node(DEFAULT_EVENT_GRAPH, NodeKind::EngineSingleton(EngineSingletonNode::new("Missing")))
        .unwrap();

    let input = ObjectRef::new(3, "Input");
    let host = Rc::new(TestHost {
        singletons: HostSingletons::new().with("Input", input.clone()),
        ..TestHost::default()
    });
    let instance = ScriptInstance::new(&script, ObjectRef::new(1, "Node"), host, EngineConfig::default());

    assert_eq!(instance.evaluate(DEFAULT_EVENT_GRAPH, known, 0).unwrap(), Value::Object(input));
    assert_eq!(instance.evaluate(DEFAULT_EVENT_GRAPH, unknown, 0).unwrap(), Value::Nil);
}
