// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visual scripting engine for `OrdoPlay`.
//!
//! Scripts are made of graphs of typed nodes connected through pins. A
//! [`Script`] is the authoring-time container; a [`ScriptInstance`] compiles
//! it and runs it against a host object.
//!
//! ## Architecture
//!
//! - [`pin`] and [`node`] define the node surface, with [`editable`] for
//!   node kinds whose pin count can change
//! - [`nodes`] holds the built-in node kinds and the palette registry
//! - [`graph`] and [`connection`] hold nodes and their links
//! - [`script`], [`function`] and [`events`] manage graphs, functions and
//!   editor notifications
//! - [`instance`] and [`runtime`] compile and execute scripts
//! - [`persistence`] reads and writes script documents

pub mod config;
pub mod connection;
pub mod editable;
pub mod events;
pub mod function;
pub mod graph;
pub mod host;
pub mod instance;
pub mod node;
pub mod nodes;
pub mod persistence;
pub mod pin;
pub mod runtime;
pub mod script;

pub use config::{EngineConfig, FunctionRemovalPolicy, SequenceFailurePolicy};
pub use connection::{Connection, PinRef};
pub use events::ScriptEvent;
pub use function::{Function, FunctionRegistry};
pub use graph::{Graph, GraphError, GraphFlags, GraphId};
pub use host::{HostSingletons, ScriptHost, SingletonRegistry};
pub use instance::{ExecutionContext, ExecutionError, NodeInstance};
pub use node::{Node, NodeBehavior, NodeId};
pub use nodes::{NodeKind, NodeRegistry};
pub use pin::{ObjectRef, Pin, PinDirection, PinKind, PinType, Value};
pub use runtime::{ScriptInstance, ScriptInstanceId};
pub use script::{Script, ScriptError, ScriptMetadata};
