// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted script documents.
//!
//! Pins are not stored. Loading rebuilds every node's pins from its
//! configuration and then re-links connections by pin index, so a document
//! that references a pin the node no longer has is rejected.

use crate::connection::Connection;
use crate::function::Function;
use crate::graph::{Graph, GraphError, GraphFlags, GraphId};
use crate::node::{Node, NodeId};
use crate::nodes::NodeKind;
use crate::script::{validate_name, Script, ScriptError, ScriptMetadata, SCRIPT_FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Serialized form of a [`Script`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDocument {
    /// Format version
    pub version: u32,
    /// Script metadata
    pub metadata: ScriptMetadata,
    /// Graphs in order
    pub graphs: Vec<GraphDocument>,
    /// Function registry
    #[serde(default)]
    pub functions: Vec<Function>,
}

/// Serialized form of a [`Graph`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Graph flags
    #[serde(default)]
    pub flags: GraphFlags,
    /// Nodes in order
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    /// Connections in order
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Serialized form of a [`Node`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Stable node ID
    pub id: NodeId,
    /// Kind and configuration
    pub kind: NodeKind,
    /// Editor position
    #[serde(default)]
    pub position: [f32; 2],
}

impl GraphDocument {
    fn from_graph(graph: &Graph) -> Self {
        Self {
            id: graph.id(),
            name: graph.name().to_owned(),
            flags: graph.flags(),
            nodes: graph
                .nodes()
                .map(|node| NodeDocument {
                    id: node.id(),
                    kind: node.kind().clone(),
                    position: node.position,
                })
                .collect(),
            connections: graph.connections().to_vec(),
        }
    }
}

impl Script {
    /// Snapshot the script as a document
    pub fn to_document(&self) -> ScriptDocument {
        ScriptDocument {
            version: SCRIPT_FORMAT_VERSION,
            metadata: self.metadata.clone(),
            graphs: self.graphs.values().map(GraphDocument::from_graph).collect(),
            functions: self.functions.iter().cloned().collect(),
        }
    }

    /// Rebuild a script from a document
    pub fn from_document(document: ScriptDocument) -> Result<Self, ScriptError> {
        if document.version > SCRIPT_FORMAT_VERSION {
            return Err(ScriptError::UnsupportedVersion {
                found: document.version,
                supported: SCRIPT_FORMAT_VERSION,
            });
        }

        let mut script = Script::empty(document.metadata);
        let mut node_ids = HashSet::new();
        let mut max_node_id = 0;

        for graph_doc in document.graphs {
            validate_name(&graph_doc.name)?;
            if script.graph(&graph_doc.name).is_some() || script.graphs.contains_key(&graph_doc.id) {
                return Err(ScriptError::NameCollision(graph_doc.name));
            }
            let mut graph = Graph::with_id(graph_doc.id, graph_doc.name, graph_doc.flags);

            for node_doc in graph_doc.nodes {
                node_doc.kind.behavior().validate()?;
                if !node_ids.insert(node_doc.id) {
                    return Err(GraphError::DuplicateNode(node_doc.id).into());
                }
                max_node_id = max_node_id.max(node_doc.id.0);
                let mut node = Node::new(node_doc.id, node_doc.kind);
                node.position = node_doc.position;
                graph.add_node(node)?;
            }

            for connection in graph_doc.connections {
                graph.connect(
                    connection.from.node,
                    connection.from.pin,
                    connection.to.node,
                    connection.to.pin,
                )?;
            }

            script.graphs.insert(graph.id(), graph);
        }

        for function in document.functions {
            check_function(&script, &function)?;
            script.functions.register(function)?;
        }
        if let Some(orphan) = script
            .graphs
            .values()
            .find(|g| g.is_function() && script.functions.find_by_graph(g.id()).is_none())
        {
            return Err(GraphError::StructuralViolation(format!(
                "graph '{}' is flagged as a function but has no registry entry",
                orphan.name()
            ))
            .into());
        }

        script.next_node_id = max_node_id + 1;
        tracing::info!(
            script = %script.metadata.name,
            graphs = script.graphs.len(),
            functions = script.functions.len(),
            "Loaded script"
        );
        Ok(script)
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> Result<String, ScriptError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(&self.to_document(), config)?)
    }

    /// Decode from RON
    pub fn from_ron(content: &str) -> Result<Self, ScriptError> {
        let document: ScriptDocument = ron::from_str(content)?;
        Self::from_document(document)
    }

    /// Encode as pretty JSON
    pub fn to_json(&self) -> Result<String, ScriptError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Decode from JSON
    pub fn from_json(content: &str) -> Result<Self, ScriptError> {
        let document: ScriptDocument = serde_json::from_str(content)?;
        Self::from_document(document)
    }

    /// Save to a file, as JSON for a `.json` extension and RON otherwise
    pub fn save(&self, path: &Path) -> Result<(), ScriptError> {
        let content = if is_json(path) { self.to_json()? } else { self.to_ron()? };
        std::fs::write(path, content)?;
        tracing::info!("Saved script {} to {:?}", self.metadata.name, path);
        Ok(())
    }

    /// Load from a file, as JSON for a `.json` extension and RON otherwise
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_ron(&content)
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// A registry entry must point at a flagged graph of the same name whose
/// owning node is that function's entry
fn check_function(script: &Script, function: &Function) -> Result<(), ScriptError> {
    let graph = script
        .graphs
        .get(&function.graph())
        .ok_or_else(|| ScriptError::GraphNotFound(function.name().to_owned()))?;
    if !graph.is_function() || graph.name() != function.name() {
        return Err(GraphError::StructuralViolation(format!(
            "function '{}' is not backed by a function graph of the same name",
            function.name()
        ))
        .into());
    }
    match graph.node(function.owning_node()).map(Node::kind) {
        Some(NodeKind::FunctionEntry(entry)) if entry.function_name == function.name() => Ok(()),
        _ => Err(GraphError::StructuralViolation(format!(
            "function '{}' does not own an entry node",
            function.name()
        ))
        .into()),
    }
}
