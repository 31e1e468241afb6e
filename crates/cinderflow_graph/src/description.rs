// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph topology documents.
//!
//! A [`GraphDescription`] lists nodes with their input overrides, edges as
//! `"node:port"` address pairs and graph tokens. It is stored as RON and
//! turned into a runnable [`FlowGraph`] with [`GraphDescription::build`].

use crate::connection::FlowAddress;
use crate::graph::{FlowGraph, GraphId};
use crate::port::PortId;
use crate::registry::NodeRegistry;
use crate::tokens::GraphToken;
use crate::value::{EntityId, FlowValue, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors building or parsing a graph description
#[derive(Debug, Error)]
pub enum DescriptionError {
    /// No node class with this name is registered
    #[error("unknown node type '{0}'")]
    UnknownType(String),
    /// Two nodes share a name
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),
    /// A `"node:port"` address names a missing node or port
    #[error("cannot resolve address '{0}'")]
    UnresolvedAddress(String),
    /// An input override could not be converted into the port's type
    #[error("input '{0}' rejected its value")]
    InputRejected(String),
    /// The graph refused an edge
    #[error("link from '{from}' to '{to}' refused")]
    LinkRefused {
        /// Output address
        from: String,
        /// Input address
        to: String,
    },
    /// Malformed RON
    #[error("failed to parse graph description: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// RON encoding failed
    #[error("failed to encode graph description: {0}")]
    Encode(#[from] ron::Error),
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Value stored for an input override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputValue {
    /// No value
    Void,
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// Vector
    Vec3(Vec3),
    /// Entity id
    EntityId(u64),
}

impl InputValue {
    /// Runtime value
    pub fn to_flow_value(&self) -> FlowValue {
        match self {
            Self::Void => FlowValue::Void,
            Self::Int(v) => FlowValue::Int(*v),
            Self::Float(v) => FlowValue::Float(*v),
            Self::Double(v) => FlowValue::Double(*v),
            Self::Bool(v) => FlowValue::Bool(*v),
            Self::String(v) => FlowValue::String(v.clone()),
            Self::Vec3(v) => FlowValue::Vec3(*v),
            Self::EntityId(v) => FlowValue::EntityId(EntityId(*v)),
        }
    }

    /// Storable form of a runtime value; pointers and custom data have none
    pub fn from_flow_value(value: &FlowValue) -> Option<Self> {
        Some(match value {
            FlowValue::Void => Self::Void,
            FlowValue::Int(v) => Self::Int(*v),
            FlowValue::Float(v) => Self::Float(*v),
            FlowValue::Double(v) => Self::Double(*v),
            FlowValue::Bool(v) => Self::Bool(*v),
            FlowValue::String(v) => Self::String(v.clone()),
            FlowValue::Vec3(v) => Self::Vec3(*v),
            FlowValue::EntityId(v) => Self::EntityId(v.0),
            FlowValue::Pointer(_) | FlowValue::CustomData(_) => return None,
        })
    }
}

/// A placed node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Unique node name
    pub name: String,
    /// Registered class name
    pub type_name: String,
    /// Input values that differ from the port defaults, by port name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, InputValue>,
}

/// An edge between two `"node:port"` addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    /// Output address
    pub from: String,
    /// Input address
    pub to: String,
}

/// Complete graph topology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDescription {
    /// Display name
    pub name: String,
    /// Editor session attached to the graph
    pub controller: Option<Uuid>,
    /// Nodes in creation order
    pub nodes: Vec<NodeDescription>,
    /// Edges in link order
    pub edges: Vec<EdgeDescription>,
    /// Graph-local variables
    pub tokens: Vec<GraphToken>,
}

impl GraphDescription {
    /// Create an empty description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse RON text
    pub fn from_ron(text: &str) -> Result<Self, DescriptionError> {
        Ok(ron::from_str(text)?)
    }

    /// Encode as pretty RON text
    pub fn to_ron(&self) -> Result<String, DescriptionError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Save to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DescriptionError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Instantiate the described graph
    pub fn build(&self, registry: Arc<NodeRegistry>, id: GraphId) -> Result<FlowGraph, DescriptionError> {
        let mut graph = FlowGraph::new(id, registry);
        graph.set_controller(self.controller);

        for node in &self.nodes {
            let node_id = graph.create_node(&node.type_name, &node.name);
            if !node_id.is_valid() {
                return Err(if graph.registry().type_id(&node.type_name).is_valid() {
                    DescriptionError::DuplicateNode(node.name.clone())
                } else {
                    DescriptionError::UnknownType(node.type_name.clone())
                });
            }
            for (port, value) in &node.inputs {
                let address = format!("{}:{port}", node.name);
                let input = graph
                    .resolve_address(&address, false)
                    .ok_or_else(|| DescriptionError::UnresolvedAddress(address.clone()))?;
                if !graph.set_input_value(input, &value.to_flow_value()) {
                    return Err(DescriptionError::InputRejected(address));
                }
            }
        }

        for edge in &self.edges {
            let from = graph
                .resolve_address(&edge.from, true)
                .ok_or_else(|| DescriptionError::UnresolvedAddress(edge.from.clone()))?;
            let to = graph
                .resolve_address(&edge.to, false)
                .ok_or_else(|| DescriptionError::UnresolvedAddress(edge.to.clone()))?;
            if !graph.link_nodes(from, to) {
                return Err(DescriptionError::LinkRefused {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }

        for token in &self.tokens {
            if !graph.add_graph_token(token.clone()) {
                tracing::warn!(graph = id.0, token = %token.name, "skipping unnamed graph token");
            }
        }

        tracing::debug!(
            graph = id.0,
            name = %self.name,
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            "built graph from description"
        );
        Ok(graph)
    }

    /// Describe a live graph; inputs are recorded where they differ from the port default
    pub fn from_graph(name: impl Into<String>, graph: &FlowGraph) -> Self {
        let mut description = Self::new(name);
        description.controller = graph.controller();

        for (id, node_name) in graph.nodes() {
            let (Some(type_name), Some(config)) = (graph.node_type_name(id), graph.node_config(id)) else {
                continue;
            };
            let mut inputs = IndexMap::new();
            for (index, port) in config.inputs.iter().enumerate() {
                let Ok(index) = u8::try_from(index) else {
                    break;
                };
                let Some(value) = graph.input_value(FlowAddress::input(id, PortId(index))) else {
                    continue;
                };
                if value == port.default_flow_value() {
                    continue;
                }
                if let Some(stored) = InputValue::from_flow_value(value) {
                    inputs.insert(port.name.clone(), stored);
                }
            }
            description.nodes.push(NodeDescription {
                name: node_name.to_owned(),
                type_name: type_name.to_owned(),
                inputs,
            });
        }

        description.edges = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                Some(EdgeDescription {
                    from: port_address(graph, edge.from)?,
                    to: port_address(graph, edge.to)?,
                })
            })
            .collect();
        description.tokens = (0..graph.graph_token_count())
            .filter_map(|index| graph.graph_token(index).cloned())
            .collect();
        description
    }
}

fn port_address(graph: &FlowGraph, address: FlowAddress) -> Option<String> {
    let config = graph.node_config(address.node)?;
    let port = if address.is_output {
        &config.outputs.get(address.port.index())?.name
    } else {
        &config.inputs.get(address.port.index())?.name
    };
    Some(format!("{}:{port}", graph.node_name(address.node)?))
}
