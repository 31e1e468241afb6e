// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PortId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One port of one node, on the input or the output side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowAddress {
    /// Node id
    pub node: NodeId,
    /// Port index
    pub port: PortId,
    /// Whether `port` indexes the output list
    pub is_output: bool,
}

impl FlowAddress {
    /// Address of an input port
    pub fn input(node: NodeId, port: PortId) -> Self {
        Self {
            node,
            port,
            is_output: false,
        }
    }

    /// Address of an output port
    pub fn output(node: NodeId, port: PortId) -> Self {
        Self {
            node,
            port,
            is_output: true,
        }
    }

    /// Whether both ids are set
    pub fn is_valid(&self) -> bool {
        self.node.is_valid() && self.port.is_valid()
    }
}

impl fmt::Display for FlowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.is_output { "out" } else { "in" };
        write!(f, "{}:{}{}", self.node.0, side, self.port.0)
    }
}

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source output
    pub from: FlowAddress,
    /// Destination input
    pub to: FlowAddress,
}

impl Edge {
    /// Create a new edge
    pub fn new(from: FlowAddress, to: FlowAddress) -> Self {
        Self { from, to }
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }
}
