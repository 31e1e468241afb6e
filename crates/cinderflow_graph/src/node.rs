// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A node is any type implementing [`FlowNode`]. All behavior happens in
//! [`FlowNode::process_event`], which the graph calls with one of the
//! [`FlowEvent`] lifecycle events and an [`ActivationInfo`] giving access to
//! the node's input cells and output ports.

use crate::config::NodeConfig;
use crate::evaluation::ActivationInfo;
use crate::graph::GraphId;
use crate::registry::NodeTypeId;
use crate::serialize::Serializer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of a node within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u16);

impl NodeId {
    /// The "no node" sentinel
    pub const INVALID: NodeId = NodeId(0xFFFF);

    /// Whether this refers to a node
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Slot index in the node table
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Lifecycle events delivered to nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowEvent {
    /// Per-tick update for regularly updated nodes
    Update,
    /// One or more inputs were activated
    Activate,
    /// Runs after every `Activate` of the tick, on request
    FinalActivate,
    /// Load resources ahead of use
    PrecacheResources,
    /// Graph start; every input counts as active
    Initialize,
    /// Runs after every node saw `Initialize`
    FinalInitialize,
    /// The node's target entity changed
    SetEntityId,
    /// Graph was suspended
    Suspend,
    /// Graph was resumed
    Resume,
    /// An edge now ends at one of this node's inputs
    ConnectInputPort,
    /// An edge ending at one of this node's inputs was removed
    DisconnectInputPort,
    /// An edge now starts at one of this node's outputs
    ConnectOutputPort,
    /// An edge starting at one of this node's outputs was removed
    DisconnectOutputPort,
    /// Graph is shutting down
    Uninitialize,
}

/// Behavior of a node class
pub trait FlowNode: Send {
    /// Port lists and flags; called once per class by the registry
    fn configuration(&self) -> NodeConfig;

    /// React to a lifecycle event. Unhandled events are ignored.
    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>);

    /// Persist or restore node state. Must tolerate reading into a fresh node.
    fn serialize(&mut self, _info: &mut ActivationInfo<'_>, _ser: &mut dyn Serializer) {}

    /// Called after the whole graph was restored
    fn post_serialize(&mut self, _info: &mut ActivationInfo<'_>) {}

    /// Fresh copy for a new placement of a cloned class
    fn clone_node(&self, _info: &CreateInfo) -> Option<Box<dyn FlowNode>> {
        None
    }

    /// Rough memory footprint
    fn memory_usage(&self) -> usize {
        std::mem::size_of_val(self)
    }

    /// Implementation type name, for diagnostics
    fn class_tag(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Display name override
    fn ui_name(&self) -> Option<&str> {
        None
    }
}

/// How placements of a class map onto node objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeLifetime {
    /// One object shared by every placement
    Singleton,
    /// A new object per placement
    #[default]
    Instanced,
    /// Each placement clones the class template
    Cloned,
}

/// Where a node is being placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateInfo {
    /// Node id in the graph
    pub node_id: NodeId,
    /// Registered type
    pub type_id: NodeTypeId,
    /// Owning graph
    pub graph_id: GraphId,
}

/// A node type that the registry can instantiate without a hand-written factory
pub trait NodeClass: FlowNode + Sized + 'static {
    /// Registered type name
    const TYPE_NAME: &'static str;
    /// Instantiation strategy
    const LIFETIME: NodeLifetime = NodeLifetime::Instanced;

    /// Build a fresh object
    fn create(info: &CreateInfo) -> Self;
}

/// Node object shared by every placement of a singleton class
pub type SharedNode = Arc<Mutex<Box<dyn FlowNode>>>;

/// A placed node's object
pub enum NodeHandle {
    /// Owned by one placement
    Owned(Box<dyn FlowNode>),
    /// Shared between placements
    Shared(SharedNode),
}

impl NodeHandle {
    /// Run `f` on the node object
    pub fn with<R>(&mut self, f: impl FnOnce(&mut dyn FlowNode) -> R) -> R {
        match self {
            Self::Owned(node) => f(&mut **node),
            Self::Shared(node) => {
                let mut guard = node.lock();
                f(&mut **guard)
            }
        }
    }

    /// Run `f` on the node object without mutating it
    pub fn with_ref<R>(&self, f: impl FnOnce(&dyn FlowNode) -> R) -> R {
        match self {
            Self::Owned(node) => f(&**node),
            Self::Shared(node) => {
                let guard = node.lock();
                f(&**guard)
            }
        }
    }

    /// Whether the object is shared with other placements
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_shared() { "Shared" } else { "Owned" };
        f.debug_tuple(kind).field(&self.with_ref(|node| node.class_tag())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::OutputPortConfig;

    struct Probe(u32);

    impl FlowNode for Probe {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new().with_outputs([OutputPortConfig::void("Out")])
        }

        fn process_event(&mut self, _event: FlowEvent, _info: &mut ActivationInfo<'_>) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_shared_handles_see_one_object() {
        let shared: SharedNode = Arc::new(Mutex::new(Box::new(Probe(0))));
        let mut a = NodeHandle::Shared(shared.clone());
        let b = NodeHandle::Shared(shared);

        a.with(|node| {
            assert_eq!(node.configuration().outputs.len(), 1);
        });
        assert!(a.is_shared());
        assert!(b.with_ref(|node| node.class_tag().ends_with("Probe")));
        assert!(!NodeHandle::Owned(Box::new(Probe(0))).is_shared());
    }

    #[test]
    fn test_node_id_sentinel() {
        assert!(!NodeId::INVALID.is_valid());
        assert_eq!(NodeId(3).index(), 3);
    }
}
