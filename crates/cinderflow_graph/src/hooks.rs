// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hooks that can veto activations and node creation, and passive inspectors.

use crate::connection::FlowAddress;
use crate::graph::GraphId;
use crate::node::{FlowEvent, FlowNode, NodeId};
use crate::value::FlowValue;

/// What a hook decides about a pending activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// Drop the activation
    Stop,
    /// Let the activation through
    Pass,
    /// Drop it; a debugger breakpoint on the input side fired
    DebuggerInput,
    /// Drop it; a debugger breakpoint on the output side fired
    DebuggerOutput,
}

/// Graph hook consulted before activations and node creation.
///
/// Every method has a permissive default.
pub trait GraphHook: Send + Sync {
    /// Decide whether `value` may travel from `from` to `to`
    fn perform_activation(
        &self,
        _graph: GraphId,
        _from: FlowAddress,
        _to: FlowAddress,
        _value: &FlowValue,
    ) -> HookVerdict {
        HookVerdict::Pass
    }

    /// Supply the node object for a new placement instead of the registry
    fn create_node(&self, _graph: GraphId, _type_name: &str, _id: NodeId) -> Option<Box<dyn FlowNode>> {
        None
    }

    /// Accept or refuse a freshly created node
    fn created_node(&self, _graph: GraphId, _id: NodeId, _name: &str) -> bool {
        true
    }

    /// A node this hook accepted was refused by a later hook
    fn cancel_created_node(&self, _graph: GraphId, _id: NodeId, _name: &str) {}
}

/// Observer of signal flow and event dispatch
pub trait GraphInspector: Send + Sync {
    /// A value is about to be written into `to`
    fn notify_flow(&self, _graph: GraphId, _from: FlowAddress, _to: FlowAddress, _value: &FlowValue) {}

    /// `event` is about to be delivered to `node`
    fn notify_process_event(&self, _graph: GraphId, _node: NodeId, _event: FlowEvent) {}
}
