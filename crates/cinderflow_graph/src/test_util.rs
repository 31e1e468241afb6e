// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared helpers for unit tests.

use crate::connection::FlowAddress;
use crate::graph::{FlowGraph, GraphId};
use crate::hooks::GraphInspector;
use crate::node::{FlowEvent, NodeId};
use crate::nodes::create_standard_registry;
use crate::value::FlowValue;
use parking_lot::Mutex;
use std::sync::Arc;

/// Empty graph over the standard node library
pub(crate) fn standard_graph() -> FlowGraph {
    let registry = create_standard_registry().expect("standard nodes register");
    FlowGraph::new(GraphId(1), Arc::new(registry))
}

/// Inspector that remembers every flow and event
#[derive(Default)]
pub(crate) struct FlowRecorder {
    flows: Mutex<Vec<(FlowAddress, FlowAddress, FlowValue)>>,
    events: Mutex<Vec<(NodeId, FlowEvent)>>,
}

impl FlowRecorder {
    pub(crate) fn flows_from(&self, from: FlowAddress) -> usize {
        self.flows.lock().iter().filter(|(source, _, _)| *source == from).count()
    }

    pub(crate) fn values_into(&self, to: FlowAddress) -> Vec<FlowValue> {
        self.flows
            .lock()
            .iter()
            .filter(|(_, target, _)| *target == to)
            .map(|(_, _, value)| value.clone())
            .collect()
    }

    /// Recorded events of the given kinds, in delivery order
    pub(crate) fn events_of(&self, kinds: &[FlowEvent]) -> Vec<(NodeId, FlowEvent)> {
        self.events.lock().iter().filter(|(_, event)| kinds.contains(event)).copied().collect()
    }

    pub(crate) fn events_for(&self, node: NodeId, event: FlowEvent) -> usize {
        self.events.lock().iter().filter(|entry| **entry == (node, event)).count()
    }
}

impl GraphInspector for FlowRecorder {
    fn notify_flow(&self, _graph: GraphId, from: FlowAddress, to: FlowAddress, value: &FlowValue) {
        self.flows.lock().push((from, to, value.clone()));
    }

    fn notify_process_event(&self, _graph: GraphId, node: NodeId, event: FlowEvent) {
        self.events.lock().push((node, event));
    }
}
