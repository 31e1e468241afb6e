// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inspector that traces signal flow and tallies traffic per output port.

use cinderflow_graph::{FlowAddress, FlowEvent, FlowValue, GraphId, GraphInspector, NodeId};
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Logs every flow at trace level and counts flows per source port
#[derive(Default)]
pub struct TraceInspector {
    flows: Mutex<IndexMap<FlowAddress, usize>>,
    activations: Mutex<usize>,
}

impl TraceInspector {
    /// Create an inspector with empty tallies
    pub fn new() -> Self {
        Self::default()
    }

    /// Flows seen per output port, in first-seen order
    pub fn flow_counts(&self) -> Vec<(FlowAddress, usize)> {
        self.flows.lock().iter().map(|(address, count)| (*address, *count)).collect()
    }

    /// Number of `Activate` events delivered
    pub fn activations(&self) -> usize {
        *self.activations.lock()
    }
}

impl GraphInspector for TraceInspector {
    fn notify_flow(&self, graph: GraphId, from: FlowAddress, to: FlowAddress, value: &FlowValue) {
        tracing::trace!(graph = graph.0, %from, %to, %value, "flow");
        *self.flows.lock().entry(from).or_insert(0) += 1;
    }

    fn notify_process_event(&self, _graph: GraphId, _node: NodeId, event: FlowEvent) {
        if event == FlowEvent::Activate {
            *self.activations.lock() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinderflow_graph::PortId;

    #[test]
    fn test_tallies() {
        let inspector = TraceInspector::new();
        let from = FlowAddress::output(NodeId(0), PortId(0));
        let to = FlowAddress::input(NodeId(1), PortId(0));
        inspector.notify_flow(GraphId(0), from, to, &FlowValue::Int(1));
        inspector.notify_flow(GraphId(0), from, to, &FlowValue::Int(2));
        inspector.notify_process_event(GraphId(0), NodeId(1), FlowEvent::Activate);
        inspector.notify_process_event(GraphId(0), NodeId(1), FlowEvent::Update);

        assert_eq!(inspector.flow_counts(), vec![(from, 2)]);
        assert_eq!(inspector.activations(), 1);
    }
}
