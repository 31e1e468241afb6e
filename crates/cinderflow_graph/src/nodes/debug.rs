// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debug helpers.

use crate::config::{NodeCategory, NodeConfig};
use crate::evaluation::ActivationInfo;
use crate::node::{CreateInfo, FlowEvent, FlowNode, NodeClass, NodeLifetime};
use crate::port::{InputPortConfig, OutputPortConfig, PortId};

/// Logs every value it receives and passes it on
pub struct LogNode;

impl LogNode {
    const IN: PortId = PortId(0);
    const MESSAGE: PortId = PortId(1);
    const OUT: PortId = PortId(0);
}

impl FlowNode for LogNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Writes In to the log")
            .with_category(NodeCategory::Debug)
            .with_inputs([
                InputPortConfig::any_type("In"),
                InputPortConfig::with_default("Message", String::from("flow")),
            ])
            .with_outputs([OutputPortConfig::any_type("Out")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        if event != FlowEvent::Activate || !info.is_port_active(Self::IN) {
            return;
        }
        let value = info.port_any(Self::IN);
        tracing::info!(
            graph = info.graph_id().0,
            node = info.node_id().0,
            text = info.port_string(Self::MESSAGE),
            %value,
            "flow log"
        );
        info.activate_output_value(Self::OUT, &value);
    }
}

impl NodeClass for LogNode {
    const TYPE_NAME: &'static str = "Debug:Log";
    const LIFETIME: NodeLifetime = NodeLifetime::Singleton;

    fn create(_info: &CreateInfo) -> Self {
        LogNode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FlowAddress;
    use crate::test_util::{standard_graph, FlowRecorder};
    use crate::value::FlowValue;
    use std::sync::Arc;

    #[test]
    fn test_log_passes_value_on() {
        let mut graph = standard_graph();
        let log = graph.create_node("Debug:Log", "log");
        let count = graph.create_node("Math:Counter", "count");
        assert!(graph.link_nodes(FlowAddress::output(log, PortId(0)), FlowAddress::input(count, PortId(0))));
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.initialize_values();
        graph.activate_input(FlowAddress::input(log, PortId(0)), &FlowValue::from("hello"));
        graph.update(0.1);

        assert_eq!(
            recorder.values_into(FlowAddress::input(count, PortId(0))),
            vec![FlowValue::from("hello")]
        );
    }
}
