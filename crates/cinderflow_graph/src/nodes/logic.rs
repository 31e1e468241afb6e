// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph start and boolean logic nodes.

use crate::config::{NodeCategory, NodeConfig};
use crate::evaluation::ActivationInfo;
use crate::node::{CreateInfo, FlowEvent, FlowNode, NodeClass, NodeLifetime};
use crate::port::{InputPortConfig, OutputPortConfig, PortId};

/// Fires its output once when the graph initializes
pub struct StartNode;

impl StartNode {
    const ENABLED: PortId = PortId(0);
    const OUTPUT: PortId = PortId(0);
}

impl FlowNode for StartNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Triggered when the graph starts")
            .with_category(NodeCategory::Approved)
            .with_inputs([InputPortConfig::with_default("Enabled", true)])
            .with_outputs([OutputPortConfig::void("Output")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        if event == FlowEvent::Initialize && info.port_bool(Self::ENABLED) {
            info.activate_output(Self::OUTPUT, true);
        }
    }
}

impl NodeClass for StartNode {
    const TYPE_NAME: &'static str = "Game:Start";
    const LIFETIME: NodeLifetime = NodeLifetime::Singleton;

    fn create(_info: &CreateInfo) -> Self {
        StartNode
    }
}

/// Logical AND of two booleans
pub struct AndNode;

impl AndNode {
    const A: PortId = PortId(0);
    const B: PortId = PortId(1);
    const OUT: PortId = PortId(0);
    const ON_TRUE: PortId = PortId(1);
    const ON_FALSE: PortId = PortId(2);
}

impl FlowNode for AndNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Outputs A AND B")
            .with_category(NodeCategory::Approved)
            .with_inputs([InputPortConfig::new::<bool>("A"), InputPortConfig::new::<bool>("B")])
            .with_outputs([
                OutputPortConfig::new::<bool>("Out"),
                OutputPortConfig::void("OnTrue"),
                OutputPortConfig::void("OnFalse"),
            ])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        if event != FlowEvent::Activate {
            return;
        }
        let result = info.port_bool(Self::A) && info.port_bool(Self::B);
        info.activate_output(Self::OUT, result);
        let branch = if result { Self::ON_TRUE } else { Self::ON_FALSE };
        info.activate_output(branch, true);
    }
}

impl NodeClass for AndNode {
    const TYPE_NAME: &'static str = "Logic:AND";
    const LIFETIME: NodeLifetime = NodeLifetime::Singleton;

    fn create(_info: &CreateInfo) -> Self {
        AndNode
    }
}

/// Logical negation
pub struct NotNode;

impl FlowNode for NotNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_category(NodeCategory::Approved)
            .with_inputs([InputPortConfig::new::<bool>("In")])
            .with_outputs([OutputPortConfig::new::<bool>("Out")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        if event == FlowEvent::Activate && info.is_port_active(PortId(0)) {
            let value = !info.port_bool(PortId(0));
            info.activate_output(PortId(0), value);
        }
    }
}

impl NodeClass for NotNode {
    const TYPE_NAME: &'static str = "Logic:NOT";
    const LIFETIME: NodeLifetime = NodeLifetime::Singleton;

    fn create(_info: &CreateInfo) -> Self {
        NotNode
    }
}
