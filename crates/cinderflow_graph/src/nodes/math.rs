// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic and counting nodes.

use crate::config::{NodeCategory, NodeConfig, NodeFlags};
use crate::evaluation::ActivationInfo;
use crate::node::{CreateInfo, FlowEvent, FlowNode, NodeClass, NodeLifetime};
use crate::port::{InputPortConfig, OutputPortConfig, PortId};
use crate::serialize::Serializer;

/// Adds two floats whenever either input changes
pub struct AddNode;

impl FlowNode for AddNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Out = A + B")
            .with_category(NodeCategory::Approved)
            .with_inputs([InputPortConfig::new::<f32>("A"), InputPortConfig::new::<f32>("B")])
            .with_outputs([OutputPortConfig::new::<f32>("Out")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        if event != FlowEvent::Activate {
            return;
        }
        let sum = info.port_float(PortId(0)) + info.port_float(PortId(1));
        info.activate_output(PortId(0), sum);
    }
}

impl NodeClass for AddNode {
    const TYPE_NAME: &'static str = "Math:Add";
    const LIFETIME: NodeLifetime = NodeLifetime::Singleton;

    fn create(_info: &CreateInfo) -> Self {
        AddNode
    }
}

/// Operation selected on [`CalculateNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A + B
    Add,
    /// A - B
    Sub,
    /// A * B
    Mul,
    /// A / B, zero when B is zero
    Div,
}

impl Operation {
    /// Decode the `Op` port value
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Add),
            1 => Some(Self::Sub),
            2 => Some(Self::Mul),
            3 => Some(Self::Div),
            _ => None,
        }
    }

    /// Apply to two operands
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div if b == 0.0 => 0.0,
            Self::Div => a / b,
        }
    }
}

/// Applies the selected operation when its `Activate` input fires
pub struct CalculateNode;

impl CalculateNode {
    const ACTIVATE: PortId = PortId(0);
    const OP: PortId = PortId(1);
    const A: PortId = PortId(2);
    const B: PortId = PortId(3);
    const OUT: PortId = PortId(0);
}

impl FlowNode for CalculateNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Out = A <Op> B, computed on Activate")
            .with_category(NodeCategory::Approved)
            .with_flags(NodeFlags::ACTIVATION_INPUT)
            .with_inputs([
                InputPortConfig::new::<i32>("Op").ui_config("enum_int:Add=0,Sub=1,Mul=2,Div=3"),
                InputPortConfig::new::<f32>("A"),
                InputPortConfig::new::<f32>("B"),
            ])
            .with_outputs([OutputPortConfig::new::<f32>("Out")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        if event != FlowEvent::Activate || !info.is_port_active(Self::ACTIVATE) {
            return;
        }
        let Some(op) = Operation::from_index(info.port_int(Self::OP)) else {
            tracing::warn!(node = info.node_id().0, op = info.port_int(Self::OP), "unknown operation");
            return;
        };
        let result = op.apply(info.port_float(Self::A), info.port_float(Self::B));
        info.activate_output(Self::OUT, result);
    }
}

impl NodeClass for CalculateNode {
    const TYPE_NAME: &'static str = "Math:Calculate";
    const LIFETIME: NodeLifetime = NodeLifetime::Singleton;

    fn create(_info: &CreateInfo) -> Self {
        CalculateNode
    }
}

/// Counts activations of `In`
#[derive(Debug, Default)]
pub struct CounterNode {
    count: i32,
}

impl CounterNode {
    const IN: PortId = PortId(0);
    const RESET: PortId = PortId(1);
    const COUNT: PortId = PortId(0);
}

impl FlowNode for CounterNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new()
            .with_description("Counts how often In was triggered")
            .with_category(NodeCategory::Approved)
            .with_inputs([InputPortConfig::any_type("In"), InputPortConfig::void("Reset")])
            .with_outputs([OutputPortConfig::new::<i32>("Count")])
    }

    fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
        match event {
            FlowEvent::Initialize => self.count = 0,
            FlowEvent::Activate => {
                if info.is_port_active(Self::RESET) {
                    self.count = 0;
                    info.activate_output(Self::COUNT, self.count);
                }
                if info.is_port_active(Self::IN) {
                    self.count = self.count.saturating_add(1);
                    info.activate_output(Self::COUNT, self.count);
                }
            }
            _ => {}
        }
    }

    fn serialize(&mut self, _info: &mut ActivationInfo<'_>, ser: &mut dyn Serializer) {
        ser.value_i32("count", &mut self.count);
    }
}

impl NodeClass for CounterNode {
    const TYPE_NAME: &'static str = "Math:Counter";

    fn create(_info: &CreateInfo) -> Self {
        Self::default()
    }
}
