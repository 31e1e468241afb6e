// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.
//!
//! [`ActivationInfo`] is the view a node gets while it handles an event: its
//! input cells, its configuration, the output ports it may activate and the
//! few graph services a node is allowed to use.

use crate::cell::ValueCell;
use crate::config::NodeConfig;
use crate::connection::FlowAddress;
use crate::custom_data::FlowCustomData;
use crate::graph::{FlowGraph, GraphId};
use crate::node::NodeId;
use crate::port::PortId;
use crate::value::{DataType, EntityId, FlowPointer, FlowType, FlowValue, Vec3};

/// Inputs of the node currently being dispatched.
///
/// While a node handles an event its cells are lent to it, so activations
/// that loop back into the node are written here instead of the node table.
pub(crate) struct LocalInputs<'a> {
    pub(crate) node: NodeId,
    pub(crate) inputs: &'a mut [ValueCell],
    pub(crate) activated: &'a mut Vec<PortId>,
}

/// Context handed to [`crate::FlowNode::process_event`]
pub struct ActivationInfo<'a> {
    pub(crate) graph: &'a mut FlowGraph,
    pub(crate) node_id: NodeId,
    pub(crate) entity_id: EntityId,
    pub(crate) config: &'a NodeConfig,
    pub(crate) inputs: &'a mut [ValueCell],
    pub(crate) self_activated: &'a mut Vec<PortId>,
    pub(crate) connect_port: PortId,
}

impl<'a> ActivationInfo<'a> {
    /// Node being dispatched
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Graph owning the node
    pub fn graph_id(&self) -> GraphId {
        self.graph.id()
    }

    /// Read-only view of the owning graph
    pub fn graph(&self) -> &FlowGraph {
        &*self.graph
    }

    /// Entity the node targets
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Class configuration
    pub fn config(&self) -> &NodeConfig {
        self.config
    }

    /// Port involved in a connect/disconnect event
    pub fn connect_port(&self) -> PortId {
        self.connect_port
    }

    /// Duration of the current tick in seconds
    pub fn delta_time(&self) -> f32 {
        self.graph.delta_time()
    }

    /// Seconds accumulated by the graph's updates
    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    fn input(&self, port: PortId) -> Option<&ValueCell> {
        let cell = self.inputs.get(port.index());
        if cell.is_none() {
            tracing::warn!(node = self.node_id.0, port = port.0, "input port out of range");
        }
        cell
    }

    fn typed<T: FlowType>(&self, port: PortId) -> T {
        let Some(cell) = self.input(port) else {
            return T::default();
        };
        match cell.get_ptr::<T>() {
            Some(value) => value.clone(),
            None => {
                tracing::warn!(
                    node = self.node_id.0,
                    port = port.0,
                    expected = %T::DATA_TYPE,
                    found = %cell.get_type(),
                    "input port holds another type"
                );
                T::default()
            }
        }
    }

    /// Mutable access to an input cell
    pub fn input_mut(&mut self, port: PortId) -> Option<&mut ValueCell> {
        self.inputs.get_mut(port.index())
    }

    /// Whether the input was activated since the node's last dispatch
    pub fn is_port_active(&self, port: PortId) -> bool {
        self.input(port).is_some_and(ValueCell::is_user_flag_set)
    }

    /// Whether a boolean input was activated with `true`
    pub fn is_bool_port_active(&self, port: PortId) -> bool {
        self.is_port_active(port) && self.port_bool(port)
    }

    /// Live type of an input
    pub fn port_type(&self, port: PortId) -> Option<DataType> {
        self.input(port).map(ValueCell::get_type)
    }

    /// Input value of whatever type it holds
    pub fn port_any(&self, port: PortId) -> FlowValue {
        self.input(port).map(|cell| cell.value().clone()).unwrap_or_default()
    }

    /// Boolean input
    pub fn port_bool(&self, port: PortId) -> bool {
        self.typed(port)
    }

    /// Integer input
    pub fn port_int(&self, port: PortId) -> i32 {
        self.typed(port)
    }

    /// Float input
    pub fn port_float(&self, port: PortId) -> f32 {
        self.typed(port)
    }

    /// Double input
    pub fn port_double(&self, port: PortId) -> f64 {
        self.typed(port)
    }

    /// Vector input
    pub fn port_vec3(&self, port: PortId) -> Vec3 {
        self.typed(port)
    }

    /// Entity input
    pub fn port_entity_id(&self, port: PortId) -> EntityId {
        self.typed(port)
    }

    /// Host handle input
    pub fn port_pointer(&self, port: PortId) -> FlowPointer {
        self.typed(port)
    }

    /// Custom data input
    pub fn port_custom_data(&self, port: PortId) -> FlowCustomData {
        self.typed(port)
    }

    /// String input
    pub fn port_string(&self, port: PortId) -> &str {
        self.input(port)
            .and_then(ValueCell::get_ptr::<String>)
            .map_or("", String::as_str)
    }

    /// Send `value` to every input linked to output `port`.
    ///
    /// Returns the number of inputs reached.
    pub fn activate_output<T: FlowType>(&mut self, port: PortId, value: T) -> usize {
        self.activate_output_value(port, &value.into_value())
    }

    /// Send a [`FlowValue`] to every input linked to output `port`
    pub fn activate_output_value(&mut self, port: PortId, value: &FlowValue) -> usize {
        if port.index() >= self.config.outputs.len() {
            tracing::warn!(node = self.node_id.0, port = port.0, "output port out of range");
            return 0;
        }
        let local = LocalInputs {
            node: self.node_id,
            inputs: &mut *self.inputs,
            activated: &mut *self.self_activated,
        };
        self.graph
            .propagate(FlowAddress::output(self.node_id, port), value, Some(local))
    }

    /// Send another cell's value to every input linked to output `port`
    pub fn activate_output_any(&mut self, port: PortId, value: &ValueCell) -> usize {
        self.activate_output_value(port, value.value())
    }

    /// Send a custom payload to every input linked to output `port`
    pub fn activate_custom_data_output(&mut self, port: PortId, data: FlowCustomData) -> usize {
        self.activate_output_value(port, &FlowValue::CustomData(data))
    }

    /// Whether output `port` has at least one edge
    pub fn is_output_connected(&self, port: PortId) -> bool {
        self.graph
            .is_output_connected(FlowAddress::output(self.node_id, port))
    }

    /// Ask for (or stop) an `Update` event every tick
    pub fn set_regularly_updated(&mut self, enabled: bool) {
        self.graph.set_regularly_updated(self.node_id, enabled);
    }

    /// Ask for a `FinalActivate` after this tick's activations
    pub fn request_final_activation(&mut self) {
        self.graph.request_final_activation(self.node_id);
    }

    /// Current value of a graph token
    pub fn graph_token_value(&self, name: &str) -> Option<&FlowValue> {
        self.graph.graph_token_value(name)
    }

    /// Store a graph token value, converting into its declared type
    pub fn set_graph_token_value(&mut self, name: &str, value: &FlowValue) -> bool {
        self.graph.set_graph_token_value(name, value)
    }
}
