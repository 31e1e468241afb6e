// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime flow graph: node table, edges and signal propagation.
//!
//! A [`FlowGraph`] owns its nodes and their input cells. Values move only
//! along edges: when a node activates an output, the value is converted into
//! every linked input cell, the cell is flagged active and the receiving node
//! is queued for an `Activate` event. [`FlowGraph::update`] delivers queued
//! events once per tick, giving each node at most one `Activate` per pass.

use crate::cell::ValueCell;
use crate::config::{NodeConfig, NodeFlags};
use crate::connection::{Edge, FlowAddress};
use crate::evaluation::{ActivationInfo, LocalInputs};
use crate::hooks::{GraphHook, GraphInspector, HookVerdict};
use crate::node::{CreateInfo, FlowEvent, FlowNode, NodeHandle, NodeId, NodeLifetime};
use crate::port::PortId;
use crate::registry::{NodeRegistry, NodeTypeId};
use crate::serialize::Serializer;
use crate::settings::GraphSettings;
use crate::tokens::{GraphToken, GraphTokens};
use crate::value::{EntityId, FlowType, FlowValue};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a graph within a flow system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub u32);

impl GraphId {
    /// The "no graph" sentinel
    pub const INVALID: GraphId = GraphId(0xFFFF_FFFF);

    /// Whether this refers to a graph
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// A placed node
struct NodeSlot {
    name: String,
    type_id: NodeTypeId,
    config: Arc<NodeConfig>,
    /// Taken out while the node handles an event
    node: Option<NodeHandle>,
    inputs: Vec<ValueCell>,
    entity_id: EntityId,
}

/// A runtime flow graph
pub struct FlowGraph {
    id: GraphId,
    registry: Arc<NodeRegistry>,
    settings: GraphSettings,
    controller: Option<Uuid>,

    nodes: Vec<Option<NodeSlot>>,
    free_ids: Vec<NodeId>,
    names: IndexMap<String, NodeId>,
    edges: Vec<Edge>,

    regular_updates: IndexSet<NodeId>,
    pending: IndexSet<NodeId>,
    final_activations: IndexSet<NodeId>,
    initializing: bool,
    init_carry: Vec<FlowAddress>,

    enabled: bool,
    active: bool,
    suspended: bool,
    needs_initialize: bool,

    tokens: GraphTokens,
    hooks: Vec<Arc<dyn GraphHook>>,
    inspectors: Vec<Arc<dyn GraphInspector>>,

    time: f64,
    delta: f32,
}

impl FlowGraph {
    /// Create an empty graph with default settings
    pub fn new(id: GraphId, registry: Arc<NodeRegistry>) -> Self {
        Self::with_settings(id, registry, GraphSettings::default())
    }

    /// Create an empty graph
    pub fn with_settings(id: GraphId, registry: Arc<NodeRegistry>, settings: GraphSettings) -> Self {
        Self {
            id,
            registry,
            settings,
            controller: None,
            nodes: Vec::new(),
            free_ids: Vec::new(),
            names: IndexMap::new(),
            edges: Vec::new(),
            regular_updates: IndexSet::new(),
            pending: IndexSet::new(),
            final_activations: IndexSet::new(),
            initializing: false,
            init_carry: Vec::new(),
            enabled: true,
            active: true,
            suspended: false,
            needs_initialize: true,
            tokens: GraphTokens::new(),
            hooks: Vec::new(),
            inspectors: Vec::new(),
            time: 0.0,
            delta: 0.0,
        }
    }

    /// Graph id
    pub fn id(&self) -> GraphId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: GraphId) {
        self.id = id;
    }

    /// Node registry the graph instantiates from
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Execution settings
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Replace the execution settings
    pub fn set_settings(&mut self, settings: GraphSettings) {
        self.settings = settings;
    }

    /// Editor session controlling this graph, if any
    pub fn controller(&self) -> Option<Uuid> {
        self.controller
    }

    /// Attach or detach a controlling editor session
    pub fn set_controller(&mut self, controller: Option<Uuid>) {
        tracing::debug!(graph = self.id.0, ?controller, "graph controller changed");
        self.controller = controller;
    }

    /// Seconds accumulated by [`FlowGraph::update`]
    pub fn current_time(&self) -> f64 {
        self.time
    }

    /// Duration of the last tick
    pub fn delta_time(&self) -> f32 {
        self.delta
    }

    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .filter_map(|(index, _)| u16::try_from(index).ok().map(NodeId))
            .collect()
    }

    // ---- topology ----

    /// Place a node of `type_name` named `name`.
    ///
    /// Returns [`NodeId::INVALID`] for an unknown type, a taken name or when a
    /// hook refuses the node. An empty name is replaced by `<type>_<id>`.
    pub fn create_node(&mut self, type_name: &str, name: &str) -> NodeId {
        let type_id = self.registry.type_id(type_name);
        let Some(config) = self.registry.config(type_id) else {
            tracing::warn!(graph = self.id.0, node_type = type_name, "unknown node type");
            return NodeId::INVALID;
        };

        let id = match self.free_ids.last() {
            Some(id) => *id,
            None => match u16::try_from(self.nodes.len()) {
                Ok(index) if index != NodeId::INVALID.0 => NodeId(index),
                _ => {
                    tracing::warn!(graph = self.id.0, "node table is full");
                    return NodeId::INVALID;
                }
            },
        };

        let name = if name.is_empty() {
            format!("{type_name}_{}", id.0)
        } else {
            name.to_owned()
        };
        if self.names.contains_key(&name) {
            tracing::warn!(graph = self.id.0, node = %name, "duplicate node name");
            return NodeId::INVALID;
        }

        let info = CreateInfo {
            node_id: id,
            type_id,
            graph_id: self.id,
        };
        let handle = self
            .hooks
            .iter()
            .find_map(|hook| hook.create_node(self.id, type_name, id))
            .map(NodeHandle::Owned)
            .or_else(|| self.registry.create(type_id, &info));
        let Some(handle) = handle else {
            return NodeId::INVALID;
        };

        for (index, hook) in self.hooks.iter().enumerate() {
            if !hook.created_node(self.id, id, &name) {
                for earlier in &self.hooks[..index] {
                    earlier.cancel_created_node(self.id, id, &name);
                }
                tracing::debug!(graph = self.id.0, node = %name, "node creation refused by hook");
                return NodeId::INVALID;
            }
        }

        let inputs = config.inputs.iter().map(|port| port.default_value.clone()).collect();
        let slot = NodeSlot {
            name: name.clone(),
            type_id,
            config,
            node: Some(handle),
            inputs,
            entity_id: EntityId::INVALID,
        };
        if self.free_ids.last() == Some(&id) {
            self.free_ids.pop();
            self.nodes[id.index()] = Some(slot);
        } else {
            self.nodes.push(Some(slot));
        }
        self.names.insert(name, id);
        self.needs_initialize = true;
        id
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if self.slot(id).is_none() {
            return false;
        }
        let touching: Vec<Edge> = self.edges.iter().filter(|edge| edge.involves_node(id)).copied().collect();
        for edge in touching {
            self.unlink_nodes(edge.from, edge.to);
        }

        let Some(slot) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
            return false;
        };
        self.names.shift_remove(&slot.name);
        self.pending.shift_remove(&id);
        self.regular_updates.shift_remove(&id);
        self.final_activations.shift_remove(&id);
        self.free_ids.push(id);
        tracing::debug!(graph = self.id.0, node = %slot.name, "removed node");
        true
    }

    /// Remove a node by name
    pub fn remove_node_by_name(&mut self, name: &str) -> bool {
        let id = self.resolve_node(name);
        id.is_valid() && self.remove_node(id)
    }

    fn port_exists(&self, address: FlowAddress) -> bool {
        self.slot(address.node).is_some_and(|slot| {
            let count = if address.is_output {
                slot.config.outputs.len()
            } else {
                slot.config.inputs.len()
            };
            address.port.index() < count
        })
    }

    /// Link an output to an input.
    ///
    /// Reversed addresses are swapped. Output-output and input-input pairs,
    /// unknown ports and duplicate edges are refused.
    pub fn link_nodes(&mut self, from: FlowAddress, to: FlowAddress) -> bool {
        let (from, to) = if !from.is_output && to.is_output {
            tracing::warn!(graph = self.id.0, %from, %to, "link given input first, swapping");
            (to, from)
        } else {
            (from, to)
        };
        if !from.is_output || to.is_output {
            tracing::warn!(graph = self.id.0, %from, %to, "links must join an output to an input");
            return false;
        }
        if !self.port_exists(from) || !self.port_exists(to) {
            tracing::warn!(graph = self.id.0, %from, %to, "link refers to a missing port");
            return false;
        }
        let edge = Edge::new(from, to);
        if self.edges.contains(&edge) {
            tracing::warn!(graph = self.id.0, %from, %to, "duplicate link");
            return false;
        }

        self.edges.push(edge);
        self.dispatch_port_event(from.node, FlowEvent::ConnectOutputPort, from.port);
        self.dispatch_port_event(to.node, FlowEvent::ConnectInputPort, to.port);
        self.needs_initialize = true;
        true
    }

    /// Remove an edge
    pub fn unlink_nodes(&mut self, from: FlowAddress, to: FlowAddress) -> bool {
        let Some(position) = self.edges.iter().position(|edge| edge.from == from && edge.to == to) else {
            return false;
        };
        self.edges.remove(position);
        self.dispatch_port_event(from.node, FlowEvent::DisconnectOutputPort, from.port);
        self.dispatch_port_event(to.node, FlowEvent::DisconnectInputPort, to.port);
        true
    }

    /// Find a node by name
    pub fn resolve_node(&self, name: &str) -> NodeId {
        self.names.get(name).copied().unwrap_or(NodeId::INVALID)
    }

    /// Resolve `"node:port"` into an address
    pub fn resolve_address(&self, address: &str, is_output: bool) -> Option<FlowAddress> {
        let (node_name, port_name) = address.rsplit_once(':')?;
        let node = self.resolve_node(node_name);
        let config = &self.slot(node)?.config;
        let port = if is_output {
            config.output_index(port_name)?
        } else {
            config.input_index(port_name)?
        };
        Some(FlowAddress { node, port, is_output })
    }

    /// Name of a node
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.slot(id).map(|slot| slot.name.as_str())
    }

    /// Rename a node; fails when the name is taken
    pub fn set_node_name(&mut self, id: NodeId, name: &str) -> bool {
        if self.names.contains_key(name) {
            return false;
        }
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        let old = std::mem::replace(&mut slot.name, name.to_owned());
        self.names.shift_remove(&old);
        self.names.insert(name.to_owned(), id);
        true
    }

    /// Registered type of a node
    pub fn node_type_id(&self, id: NodeId) -> NodeTypeId {
        self.slot(id).map_or(NodeTypeId::INVALID, |slot| slot.type_id)
    }

    /// Registered type name of a node
    pub fn node_type_name(&self, id: NodeId) -> Option<&str> {
        self.registry.type_name(self.node_type_id(id))
    }

    /// Class configuration of a node
    pub fn node_config(&self, id: NodeId) -> Option<Arc<NodeConfig>> {
        self.slot(id).map(|slot| slot.config.clone())
    }

    /// Iterate over placed nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.nodes.iter().enumerate().filter_map(|(index, slot)| {
            let slot = slot.as_ref()?;
            Some((NodeId(u16::try_from(index).ok()?), slot.name.as_str()))
        })
    }

    /// Number of placed nodes
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// All edges, in link order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whether an output has at least one edge
    pub fn is_output_connected(&self, output: FlowAddress) -> bool {
        self.edges.iter().any(|edge| edge.from == output)
    }

    // ---- dispatch ----

    /// Lend a node its object and inputs, then put them back.
    ///
    /// With `clear_flags`, input activation flags are cleared afterwards,
    /// except for ports the node activated on itself.
    fn with_node<R>(
        &mut self,
        id: NodeId,
        port: PortId,
        event: Option<FlowEvent>,
        f: impl FnOnce(&mut dyn FlowNode, &mut ActivationInfo<'_>) -> R,
    ) -> Option<R> {
        let slot = self.slot_mut(id)?;
        let Some(mut handle) = slot.node.take() else {
            tracing::warn!(node = id.0, "node is already being dispatched");
            return None;
        };
        let mut inputs = std::mem::take(&mut slot.inputs);
        let config = slot.config.clone();
        let entity_id = slot.entity_id;

        if let Some(event) = event {
            for inspector in &self.inspectors {
                inspector.notify_process_event(self.id, id, event);
            }
        }

        let mut self_activated = Vec::new();
        let result = {
            let mut info = ActivationInfo {
                graph: &mut *self,
                node_id: id,
                entity_id,
                config: &*config,
                inputs: &mut inputs,
                self_activated: &mut self_activated,
                connect_port: port,
            };
            handle.with(|node| f(node, &mut info))
        };

        let clear_flags = self.settings.clear_activations_after_dispatch
            && matches!(event, Some(FlowEvent::Activate | FlowEvent::Initialize));
        if clear_flags {
            for (index, cell) in inputs.iter_mut().enumerate() {
                if !self_activated.iter().any(|port| port.index() == index) {
                    cell.clear_user_flag();
                }
            }
            if event == Some(FlowEvent::Initialize) {
                for address in self.init_carry.iter().filter(|address| address.node == id) {
                    if let Some(cell) = inputs.get_mut(address.port.index()) {
                        cell.set_user_flag();
                    }
                }
            }
        }

        if let Some(slot) = self.slot_mut(id) {
            slot.node = Some(handle);
            slot.inputs = inputs;
        }
        Some(result)
    }

    fn dispatch(&mut self, id: NodeId, event: FlowEvent) {
        self.dispatch_port_event(id, event, PortId::INVALID);
    }

    fn dispatch_port_event(&mut self, id: NodeId, event: FlowEvent, port: PortId) {
        self.with_node(id, port, Some(event), |node, info| node.process_event(event, info));
    }

    fn dispatch_all(&mut self, event: FlowEvent) {
        for id in self.node_ids() {
            self.dispatch(id, event);
        }
    }

    /// Write `value` into every input linked to `source` and queue the receivers
    pub(crate) fn propagate(
        &mut self,
        source: FlowAddress,
        value: &FlowValue,
        mut local: Option<LocalInputs<'_>>,
    ) -> usize {
        let targets: Vec<FlowAddress> = self
            .edges
            .iter()
            .filter(|edge| edge.from == source)
            .map(|edge| edge.to)
            .collect();

        let mut reached = 0;
        for to in targets {
            let verdict = self
                .hooks
                .iter()
                .map(|hook| hook.perform_activation(self.id, source, to, value))
                .find(|verdict| *verdict != HookVerdict::Pass);
            if let Some(verdict) = verdict {
                tracing::debug!(graph = self.id.0, from = %source, %to, ?verdict, "activation withheld");
                continue;
            }

            for inspector in &self.inspectors {
                inspector.notify_flow(self.id, source, to, value);
            }
            if self.settings.log_activations {
                tracing::trace!(graph = self.id.0, from = %source, %to, %value, "activate");
            }

            let cell = match local.as_mut() {
                Some(local) if local.node == to.node => {
                    local.activated.push(to.port);
                    local.inputs.get_mut(to.port.index())
                }
                _ => self
                    .nodes
                    .get_mut(to.node.index())
                    .and_then(Option::as_mut)
                    .and_then(|slot| slot.inputs.get_mut(to.port.index())),
            };
            let Some(cell) = cell else {
                continue;
            };
            if !cell.assign_with_conversion(value) {
                tracing::warn!(
                    graph = self.id.0,
                    from = %source,
                    %to,
                    value_type = %value.data_type(),
                    port_type = %cell.get_type(),
                    "activation value could not be converted"
                );
            }
            cell.set_user_flag();

            if self.initializing {
                self.init_carry.push(to);
            }
            self.pending.insert(to.node);
            reached += 1;
        }
        reached
    }

    /// Deliver `Activate` to queued nodes, each at most once, then `FinalActivate`
    fn deliver_activations(&mut self) {
        let mut delivered = HashSet::new();
        let mut deferred = Vec::new();
        while let Some(id) = self.pending.shift_remove_index(0) {
            if delivered.insert(id) {
                self.dispatch(id, FlowEvent::Activate);
            } else {
                deferred.push(id);
            }
        }
        if deferred.len() > self.settings.max_deferred_per_tick {
            tracing::warn!(graph = self.id.0, deferred = deferred.len(), "many activations deferred to next tick");
        }
        self.pending.extend(deferred);

        let finals = std::mem::take(&mut self.final_activations);
        for id in finals {
            self.dispatch(id, FlowEvent::FinalActivate);
        }
    }

    // ---- lifecycle ----

    /// Run one tick
    pub fn update(&mut self, dt: f32) {
        if !self.enabled || !self.active || self.suspended {
            return;
        }
        self.delta = dt;
        self.time += f64::from(dt);

        if self.needs_initialize {
            self.initialize_values();
        }

        let regular: Vec<NodeId> = self.regular_updates.iter().copied().collect();
        for id in regular {
            self.dispatch(id, FlowEvent::Update);
        }
        self.deliver_activations();
    }

    /// Reset the graph and deliver `Initialize` and `FinalInitialize` to every node
    pub fn initialize_values(&mut self) {
        self.pending.clear();
        self.final_activations.clear();
        for slot in self.nodes.iter_mut().flatten() {
            for cell in &mut slot.inputs {
                cell.clear_user_flag();
            }
        }
        self.tokens.reset_all();
        self.needs_initialize = false;

        if !self.enabled || !self.active || self.suspended {
            return;
        }

        for slot in self.nodes.iter_mut().flatten() {
            for cell in &mut slot.inputs {
                cell.set_user_flag();
            }
        }

        let ids = self.node_ids();
        self.initializing = true;
        for id in &ids {
            self.dispatch(*id, FlowEvent::Initialize);
        }
        self.initializing = false;
        self.init_carry.clear();

        for id in ids {
            self.dispatch(id, FlowEvent::FinalInitialize);
        }
        tracing::debug!(graph = self.id.0, nodes = self.node_count(), "graph initialized");
    }

    /// Deliver `Uninitialize` to every node and drop queued work
    pub fn uninitialize(&mut self) {
        self.dispatch_all(FlowEvent::Uninitialize);
        self.pending.clear();
        self.final_activations.clear();
        self.regular_updates.clear();
        self.needs_initialize = true;
    }

    /// Deliver `PrecacheResources` to every node
    pub fn precache_resources(&mut self) {
        self.dispatch_all(FlowEvent::PrecacheResources);
    }

    /// Whether initialization is due on the next update
    pub fn needs_initialize(&self) -> bool {
        self.needs_initialize
    }

    /// Force initialization on the next update
    pub fn request_initialize(&mut self) {
        self.needs_initialize = true;
    }

    /// Whether the graph runs
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the graph
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the graph is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate or deactivate the graph
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether the graph is suspended
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Suspend or resume the graph, notifying every node
    pub fn set_suspended(&mut self, suspended: bool) {
        if self.suspended == suspended {
            return;
        }
        self.suspended = suspended;
        let event = if suspended {
            FlowEvent::Suspend
        } else {
            FlowEvent::Resume
        };
        self.dispatch_all(event);
    }

    /// Change a node's target entity; the node gets `SetEntityId` and is queued
    pub fn set_entity_id(&mut self, id: NodeId, entity_id: EntityId) -> bool {
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        slot.entity_id = entity_id;
        let targets_entity = slot.config.flags.contains(NodeFlags::TARGET_ENTITY);
        self.dispatch(id, FlowEvent::SetEntityId);
        if targets_entity {
            self.pending.insert(id);
        }
        true
    }

    /// Target entity of a node
    pub fn entity_id(&self, id: NodeId) -> EntityId {
        self.slot(id).map_or(EntityId::INVALID, |slot| slot.entity_id)
    }

    /// Move every node targeting `old` over to `new`
    pub fn on_entity_id_changed(&mut self, old: EntityId, new: EntityId) {
        if self.suspended {
            return;
        }
        let affected: Vec<NodeId> = self
            .node_ids()
            .into_iter()
            .filter(|id| self.entity_id(*id) == old)
            .collect();
        for id in affected {
            self.set_entity_id(id, new);
        }
    }

    /// Remove every node, edge and token
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_ids.clear();
        self.names.clear();
        self.edges.clear();
        self.regular_updates.clear();
        self.pending.clear();
        self.final_activations.clear();
        self.tokens.clear();
        self.needs_initialize = true;
    }

    // ---- activation ----

    /// Queue a node for `Activate` without touching its inputs
    pub fn activate_node(&mut self, id: NodeId) -> bool {
        if self.slot(id).is_none() {
            return false;
        }
        self.pending.insert(id);
        true
    }

    /// Queue a node for `FinalActivate` after this tick's activations
    pub fn request_final_activation(&mut self, id: NodeId) {
        self.final_activations.insert(id);
    }

    /// Add or remove a node from the per-tick `Update` set
    pub fn set_regularly_updated(&mut self, id: NodeId, enabled: bool) {
        if enabled {
            self.regular_updates.insert(id);
        } else {
            self.regular_updates.shift_remove(&id);
        }
    }

    /// Whether a node gets `Update` every tick
    pub fn is_regularly_updated(&self, id: NodeId) -> bool {
        self.regular_updates.contains(&id)
    }

    /// Send a value out of an output port, as if the node activated it
    pub fn activate_port<T: FlowType>(&mut self, source: FlowAddress, value: T) -> usize {
        self.propagate(source, &value.into_value(), None)
    }

    /// Send a cell's value out of an output port
    pub fn activate_port_any(&mut self, source: FlowAddress, value: &ValueCell) -> usize {
        self.propagate(source, value.value(), None)
    }

    /// Send a string out of an output port
    pub fn activate_port_cstring(&mut self, source: FlowAddress, value: &str) -> usize {
        self.propagate(source, &FlowValue::from(value), None)
    }

    /// Overwrite an input without activating it
    pub fn set_input_value(&mut self, input: FlowAddress, value: &FlowValue) -> bool {
        self.input_cell_mut(input)
            .is_some_and(|cell| cell.assign_with_conversion(value))
    }

    /// Write an input, flag it active and queue its node
    pub fn activate_input(&mut self, input: FlowAddress, value: &FlowValue) -> bool {
        let Some(cell) = self.input_cell_mut(input) else {
            return false;
        };
        let written = cell.assign_with_conversion(value);
        cell.set_user_flag();
        self.pending.insert(input.node);
        written
    }

    /// Current value of an input
    pub fn input_value(&self, input: FlowAddress) -> Option<&FlowValue> {
        self.input_cell(input).map(ValueCell::value)
    }

    /// Whether an input is flagged active
    pub fn is_input_active(&self, input: FlowAddress) -> bool {
        self.input_cell(input).is_some_and(ValueCell::is_user_flag_set)
    }

    fn input_cell(&self, input: FlowAddress) -> Option<&ValueCell> {
        if input.is_output {
            return None;
        }
        self.slot(input.node)?.inputs.get(input.port.index())
    }

    fn input_cell_mut(&mut self, input: FlowAddress) -> Option<&mut ValueCell> {
        if input.is_output {
            return None;
        }
        self.slot_mut(input.node)?.inputs.get_mut(input.port.index())
    }

    // ---- hooks ----

    /// Attach a hook; fails if it is already attached
    pub fn add_hook(&mut self, hook: Arc<dyn GraphHook>) -> bool {
        if self.hooks.iter().any(|existing| same_object(existing, &hook)) {
            return false;
        }
        self.hooks.push(hook);
        true
    }

    /// Detach a hook
    pub fn remove_hook(&mut self, hook: &Arc<dyn GraphHook>) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|existing| !same_object(existing, hook));
        self.hooks.len() != before
    }

    /// Attach an inspector; fails if it is already attached
    pub fn add_inspector(&mut self, inspector: Arc<dyn GraphInspector>) -> bool {
        if self.inspectors.iter().any(|existing| same_object(existing, &inspector)) {
            return false;
        }
        self.inspectors.push(inspector);
        true
    }

    /// Detach an inspector
    pub fn remove_inspector(&mut self, inspector: &Arc<dyn GraphInspector>) -> bool {
        let before = self.inspectors.len();
        self.inspectors.retain(|existing| !same_object(existing, inspector));
        self.inspectors.len() != before
    }

    // ---- graph tokens ----

    /// Declare a graph token; an empty name is refused
    pub fn add_graph_token(&mut self, token: GraphToken) -> bool {
        if token.name.is_empty() {
            return false;
        }
        self.tokens.add(token);
        true
    }

    /// Remove a graph token
    pub fn remove_graph_token(&mut self, name: &str) -> bool {
        self.tokens.remove(name)
    }

    /// Remove every graph token
    pub fn remove_graph_tokens(&mut self) {
        self.tokens.clear();
    }

    /// Number of graph tokens
    pub fn graph_token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Graph token at `index`
    pub fn graph_token(&self, index: usize) -> Option<&GraphToken> {
        self.tokens.get(index)
    }

    /// Globally unique name of a graph token
    pub fn global_name_for_graph_token(&self, name: &str) -> String {
        GraphTokens::global_name(self.id.0, name)
    }

    /// Current value of a graph token
    pub fn graph_token_value(&self, name: &str) -> Option<&FlowValue> {
        self.tokens.value(name)
    }

    /// Store a graph token value, converting into its declared type
    pub fn set_graph_token_value(&mut self, name: &str, value: &FlowValue) -> bool {
        self.tokens.set_value(name, value)
    }

    // ---- cloning and persistence ----

    /// Copy topology, input values and tokens into a new graph.
    ///
    /// Cloned classes copy their live node through `clone_node`; every other
    /// node is created again from the registry.
    pub fn clone_graph(&self, id: GraphId) -> FlowGraph {
        let mut clone = FlowGraph::with_settings(id, self.registry.clone(), self.settings.clone());
        for (index, slot) in self.nodes.iter().enumerate() {
            let cloned = slot.as_ref().and_then(|slot| {
                let node_id = NodeId(u16::try_from(index).ok()?);
                let info = CreateInfo {
                    node_id,
                    type_id: slot.type_id,
                    graph_id: id,
                };
                let from_template = match self.registry.lifetime(slot.type_id) {
                    Some(NodeLifetime::Cloned) => slot
                        .node
                        .as_ref()
                        .and_then(|handle| handle.with_ref(|node| node.clone_node(&info)))
                        .map(NodeHandle::Owned),
                    _ => None,
                };
                let handle = from_template.or_else(|| self.registry.create(slot.type_id, &info))?;
                Some(NodeSlot {
                    name: slot.name.clone(),
                    type_id: slot.type_id,
                    config: slot.config.clone(),
                    node: Some(handle),
                    inputs: slot.inputs.clone(),
                    entity_id: slot.entity_id,
                })
            });
            if slot.is_some() && cloned.is_none() {
                tracing::warn!(graph = self.id.0, node = index, "node could not be cloned");
            }
            clone.nodes.push(cloned);
        }

        clone.free_ids = self.free_ids.clone();
        clone.names = self
            .names
            .iter()
            .filter(|(_, id)| clone.slot(**id).is_some())
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        clone.edges = self
            .edges
            .iter()
            .filter(|edge| clone.slot(edge.from.node).is_some() && clone.slot(edge.to.node).is_some())
            .copied()
            .collect();
        clone.tokens = self.tokens.clone();
        clone.regular_updates = self.regular_updates.clone();
        clone.hooks = self.hooks.clone();
        clone.inspectors = self.inspectors.clone();
        clone.enabled = self.enabled;
        clone.active = self.active;
        clone
    }

    /// Persist or restore runtime state: flags, queues, input cells and node state.
    ///
    /// Topology is not part of the archive; reading matches nodes by name.
    /// Stored counts are informational when reading: lists end at the first
    /// missing indexed entry.
    pub fn serialize(&mut self, ser: &mut dyn Serializer) {
        let reading = ser.is_reading();
        ser.value_bool("needsInitialize", &mut self.needs_initialize);
        ser.value_bool("enabled", &mut self.enabled);
        ser.value_bool("suspended", &mut self.suspended);
        ser.value_bool("active", &mut self.active);
        ser.value_f64("time", &mut self.time);

        let pending: Vec<NodeId> = self.pending.iter().copied().collect();
        let restored = self.serialize_node_list(ser, "activatedNodes", &pending);
        if reading {
            self.pending = restored.into_iter().collect();
        }

        let ids = self.node_ids();
        let mut count = i32::try_from(ids.len()).unwrap_or(i32::MAX);
        ser.value_i32("nodeCount", &mut count);
        if reading {
            let mut index = 0;
            while ser.contains(&format!("Node{index}")) {
                ser.begin_group(&format!("Node{index}"));
                let mut name = String::new();
                ser.value_string("name", &mut name);
                let id = self.resolve_node(&name);
                if id.is_valid() {
                    self.serialize_node(id, ser);
                } else {
                    tracing::warn!(graph = self.id.0, node = %name, "archived node not found");
                }
                ser.end_group();
                index += 1;
            }
            if usize::try_from(count).ok() != Some(index) {
                tracing::warn!(graph = self.id.0, count, found = index, "archived node count mismatch");
            }
        } else {
            for (index, id) in ids.iter().enumerate() {
                ser.begin_group(&format!("Node{index}"));
                let mut name = self.node_name(*id).map(str::to_owned).unwrap_or_default();
                ser.value_string("name", &mut name);
                self.serialize_node(*id, ser);
                ser.end_group();
            }
        }

        let regular: Vec<NodeId> = self.regular_updates.iter().copied().collect();
        let restored = self.serialize_node_list(ser, "regularUpdates", &regular);
        if reading {
            self.regular_updates = restored.into_iter().collect();
        }

        let finals: Vec<NodeId> = self.final_activations.iter().copied().collect();
        let restored = self.serialize_node_list(ser, "finalActivations", &finals);
        if reading {
            self.final_activations = restored.into_iter().collect();
            for id in self.node_ids() {
                self.with_node(id, PortId::INVALID, None, |node, info| node.post_serialize(info));
            }
        }
    }

    fn serialize_node(&mut self, id: NodeId, ser: &mut dyn Serializer) {
        if let Some(slot) = self.slot_mut(id) {
            ser.begin_group("inputs");
            for (port, cell) in slot.config.inputs.iter().zip(slot.inputs.iter_mut()) {
                ser.begin_group(&port.name);
                cell.serialize(ser);
                ser.end_group();
            }
            ser.end_group();
        }
        ser.begin_group("state");
        self.with_node(id, PortId::INVALID, None, |node, info| node.serialize(info, &mut *ser));
        ser.end_group();
    }

    fn serialize_node_list(&self, ser: &mut dyn Serializer, group: &str, ids: &[NodeId]) -> Vec<NodeId> {
        ser.begin_group(group);
        let mut count = i32::try_from(ids.len()).unwrap_or(i32::MAX);
        ser.value_i32("count", &mut count);
        let mut restored = Vec::new();
        if ser.is_reading() {
            let mut index = 0;
            while ser.contains(&format!("n{index}")) {
                let mut name = String::new();
                ser.value_string(&format!("n{index}"), &mut name);
                let id = self.resolve_node(&name);
                if id.is_valid() {
                    restored.push(id);
                }
                index += 1;
            }
            if usize::try_from(count).ok() != Some(index) {
                tracing::warn!(graph = self.id.0, list = group, count, found = index, "archived list count mismatch");
            }
        } else {
            for (index, id) in ids.iter().enumerate() {
                let mut name = self.node_name(*id).map(str::to_owned).unwrap_or_default();
                ser.value_string(&format!("n{index}"), &mut name);
            }
        }
        ser.end_group();
        restored
    }

    /// Rough memory footprint of nodes, cells and edges
    pub fn memory_usage(&self) -> usize {
        let nodes: usize = self
            .nodes
            .iter()
            .flatten()
            .map(|slot| {
                let node = slot.node.as_ref().map_or(0, |handle| handle.with_ref(|node| node.memory_usage()));
                let inputs: usize = slot.inputs.iter().map(ValueCell::memory_usage).sum();
                node + inputs + slot.name.capacity()
            })
            .sum();
        std::mem::size_of::<Self>() + nodes + self.edges.capacity() * std::mem::size_of::<Edge>()
    }
}

fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeClass;
    use crate::nodes::create_standard_registry;
    use crate::port::{InputPortConfig, OutputPortConfig};
    use crate::serialize::{ArchiveReader, ArchiveValue, ArchiveWriter};
    use crate::test_util::{standard_graph, FlowRecorder};
    use crate::value::DataType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn input(node: NodeId, port: u8) -> FlowAddress {
        FlowAddress::input(node, PortId(port))
    }

    fn output(node: NodeId, port: u8) -> FlowAddress {
        FlowAddress::output(node, PortId(port))
    }

    #[test]
    fn test_fan_out_flags_every_target() {
        let mut graph = standard_graph();
        let source = graph.create_node("Logic:NOT", "source");
        let targets: Vec<NodeId> = (0..3)
            .map(|index| graph.create_node("Math:Counter", &format!("count{index}")))
            .collect();
        for target in &targets {
            assert!(graph.link_nodes(output(source, 0), input(*target, 0)));
        }
        graph.initialize_values();

        assert_eq!(graph.activate_port(output(source, 0), true), 3);
        for target in &targets {
            assert!(graph.is_input_active(input(*target, 0)));
            assert_eq!(graph.input_value(input(*target, 0)), Some(&FlowValue::Bool(true)));
        }

        graph.update(0.1);
        assert!(targets.iter().all(|target| !graph.is_input_active(input(*target, 0))));
    }

    #[test]
    fn test_cycle_delivers_once_per_tick() {
        let mut graph = standard_graph();
        let a = graph.create_node("Logic:NOT", "a");
        let b = graph.create_node("Logic:NOT", "b");
        assert!(graph.link_nodes(output(a, 0), input(b, 0)));
        assert!(graph.link_nodes(output(b, 0), input(a, 0)));
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.initialize_values();
        graph.activate_input(input(a, 0), &FlowValue::Bool(false));
        graph.update(0.1);
        assert_eq!(recorder.events_for(a, FlowEvent::Activate), 1);
        assert_eq!(recorder.events_for(b, FlowEvent::Activate), 1);

        graph.update(0.1);
        assert_eq!(recorder.events_for(a, FlowEvent::Activate), 2);
        assert_eq!(recorder.events_for(b, FlowEvent::Activate), 2);
    }

    #[test]
    fn test_start_reaches_nodes_in_any_order() {
        for counter_first in [false, true] {
            let mut graph = standard_graph();
            let (start, count) = if counter_first {
                let count = graph.create_node("Math:Counter", "count");
                (graph.create_node("Game:Start", "start"), count)
            } else {
                let start = graph.create_node("Game:Start", "start");
                (start, graph.create_node("Math:Counter", "count"))
            };
            assert!(graph.link_nodes(output(start, 0), input(count, 0)));
            let recorder = Arc::new(FlowRecorder::default());
            graph.add_inspector(recorder.clone());

            graph.update(0.1);
            assert!(!graph.needs_initialize());
            assert_eq!(recorder.flows_from(output(start, 0)), 1);
            assert_eq!(recorder.events_for(count, FlowEvent::Activate), 1);
            assert!(!graph.is_input_active(input(count, 0)));
        }
    }

    #[test]
    fn test_self_activation_survives_dispatch() {
        let mut graph = standard_graph();
        let node = graph.create_node("Logic:NOT", "toggle");
        assert!(graph.link_nodes(output(node, 0), input(node, 0)));
        graph.initialize_values();

        graph.activate_input(input(node, 0), &FlowValue::Bool(false));
        graph.update(0.1);
        assert_eq!(graph.input_value(input(node, 0)), Some(&FlowValue::Bool(true)));
        assert!(graph.is_input_active(input(node, 0)));

        graph.update(0.1);
        assert_eq!(graph.input_value(input(node, 0)), Some(&FlowValue::Bool(false)));
    }

    #[test]
    fn test_link_validation() {
        let mut graph = standard_graph();
        let a = graph.create_node("Math:Counter", "a");
        let b = graph.create_node("Math:Counter", "b");

        assert!(graph.link_nodes(input(b, 0), output(a, 0)));
        assert_eq!(graph.edges(), &[Edge::new(output(a, 0), input(b, 0))]);
        assert!(!graph.link_nodes(output(a, 0), input(b, 0)));
        assert!(!graph.link_nodes(output(a, 0), output(b, 0)));
        assert!(!graph.link_nodes(output(a, 0), input(b, 9)));
        assert!(graph.is_output_connected(output(a, 0)));

        assert!(graph.unlink_nodes(output(a, 0), input(b, 0)));
        assert!(!graph.unlink_nodes(output(a, 0), input(b, 0)));
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_node_ids_and_names() {
        let mut graph = standard_graph();
        let a = graph.create_node("Math:Counter", "a");
        let b = graph.create_node("Math:Counter", "b");
        let c = graph.create_node("Math:Counter", "c");
        assert!(graph.link_nodes(output(a, 0), input(b, 0)));

        assert!(graph.remove_node(b));
        assert!(graph.edges().is_empty());
        assert_eq!(graph.create_node("Math:Counter", "d"), b);
        assert_eq!(graph.create_node("Math:Counter", "a"), NodeId::INVALID);
        assert_eq!(graph.create_node("Nope:Missing", "x"), NodeId::INVALID);

        let unnamed = graph.create_node("Math:Counter", "");
        assert_eq!(graph.node_name(unnamed), Some(format!("Math:Counter_{}", unnamed.0).as_str()));
        assert!(graph.set_node_name(c, "renamed"));
        assert!(!graph.set_node_name(a, "renamed"));
        assert_eq!(graph.resolve_node("renamed"), c);
        assert_eq!(graph.node_count(), 4);
        assert!(graph.remove_node_by_name("renamed"));
        assert_eq!(graph.resolve_node("renamed"), NodeId::INVALID);
    }

    #[test]
    fn test_resolve_address() {
        let mut graph = standard_graph();
        let count = graph.create_node("Math:Counter", "count");

        assert_eq!(graph.resolve_address("count:Reset", false), Some(input(count, 1)));
        assert_eq!(graph.resolve_address("count:count", true), Some(output(count, 0)));
        assert_eq!(graph.resolve_address("count:Missing", false), None);
        assert_eq!(graph.resolve_address("nobody:In", false), None);
        assert_eq!(graph.resolve_address("count", false), None);
    }

    struct Gate {
        blocked: NodeId,
        refused: Option<&'static str>,
        cancelled: AtomicUsize,
    }

    impl GraphHook for Gate {
        fn perform_activation(&self, _graph: GraphId, _from: FlowAddress, to: FlowAddress, _value: &FlowValue) -> HookVerdict {
            if to.node == self.blocked {
                HookVerdict::Stop
            } else {
                HookVerdict::Pass
            }
        }

        fn created_node(&self, _graph: GraphId, _id: NodeId, name: &str) -> bool {
            self.refused != Some(name)
        }

        fn cancel_created_node(&self, _graph: GraphId, _id: NodeId, _name: &str) {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_hooks_veto() {
        let mut graph = standard_graph();
        let source = graph.create_node("Logic:NOT", "source");
        let open = graph.create_node("Math:Counter", "open");
        let closed = graph.create_node("Math:Counter", "closed");
        assert!(graph.link_nodes(output(source, 0), input(open, 0)));
        assert!(graph.link_nodes(output(source, 0), input(closed, 0)));

        let permissive = Arc::new(Gate {
            blocked: NodeId::INVALID,
            refused: None,
            cancelled: AtomicUsize::new(0),
        });
        let strict = Arc::new(Gate {
            blocked: closed,
            refused: Some("forbidden"),
            cancelled: AtomicUsize::new(0),
        });
        assert!(graph.add_hook(permissive.clone()));
        assert!(graph.add_hook(strict.clone()));
        assert!(!graph.add_hook(strict.clone()));
        graph.initialize_values();

        assert_eq!(graph.activate_port(output(source, 0), true), 1);
        assert!(graph.is_input_active(input(open, 0)));
        assert!(!graph.is_input_active(input(closed, 0)));

        assert_eq!(graph.create_node("Math:Counter", "forbidden"), NodeId::INVALID);
        assert_eq!(permissive.cancelled.load(Ordering::Relaxed), 1);
        assert_eq!(strict.cancelled.load(Ordering::Relaxed), 0);

        let strict: Arc<dyn GraphHook> = strict;
        assert!(graph.remove_hook(&strict));
        assert_ne!(graph.create_node("Math:Counter", "forbidden"), NodeId::INVALID);
    }

    #[test]
    fn test_graph_tokens() {
        let mut graph = standard_graph();
        assert!(graph.add_graph_token(GraphToken {
            name: "score".into(),
            data_type: DataType::Int,
        }));
        assert!(!graph.add_graph_token(GraphToken {
            name: String::new(),
            data_type: DataType::Bool,
        }));

        assert!(graph.set_graph_token_value("score", &FlowValue::Float(2.0)));
        assert_eq!(graph.graph_token_value("score"), Some(&FlowValue::Int(2)));
        assert_eq!(graph.global_name_for_graph_token("score"), "GraphToken.Graph1.score");

        graph.initialize_values();
        assert_eq!(graph.graph_token_value("score"), Some(&FlowValue::Int(0)));
        assert!(graph.remove_graph_token("score"));
        assert_eq!(graph.graph_token_count(), 0);
    }

    #[test]
    fn test_serialization_restores_state() {
        let mut graph = standard_graph();
        let count = graph.create_node("Math:Counter", "count");
        graph.initialize_values();
        for _ in 0..3 {
            graph.activate_input(input(count, 0), &FlowValue::Int(1));
            graph.update(0.1);
        }

        let mut writer = ArchiveWriter::new();
        graph.serialize(&mut writer);
        let archive = writer.finish();
        let state = archive.group("Node0").and_then(|node| node.group("state"));
        assert_eq!(state.and_then(|state| state.get("count")), Some(&ArchiveValue::I32(3)));

        let mut restored = standard_graph();
        restored.create_node("Math:Counter", "count");
        let mut reader = ArchiveReader::new(&archive);
        restored.serialize(&mut reader);
        reader.finish().expect("archive matches the graph");
        assert!(!restored.needs_initialize());

        let mut writer = ArchiveWriter::new();
        restored.serialize(&mut writer);
        assert_eq!(writer.finish(), archive);
    }

    #[test]
    fn test_clone_graph() {
        let mut graph = standard_graph();
        let delay = graph.create_node("Time:Delay", "delay");
        let count = graph.create_node("Math:Counter", "count");
        assert!(graph.link_nodes(output(delay, 0), input(count, 0)));
        graph.set_input_value(input(delay, 1), &FlowValue::Float(0.5));
        graph.add_graph_token(GraphToken {
            name: "level".into(),
            data_type: DataType::String,
        });

        let mut clone = graph.clone_graph(GraphId(2));
        assert_eq!(clone.id(), GraphId(2));
        assert_eq!(clone.node_count(), 2);
        assert_eq!(clone.edges(), graph.edges());
        assert_eq!(clone.resolve_node("count"), count);
        assert_eq!(clone.input_value(input(delay, 1)), Some(&FlowValue::Float(0.5)));
        assert_eq!(clone.graph_token_count(), 1);

        clone.initialize_values();
        clone.activate_input(input(delay, 0), &FlowValue::Int(4));
        clone.update(0.1);
        assert!(clone.is_regularly_updated(delay));
        assert!(!graph.is_regularly_updated(delay));
    }

    #[test]
    fn test_suspend_pauses_updates() {
        let mut graph = standard_graph();
        let count = graph.create_node("Math:Counter", "count");
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());
        graph.update(0.5);

        graph.set_suspended(true);
        assert_eq!(recorder.events_for(count, FlowEvent::Suspend), 1);
        graph.activate_input(input(count, 0), &FlowValue::Int(1));
        graph.update(0.5);
        assert_eq!(graph.current_time(), 0.5);
        assert_eq!(recorder.events_for(count, FlowEvent::Activate), 0);

        graph.set_suspended(false);
        assert_eq!(recorder.events_for(count, FlowEvent::Resume), 1);
        graph.update(0.5);
        assert_eq!(recorder.events_for(count, FlowEvent::Activate), 1);
    }

    #[test]
    fn test_entity_id_changes() {
        let mut graph = standard_graph();
        let a = graph.create_node("Math:Counter", "a");
        let b = graph.create_node("Math:Counter", "b");
        assert!(graph.set_entity_id(a, EntityId(7)));
        assert!(graph.set_entity_id(b, EntityId(8)));

        graph.on_entity_id_changed(EntityId(7), EntityId(9));
        assert_eq!(graph.entity_id(a), EntityId(9));
        assert_eq!(graph.entity_id(b), EntityId(8));
        assert!(!graph.set_entity_id(NodeId(40), EntityId(1)));
    }

    #[test]
    fn test_connect_events() {
        let mut graph = standard_graph();
        let a = graph.create_node("Math:Counter", "a");
        let b = graph.create_node("Math:Counter", "b");
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.link_nodes(output(a, 0), input(b, 0));
        graph.remove_node(a);
        assert_eq!(recorder.events_for(a, FlowEvent::ConnectOutputPort), 1);
        assert_eq!(recorder.events_for(b, FlowEvent::ConnectInputPort), 1);
        assert_eq!(recorder.events_for(a, FlowEvent::DisconnectOutputPort), 1);
        assert_eq!(recorder.events_for(b, FlowEvent::DisconnectInputPort), 1);
    }

    /// Forwards on `Out`, then signals `Late` from its final activation
    struct Finisher;

    impl FlowNode for Finisher {
        fn configuration(&self) -> NodeConfig {
            NodeConfig::new()
                .with_inputs([InputPortConfig::any_type("In")])
                .with_outputs([OutputPortConfig::new::<bool>("Out"), OutputPortConfig::void("Late")])
        }

        fn process_event(&mut self, event: FlowEvent, info: &mut ActivationInfo<'_>) {
            match event {
                FlowEvent::Activate => {
                    info.activate_output(PortId(0), true);
                    info.request_final_activation();
                }
                FlowEvent::FinalActivate => {
                    info.activate_output(PortId(1), true);
                }
                _ => {}
            }
        }
    }

    impl NodeClass for Finisher {
        const TYPE_NAME: &'static str = "Test:Finisher";

        fn create(_info: &CreateInfo) -> Self {
            Finisher
        }
    }

    fn finisher_graph() -> FlowGraph {
        let mut registry = create_standard_registry().expect("standard nodes register");
        registry.register::<Finisher>().expect("register finisher");
        FlowGraph::new(GraphId(1), Arc::new(registry))
    }

    #[test]
    fn test_final_activation_follows_the_pass() {
        let mut graph = finisher_graph();
        let a = graph.create_node("Test:Finisher", "a");
        let b = graph.create_node("Logic:NOT", "b");
        let c = graph.create_node("Logic:NOT", "c");
        let late = graph.create_node("Math:Counter", "late");
        assert!(graph.link_nodes(output(a, 0), input(b, 0)));
        assert!(graph.link_nodes(output(b, 0), input(c, 0)));
        assert!(graph.link_nodes(output(a, 1), input(late, 0)));
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.initialize_values();
        graph.activate_input(input(a, 0), &FlowValue::Int(1));
        graph.update(0.1);
        assert_eq!(
            recorder.events_of(&[FlowEvent::Activate, FlowEvent::FinalActivate]),
            vec![
                (a, FlowEvent::Activate),
                (b, FlowEvent::Activate),
                (c, FlowEvent::Activate),
                (a, FlowEvent::FinalActivate),
            ]
        );

        // Activations made during FinalActivate wait for the next tick.
        assert!(graph.is_input_active(input(late, 0)));
        assert_eq!(recorder.events_for(late, FlowEvent::Activate), 0);
        graph.update(0.1);
        assert_eq!(recorder.events_for(late, FlowEvent::Activate), 1);
        assert_eq!(recorder.events_for(a, FlowEvent::FinalActivate), 1);
    }

    #[test]
    fn test_final_initialize_follows_every_initialize() {
        let mut graph = standard_graph();
        let nodes = [
            graph.create_node("Game:Start", "start"),
            graph.create_node("Math:Counter", "count"),
            graph.create_node("Time:Delay", "delay"),
        ];
        let recorder = Arc::new(FlowRecorder::default());
        graph.add_inspector(recorder.clone());

        graph.initialize_values();
        let events = recorder.events_of(&[FlowEvent::Initialize, FlowEvent::FinalInitialize]);
        assert_eq!(events.len(), 6);
        let (first, last) = events.split_at(3);
        assert!(first.iter().all(|(_, event)| *event == FlowEvent::Initialize));
        assert!(last.iter().all(|(_, event)| *event == FlowEvent::FinalInitialize));
        for node in nodes {
            assert_eq!(recorder.events_for(node, FlowEvent::FinalInitialize), 1);
        }
    }

    #[test]
    fn test_serialization_keeps_final_activations() {
        let mut graph = finisher_graph();
        let a = graph.create_node("Test:Finisher", "a");
        graph.initialize_values();
        graph.request_final_activation(a);

        let mut writer = ArchiveWriter::new();
        graph.serialize(&mut writer);
        let archive = writer.finish();
        let finals = archive.group("finalActivations");
        assert_eq!(finals.and_then(|list| list.get("n0")), Some(&ArchiveValue::Str("a".into())));

        let mut restored = finisher_graph();
        let a = restored.create_node("Test:Finisher", "a");
        let recorder = Arc::new(FlowRecorder::default());
        restored.add_inspector(recorder.clone());
        let mut reader = ArchiveReader::new(&archive);
        restored.serialize(&mut reader);
        reader.finish().expect("archive matches the graph");

        restored.update(0.1);
        assert_eq!(recorder.events_for(a, FlowEvent::FinalActivate), 1);
    }
}
