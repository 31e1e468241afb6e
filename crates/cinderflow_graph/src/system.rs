// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-side owner of the node registry and every running graph.

use crate::description::{DescriptionError, GraphDescription};
use crate::graph::{FlowGraph, GraphId};
use crate::registry::NodeRegistry;
use crate::settings::GraphSettings;
use crate::value::EntityId;
use indexmap::IndexMap;
use std::sync::Arc;

/// Owns graphs, hands out their ids and ticks them
pub struct FlowSystem {
    registry: Arc<NodeRegistry>,
    settings: GraphSettings,
    graphs: IndexMap<GraphId, FlowGraph>,
    next_id: u32,
}

impl FlowSystem {
    /// Create a system with default graph settings
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_settings(registry, GraphSettings::default())
    }

    /// Create a system whose new graphs use `settings`
    pub fn with_settings(registry: Arc<NodeRegistry>, settings: GraphSettings) -> Self {
        Self {
            registry,
            settings,
            graphs: IndexMap::new(),
            next_id: 0,
        }
    }

    /// Shared node registry
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    fn allocate_id(&mut self) -> GraphId {
        loop {
            let id = GraphId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if id.is_valid() && !self.graphs.contains_key(&id) {
                return id;
            }
        }
    }

    /// Create an empty graph
    pub fn create_graph(&mut self) -> GraphId {
        let id = self.allocate_id();
        let graph = FlowGraph::with_settings(id, self.registry.clone(), self.settings.clone());
        self.graphs.insert(id, graph);
        tracing::debug!(graph = id.0, "created graph");
        id
    }

    /// Take ownership of a graph built elsewhere and give it a fresh id
    pub fn register_graph(&mut self, mut graph: FlowGraph) -> GraphId {
        let id = self.allocate_id();
        graph.set_id(id);
        self.graphs.insert(id, graph);
        id
    }

    /// Build a graph from a description and register it
    pub fn load_description(&mut self, description: &GraphDescription) -> Result<GraphId, DescriptionError> {
        let id = self.allocate_id();
        let mut graph = description.build(self.registry.clone(), id)?;
        graph.set_settings(self.settings.clone());
        self.graphs.insert(id, graph);
        Ok(id)
    }

    /// Register a copy of an existing graph
    pub fn clone_graph(&mut self, id: GraphId) -> Option<GraphId> {
        if !self.graphs.contains_key(&id) {
            return None;
        }
        let copy_id = self.allocate_id();
        let copy = self.graphs.get(&id)?.clone_graph(copy_id);
        self.graphs.insert(copy_id, copy);
        Some(copy_id)
    }

    /// Look up a graph
    pub fn graph(&self, id: GraphId) -> Option<&FlowGraph> {
        self.graphs.get(&id)
    }

    /// Look up a graph mutably
    pub fn graph_mut(&mut self, id: GraphId) -> Option<&mut FlowGraph> {
        self.graphs.get_mut(&id)
    }

    /// Uninitialize and hand back a graph
    pub fn remove_graph(&mut self, id: GraphId) -> Option<FlowGraph> {
        let mut graph = self.graphs.shift_remove(&id)?;
        graph.uninitialize();
        Some(graph)
    }

    /// Registered graph ids, in registration order
    pub fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.keys().copied()
    }

    /// Number of registered graphs
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Whether no graph is registered
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Tick every graph
    pub fn update(&mut self, dt: f32) {
        for graph in self.graphs.values_mut() {
            graph.update(dt);
        }
    }

    /// Initialize every graph now instead of on its first update
    pub fn initialize_all(&mut self) {
        for graph in self.graphs.values_mut() {
            graph.initialize_values();
        }
    }

    /// Retarget nodes from `old` to `new` in every running graph
    pub fn on_entity_id_changed(&mut self, old: EntityId, new: EntityId) {
        for graph in self.graphs.values_mut() {
            graph.on_entity_id_changed(old, new);
        }
    }

    /// Deliver `Uninitialize` to every graph
    pub fn uninitialize(&mut self) {
        for graph in self.graphs.values_mut() {
            graph.uninitialize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FlowAddress;
    use crate::nodes::create_standard_registry;
    use crate::port::PortId;

    fn system() -> FlowSystem {
        FlowSystem::new(Arc::new(create_standard_registry().expect("standard nodes register")))
    }

    #[test]
    fn test_graph_ids() {
        let mut system = system();
        let a = system.create_graph();
        let registry = system.registry().clone();
        let b = system.register_graph(FlowGraph::new(GraphId(77), registry));
        assert_ne!(a, b);
        assert_eq!(system.graph(b).map(FlowGraph::id), Some(b));

        let copy = system.clone_graph(a).expect("graph exists");
        assert_eq!(system.len(), 3);
        assert!(system.remove_graph(copy).is_some());
        assert!(system.graph(copy).is_none());
        assert_eq!(system.graph_ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_update_ticks_every_graph() {
        let mut system = system();
        let a = system.create_graph();
        let b = system.create_graph();
        system.update(0.5);
        system.update(0.5);
        for id in [a, b] {
            let graph = system.graph(id).expect("graph exists");
            assert_eq!(graph.current_time(), 1.0);
            assert!(!graph.needs_initialize());
        }
    }

    #[test]
    fn test_entity_change_skips_suspended_graphs() {
        let mut system = system();
        let running = system.create_graph();
        let paused = system.create_graph();
        for id in [running, paused] {
            let graph = system.graph_mut(id).expect("graph exists");
            let node = graph.create_node("Math:Counter", "count");
            graph.set_entity_id(node, EntityId(5));
        }
        if let Some(graph) = system.graph_mut(paused) {
            graph.set_suspended(true);
        }

        system.on_entity_id_changed(EntityId(5), EntityId(6));
        let entity = |id| {
            let graph = system.graph(id).expect("graph exists");
            graph.entity_id(graph.resolve_node("count"))
        };
        assert_eq!(entity(running), EntityId(6));
        assert_eq!(entity(paused), EntityId(5));
    }

    #[test]
    fn test_uninitialize_requests_fresh_start() {
        let mut system = system();
        let id = system.create_graph();
        {
            let graph = system.graph_mut(id).expect("graph exists");
            let delay = graph.create_node("Time:Delay", "delay");
            graph.initialize_values();
            graph.activate_input(FlowAddress::input(delay, PortId(0)), &true.into());
        }
        system.update(0.1);
        system.uninitialize();

        let graph = system.graph(id).expect("graph exists");
        assert!(graph.needs_initialize());
        assert!(!graph.is_regularly_updated(graph.resolve_node("delay")));
    }
}
