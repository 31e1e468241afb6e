// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node classes and their factories.

use crate::config::{NodeConfig, NodeFlags};
use crate::node::{CreateInfo, FlowNode, NodeClass, NodeHandle, NodeLifetime, SharedNode};
use crate::port::InputPortConfig;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Identifier of a registered node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeTypeId(pub u16);

impl NodeTypeId {
    /// The "no type" sentinel
    pub const INVALID: NodeTypeId = NodeTypeId(0);

    /// Whether this refers to a registered type
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    fn from_index(index: usize) -> Option<Self> {
        u16::try_from(index + 1).ok().map(Self)
    }

    fn index(self) -> Option<usize> {
        usize::from(self.0).checked_sub(1)
    }
}

/// Creates node objects for one registered type
pub trait NodeFactory: Send + Sync {
    /// Registered type name
    fn type_name(&self) -> &str;

    /// Instantiation strategy
    fn lifetime(&self) -> NodeLifetime;

    /// Object for a new placement
    fn create(&self, info: &CreateInfo) -> NodeHandle;

    /// Class configuration, queried once at registration
    fn configuration(&self) -> NodeConfig;
}

/// Factory for a [`NodeClass`], honoring its [`NodeLifetime`]
pub struct ClassFactory<T: NodeClass> {
    singleton: Mutex<Option<SharedNode>>,
    template: Mutex<Option<Box<dyn FlowNode>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NodeClass> ClassFactory<T> {
    /// Create a factory
    pub fn new() -> Self {
        Self {
            singleton: Mutex::new(None),
            template: Mutex::new(None),
            _marker: PhantomData,
        }
    }
}

impl<T: NodeClass> Default for ClassFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NodeClass> NodeFactory for ClassFactory<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn lifetime(&self) -> NodeLifetime {
        T::LIFETIME
    }

    fn create(&self, info: &CreateInfo) -> NodeHandle {
        match T::LIFETIME {
            NodeLifetime::Singleton => {
                let mut singleton = self.singleton.lock();
                let shared = singleton.get_or_insert_with(|| {
                    let node: Box<dyn FlowNode> = Box::new(T::create(info));
                    Arc::new(Mutex::new(node))
                });
                NodeHandle::Shared(shared.clone())
            }
            NodeLifetime::Instanced => NodeHandle::Owned(Box::new(T::create(info))),
            NodeLifetime::Cloned => {
                let mut template = self.template.lock();
                let template = template.get_or_insert_with(|| {
                    let node: Box<dyn FlowNode> = Box::new(T::create(info));
                    node
                });
                match template.clone_node(info) {
                    Some(node) => NodeHandle::Owned(node),
                    None => {
                        tracing::warn!(node_type = T::TYPE_NAME, "clone_node returned nothing, creating fresh");
                        NodeHandle::Owned(Box::new(T::create(info)))
                    }
                }
            }
        }
    }

    fn configuration(&self) -> NodeConfig {
        let probe = CreateInfo {
            node_id: crate::node::NodeId::INVALID,
            type_id: NodeTypeId::INVALID,
            graph_id: crate::graph::GraphId::INVALID,
        };
        T::create(&probe).configuration()
    }
}

struct RegisteredType {
    factory: Box<dyn NodeFactory>,
    config: Arc<NodeConfig>,
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by name
    types: IndexMap<String, RegisteredType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node class
    pub fn register<T: NodeClass>(&mut self) -> Result<NodeTypeId, RegistryError> {
        self.register_factory(Box::new(ClassFactory::<T>::new()))
    }

    /// Register a hand-written factory
    pub fn register_factory(&mut self, factory: Box<dyn NodeFactory>) -> Result<NodeTypeId, RegistryError> {
        let name = factory.type_name().to_owned();
        if self.types.contains_key(&name) {
            return Err(RegistryError::DuplicateType(name));
        }
        let id = NodeTypeId::from_index(self.types.len()).ok_or(RegistryError::Full)?;

        let mut config = factory.configuration();
        if config.flags.contains(NodeFlags::ACTIVATION_INPUT) {
            config.inputs.insert(0, InputPortConfig::void("Activate"));
        }
        tracing::debug!(node_type = %name, id = id.0, "registered node type");

        self.types.insert(
            name,
            RegisteredType {
                factory,
                config: Arc::new(config),
            },
        );
        Ok(id)
    }

    /// Look up a type by name
    pub fn type_id(&self, name: &str) -> NodeTypeId {
        self.types
            .get_index_of(name)
            .and_then(NodeTypeId::from_index)
            .unwrap_or(NodeTypeId::INVALID)
    }

    /// Name of a registered type
    pub fn type_name(&self, id: NodeTypeId) -> Option<&str> {
        self.types.get_index(id.index()?).map(|(name, _)| name.as_str())
    }

    /// Shared configuration of a registered type
    pub fn config(&self, id: NodeTypeId) -> Option<Arc<NodeConfig>> {
        self.entry(id).map(|entry| entry.config.clone())
    }

    /// Instantiation strategy of a registered type
    pub fn lifetime(&self, id: NodeTypeId) -> Option<NodeLifetime> {
        self.entry(id).map(|entry| entry.factory.lifetime())
    }

    /// Object for a new placement
    pub fn create(&self, id: NodeTypeId, info: &CreateInfo) -> Option<NodeHandle> {
        self.entry(id).map(|entry| entry.factory.create(info))
    }

    /// Iterate over registered types
    pub fn types(&self) -> impl Iterator<Item = (NodeTypeId, &str)> {
        self.types
            .keys()
            .enumerate()
            .filter_map(|(index, name)| Some((NodeTypeId::from_index(index)?, name.as_str())))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn entry(&self, id: NodeTypeId) -> Option<&RegisteredType> {
        self.types.get_index(id.index()?).map(|(_, entry)| entry)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when registering a node type
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Name already taken
    #[error("Node type already registered: {0}")]
    DuplicateType(String),

    /// No identifiers left
    #[error("Node type table is full")]
    Full,
}
