// SPDX-License-Identifier: MIT OR Apache-2.0
//! Standard node library.

pub mod debug;
pub mod logic;
pub mod math;
pub mod time;

use crate::registry::{NodeRegistry, RegistryError};

/// Register every standard node class
pub fn register_standard_nodes(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register::<logic::StartNode>()?;
    registry.register::<logic::AndNode>()?;
    registry.register::<logic::NotNode>()?;
    registry.register::<math::AddNode>()?;
    registry.register::<math::CalculateNode>()?;
    registry.register::<math::CounterNode>()?;
    registry.register::<time::DelayNode>()?;
    registry.register::<time::FadeNode>()?;
    registry.register::<debug::LogNode>()?;
    Ok(())
}

/// Create a registry holding the standard node classes
pub fn create_standard_registry() -> Result<NodeRegistry, RegistryError> {
    let mut registry = NodeRegistry::new();
    register_standard_nodes(&mut registry)?;
    Ok(registry)
}
