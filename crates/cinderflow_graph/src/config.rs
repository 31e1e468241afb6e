// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-class node configuration: flags and port lists.

use crate::port::{InputPortConfig, OutputPortConfig, PortId};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Node class flags.
///
/// The low nibble holds core behavior flags, the next byte the category and
/// the following nibble usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFlags(pub u32);

impl NodeFlags {
    /// No flags
    pub const NONE: NodeFlags = NodeFlags(0);
    /// Node acts on the graph's or its own target entity
    pub const TARGET_ENTITY: NodeFlags = NodeFlags(0x0001);
    /// Hidden from node pickers
    pub const HIDE_UI: NodeFlags = NodeFlags(0x0002);
    /// Output list may grow at runtime
    pub const DYNAMIC_OUTPUT: NodeFlags = NodeFlags(0x0004);
    /// Cannot be deleted by the user
    pub const UNREMOVEABLE: NodeFlags = NodeFlags(0x0008);
    /// Production ready
    pub const APPROVED: NodeFlags = NodeFlags(0x0010);
    /// Expert use
    pub const ADVANCED: NodeFlags = NodeFlags(0x0020);
    /// Debugging aid
    pub const DEBUG: NodeFlags = NodeFlags(0x0040);
    /// Kept for old graphs only
    pub const OBSOLETE: NodeFlags = NodeFlags(0x0200);
    /// Registry prepends a trigger input named `Activate`
    pub const ACTIVATION_INPUT: NodeFlags = NodeFlags(0x1000);

    /// Mask of the core behavior flags
    pub const CORE_MASK: u32 = 0x000F;
    /// Mask of the category flags
    pub const CATEGORY_MASK: u32 = 0x0FF0;
    /// Mask of the usage flags
    pub const USAGE_MASK: u32 = 0xF000;

    /// Whether every bit of `other` is set
    pub fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: NodeFlags) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`
    pub fn remove(&mut self, other: NodeFlags) {
        self.0 &= !other.0;
    }

    /// Replace the category bits
    pub fn set_category(&mut self, category: NodeCategory) {
        self.0 = (self.0 & !Self::CATEGORY_MASK) | category.flag().0;
    }

    /// Category encoded in the flags, if it is one of the known ones
    pub fn category(self) -> Option<NodeCategory> {
        NodeCategory::ALL
            .into_iter()
            .find(|category| self.0 & Self::CATEGORY_MASK == category.flag().0)
    }

    /// Core behavior bits
    pub fn core_flags(self) -> u32 {
        self.0 & Self::CORE_MASK
    }

    /// Category bits
    pub fn category_flags(self) -> u32 {
        self.0 & Self::CATEGORY_MASK
    }

    /// Usage bits
    pub fn usage_flags(self) -> u32 {
        self.0 & Self::USAGE_MASK
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::DEBUG
    }
}

impl BitOr for NodeFlags {
    type Output = NodeFlags;

    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | rhs.0)
    }
}

/// Node maturity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Production ready
    Approved,
    /// Expert use
    Advanced,
    /// Debugging aid
    Debug,
    /// Kept for old graphs only
    Obsolete,
}

impl NodeCategory {
    /// All categories
    pub const ALL: [NodeCategory; 4] = [
        NodeCategory::Approved,
        NodeCategory::Advanced,
        NodeCategory::Debug,
        NodeCategory::Obsolete,
    ];

    /// Flag bit of this category
    pub fn flag(self) -> NodeFlags {
        match self {
            Self::Approved => NodeFlags::APPROVED,
            Self::Advanced => NodeFlags::ADVANCED,
            Self::Debug => NodeFlags::DEBUG,
            Self::Obsolete => NodeFlags::OBSOLETE,
        }
    }
}

/// Configuration shared by every placement of a node class
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Tooltip text
    pub description: Option<String>,
    /// Editor widget override
    pub ui_class_name: Option<String>,
    /// Class flags
    pub flags: NodeFlags,
    /// Input ports, in port id order
    pub inputs: Vec<InputPortConfig>,
    /// Output ports, in port id order
    pub outputs: Vec<OutputPortConfig>,
}

impl NodeConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input list, stopping at the first terminator
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = InputPortConfig>) -> Self {
        self.inputs = inputs.into_iter().take_while(|port| !port.is_terminator()).collect();
        self
    }

    /// Set the output list, stopping at the first terminator
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = OutputPortConfig>) -> Self {
        self.outputs = outputs.into_iter().take_while(|port| !port.is_terminator()).collect();
        self
    }

    /// Set the tooltip
    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the editor widget override
    pub fn with_ui_class(mut self, name: impl Into<String>) -> Self {
        self.ui_class_name = Some(name.into());
        self
    }

    /// Add class flags
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    /// Replace the category
    pub fn with_category(mut self, category: NodeCategory) -> Self {
        self.flags.set_category(category);
        self
    }

    /// Find an input by name
    pub fn input_index(&self, name: &str) -> Option<PortId> {
        port_index(self.inputs.iter().map(|port| port.name.as_str()), name)
    }

    /// Find an output by name
    pub fn output_index(&self, name: &str) -> Option<PortId> {
        port_index(self.outputs.iter().map(|port| port.name.as_str()), name)
    }
}

fn port_index<'a>(mut names: impl Iterator<Item = &'a str>, name: &str) -> Option<PortId> {
    let index = names.position(|candidate| candidate.eq_ignore_ascii_case(name))?;
    u8::try_from(index).ok().map(PortId).filter(|id| id.is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    #[test]
    fn test_lists_stop_at_terminator() {
        let config = NodeConfig::new()
            .with_inputs([
                InputPortConfig::void("Start"),
                InputPortConfig::new::<f32>("Duration"),
                InputPortConfig::terminator(),
                InputPortConfig::new::<i32>("Ignored"),
            ])
            .with_outputs([OutputPortConfig::void("Done"), OutputPortConfig::terminator()]);

        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.outputs.len(), 1);
        assert_eq!(config.input_index("duration"), Some(PortId(1)));
        assert_eq!(config.input_index("Ignored"), None);
        assert_eq!(config.output_index("Done"), Some(PortId(0)));
        assert_eq!(config.inputs[1].data_type(), DataType::Float);
    }

    #[test]
    fn test_flag_groups() {
        let mut flags = NodeFlags::default();
        assert_eq!(flags.category(), Some(NodeCategory::Debug));

        flags.insert(NodeFlags::TARGET_ENTITY | NodeFlags::ACTIVATION_INPUT);
        flags.set_category(NodeCategory::Approved);

        assert_eq!(flags.category(), Some(NodeCategory::Approved));
        assert_eq!(flags.core_flags(), NodeFlags::TARGET_ENTITY.0);
        assert_eq!(flags.usage_flags(), NodeFlags::ACTIVATION_INPUT.0);
        assert!(!flags.contains(NodeFlags::DEBUG));

        flags.remove(NodeFlags::TARGET_ENTITY);
        assert_eq!(flags.core_flags(), 0);
    }
}
