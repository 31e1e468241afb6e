// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::cell::ValueCell;
use crate::custom_data::FlowCustomData;
use crate::value::{DataType, FlowPointer, FlowType, FlowValue, PortType, Void};
use serde::{Deserialize, Serialize};

/// Index of a port within a node's input or output list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u8);

impl PortId {
    /// The "no port" sentinel
    pub const INVALID: PortId = PortId(0xFF);

    /// Whether this refers to a port
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Position in the port list
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Static description of one input port
#[derive(Debug, Clone)]
pub struct InputPortConfig {
    /// Port name (empty for the list terminator)
    pub name: String,
    /// Display name override
    pub human_name: Option<String>,
    /// Tooltip text
    pub description: Option<String>,
    /// Editor hint such as `enum_int:Add=0,Sub=1`
    pub ui_config: Option<String>,
    /// Value new placements start with; its lock decides coercion
    pub default_value: ValueCell,
}

impl InputPortConfig {
    fn with_cell(name: impl Into<String>, default_value: ValueCell) -> Self {
        Self {
            name: name.into(),
            human_name: None,
            description: None,
            ui_config: None,
            default_value,
        }
    }

    /// Typed input defaulting to `T`'s zero value
    pub fn new<T: FlowType>(name: impl Into<String>) -> Self {
        Self::with_cell(name, ValueCell::default_for(T::DATA_TYPE, true))
    }

    /// Typed input with an explicit default
    pub fn with_default<T: FlowType>(name: impl Into<String>, value: T) -> Self {
        Self::with_cell(name, ValueCell::locked(value.into_value()))
    }

    /// Input taking on whatever type arrives
    pub fn any_type(name: impl Into<String>) -> Self {
        Self::with_cell(name, ValueCell::new(0))
    }

    /// Trigger input
    pub fn void(name: impl Into<String>) -> Self {
        Self::with_cell(name, ValueCell::new(Void))
    }

    /// Custom data input locked to the payload type of `value`
    pub fn custom_data(name: impl Into<String>, value: FlowCustomData) -> Self {
        Self::with_cell(name, ValueCell::locked(value))
    }

    /// Host handle input
    pub fn pointer(name: impl Into<String>) -> Self {
        Self::with_cell(name, ValueCell::new(FlowPointer::NULL))
    }

    /// List terminator
    pub fn terminator() -> Self {
        Self::with_cell(String::new(), ValueCell::default())
    }

    /// Whether this is the list terminator
    pub fn is_terminator(&self) -> bool {
        self.name.is_empty()
    }

    /// Set the tooltip
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the display name
    pub fn human_name(mut self, text: impl Into<String>) -> Self {
        self.human_name = Some(text.into());
        self
    }

    /// Set the editor hint
    pub fn ui_config(mut self, text: impl Into<String>) -> Self {
        self.ui_config = Some(text.into());
        self
    }

    /// Type of the default value
    pub fn data_type(&self) -> DataType {
        self.default_value.get_type()
    }

    /// Name shown to users
    pub fn display_name(&self) -> &str {
        self.human_name.as_deref().unwrap_or(&self.name)
    }

    /// Default as a plain value
    pub fn default_flow_value(&self) -> &FlowValue {
        self.default_value.value()
    }
}

/// Static description of one output port
#[derive(Debug, Clone)]
pub struct OutputPortConfig {
    /// Port name (empty for the list terminator)
    pub name: String,
    /// Display name override
    pub human_name: Option<String>,
    /// Tooltip text
    pub description: Option<String>,
    /// Declared type of emitted values
    pub port_type: PortType,
}

impl OutputPortConfig {
    fn with_type(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            human_name: None,
            description: None,
            port_type,
        }
    }

    /// Output emitting `T`
    pub fn new<T: FlowType>(name: impl Into<String>) -> Self {
        Self::with_type(name, PortType::Data(T::DATA_TYPE))
    }

    /// Output emitting values of any type
    pub fn any_type(name: impl Into<String>) -> Self {
        Self::with_type(name, PortType::Any)
    }

    /// Trigger output
    pub fn void(name: impl Into<String>) -> Self {
        Self::with_type(name, PortType::Data(DataType::Void))
    }

    /// Custom data output
    pub fn custom_data(name: impl Into<String>) -> Self {
        Self::with_type(name, PortType::Data(DataType::CustomData))
    }

    /// Host handle output
    pub fn pointer(name: impl Into<String>) -> Self {
        Self::with_type(name, PortType::Data(DataType::Pointer))
    }

    /// List terminator
    pub fn terminator() -> Self {
        Self::with_type(String::new(), PortType::Data(DataType::Void))
    }

    /// Whether this is the list terminator
    pub fn is_terminator(&self) -> bool {
        self.name.is_empty()
    }

    /// Set the tooltip
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the display name
    pub fn human_name(mut self, text: impl Into<String>) -> Self {
        self.human_name = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults() {
        let port = InputPortConfig::new::<f32>("Duration");
        assert_eq!(port.data_type(), DataType::Float);
        assert!(port.default_value.is_locked());

        let port = InputPortConfig::with_default("Duration", 2.0f32);
        assert_eq!(port.default_flow_value(), &FlowValue::Float(2.0));

        let port = InputPortConfig::any_type("In");
        assert_eq!(port.data_type(), DataType::Int);
        assert!(!port.default_value.is_locked());

        assert!(!InputPortConfig::void("Start").default_value.is_locked());
        assert!(!InputPortConfig::pointer("Handle").default_value.is_locked());
        assert!(InputPortConfig::custom_data("Data", FlowCustomData::default())
            .default_value
            .is_locked());
    }

    #[test]
    fn test_builders() {
        let port = InputPortConfig::new::<i32>("op")
            .human_name("Operation")
            .description("Which operation to apply")
            .ui_config("enum_int:Add=0,Sub=1");
        assert_eq!(port.display_name(), "Operation");
        assert_eq!(port.ui_config.as_deref(), Some("enum_int:Add=0,Sub=1"));
        assert_eq!(InputPortConfig::void("In").display_name(), "In");
    }

    #[test]
    fn test_output_types() {
        assert_eq!(OutputPortConfig::new::<bool>("Out").port_type, PortType::Data(DataType::Bool));
        assert_eq!(OutputPortConfig::any_type("Out").port_type, PortType::Any);
        assert!(OutputPortConfig::terminator().is_terminator());
        assert!(InputPortConfig::terminator().is_terminator());
        assert!(!OutputPortConfig::void("Done").is_terminator());
    }
}
