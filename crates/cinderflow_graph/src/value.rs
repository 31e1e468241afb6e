// SPDX-License-Identifier: MIT OR Apache-2.0
//! The closed set of value types that can travel through flow ports.
//!
//! Every port value is one of a fixed list of primitive types, modelled as
//! [`FlowValue`]. [`DataType`] is the payload-free tag of that enum and also
//! defines the numbering used when values are serialized.

use crate::custom_data::FlowCustomData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag of a [`FlowValue`] variant.
///
/// The serialization tags follow the historic type list and must never be
/// renumbered: new types are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Trigger without payload
    Void,
    /// 32-bit signed integer
    Int,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
    /// Three component vector
    Vec3,
    /// 64-bit entity identifier
    EntityId,
    /// Type-erased shared payload
    CustomData,
    /// Opaque host handle
    Pointer,
}

/// Tag still accepted for the retired 32-bit entity identifier type.
const LEGACY_ENTITY_ID_TAG: i32 = 3;

impl DataType {
    /// All data types, in declaration order
    pub const ALL: [DataType; 10] = [
        DataType::Void,
        DataType::Int,
        DataType::Float,
        DataType::Double,
        DataType::Bool,
        DataType::String,
        DataType::Vec3,
        DataType::EntityId,
        DataType::CustomData,
        DataType::Pointer,
    ];

    /// Serialization tag of this type
    pub fn tag(self) -> i32 {
        match self {
            Self::Void => 0,
            Self::Int => 1,
            Self::Float => 2,
            Self::Vec3 => 4,
            Self::String => 5,
            Self::Bool => 6,
            Self::CustomData => 7,
            Self::Pointer => 8,
            Self::Double => 9,
            Self::EntityId => 10,
        }
    }

    /// Look up a type from its serialization tag.
    ///
    /// The legacy 32-bit entity identifier tag loads as [`DataType::EntityId`].
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::Void),
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            LEGACY_ENTITY_ID_TAG | 10 => Some(Self::EntityId),
            4 => Some(Self::Vec3),
            5 => Some(Self::String),
            6 => Some(Self::Bool),
            7 => Some(Self::CustomData),
            8 => Some(Self::Pointer),
            9 => Some(Self::Double),
            _ => None,
        }
    }

    /// Human readable type name
    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Vec3 => "vec3",
            Self::EntityId => "entity",
            Self::CustomData => "custom",
            Self::Pointer => "pointer",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Output may carry any type
    Any,
    /// Output carries exactly this type ([`DataType::Void`] means trigger-only)
    Data(DataType),
}

impl PortType {
    /// Serialization tag, `-1` for [`PortType::Any`]
    pub fn tag(self) -> i32 {
        match self {
            Self::Any => -1,
            Self::Data(data_type) => data_type.tag(),
        }
    }

    /// Check whether a value of `data_type` matches this declaration
    pub fn accepts(self, data_type: DataType) -> bool {
        match self {
            Self::Any => true,
            Self::Data(declared) => declared == data_type,
        }
    }
}

/// Plain three component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// The zero vector
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a vector from components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Create a vector with all components set to `value`
    pub const fn splat(value: f32) -> Self {
        Self { x: value, y: value, z: value }
    }

    /// Squared euclidean length
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
}

/// 64-bit entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The "no entity" sentinel
    pub const INVALID: EntityId = EntityId(0);

    /// Whether this id refers to an entity
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Whether the id fits into 32 bits
    pub fn is_32bit(self) -> bool {
        self.0 >> 32 == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque host handle.
///
/// The core never dereferences it; the address only round-trips between
/// host-aware nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlowPointer(usize);

impl FlowPointer {
    /// The null handle
    pub const NULL: FlowPointer = FlowPointer(0);

    /// Wrap a host address
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// The wrapped address
    pub fn addr(self) -> usize {
        self.0
    }

    /// Whether this is the null handle
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Payload-free trigger value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Void;

/// A value of one of the closed set of port types.
#[derive(Debug, Clone, Default)]
pub enum FlowValue {
    /// Trigger
    #[default]
    Void,
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// Vector
    Vec3(Vec3),
    /// Entity identifier
    EntityId(EntityId),
    /// Shared custom payload
    CustomData(FlowCustomData),
    /// Host handle
    Pointer(FlowPointer),
}

impl FlowValue {
    /// Tag of the live variant
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Void => DataType::Void,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::Bool(_) => DataType::Bool,
            Self::String(_) => DataType::String,
            Self::Vec3(_) => DataType::Vec3,
            Self::EntityId(_) => DataType::EntityId,
            Self::CustomData(_) => DataType::CustomData,
            Self::Pointer(_) => DataType::Pointer,
        }
    }

    /// The default value of a type
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::Void => Self::Void,
            DataType::Int => Self::Int(0),
            DataType::Float => Self::Float(0.0),
            DataType::Double => Self::Double(0.0),
            DataType::Bool => Self::Bool(false),
            DataType::String => Self::String(String::new()),
            DataType::Vec3 => Self::Vec3(Vec3::ZERO),
            DataType::EntityId => Self::EntityId(EntityId::INVALID),
            DataType::CustomData => Self::CustomData(FlowCustomData::default()),
            DataType::Pointer => Self::Pointer(FlowPointer::NULL),
        }
    }

    /// Whether `other` holds the same type.
    ///
    /// Custom data only matches when both wrap the same payload type.
    pub fn is_same_type(&self, other: &FlowValue) -> bool {
        match (self, other) {
            (Self::CustomData(a), Self::CustomData(b)) => a.is_same_type(b),
            _ => self.data_type() == other.data_type(),
        }
    }

    /// Rough heap usage of the payload
    pub fn memory_usage(&self) -> usize {
        match self {
            Self::String(s) => s.capacity(),
            Self::CustomData(data) => data.memory_usage(),
            _ => 0,
        }
    }
}

impl PartialEq for FlowValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Vec3(a), Self::Vec3(b)) => a == b,
            (Self::EntityId(a), Self::EntityId(b)) => a == b,
            (Self::CustomData(a), Self::CustomData(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FlowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => Ok(()),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Vec3(v) => write!(f, "{},{},{}", v.x, v.y, v.z),
            Self::EntityId(v) => write!(f, "{v}"),
            Self::CustomData(data) => write!(f, "<{}>", data.type_name()),
            Self::Pointer(p) => write!(f, "{:#x}", p.addr()),
        }
    }
}

/// A Rust type that maps onto one [`FlowValue`] variant.
pub trait FlowType: Clone + Default + 'static {
    /// The variant tag this type maps to
    const DATA_TYPE: DataType;

    /// Wrap the value
    fn into_value(self) -> FlowValue;

    /// Borrow the payload if `value` holds this exact type
    fn value_ref(value: &FlowValue) -> Option<&Self>;

    /// Mutably borrow the payload if `value` holds this exact type
    fn value_mut(value: &mut FlowValue) -> Option<&mut Self>;
}

macro_rules! impl_flow_type {
    ($ty:ty, $variant:ident) => {
        impl FlowType for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_value(self) -> FlowValue {
                FlowValue::$variant(self)
            }

            fn value_ref(value: &FlowValue) -> Option<&Self> {
                match value {
                    FlowValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn value_mut(value: &mut FlowValue) -> Option<&mut Self> {
                match value {
                    FlowValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for FlowValue {
            fn from(value: $ty) -> Self {
                FlowValue::$variant(value)
            }
        }
    };
}

impl_flow_type!(i32, Int);
impl_flow_type!(f32, Float);
impl_flow_type!(f64, Double);
impl_flow_type!(bool, Bool);
impl_flow_type!(String, String);
impl_flow_type!(Vec3, Vec3);
impl_flow_type!(EntityId, EntityId);
impl_flow_type!(FlowCustomData, CustomData);
impl_flow_type!(FlowPointer, Pointer);

static VOID: Void = Void;

impl FlowType for Void {
    const DATA_TYPE: DataType = DataType::Void;

    fn into_value(self) -> FlowValue {
        FlowValue::Void
    }

    fn value_ref(value: &FlowValue) -> Option<&Self> {
        match value {
            FlowValue::Void => Some(&VOID),
            _ => None,
        }
    }

    fn value_mut(_value: &mut FlowValue) -> Option<&mut Self> {
        None
    }
}

impl From<Void> for FlowValue {
    fn from(_: Void) -> Self {
        FlowValue::Void
    }
}

impl From<&str> for FlowValue {
    fn from(value: &str) -> Self {
        FlowValue::String(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_stable() {
        assert_eq!(DataType::Void.tag(), 0);
        assert_eq!(DataType::Vec3.tag(), 4);
        assert_eq!(DataType::Double.tag(), 9);
        assert_eq!(DataType::EntityId.tag(), 10);
        assert_eq!(PortType::Any.tag(), -1);

        for data_type in DataType::ALL {
            assert_eq!(DataType::from_tag(data_type.tag()), Some(data_type));
        }
        assert_eq!(DataType::from_tag(3), Some(DataType::EntityId));
        assert_eq!(DataType::from_tag(11), None);
    }

    #[test]
    fn test_values_of_different_types_differ() {
        assert_ne!(FlowValue::Int(1), FlowValue::Float(1.0));
        assert_eq!(FlowValue::from("a"), FlowValue::String("a".into()));
        assert!(FlowValue::Int(4).is_same_type(&FlowValue::Int(7)));
    }

    #[test]
    fn test_entity_id_width() {
        assert!(EntityId(0xFFFF_FFFF).is_32bit());
        assert!(!EntityId(1 << 32).is_32bit());
        assert!(!EntityId::INVALID.is_valid());
    }
}
