// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed value cells backing node input ports.

use crate::convert::convert;
use crate::serialize::Serializer;
use crate::value::{DataType, FlowType, FlowValue};

/// One input port's storage: a value, an activation flag and a lock.
///
/// A locked cell keeps its type: unconverted writes of another type are
/// refused, converted writes are coerced into the live type. An unlocked cell
/// takes on whatever type is written into it.
#[derive(Debug, Clone, Default)]
pub struct ValueCell {
    value: FlowValue,
    user_flag: bool,
    locked: bool,
}

impl ValueCell {
    /// Create an unlocked cell
    pub fn new(value: impl Into<FlowValue>) -> Self {
        Self {
            value: value.into(),
            user_flag: false,
            locked: false,
        }
    }

    /// Create a locked cell
    pub fn locked(value: impl Into<FlowValue>) -> Self {
        Self {
            locked: true,
            ..Self::new(value)
        }
    }

    /// Create a cell holding the default of `data_type`
    pub fn default_for(data_type: DataType, locked: bool) -> Self {
        Self {
            value: FlowValue::default_for(data_type),
            user_flag: false,
            locked,
        }
    }

    /// Create a cell holding the default of the type with serialization `tag`
    pub fn create_default_for_tag(tag: i32, locked: bool) -> Option<Self> {
        DataType::from_tag(tag).map(|data_type| Self::default_for(data_type, locked))
    }

    /// Live type
    pub fn get_type(&self) -> DataType {
        self.value.data_type()
    }

    /// Live value
    pub fn value(&self) -> &FlowValue {
        &self.value
    }

    /// Store `value` without conversion.
    ///
    /// Returns `false` and leaves the cell untouched when the cell is locked
    /// to another type.
    pub fn set<T: FlowType>(&mut self, value: T) -> bool {
        self.set_value(value.into_value())
    }

    /// Store a [`FlowValue`] without conversion
    pub fn set_value(&mut self, value: FlowValue) -> bool {
        if self.locked && !self.value.is_same_type(&value) {
            return false;
        }
        self.value = value;
        true
    }

    /// Store `value`, coercing it into the live type when the cell is locked
    pub fn set_value_with_conversion<T: FlowType>(&mut self, value: T) -> bool {
        self.assign_with_conversion(&value.into_value())
    }

    /// Store another cell's live value, coercing it when this cell is locked
    pub fn set_value_with_conversion_from(&mut self, source: &ValueCell) -> bool {
        self.assign_with_conversion(&source.value)
    }

    pub(crate) fn assign_with_conversion(&mut self, value: &FlowValue) -> bool {
        if !self.locked || self.value.is_same_type(value) {
            self.value = value.clone();
            return true;
        }
        convert(value, &mut self.value).is_ok()
    }

    /// Read the value as `T`, converting when the live type differs
    pub fn get_value_with_conversion<T: FlowType>(&self) -> Option<T> {
        if let Some(value) = T::value_ref(&self.value) {
            return Some(value.clone());
        }
        let mut out = FlowValue::default_for(T::DATA_TYPE);
        convert(&self.value, &mut out).ok()?;
        T::value_ref(&out).cloned()
    }

    /// Borrow the value if it is exactly a `T`
    pub fn get_ptr<T: FlowType>(&self) -> Option<&T> {
        T::value_ref(&self.value)
    }

    /// Mutably borrow the value if it is exactly a `T`
    pub fn get_ptr_mut<T: FlowType>(&mut self) -> Option<&mut T> {
        T::value_mut(&mut self.value)
    }

    /// Reset to the default of the type with serialization `tag`.
    ///
    /// Returns `false` for an unknown tag.
    pub fn set_default_for_tag(&mut self, tag: i32) -> bool {
        match DataType::from_tag(tag) {
            Some(data_type) => {
                self.value = FlowValue::default_for(data_type);
                true
            }
            None => false,
        }
    }

    /// Whether the activation flag is set
    pub fn is_user_flag_set(&self) -> bool {
        self.user_flag
    }

    /// Set the activation flag
    pub fn set_user_flag(&mut self) {
        self.user_flag = true;
    }

    /// Clear the activation flag
    pub fn clear_user_flag(&mut self) {
        self.user_flag = false;
    }

    /// Whether the type is fixed
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Fix the live type
    pub fn set_locked(&mut self) {
        self.locked = true;
    }

    /// Let writes replace the live type
    pub fn set_unlocked(&mut self) {
        self.locked = false;
    }

    /// Write or read the cell as a `(tag, ud, v)` triple
    pub fn serialize(&mut self, ser: &mut dyn Serializer) {
        let mut tag = self.get_type().tag();
        ser.value_i32("tag", &mut tag);
        if ser.is_reading() && !self.set_default_for_tag(tag) {
            tracing::warn!(tag, "unknown value tag in archive");
            return;
        }

        let mut user_flag = self.user_flag;
        ser.value_bool("ud", &mut user_flag);
        self.user_flag = user_flag;

        match &mut self.value {
            FlowValue::Int(v) => ser.value_i32("v", v),
            FlowValue::Float(v) => ser.value_f32("v", v),
            FlowValue::Double(v) => ser.value_f64("v", v),
            FlowValue::Bool(v) => ser.value_bool("v", v),
            FlowValue::String(v) => ser.value_string("v", v),
            FlowValue::Vec3(v) => ser.value_vec3("v", v),
            FlowValue::EntityId(v) => ser.value_u64("v", &mut v.0),
            FlowValue::Void | FlowValue::Pointer(_) => {
                ser.begin_group("v");
                ser.end_group();
            }
            FlowValue::CustomData(data) => {
                ser.begin_group("v");
                data.serialize(ser);
                ser.end_group();
            }
        }
    }

    /// Rough memory footprint
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.value.memory_usage()
    }
}

impl PartialEq for ValueCell {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl From<FlowValue> for ValueCell {
    fn from(value: FlowValue) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_data::FlowCustomData;
    use crate::serialize::{ArchiveReader, ArchiveWriter};
    use crate::value::{EntityId, FlowPointer, Vec3, Void};

    fn check_round_trip<T: FlowType + PartialEq + std::fmt::Debug>(value: T) {
        let mut cell = ValueCell::default();
        assert!(cell.set(value.clone()));
        assert_eq!(cell.get_type(), T::DATA_TYPE);
        assert_eq!(cell.get_value_with_conversion::<T>(), Some(value));
    }

    #[test]
    fn test_identity_round_trip() {
        check_round_trip(Void);
        check_round_trip(-7i32);
        check_round_trip(1.25f32);
        check_round_trip(-9.5f64);
        check_round_trip(true);
        check_round_trip(String::from("flow"));
        check_round_trip(Vec3::new(1.0, -2.0, 3.5));
        check_round_trip(EntityId(u64::MAX));
        check_round_trip(FlowPointer::from_addr(0xBEEF));
    }

    #[test]
    fn test_locked_set_refuses_other_types() {
        let mut cell = ValueCell::locked(5);
        assert!(!cell.set(2.0f32));
        assert!(!cell.set(String::from("x")));
        assert_eq!(cell.value(), &FlowValue::Int(5));
        assert!(cell.set(9));
        assert_eq!(cell.value(), &FlowValue::Int(9));
    }

    #[test]
    fn test_locked_conversion_keeps_type() {
        let mut cell = ValueCell::locked(0);
        assert!(cell.set_value_with_conversion(7.8f32));
        assert_eq!(cell.value(), &FlowValue::Int(7));

        assert!(!cell.set_value_with_conversion(EntityId(1 << 40)));
        assert!(!cell.set_value_with_conversion(String::from("nope")));
        assert_eq!(cell.get_type(), DataType::Int);

        assert!(cell.set_value_with_conversion(Void));
        assert_eq!(cell.value(), &FlowValue::Int(0));
    }

    #[test]
    fn test_unlocked_cell_takes_new_type() {
        let mut cell = ValueCell::new(0);
        assert!(cell.set_value_with_conversion(String::from("hello")));
        assert_eq!(cell.get_type(), DataType::String);
        assert!(cell.set(true));
        assert_eq!(cell.get_type(), DataType::Bool);
    }

    #[test]
    fn test_conversion_on_read() {
        let cell = ValueCell::new(String::from("12"));
        assert_eq!(cell.get_value_with_conversion::<i32>(), Some(12));
        assert_eq!(cell.get_value_with_conversion::<bool>(), Some(true));
        assert_eq!(cell.get_value_with_conversion::<FlowPointer>(), None);
        assert_eq!(cell.get_ptr::<i32>(), None);
    }

    #[test]
    fn test_equality_needs_same_type() {
        assert_eq!(ValueCell::new(1), ValueCell::locked(1));
        assert_ne!(ValueCell::new(1), ValueCell::new(1.0f32));
        assert_ne!(ValueCell::new(1), ValueCell::new(2));
    }

    #[test]
    fn test_default_for_tag() {
        let mut cell = ValueCell::locked(3);
        assert!(cell.set_default_for_tag(DataType::Vec3.tag()));
        assert_eq!(cell.value(), &FlowValue::Vec3(Vec3::ZERO));
        assert!(!cell.set_default_for_tag(42));
        assert!(ValueCell::create_default_for_tag(-1, true).is_none());
        assert_eq!(
            ValueCell::create_default_for_tag(3, false).map(|c| c.get_type()),
            Some(DataType::EntityId)
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let cells = [
            ValueCell::new(Void),
            ValueCell::new(-3),
            ValueCell::new(0.5f32),
            ValueCell::new(1e300f64),
            ValueCell::new(true),
            ValueCell::new(String::from("text")),
            ValueCell::new(Vec3::new(1.0, 2.0, 3.0)),
            ValueCell::new(EntityId(1 << 40)),
        ];
        for (index, original) in cells.into_iter().enumerate() {
            let mut original = original;
            if index % 2 == 0 {
                original.set_user_flag();
            }

            let mut writer = ArchiveWriter::new();
            original.serialize(&mut writer);
            let archive = writer.finish();

            let mut restored = ValueCell::default();
            let mut reader = ArchiveReader::new(&archive);
            restored.serialize(&mut reader);
            assert!(reader.finish().is_ok());

            assert_eq!(restored.get_type(), original.get_type());
            assert_eq!(restored, original);
            assert_eq!(restored.is_user_flag_set(), original.is_user_flag_set());
        }
    }

    #[test]
    fn test_custom_data_cells_share_payload() {
        #[derive(Debug)]
        struct Counter(i32);
        impl crate::custom_data::CustomPortData for Counter {}

        let data = FlowCustomData::new(Counter(1));
        let cells: Vec<ValueCell> = (0..4).map(|_| ValueCell::locked(data.clone())).collect();

        data.set(Counter(99));

        for cell in &cells {
            let shared = cell.get_ptr::<FlowCustomData>().map(|d| d.get::<Counter>().0);
            assert_eq!(shared, Some(99));
        }
    }
}
