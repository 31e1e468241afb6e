// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type-erased payloads that travel through ordinary flow ports.
//!
//! [`FlowCustomData`] lets a node author publish a structured value without
//! extending [`FlowValue`]. The payload lives in a reference-counted box:
//! cloning a `FlowCustomData` shares the box, so a payload must be treated as
//! immutable once it has been sent on an output.

use crate::serialize::Serializer;
use crate::value::{EntityId, FlowPointer, FlowValue, Vec3};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Capabilities of a payload carried by [`FlowCustomData`].
///
/// Every conversion hook is optional. The defaults refuse the conversion,
/// except [`CustomPortData::get_as_void`] which always succeeds.
pub trait CustomPortData: Send + Sync + 'static {
    /// Accept a trigger
    fn set_from_void(&mut self) -> bool {
        false
    }
    /// Accept an integer
    fn set_from_int(&mut self, _from: i32) -> bool {
        false
    }
    /// Accept a float
    fn set_from_float(&mut self, _from: f32) -> bool {
        false
    }
    /// Accept a double
    fn set_from_double(&mut self, _from: f64) -> bool {
        false
    }
    /// Accept a boolean
    fn set_from_bool(&mut self, _from: bool) -> bool {
        false
    }
    /// Accept a string
    fn set_from_string(&mut self, _from: &str) -> bool {
        false
    }
    /// Accept a vector
    fn set_from_vec3(&mut self, _from: Vec3) -> bool {
        false
    }
    /// Accept an entity id
    fn set_from_entity_id(&mut self, _from: EntityId) -> bool {
        false
    }
    /// Accept a host handle
    fn set_from_pointer(&mut self, _from: FlowPointer) -> bool {
        false
    }
    /// Accept another custom payload of a different type
    fn set_from_object(&mut self, _from: &FlowCustomData) -> bool {
        false
    }

    /// Discard into a trigger
    fn get_as_void(&self) -> bool {
        true
    }
    /// Produce an integer
    fn get_as_int(&self, _to: &mut i32) -> bool {
        false
    }
    /// Produce a float
    fn get_as_float(&self, _to: &mut f32) -> bool {
        false
    }
    /// Produce a double
    fn get_as_double(&self, _to: &mut f64) -> bool {
        false
    }
    /// Produce a boolean
    fn get_as_bool(&self, _to: &mut bool) -> bool {
        false
    }
    /// Produce a string
    fn get_as_string(&self, _to: &mut String) -> bool {
        false
    }
    /// Produce a vector
    fn get_as_vec3(&self, _to: &mut Vec3) -> bool {
        false
    }
    /// Produce an entity id
    fn get_as_entity_id(&self, _to: &mut EntityId) -> bool {
        false
    }
    /// Produce a host handle
    fn get_as_pointer(&self, _to: &mut FlowPointer) -> bool {
        false
    }
    /// Write into another custom payload of a different type
    fn get_as_object(&self, _to: &FlowCustomData) -> bool {
        false
    }

    /// Payload equality; two payloads are never equal unless overridden
    fn equals(&self, _other: &Self) -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Persist or restore the payload
    fn serialize(&mut self, _ser: &mut dyn Serializer) {}

    /// Heap memory owned by the payload, excluding its own size
    fn memory_usage(&self) -> usize {
        0
    }
}

/// The payload stored by [`FlowCustomData::default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyCustomData;

impl CustomPortData for EmptyCustomData {}

/// Object-safe view over a [`CustomPortData`] payload.
trait ErasedData: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn equals_erased(&self, other: &dyn ErasedData) -> bool;
    fn set_from(&mut self, from: &FlowValue) -> bool;
    fn get_as(&self, to: &mut FlowValue) -> bool;
    fn serialize(&mut self, ser: &mut dyn Serializer);
    fn memory_usage(&self) -> usize;
}

impl<T: CustomPortData> ErasedData for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn equals_erased(&self, other: &dyn ErasedData) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self.equals(other))
    }

    fn set_from(&mut self, from: &FlowValue) -> bool {
        match from {
            FlowValue::Void => self.set_from_void(),
            FlowValue::Int(v) => self.set_from_int(*v),
            FlowValue::Float(v) => self.set_from_float(*v),
            FlowValue::Double(v) => self.set_from_double(*v),
            FlowValue::Bool(v) => self.set_from_bool(*v),
            FlowValue::String(v) => self.set_from_string(v),
            FlowValue::Vec3(v) => self.set_from_vec3(*v),
            FlowValue::EntityId(v) => self.set_from_entity_id(*v),
            FlowValue::CustomData(v) => self.set_from_object(v),
            FlowValue::Pointer(v) => self.set_from_pointer(*v),
        }
    }

    fn get_as(&self, to: &mut FlowValue) -> bool {
        match to {
            FlowValue::Void => self.get_as_void(),
            FlowValue::Int(v) => self.get_as_int(v),
            FlowValue::Float(v) => self.get_as_float(v),
            FlowValue::Double(v) => self.get_as_double(v),
            FlowValue::Bool(v) => self.get_as_bool(v),
            FlowValue::String(v) => self.get_as_string(v),
            FlowValue::Vec3(v) => self.get_as_vec3(v),
            FlowValue::EntityId(v) => self.get_as_entity_id(v),
            FlowValue::CustomData(v) => self.get_as_object(v),
            FlowValue::Pointer(v) => self.get_as_pointer(v),
        }
    }

    fn serialize(&mut self, ser: &mut dyn Serializer) {
        CustomPortData::serialize(self, ser);
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<T>() + CustomPortData::memory_usage(self)
    }
}

/// Shared, type-erased custom port payload.
#[derive(Clone)]
pub struct FlowCustomData {
    inner: Arc<RwLock<Box<dyn ErasedData>>>,
    type_id: TypeId,
    type_name: &'static str,
}

impl FlowCustomData {
    /// Box a payload, capturing its type
    pub fn new<T: CustomPortData>(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Box::new(value))),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Whether the payload is a `T`
    pub fn is_type<T: CustomPortData>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Whether both wrap the same payload type
    pub fn is_same_type(&self, other: &FlowCustomData) -> bool {
        self.type_id == other.type_id
    }

    /// Whether both share one box
    pub fn ptr_eq(&self, other: &FlowCustomData) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Name of the captured payload type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the payload.
    ///
    /// # Panics
    ///
    /// Panics if the payload is not a `T`.
    pub fn get<T: CustomPortData>(&self) -> MappedRwLockReadGuard<'_, T> {
        let held = self.type_name;
        RwLockReadGuard::map(self.inner.read(), |data| {
            match data.as_any().downcast_ref::<T>() {
                Some(value) => value,
                None => panic!("custom data holds `{held}`, not `{}`", type_name::<T>()),
            }
        })
    }

    /// Borrow the payload if it is a `T`
    pub fn try_get<T: CustomPortData>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.inner.read(), |data| data.as_any().downcast_ref::<T>()).ok()
    }

    /// Replace the payload; every clone sharing the box observes the change.
    ///
    /// # Panics
    ///
    /// Panics if the payload is not a `T`.
    pub fn set<T: CustomPortData>(&self, value: T) {
        assert!(
            self.is_type::<T>(),
            "custom data holds `{}`, cannot set `{}`",
            self.type_name,
            type_name::<T>()
        );
        let mut guard = self.inner.write();
        if let Some(slot) = guard.as_any_mut().downcast_mut::<T>() {
            *slot = value;
        }
    }

    /// Convert `from` into the payload through its `set_from_*` hooks
    pub fn set_from(&self, from: &FlowValue) -> bool {
        if let FlowValue::CustomData(other) = from {
            if self.ptr_eq(other) {
                return true;
            }
        }
        self.inner.write().set_from(from)
    }

    /// Convert the payload into `to`'s type through its `get_as_*` hooks
    pub fn get_as(&self, to: &mut FlowValue) -> bool {
        if let FlowValue::CustomData(other) = to {
            if self.ptr_eq(other) {
                return true;
            }
        }
        self.inner.read().get_as(to)
    }

    /// Persist or restore the payload
    pub fn serialize(&self, ser: &mut dyn Serializer) {
        self.inner.write().serialize(ser);
    }

    /// Size of the payload and the heap memory it owns
    pub fn memory_usage(&self) -> usize {
        self.inner.read().memory_usage()
    }
}

impl Default for FlowCustomData {
    fn default() -> Self {
        Self::new(EmptyCustomData)
    }
}

impl PartialEq for FlowCustomData {
    fn eq(&self, other: &Self) -> bool {
        if !self.is_same_type(other) {
            return false;
        }
        if self.ptr_eq(other) {
            let data = self.inner.read();
            return data.equals_erased(&**data);
        }
        let (lhs, rhs) = (self.inner.read(), other.inner.read());
        lhs.equals_erased(&**rhs)
    }
}

impl fmt::Debug for FlowCustomData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowCustomData")
            .field("type", &self.type_name)
            .field("shared", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Score(i32);

    impl CustomPortData for Score {
        fn set_from_int(&mut self, from: i32) -> bool {
            self.0 = from;
            true
        }

        fn get_as_int(&self, to: &mut i32) -> bool {
            *to = self.0;
            true
        }

        fn equals(&self, other: &Self) -> bool {
            self == other
        }
    }

    #[derive(Debug, Clone)]
    struct Label(String);

    impl CustomPortData for Label {
        fn set_from_object(&mut self, from: &FlowCustomData) -> bool {
            match from.try_get::<Score>() {
                Some(score) => {
                    self.0 = format!("score {}", score.0);
                    true
                }
                None => false,
            }
        }
    }

    #[test]
    fn test_clones_share_the_box() {
        let original = FlowCustomData::new(Score(1));
        let copies = [original.clone(), original.clone(), original.clone()];

        original.set(Score(42));

        assert_eq!(original.get::<Score>().0, 42);
        for copy in &copies {
            assert!(copy.ptr_eq(&original));
            assert_eq!(copy.get::<Score>().0, 42);
        }
    }

    #[test]
    fn test_type_identity() {
        let score = FlowCustomData::new(Score(3));
        let label = FlowCustomData::new(Label(String::new()));

        assert!(score.is_type::<Score>());
        assert!(!score.is_type::<Label>());
        assert!(!score.is_same_type(&label));
        assert!(score.try_get::<Label>().is_none());
        assert!(FlowCustomData::default().is_type::<EmptyCustomData>());
    }

    #[test]
    #[should_panic(expected = "custom data holds")]
    fn test_get_with_wrong_type_panics() {
        let score = FlowCustomData::new(Score(3));
        let _ = score.get::<Label>();
    }

    #[test]
    fn test_equality_delegates_to_payload() {
        assert_eq!(FlowCustomData::new(Score(5)), FlowCustomData::new(Score(5)));
        assert_ne!(FlowCustomData::new(Score(5)), FlowCustomData::new(Score(6)));
        // Label keeps the default equality, which never matches.
        let label = FlowCustomData::new(Label("x".into()));
        assert_ne!(label, label.clone());
    }

    #[test]
    fn test_conversion_hooks() {
        let score = FlowCustomData::new(Score(0));
        assert!(score.set_from(&FlowValue::Int(9)));
        assert!(!score.set_from(&FlowValue::Float(1.0)));

        let mut out = FlowValue::Int(0);
        assert!(score.get_as(&mut out));
        assert_eq!(out, FlowValue::Int(9));
        assert!(score.get_as(&mut FlowValue::Void));
        assert!(!score.get_as(&mut FlowValue::Bool(false)));

        let label = FlowCustomData::new(Label(String::new()));
        assert!(label.set_from(&FlowValue::CustomData(score.clone())));
        assert_eq!(label.get::<Label>().0, "score 9");
    }
}
