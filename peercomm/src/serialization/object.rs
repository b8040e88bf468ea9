//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Pluggable serialization of arbitrary payload objects.
//!
//! Command parameters, command results, notification arguments and
//! connection verification payloads travel as type-erased [`ObjectValue`]s.
//! The [`ObjectSerializerRegistry`] turns them into [`SerializedObject`]s for
//! the wire and back. Serializers are consulted in registration order; a type
//! without a serializer cannot be sent and yields
//! [`ObjectSerializationError::MissingSerializer`].
//!
//! # Examples
//!
//! ```rust
//! use peercomm::serialization::{ObjectSerializerRegistry, ObjectValue};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let registry = ObjectSerializerRegistry::with_defaults();
//! registry.register_type::<Point>();
//!
//! let wire = registry.serialize(&ObjectValue::new(Point { x: 1, y: 2 })).unwrap();
//! let back = registry.deserialize(&wire).unwrap();
//! assert_eq!(back.downcast_cloned::<Point>(), Some(Point { x: 1, y: 2 }));
//! ```

use crate::serialization::ObjectSerializationError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A shareable, type-erased value.
#[derive(Clone)]
pub struct ObjectValue {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl ObjectValue {
    /// Wraps a value.
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The unit value, used for commands without a result.
    #[must_use]
    pub fn unit() -> Self {
        Self::new(())
    }

    /// The [`TypeId`] of the wrapped value.
    #[must_use]
    pub fn value_type_id(&self) -> TypeId {
        self.type_id
    }

    /// The Rust type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrows the wrapped value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Clones the wrapped value out as a `T`.
    #[must_use]
    pub fn downcast_cloned<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Wire form of an [`ObjectValue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedObject {
    /// Name under which the serializer is registered on both sides.
    pub type_name: String,
    /// The encoded value.
    pub value: serde_json::Value,
}

/// Converts values of one type between [`ObjectValue`] and JSON.
pub trait ObjectSerializer: Send + Sync {
    /// Wire name of the handled type.
    fn type_name(&self) -> &str;

    /// Returns `true` if this serializer handles values of the given type.
    fn handles(&self, type_id: TypeId) -> bool;

    /// Encodes a value.
    fn serialize(&self, value: &ObjectValue) -> Result<serde_json::Value, ObjectSerializationError>;

    /// Decodes a value.
    fn deserialize(&self, value: &serde_json::Value) -> Result<ObjectValue, ObjectSerializationError>;
}

/// [`ObjectSerializer`] for any serde type.
///
/// The wire name defaults to [`std::any::type_name`]; use
/// [`JsonObjectSerializer::named`] when both sides do not share the same
/// Rust type path.
pub struct JsonObjectSerializer<T> {
    type_name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonObjectSerializer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a serializer named after the Rust type.
    #[must_use]
    pub fn new() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// Creates a serializer with an explicit wire name.
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonObjectSerializer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectSerializer for JsonObjectSerializer<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn handles(&self, type_id: TypeId) -> bool {
        type_id == TypeId::of::<T>()
    }

    fn serialize(&self, value: &ObjectValue) -> Result<serde_json::Value, ObjectSerializationError> {
        let typed = value
            .downcast_ref::<T>()
            .ok_or_else(|| ObjectSerializationError::TypeMismatch {
                expected: self.type_name.clone(),
                actual: value.type_name().to_string(),
            })?;
        serde_json::to_value(typed).map_err(|source| ObjectSerializationError::Json {
            type_name: self.type_name.clone(),
            source,
        })
    }

    fn deserialize(&self, value: &serde_json::Value) -> Result<ObjectValue, ObjectSerializationError> {
        let typed: T = serde_json::from_value(value.clone()).map_err(|source| {
            ObjectSerializationError::Json {
                type_name: self.type_name.clone(),
                source,
            }
        })?;
        Ok(ObjectValue::new(typed))
    }
}

/// Ordered collection of [`ObjectSerializer`]s.
///
/// Lookups return the first matching serializer, so serializers registered
/// earlier take precedence.
#[derive(Default)]
pub struct ObjectSerializerRegistry {
    serializers: RwLock<Vec<Arc<dyn ObjectSerializer>>>,
}

impl ObjectSerializerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that knows the primitive types, `String`,
    /// `Vec<u8>` and `()`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_type::<()>();
        registry.register_type::<bool>();
        registry.register_type::<i8>();
        registry.register_type::<i16>();
        registry.register_type::<i32>();
        registry.register_type::<i64>();
        registry.register_type::<u8>();
        registry.register_type::<u16>();
        registry.register_type::<u32>();
        registry.register_type::<u64>();
        registry.register_type::<f32>();
        registry.register_type::<f64>();
        registry.register_type::<char>();
        registry.register_type::<String>();
        registry.register_type::<Vec<u8>>();
        registry.register_type::<Vec<String>>();
        registry
    }

    /// Appends a serializer.
    pub fn register(&self, serializer: Arc<dyn ObjectSerializer>) {
        tracing::trace!(type_name = serializer.type_name(), "registering object serializer");
        self.serializers.write().push(serializer);
    }

    /// Appends a [`JsonObjectSerializer`] for `T` unless `T` is already
    /// handled.
    pub fn register_type<T>(&self)
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if !self.has_serializer_for(TypeId::of::<T>()) {
            self.register(Arc::new(JsonObjectSerializer::<T>::new()));
        }
    }

    /// Returns `true` if some serializer handles the given type.
    #[must_use]
    pub fn has_serializer_for(&self, type_id: TypeId) -> bool {
        self.serializers.read().iter().any(|s| s.handles(type_id))
    }

    /// Returns the first serializer handling the given type.
    #[must_use]
    pub fn serializer_for(&self, type_id: TypeId) -> Option<Arc<dyn ObjectSerializer>> {
        self.serializers
            .read()
            .iter()
            .find(|s| s.handles(type_id))
            .cloned()
    }

    /// Returns the first serializer registered under the given wire name.
    #[must_use]
    pub fn serializer_for_name(&self, type_name: &str) -> Option<Arc<dyn ObjectSerializer>> {
        self.serializers
            .read()
            .iter()
            .find(|s| s.type_name() == type_name)
            .cloned()
    }

    /// Fails with [`ObjectSerializationError::MissingSerializer`] unless a
    /// serializer handles the type of `value`.
    pub fn ensure_serializer_for(&self, value: &ObjectValue) -> Result<(), ObjectSerializationError> {
        self.required_serializer(value).map(|_| ())
    }

    fn required_serializer(&self, value: &ObjectValue) -> Result<Arc<dyn ObjectSerializer>, ObjectSerializationError> {
        self.serializer_for(value.value_type_id())
            .ok_or_else(|| ObjectSerializationError::MissingSerializer {
                type_name: value.type_name().to_string(),
            })
    }

    /// Encodes a value for the wire.
    pub fn serialize(&self, value: &ObjectValue) -> Result<SerializedObject, ObjectSerializationError> {
        let serializer = self.required_serializer(value)?;
        Ok(SerializedObject {
            type_name: serializer.type_name().to_string(),
            value: serializer.serialize(value)?,
        })
    }

    /// Decodes a value received from the wire.
    pub fn deserialize(&self, object: &SerializedObject) -> Result<ObjectValue, ObjectSerializationError> {
        let serializer = self.serializer_for_name(&object.type_name).ok_or_else(|| {
            ObjectSerializationError::MissingSerializer {
                type_name: object.type_name.clone(),
            }
        })?;
        serializer.deserialize(&object.value)
    }

    /// Number of registered serializers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.serializers.read().len()
    }

    /// Returns `true` if no serializer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.serializers.read().is_empty()
    }
}

impl fmt::Debug for ObjectSerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .serializers
            .read()
            .iter()
            .map(|s| s.type_name().to_string())
            .collect();
        f.debug_struct("ObjectSerializerRegistry")
            .field("serializers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
    }

    #[test]
    fn test_object_value_downcast() {
        let value = ObjectValue::new(42i32);
        assert!(value.is::<i32>());
        assert!(!value.is::<i64>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.downcast_cloned::<i64>(), None);
    }

    #[test]
    fn test_defaults_cover_primitives() {
        let registry = ObjectSerializerRegistry::with_defaults();
        assert!(registry.has_serializer_for(TypeId::of::<i32>()));
        assert!(registry.has_serializer_for(TypeId::of::<String>()));
        assert!(registry.has_serializer_for(TypeId::of::<()>()));
        assert!(!registry.has_serializer_for(TypeId::of::<Reading>()));
    }

    #[test]
    fn test_missing_serializer_is_reported() {
        let registry = ObjectSerializerRegistry::with_defaults();
        let error = registry
            .serialize(&ObjectValue::new(Reading {
                sensor: "t1".to_string(),
                value: 1.5,
            }))
            .unwrap_err();
        assert!(error.is_missing_serializer());

        let unknown = SerializedObject {
            type_name: "nobody.Knows".to_string(),
            value: serde_json::Value::Null,
        };
        assert!(registry.deserialize(&unknown).unwrap_err().is_missing_serializer());
    }

    #[test]
    fn test_custom_type_round_trip() {
        let registry = ObjectSerializerRegistry::new();
        registry.register_type::<Reading>();
        let reading = Reading {
            sensor: "t1".to_string(),
            value: 21.5,
        };
        let wire = registry.serialize(&ObjectValue::new(reading.clone())).unwrap();
        assert_eq!(wire.type_name, std::any::type_name::<Reading>());
        let back = registry.deserialize(&wire).unwrap();
        assert_eq!(back.downcast_cloned::<Reading>(), Some(reading));
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = ObjectSerializerRegistry::new();
        registry.register(Arc::new(JsonObjectSerializer::<u32>::named("first")));
        registry.register(Arc::new(JsonObjectSerializer::<u32>::named("second")));
        let wire = registry.serialize(&ObjectValue::new(5u32)).unwrap();
        assert_eq!(wire.type_name, "first");
    }

    #[test]
    fn test_register_type_is_idempotent() {
        let registry = ObjectSerializerRegistry::new();
        registry.register_type::<u32>();
        registry.register_type::<u32>();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_type_mismatch() {
        let serializer = JsonObjectSerializer::<u32>::new();
        let result = serializer.serialize(&ObjectValue::new("text".to_string()));
        assert!(matches!(
            result,
            Err(ObjectSerializationError::TypeMismatch { .. })
        ));
    }
}
