//! Bidirectional JSON ↔ typed-object mapping.
//!
//! # Design
//! The Graph API returns the same logical value in several shapes: `[]` where
//! `{}` was meant, `false` for "nothing", a bare `{"data": [...]}` where a list
//! was expected, numbers as strings. `Mapper` absorbs those variants so typed
//! shapes can stay plain structs. Field discovery is static: each type
//! registers its bindings once through `graph_object!`, and the mapper only
//! walks the resulting `TypeDescriptor`.
//!
//! Absence is never an error. Fields are omitted whenever the caller's field
//! selection leaves them out, so a missing key just leaves the field at its
//! default.

pub mod binding;
pub mod value;

pub use binding::{object_from_json, object_to_json, Completion, FieldBinding, GraphObject, TypeDescriptor};
pub use serde_json::Value;
pub use value::{enum_from_json, resolve_enum, FieldValue, GraphEnum};

use serde_json::Map;
use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};

/// Stateless JSON mapper. Cheap to construct and safe to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper;

impl Mapper {
    pub fn new() -> Self {
        Self
    }

    /// Map a JSON document to `T`.
    ///
    /// `Ok(None)` is returned for `null` and `false` documents, and for any
    /// other non-object when `T` is a registered object.
    pub fn to_object<T: FieldValue>(&self, json: &str) -> GraphResult<Option<T>> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            return Err(GraphError::mapping("JSON is an empty string - can't map it"));
        }
        let trimmed = if trimmed == "[]" && !T::ACCEPTS_ARRAY {
            "{}"
        } else {
            trimmed
        };
        if trimmed.starts_with('[') && !T::ACCEPTS_ARRAY {
            return Err(GraphError::mapping(format!(
                "JSON is an array but is being mapped as an object - map it as a list instead. \
                 Offending JSON is '{trimmed}'"
            )));
        }
        let value = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            // A bare word is a primitive payload; hand it over as text.
            Err(_) if T::descriptor().is_none() && !T::PASSTHROUGH => {
                Value::String(trimmed.to_string())
            }
            Err(e) => return Err(GraphError::mapping(format!("invalid JSON: {e}"))),
        };
        if value == Value::Bool(false) && !T::PASSTHROUGH {
            debug!(
                target_type = std::any::type_name::<T>(),
                "response body is 'false', mapping none"
            );
            return Ok(None);
        }
        self.map_value(&value)
    }

    /// Map an already parsed JSON value to `T`.
    pub fn map_value<T: FieldValue>(&self, value: &Value) -> GraphResult<Option<T>> {
        if T::PASSTHROUGH {
            return T::from_json(value, self).map(Some);
        }
        if T::WRAPPER {
            return T::from_json_opt(value, self);
        }
        let empty = Value::Object(Map::new());
        let value = match value {
            Value::Array(items) if items.is_empty() && !T::ACCEPTS_ARRAY => &empty,
            Value::Array(_) if !T::ACCEPTS_ARRAY => {
                return Err(GraphError::mapping(format!(
                    "JSON is an array but is being mapped as an object. Offending JSON is '{value}'"
                )));
            }
            other => other,
        };

        let Some(descriptor) = T::descriptor() else {
            if is_empty_object(value) {
                return Ok(Some(T::zero_value()));
            }
            return T::from_json_opt(value, self);
        };

        match value {
            Value::Null => Ok(None),
            Value::Bool(false) => {
                debug!(
                    target_type = descriptor.type_name(),
                    "encountered 'false' where an object was expected, mapping none"
                );
                Ok(None)
            }
            Value::Object(map) => {
                let mut instance = T::zero_value();
                if !map.is_empty() {
                    descriptor.populate(&mut instance, map, self)?;
                }
                descriptor.complete(&mut instance, self)?;
                Ok(Some(instance))
            }
            other => {
                debug!(
                    target_type = descriptor.type_name(),
                    json = %other,
                    "expected a JSON object, mapping none"
                );
                Ok(None)
            }
        }
    }

    /// Map a JSON document to a list of `T`.
    ///
    /// `{}` is an empty list, and an object whose first member holds an array
    /// (the `{"data": [...]}` idiom) is unwrapped to that array.
    pub fn to_list<T: FieldValue>(&self, json: &str) -> GraphResult<Vec<T>> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            return Err(GraphError::mapping("JSON is an empty string - can't map it"));
        }
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| GraphError::mapping(format!("invalid JSON: {e}")))?;
        self.list_from_value(&value)
    }

    /// Map an already parsed JSON value to a list of `T`. Elements that map
    /// to nothing (such as `null`) are dropped; use `Option<T>` to keep them.
    pub fn list_from_value<T: FieldValue>(&self, value: &Value) -> GraphResult<Vec<T>> {
        let items = match value {
            Value::Object(map) if map.is_empty() => {
                trace!("encountered {{}} where a list was expected, mapping an empty list");
                return Ok(Vec::new());
            }
            Value::Object(map) => {
                let first = map.values().next().unwrap_or(&Value::Null);
                if map.len() > 1 && !first.is_array() {
                    return Err(GraphError::mapping(format!(
                        "JSON is an object but is being mapped as a list. Offending JSON is '{value}'"
                    )));
                }
                first
            }
            other => other,
        };
        let Value::Array(items) = items else {
            return Err(GraphError::mapping(format!(
                "expected a JSON array, got '{items}'"
            )));
        };
        let mut list = Vec::with_capacity(items.len());
        for item in items {
            if let Some(mapped) = self.map_value::<T>(item)? {
                list.push(mapped);
            }
        }
        Ok(list)
    }

    /// Serialize `object` to a JSON string. With `skip_nulls`, members whose
    /// value is null, an empty list, or an empty object are omitted.
    pub fn to_json<T: FieldValue>(&self, object: &T, skip_nulls: bool) -> GraphResult<String> {
        Ok(self.to_json_value(object, skip_nulls)?.to_string())
    }

    pub fn to_json_value<T: FieldValue>(&self, object: &T, skip_nulls: bool) -> GraphResult<Value> {
        object.to_json(self, skip_nulls)
    }
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}
