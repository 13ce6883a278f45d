//! `FieldValue`: how each Rust type is read from and written to JSON.
//!
//! Scalars go through `Coerce`, containers recurse through the `Mapper`,
//! registered objects and enums get their impls from `graph_object!` and
//! `graph_enum!`.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::warn;

use super::binding::TypeDescriptor;
use super::Mapper;
use crate::coerce::{text_form, Coerce};
use crate::dates;
use crate::error::{GraphError, GraphResult};

/// A type the mapping engine can bind a JSON value to.
pub trait FieldValue: Sized + 'static {
    /// Whether a top-level JSON array is acceptable input.
    const ACCEPTS_ARRAY: bool = false;

    /// Raw JSON that bypasses mapping entirely.
    const PASSTHROUGH: bool = false;

    /// Mapping is delegated to an inner type (`Option`, `Box`), which applies
    /// the `{}` and `[]` rules itself.
    const WRAPPER: bool = false;

    fn from_json(value: &Value, mapper: &Mapper) -> GraphResult<Self>;

    /// Like `from_json`, but `Ok(None)` means "leave the target untouched".
    /// JSON `null` yields `None` unless the type can represent it.
    fn from_json_opt(value: &Value, mapper: &Mapper) -> GraphResult<Option<Self>> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_json(value, mapper).map(Some)
        }
    }

    fn to_json(&self, mapper: &Mapper, skip_nulls: bool) -> GraphResult<Value>;

    /// Value produced when `{}` is mapped to a type with no bound fields.
    fn zero_value() -> Self;

    /// Field bindings, for types registered with `graph_object!`.
    fn descriptor() -> Option<&'static TypeDescriptor<Self>> {
        None
    }
}

macro_rules! scalar_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl FieldValue for $t {
                fn from_json(value: &Value, _mapper: &Mapper) -> GraphResult<Self> {
                    <$t as Coerce>::coerce(value)
                }

                fn to_json(&self, _mapper: &Mapper, _skip_nulls: bool) -> GraphResult<Value> {
                    Ok(Value::from(self.clone()))
                }

                fn zero_value() -> Self {
                    <$t>::default()
                }
            }
        )*
    };
}

scalar_field!(bool, String, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl FieldValue for Value {
    const ACCEPTS_ARRAY: bool = true;
    const PASSTHROUGH: bool = true;

    fn from_json(value: &Value, _mapper: &Mapper) -> GraphResult<Self> {
        Ok(value.clone())
    }

    fn to_json(&self, _mapper: &Mapper, _skip_nulls: bool) -> GraphResult<Value> {
        Ok(self.clone())
    }

    fn zero_value() -> Self {
        Value::Null
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const ACCEPTS_ARRAY: bool = T::ACCEPTS_ARRAY;
    const WRAPPER: bool = true;

    fn from_json(value: &Value, mapper: &Mapper) -> GraphResult<Self> {
        if value.is_null() {
            return Ok(None);
        }
        mapper.map_value::<T>(value)
    }

    fn from_json_opt(value: &Value, mapper: &Mapper) -> GraphResult<Option<Self>> {
        Self::from_json(value, mapper).map(Some)
    }

    fn to_json(&self, mapper: &Mapper, skip_nulls: bool) -> GraphResult<Value> {
        match self {
            Some(inner) => inner.to_json(mapper, skip_nulls),
            None => Ok(Value::Null),
        }
    }

    fn zero_value() -> Self {
        None
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    const ACCEPTS_ARRAY: bool = T::ACCEPTS_ARRAY;
    const WRAPPER: bool = true;

    fn from_json(value: &Value, mapper: &Mapper) -> GraphResult<Self> {
        T::from_json(value, mapper).map(Box::new)
    }

    fn from_json_opt(value: &Value, mapper: &Mapper) -> GraphResult<Option<Self>> {
        Ok(mapper.map_value::<T>(value)?.map(Box::new))
    }

    fn to_json(&self, mapper: &Mapper, skip_nulls: bool) -> GraphResult<Value> {
        (**self).to_json(mapper, skip_nulls)
    }

    fn zero_value() -> Self {
        Box::new(T::zero_value())
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    const ACCEPTS_ARRAY: bool = true;

    fn from_json(value: &Value, mapper: &Mapper) -> GraphResult<Self> {
        mapper.list_from_value(value)
    }

    fn to_json(&self, mapper: &Mapper, skip_nulls: bool) -> GraphResult<Value> {
        self.iter()
            .map(|item| item.to_json(mapper, skip_nulls))
            .collect::<GraphResult<Vec<_>>>()
            .map(Value::Array)
    }

    fn zero_value() -> Self {
        Vec::new()
    }
}

/// Reads a JSON object's members through `T`, skipping members that map to
/// nothing. An empty array stands in for an empty object.
fn map_entries<T: FieldValue>(
    value: &Value,
    mapper: &Mapper,
    mut insert: impl FnMut(String, T),
) -> GraphResult<()> {
    match value {
        Value::Object(map) => {
            for (key, member) in map {
                if let Some(v) = T::from_json_opt(member, mapper)? {
                    insert(key.clone(), v);
                }
            }
            Ok(())
        }
        Value::Array(items) if items.is_empty() => Ok(()),
        other => Err(GraphError::mapping(format!(
            "expected a JSON object for a map, got {other}"
        ))),
    }
}

fn entries_to_json<'a, T: FieldValue>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
    mapper: &Mapper,
    skip_nulls: bool,
) -> GraphResult<Value> {
    let mut out = Map::new();
    for (key, value) in entries {
        out.insert(key.clone(), value.to_json(mapper, skip_nulls)?);
    }
    Ok(Value::Object(out))
}

impl<T: FieldValue> FieldValue for HashMap<String, T> {
    fn from_json(value: &Value, mapper: &Mapper) -> GraphResult<Self> {
        let mut out = HashMap::new();
        map_entries(value, mapper, |k, v| {
            out.insert(k, v);
        })?;
        Ok(out)
    }

    fn to_json(&self, mapper: &Mapper, skip_nulls: bool) -> GraphResult<Value> {
        entries_to_json(self.iter(), mapper, skip_nulls)
    }

    fn zero_value() -> Self {
        HashMap::new()
    }
}

impl<T: FieldValue> FieldValue for BTreeMap<String, T> {
    fn from_json(value: &Value, mapper: &Mapper) -> GraphResult<Self> {
        let mut out = BTreeMap::new();
        map_entries(value, mapper, |k, v| {
            out.insert(k, v);
        })?;
        Ok(out)
    }

    fn to_json(&self, mapper: &Mapper, skip_nulls: bool) -> GraphResult<Value> {
        entries_to_json(self.iter(), mapper, skip_nulls)
    }

    fn zero_value() -> Self {
        BTreeMap::new()
    }
}

impl FieldValue for OffsetDateTime {
    fn from_json(value: &Value, _mapper: &Mapper) -> GraphResult<Self> {
        dates::parse_value(value)
    }

    fn to_json(&self, _mapper: &Mapper, _skip_nulls: bool) -> GraphResult<Value> {
        dates::format_long(*self).map(Value::String)
    }

    fn zero_value() -> Self {
        OffsetDateTime::UNIX_EPOCH
    }
}

/// An enum whose variants travel as fixed wire names.
pub trait GraphEnum: Copy + PartialEq + Sized + 'static {
    const VARIANTS: &'static [(&'static str, Self)];

    fn name(&self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(_, v)| v == self)
            .map_or("", |(name, _)| *name)
    }

    /// Exact wire name first, then the upper-cased name.
    fn from_name(name: &str) -> Option<Self> {
        let find = |candidate: &str| {
            Self::VARIANTS
                .iter()
                .find(|(n, _)| *n == candidate)
                .map(|(_, v)| *v)
        };
        find(name).or_else(|| find(&name.to_uppercase()))
    }
}

/// Resolves an enum from JSON, logging and yielding `None` for unknown names.
pub fn resolve_enum<E: GraphEnum>(value: &Value) -> Option<E> {
    if value.is_null() {
        return None;
    }
    let name = text_form(value);
    let resolved = E::from_name(&name);
    if resolved.is_none() {
        warn!(
            value = %name,
            enum_type = std::any::type_name::<E>(),
            "unknown enum name, mapping to none"
        );
    }
    resolved
}

pub fn enum_from_json<E: GraphEnum>(value: &Value) -> GraphResult<E> {
    resolve_enum(value).ok_or_else(|| {
        GraphError::mapping(format!(
            "{value} is not a known {}",
            std::any::type_name::<E>()
        ))
    })
}

/// Declares an enum mapped by wire name.
///
/// ```ignore
/// graph_enum! {
///     pub enum Privacy {
///         Everyone = "EVERYONE",
///         SelfOnly = "SELF",
///     }
/// }
/// ```
#[macro_export]
macro_rules! graph_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::mapping::GraphEnum for $name {
            const VARIANTS: &'static [(&'static str, Self)] = &[ $( ($wire, $name::$variant) ),+ ];
        }

        impl $crate::mapping::FieldValue for $name {
            fn from_json(
                value: &$crate::mapping::Value,
                _mapper: &$crate::mapping::Mapper,
            ) -> $crate::GraphResult<Self> {
                $crate::mapping::enum_from_json(value)
            }

            fn from_json_opt(
                value: &$crate::mapping::Value,
                _mapper: &$crate::mapping::Mapper,
            ) -> $crate::GraphResult<Option<Self>> {
                Ok($crate::mapping::resolve_enum(value))
            }

            fn to_json(
                &self,
                _mapper: &$crate::mapping::Mapper,
                _skip_nulls: bool,
            ) -> $crate::GraphResult<$crate::mapping::Value> {
                Ok($crate::mapping::Value::String(
                    $crate::mapping::GraphEnum::name(self).to_string(),
                ))
            }

            fn zero_value() -> Self {
                <Self as $crate::mapping::GraphEnum>::VARIANTS[0].1
            }
        }
    };
}
