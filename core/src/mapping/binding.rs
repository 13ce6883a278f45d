//! Field bindings and per-type descriptors.
//!
//! # Design
//! A `TypeDescriptor` is the static answer to "which JSON names feed which
//! fields of `T`, and what runs once they are all set". It is built once per
//! type by `graph_object!` and cached for the life of the process. Bindings
//! keep declaration order; several bindings may share one JSON name when the
//! server sends differently shaped values under the same key.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::value::FieldValue;
use super::Mapper;
use crate::error::{GraphError, GraphResult};

type Setter<T> = Box<dyn Fn(&mut T, &Value, &Mapper) -> GraphResult<()> + Send + Sync>;
type Getter<T> = Box<dyn Fn(&T, &Mapper, bool) -> GraphResult<Value> + Send + Sync>;

/// Runs after every binding of an object has been applied.
pub type Completion<T> = fn(&mut T, &Mapper) -> GraphResult<()>;

/// One JSON name bound to one field.
pub struct FieldBinding<T> {
    name: &'static str,
    field: &'static str,
    type_name: &'static str,
    set: Setter<T>,
    get: Getter<T>,
}

impl<T: 'static> FieldBinding<T> {
    pub fn new<F, G, M>(name: &'static str, field: &'static str, get: G, get_mut: M) -> Self
    where
        F: FieldValue,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        Self {
            name,
            field,
            type_name: std::any::type_name::<F>(),
            set: Box::new(move |target: &mut T, value: &Value, mapper: &Mapper| {
                if let Some(v) = F::from_json_opt(value, mapper)? {
                    *get_mut(target) = v;
                }
                Ok(())
            }),
            get: Box::new(move |source: &T, mapper: &Mapper, skip_nulls: bool| {
                get(source).to_json(mapper, skip_nulls)
            }),
        }
    }

    /// JSON name this binding reads.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl<T> std::fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Ordered bindings and completion hooks for one type.
pub struct TypeDescriptor<T> {
    type_name: &'static str,
    bindings: Vec<FieldBinding<T>>,
    ambiguous: Vec<&'static str>,
    completions: Vec<Completion<T>>,
}

impl<T: 'static> TypeDescriptor<T> {
    pub fn new(
        type_name: &'static str,
        bindings: Vec<FieldBinding<T>>,
        completions: Vec<Completion<T>>,
    ) -> Self {
        let mut counts: HashMap<&'static str, usize> = HashMap::new();
        for binding in &bindings {
            *counts.entry(binding.name).or_default() += 1;
        }
        let mut ambiguous: Vec<&'static str> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name)
            .collect();
        ambiguous.sort_unstable();
        Self {
            type_name,
            bindings,
            ambiguous,
            completions,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn bindings(&self) -> &[FieldBinding<T>] {
        &self.bindings
    }

    /// Whether more than one binding reads `name`.
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous.iter().any(|n| *n == name)
    }

    /// Apply every binding whose name is present in `object`.
    ///
    /// Missing names are skipped. For ambiguous names each binding is tried
    /// and failures are logged; any other failure aborts the whole mapping.
    pub(crate) fn populate(
        &self,
        target: &mut T,
        object: &Map<String, Value>,
        mapper: &Mapper,
    ) -> GraphResult<()> {
        let mut ambiguous_hits: Vec<(&'static str, bool)> = Vec::new();
        for binding in &self.bindings {
            let Some(value) = object.get(binding.name) else {
                continue;
            };
            if !self.is_ambiguous(binding.name) {
                (binding.set)(&mut *target, value, mapper)
                    .map_err(|e| self.with_context(binding, e))?;
                continue;
            }
            let ok = match (binding.set)(&mut *target, value, mapper) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        json_field = binding.name,
                        field = binding.field,
                        target_type = self.type_name,
                        error = %e,
                        "could not map multiply-bound field, continuing"
                    );
                    false
                }
            };
            match ambiguous_hits.iter_mut().find(|(name, _)| *name == binding.name) {
                Some((_, any_ok)) => *any_ok |= ok,
                None => ambiguous_hits.push((binding.name, ok)),
            }
        }
        for (name, _) in ambiguous_hits.iter().filter(|(_, ok)| !ok) {
            warn!(
                json_field = *name,
                target_type = self.type_name,
                "no binding accepted the value of a multiply-bound field"
            );
        }
        Ok(())
    }

    /// Run completion hooks in declaration order.
    pub(crate) fn complete(&self, target: &mut T, mapper: &Mapper) -> GraphResult<()> {
        for hook in &self.completions {
            hook(target, mapper)?;
        }
        Ok(())
    }

    /// Serialize every binding. For a name bound more than once the first
    /// non-null value wins.
    pub(crate) fn serialize(
        &self,
        source: &T,
        mapper: &Mapper,
        skip_nulls: bool,
    ) -> GraphResult<Map<String, Value>> {
        let mut out = Map::new();
        for binding in &self.bindings {
            let value = (binding.get)(source, mapper, skip_nulls)?;
            if skip_nulls && is_empty_value(&value) {
                continue;
            }
            let taken = out.get(binding.name).is_some_and(|v| !v.is_null());
            if !taken {
                out.insert(binding.name.to_string(), value);
            }
        }
        Ok(out)
    }

    fn with_context(&self, binding: &FieldBinding<T>, error: GraphError) -> GraphError {
        match error {
            GraphError::Mapping(msg) => GraphError::Mapping(format!(
                "{}.{} (\"{}\"): {msg}",
                self.type_name, binding.field, binding.name
            )),
            other => other,
        }
    }
}

impl<T> std::fmt::Debug for TypeDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("bindings", &self.bindings)
            .field("ambiguous", &self.ambiguous)
            .field("completions", &self.completions.len())
            .finish()
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A struct registered with `graph_object!`.
pub trait GraphObject: Default + Sized + 'static {
    fn descriptor() -> &'static TypeDescriptor<Self>;
}

pub fn object_from_json<T: GraphObject + FieldValue>(
    value: &Value,
    mapper: &Mapper,
) -> GraphResult<T> {
    mapper.map_value::<T>(value)?.ok_or_else(|| {
        GraphError::mapping(format!(
            "cannot map {value} to {}",
            <T as GraphObject>::descriptor().type_name()
        ))
    })
}

pub fn object_to_json<T: GraphObject>(
    source: &T,
    mapper: &Mapper,
    skip_nulls: bool,
) -> GraphResult<Value> {
    T::descriptor()
        .serialize(source, mapper, skip_nulls)
        .map(Value::Object)
}

/// Registers a struct's JSON bindings.
///
/// Each entry binds a JSON name to a field; the same name may appear more
/// than once. Optional `on_complete` hooks run in order after all bindings
/// have been applied.
///
/// ```ignore
/// #[derive(Debug, Default)]
/// struct Post { id: Option<String>, message: Option<String> }
///
/// graph_object! {
///     Post {
///         "id" => id,
///         "message" => message,
///     }
/// }
/// ```
#[macro_export]
macro_rules! graph_object {
    (
        $ty:ident {
            $( $name:literal => $field:ident ),* $(,)?
        }
        $( on_complete: [ $( $hook:path ),* $(,)? ] $(,)? )?
    ) => {
        impl $crate::mapping::GraphObject for $ty {
            fn descriptor() -> &'static $crate::mapping::TypeDescriptor<Self> {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::mapping::TypeDescriptor<$ty>> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::mapping::TypeDescriptor::new(
                        stringify!($ty),
                        vec![
                            $(
                                $crate::mapping::FieldBinding::new(
                                    $name,
                                    stringify!($field),
                                    |o: &$ty| &o.$field,
                                    |o: &mut $ty| &mut o.$field,
                                ),
                            )*
                        ],
                        vec![ $( $( $hook as $crate::mapping::Completion<$ty>, )* )? ],
                    )
                })
            }
        }

        impl $crate::mapping::FieldValue for $ty {
            fn from_json(
                value: &$crate::mapping::Value,
                mapper: &$crate::mapping::Mapper,
            ) -> $crate::GraphResult<Self> {
                $crate::mapping::object_from_json(value, mapper)
            }

            fn from_json_opt(
                value: &$crate::mapping::Value,
                mapper: &$crate::mapping::Mapper,
            ) -> $crate::GraphResult<Option<Self>> {
                mapper.map_value::<Self>(value)
            }

            fn to_json(
                &self,
                mapper: &$crate::mapping::Mapper,
                skip_nulls: bool,
            ) -> $crate::GraphResult<$crate::mapping::Value> {
                $crate::mapping::object_to_json(self, mapper, skip_nulls)
            }

            fn zero_value() -> Self {
                <Self as ::std::default::Default>::default()
            }

            fn descriptor() -> Option<&'static $crate::mapping::TypeDescriptor<Self>> {
                Some(<Self as $crate::mapping::GraphObject>::descriptor())
            }
        }
    };
}
