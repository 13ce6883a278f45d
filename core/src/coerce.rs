//! Lenient conversion of one JSON scalar into a Rust primitive.
//!
//! The Graph API is loose with scalar types: booleans arrive as `0`/`1` or
//! `"true"`, ids arrive as numbers in one context and strings in another.
//! `Coerce` accepts those variants and fails only when the text form itself
//! cannot be parsed.

use std::str::FromStr;

use serde_json::Value;

use crate::error::{GraphError, GraphResult};

/// A primitive that can be read out of any single JSON value.
pub trait Coerce: Sized {
    fn coerce(value: &Value) -> GraphResult<Self>;
}

/// Text form of a JSON value: string contents unescaped, anything else as
/// its canonical JSON serialization.
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Coerce for bool {
    fn coerce(value: &Value) -> GraphResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(GraphError::mapping(format!(
                "cannot convert {other} to a boolean"
            ))),
        }
    }
}

impl Coerce for String {
    fn coerce(value: &Value) -> GraphResult<Self> {
        Ok(text_form(value))
    }
}

fn parse_text<T>(value: &Value, target: &str) -> GraphResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = text_form(value);
    text.trim().parse::<T>().map_err(|e| {
        GraphError::mapping(format!("cannot convert {text:?} to {target}: {e}"))
    })
}

macro_rules! coerce_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl Coerce for $t {
                fn coerce(value: &Value) -> GraphResult<Self> {
                    if let Value::Number(n) = value {
                        if let Some(v) = n.as_i64().and_then(|v| <$t>::try_from(v).ok()) {
                            return Ok(v);
                        }
                        if let Some(v) = n.as_u64().and_then(|v| <$t>::try_from(v).ok()) {
                            return Ok(v);
                        }
                    }
                    parse_text(value, stringify!($t))
                }
            }
        )*
    };
}

coerce_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

macro_rules! coerce_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl Coerce for $t {
                fn coerce(value: &Value) -> GraphResult<Self> {
                    if let Some(v) = value.as_f64() {
                        return Ok(v as $t);
                    }
                    parse_text(value, stringify!($t))
                }
            }
        )*
    };
}

coerce_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_accepts_bool_numbers_and_text() {
        assert!(bool::coerce(&json!(true)).unwrap());
        assert!(!bool::coerce(&json!(0)).unwrap());
        assert!(bool::coerce(&json!(1)).unwrap());
        assert!(bool::coerce(&json!("TRUE")).unwrap());
        assert!(!bool::coerce(&json!("False")).unwrap());
    }

    #[test]
    fn bool_rejects_other_values() {
        assert!(bool::coerce(&json!(2)).is_err());
        assert!(bool::coerce(&json!("yes")).is_err());
        assert!(bool::coerce(&json!(null)).is_err());
    }

    #[test]
    fn integers_accept_numbers_and_numeric_strings() {
        assert_eq!(i64::coerce(&json!(42)).unwrap(), 42);
        assert_eq!(i64::coerce(&json!("1234567890123")).unwrap(), 1_234_567_890_123);
        assert_eq!(u32::coerce(&json!(" 7 ")).unwrap(), 7);
    }

    #[test]
    fn integer_parse_failure_propagates() {
        let err = i32::coerce(&json!("abc")).unwrap_err();
        assert!(matches!(err, GraphError::Mapping(_)));
        assert!(i32::coerce(&json!(1.5)).is_err());
        assert!(u8::coerce(&json!(300)).is_err());
    }

    #[test]
    fn floats_accept_numbers_and_strings() {
        assert_eq!(f64::coerce(&json!(1.25)).unwrap(), 1.25);
        assert_eq!(f64::coerce(&json!("2.5")).unwrap(), 2.5);
        assert_eq!(f32::coerce(&json!(3)).unwrap(), 3.0);
    }

    #[test]
    fn string_unescapes_strings_and_serializes_the_rest() {
        assert_eq!(String::coerce(&json!("a \"quoted\" word")).unwrap(), "a \"quoted\" word");
        assert_eq!(String::coerce(&json!(12)).unwrap(), "12");
        assert_eq!(String::coerce(&json!(true)).unwrap(), "true");
        assert_eq!(String::coerce(&json!({"a":1})).unwrap(), r#"{"a":1}"#);
    }
}
