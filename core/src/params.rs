//! Request parameters: construction, reserved-name checks, and encoding.

use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;

use crate::error::{GraphError, GraphResult};
use crate::mapping::{FieldValue, Mapper, Value};

pub const ACCESS_TOKEN_PARAM: &str = "access_token";
pub const METHOD_PARAM: &str = "method";
pub const FORMAT_PARAM: &str = "format";
pub const APP_SECRET_PROOF_PARAM: &str = "appsecret_proof";

/// Names the pipeline sets itself; callers may not supply them.
pub const RESERVED_PARAMS: [&str; 3] = [ACCESS_TOKEN_PARAM, METHOD_PARAM, FORMAT_PARAM];

/// Form encoding: everything but `A-Z a-z 0-9 - _ . *` is escaped and space
/// becomes `+`.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

/// A single name/value request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    /// Parameter from any mappable value. Strings are sent as-is, everything
    /// else as its JSON text (`true`, `42`, `["a","b"]`, `{"k":"v"}`).
    pub fn with<V: FieldValue>(name: impl Into<String>, value: V) -> GraphResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GraphError::usage("parameter name cannot be blank"));
        }
        let value = match value.to_json(&Mapper::new(), true)? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Self { name, value })
    }

    /// Parameter from a plain string value.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Fail if any caller parameter uses a reserved name.
pub fn verify_not_reserved(params: &[Parameter]) -> GraphResult<()> {
    match params
        .iter()
        .find(|p| RESERVED_PARAMS.contains(&p.name.as_str()))
    {
        Some(p) => Err(GraphError::usage(format!(
            "parameter '{}' is reserved and may not be specified; reserved names are {}",
            p.name,
            RESERVED_PARAMS.join(", ")
        ))),
        None => Ok(()),
    }
}

/// `application/x-www-form-urlencoded` encoding of one value.
pub fn form_encode(value: &str) -> String {
    utf8_percent_encode(value, FORM_ENCODE_SET)
        .to_string()
        .replace("%20", "+")
}

/// Joins parameters into `name=value&...`.
///
/// An access token that already contains an encoded `|` is assumed to be
/// encoded and is passed through untouched.
pub fn to_parameter_string(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|p| {
            let value = if p.name == ACCESS_TOKEN_PARAM && is_encoded_token(&p.value) {
                p.value.clone()
            } else {
                form_encode(&p.value)
            };
            format!("{}={}", form_encode(&p.name), value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_encoded_token(token: &str) -> bool {
    token.contains("%7C") || token.contains("%7c")
}

/// Lowercase hex HMAC-SHA256 of `access_token` keyed with `app_secret`.
pub fn app_secret_proof(access_token: &str, app_secret: &str) -> GraphResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
        .map_err(|e| GraphError::usage(format!("invalid app secret: {e}")))?;
    mac.update(access_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
