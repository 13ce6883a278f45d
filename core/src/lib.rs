//! Blocking client core for the Facebook Graph API.
//!
//! # Overview
//! `GraphClient` turns typed calls into HTTP exchanges and maps the JSON that
//! comes back onto plain Rust structs. Network IO sits behind the
//! `Transport` trait; `UreqTransport` is the stock implementation, and tests
//! or hosts with their own HTTP stack plug in anything else.
//!
//! # Design
//! - `mapping` binds JSON to structs registered with `graph_object!`,
//!   absorbing the API's shape quirks (`[]` for `{}`, `false` for nothing,
//!   numbers as strings).
//! - `client` owns the request pipeline: parameter assembly, auth, dispatch,
//!   and error classification.
//! - `connection` models cursor-paged collections and fetches pages one
//!   exchange at a time.
//! - Nothing on the client mutates after construction, so one instance can
//!   be shared across threads.
//!
//! ```ignore
//! use graphlink_core::{graph_object, GraphClient, GraphConfig, Parameter};
//!
//! #[derive(Debug, Default)]
//! struct User { id: String, name: Option<String> }
//!
//! graph_object! { User { "id" => id, "name" => name } }
//!
//! let client = GraphClient::from_config(GraphConfig::from_env());
//! let me: Option<User> = client.fetch_object("me", &[Parameter::text("fields", "id,name")])?;
//! ```

pub mod batch;
pub mod client;
pub mod coerce;
pub mod config;
pub mod connection;
pub mod dates;
pub mod error;
pub mod extract;
pub mod http;
pub mod mapping;
pub mod params;
pub mod transport;
pub mod types;

pub use batch::{BatchHeader, BatchRequest, BatchRequestBuilder, BatchResponse};
pub use client::{GraphClient, RequestDescriptor};
pub use config::{DefaultUrlResolver, GraphConfig, UrlResolver};
pub use connection::{Connection, Pages};
pub use error::{ApplicationError, ApplicationErrorKind, GraphError, GraphResult};
pub use extract::{DefaultErrorExtractor, ErrorExtractor};
pub use http::{BinaryAttachment, DebugHeaderInfo, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use mapping::{FieldValue, GraphEnum, GraphObject, Mapper};
pub use params::Parameter;
pub use transport::UreqTransport;
pub use types::{AccessToken, DebugTokenInfo, NamedObject, PublishResult};
