//! Cursor-paged collections ("connections").
//!
//! # Design
//! A `Connection` is one page: typed data plus the paging metadata the server
//! sent with it. Paging is explicit. `Connection::fetch_next` performs exactly
//! one exchange and returns the following page, and `Pages` drives that
//! forward while exposing the connection behind the latest page so a caller
//! can stop and resume from its cursors later. Nothing is prefetched.

use serde_json::Value;
use tracing::warn;

use crate::client::GraphClient;
use crate::coerce::Coerce;
use crate::error::{GraphError, GraphResult};
use crate::mapping::{FieldValue, Mapper};

/// One page of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    data: Vec<T>,
    previous_page_url: Option<String>,
    next_page_url: Option<String>,
    before_cursor: Option<String>,
    after_cursor: Option<String>,
    total_count: Option<u64>,
    summary: Option<Value>,
}

impl<T: FieldValue> Connection<T> {
    /// Parse a raw connection payload.
    pub fn from_json(mapper: &Mapper, json: &str) -> GraphResult<Self> {
        let value: Value = serde_json::from_str(json.trim())
            .map_err(|e| GraphError::mapping(format!("invalid connection JSON: {e}")))?;
        Self::from_value(mapper, &value)
    }

    pub fn from_value(mapper: &Mapper, value: &Value) -> GraphResult<Self> {
        let Value::Object(root) = value else {
            return Err(GraphError::mapping(format!(
                "connection JSON must be an object, got '{value}'"
            )));
        };
        let data = match root.get("data") {
            Some(data @ Value::Array(_)) => mapper.list_from_value::<T>(data)?,
            Some(other) => {
                return Err(GraphError::mapping(format!(
                    "connection 'data' must be an array, got '{other}'"
                )))
            }
            None => return Err(GraphError::mapping("connection JSON has no 'data' member")),
        };

        let paging = root.get("paging");
        let page_url = |key: &str| {
            paging
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(to_https)
        };
        let cursor = |key: &str| {
            paging
                .and_then(|p| p.get("cursors"))
                .and_then(|c| c.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let summary = root.get("summary").filter(|s| !s.is_null()).cloned();
        let total_count = match summary.as_ref().and_then(|s| s.get("total_count")) {
            Some(count) if !count.is_null() => match u64::coerce(count) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(total_count = %count, error = %e, "ignoring unreadable summary count");
                    None
                }
            },
            _ => None,
        };

        Ok(Self {
            data,
            previous_page_url: page_url("previous"),
            next_page_url: page_url("next"),
            before_cursor: cursor("before"),
            after_cursor: cursor("after"),
            total_count,
            summary,
        })
    }

    /// Fetch the page after this one. One exchange per call.
    pub fn fetch_next(&self, client: &GraphClient) -> GraphResult<Connection<T>> {
        match self.next_page_url.as_deref() {
            Some(url) if self.has_next() => client.fetch_connection_page(url),
            _ => Err(GraphError::IterationExhausted),
        }
    }

    /// Iterate this page and every page after it.
    pub fn pages(self, client: &GraphClient) -> Pages<'_, T> {
        Pages {
            client,
            current: self,
            state: PageState::Initial,
        }
    }
}

impl<T> Connection<T> {
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn previous_page_url(&self) -> Option<&str> {
        self.previous_page_url.as_deref()
    }

    pub fn next_page_url(&self) -> Option<&str> {
        self.next_page_url.as_deref()
    }

    pub fn before_cursor(&self) -> Option<&str> {
        self.before_cursor.as_deref()
    }

    pub fn after_cursor(&self) -> Option<&str> {
        self.after_cursor.as_deref()
    }

    /// `summary.total_count`, when the caller asked for a summary.
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn summary(&self) -> Option<&Value> {
        self.summary.as_ref()
    }

    /// Equal cursors mean the server is pointing back at the same page.
    fn cursors_stalled(&self) -> bool {
        matches!((&self.before_cursor, &self.after_cursor), (Some(b), Some(a)) if a == b)
    }

    pub fn has_next(&self) -> bool {
        self.next_page_url.is_some() && !self.data.is_empty() && !self.cursors_stalled()
    }

    pub fn has_previous(&self) -> bool {
        self.previous_page_url.is_some() && !self.data.is_empty() && !self.cursors_stalled()
    }
}

fn to_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    /// The page parsed from the original payload has not been handed out.
    Initial,
    /// At least one page has been handed out.
    Paged,
    /// A fetch failed; iteration is over.
    Failed,
}

/// Forward pager over a connection.
///
/// The first call yields the initial page without any network activity;
/// each later call fetches exactly one page.
#[derive(Debug)]
pub struct Pages<'c, T> {
    client: &'c GraphClient,
    current: Connection<T>,
    state: PageState,
}

impl<'c, T: FieldValue> Pages<'c, T> {
    /// Returns the next page's data, or `IterationExhausted` past the end.
    pub fn next_page(&mut self) -> GraphResult<&[T]> {
        match self.state {
            PageState::Initial => {
                self.state = PageState::Paged;
                return Ok(self.current.data());
            }
            PageState::Failed => return Err(GraphError::IterationExhausted),
            PageState::Paged => {}
        }
        if !self.current.has_next() {
            return Err(GraphError::IterationExhausted);
        }
        match self.current.fetch_next(self.client) {
            Ok(next) => {
                self.current = next;
                Ok(self.current.data())
            }
            Err(e) => {
                self.state = PageState::Failed;
                Err(e)
            }
        }
    }

    pub fn has_next(&self) -> bool {
        match self.state {
            PageState::Initial => true,
            PageState::Paged => self.current.has_next(),
            PageState::Failed => false,
        }
    }

    /// The connection behind the most recent page.
    pub fn snapshot(&self) -> &Connection<T> {
        &self.current
    }

    pub fn into_snapshot(self) -> Connection<T> {
        self.current
    }
}

impl<T: FieldValue + Clone> Iterator for Pages<'_, T> {
    type Item = GraphResult<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_page() {
            Ok(page) => Some(Ok(page.to_vec())),
            Err(GraphError::IterationExhausted) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
