//! Message header accessor
//!
//! Headers travel alongside the task body in every queue message. Outgoing messages
//! own a mutable header set; headers on a received message are an immutable snapshot
//! shared with the transport. Writers must check [`Headers::is_mutable`] (or go through
//! [`Headers::to_mutable`]) before inserting.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Transport-native header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    String(String),
    Number(i64),
    Binary(Vec<u8>),
}

impl HeaderValue {
    /// Coerce to a 64-bit integer. Numeric strings are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Number(n) => Some(*n),
            HeaderValue::String(s) => s.trim().parse().ok(),
            HeaderValue::Binary(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Data type name understood by the queue transport.
    pub fn data_type(&self) -> &'static str {
        match self {
            HeaderValue::String(_) => "String",
            HeaderValue::Number(_) => "Number",
            HeaderValue::Binary(_) => "Binary",
        }
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Number(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::String(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::String(value)
    }
}

pub type HeaderMap = BTreeMap<String, HeaderValue>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header '{key}' cannot be set on an immutable header snapshot")]
    Immutable { key: String },
}

/// Header set of a queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Headers {
    /// Writable header set owned by an outgoing message.
    Mutable(HeaderMap),
    /// Read-only view handed out by the transport for a delivered message.
    Snapshot(Arc<HeaderMap>),
}

impl Default for Headers {
    fn default() -> Self {
        Headers::Mutable(HeaderMap::new())
    }
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(map: HeaderMap) -> Self {
        Headers::Snapshot(Arc::new(map))
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self, Headers::Mutable(_))
    }

    fn map(&self) -> &HeaderMap {
        match self {
            Headers::Mutable(map) => map,
            Headers::Snapshot(map) => map,
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.map().get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map().contains_key(key)
    }

    /// Insert a header, returning the previous value.
    ///
    /// Fails on a snapshot; use [`Headers::to_mutable`] to get a writable copy first.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<HeaderValue>,
    ) -> Result<Option<HeaderValue>, HeaderError> {
        match self {
            Headers::Mutable(map) => Ok(map.insert(key.into(), value.into())),
            Headers::Snapshot(_) => Err(HeaderError::Immutable { key: key.into() }),
        }
    }

    /// Writable copy of these headers. Mutable headers are cloned as-is.
    pub fn to_mutable(&self) -> Headers {
        Headers::Mutable(self.map().clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.map().iter()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    pub fn into_map(self) -> HeaderMap {
        match self {
            Headers::Mutable(map) => map,
            Headers::Snapshot(map) => Arc::try_unwrap(map).unwrap_or_else(|shared| (*shared).clone()),
        }
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Headers::Mutable(map)
    }
}

/// Anything that exposes message headers.
///
/// The consumer takes its header source explicitly; message shapes that carry headers
/// implement this so trace decoding works uniformly over all of them.
pub trait HeaderCarrier {
    fn headers(&self) -> &Headers;
}

impl HeaderCarrier for Headers {
    fn headers(&self) -> &Headers {
        self
    }
}
