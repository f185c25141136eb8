//! Correlation keys and the strategies that resolve them
//!
//! Every message admitted to a barrier must resolve to a [`CorrelationKey`].
//! A message that does not is rejected with
//! [`BarrierError::MissingCorrelationKey`](crate::barrier::error::BarrierError)
//! by the handler; strategies themselves only answer "which key, if any".

use crate::barrier::message::{HeaderValue, Message, CORRELATION_ID};
use std::fmt;

/// Value grouping related messages into one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CorrelationKey {
    Text(String),
    Integer(i64),
    Composite(Vec<CorrelationKey>),
}

impl CorrelationKey {
    /// Convert a header value into a key; booleans and channels do not correlate
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        match value {
            HeaderValue::Text(text) => Some(CorrelationKey::Text(text.clone())),
            HeaderValue::Integer(number) => Some(CorrelationKey::Integer(*number)),
            HeaderValue::Boolean(_) | HeaderValue::Channel(_) => None,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Text(text) => write!(f, "{}", text),
            CorrelationKey::Integer(number) => write!(f, "{}", number),
            CorrelationKey::Composite(parts) => {
                write!(f, "(")?;
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for CorrelationKey {
    fn from(value: &str) -> Self {
        CorrelationKey::Text(value.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(value: String) -> Self {
        CorrelationKey::Text(value)
    }
}

impl From<i64> for CorrelationKey {
    fn from(value: i64) -> Self {
        CorrelationKey::Integer(value)
    }
}

/// Resolves the correlation key of a message
pub trait CorrelationStrategy: Send + Sync {
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey>;
}

impl<F> CorrelationStrategy for F
where
    F: Fn(&Message) -> Option<CorrelationKey> + Send + Sync,
{
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey> {
        self(message)
    }
}

/// Reads the key from a single named header
#[derive(Debug, Clone)]
pub struct HeaderCorrelationStrategy {
    header_name: String,
}

impl HeaderCorrelationStrategy {
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

impl Default for HeaderCorrelationStrategy {
    fn default() -> Self {
        Self::new(CORRELATION_ID)
    }
}

impl CorrelationStrategy for HeaderCorrelationStrategy {
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey> {
        message
            .header
            .get(&self.header_name)
            .and_then(CorrelationKey::from_header)
    }
}

/// Combines several headers into one composite key
///
/// Resolves only when every listed header resolves.
#[derive(Debug, Clone)]
pub struct CompositeHeaderStrategy {
    header_names: Vec<String>,
}

impl CompositeHeaderStrategy {
    pub fn new<I, S>(header_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header_names: header_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl CorrelationStrategy for CompositeHeaderStrategy {
    fn correlation_key(&self, message: &Message) -> Option<CorrelationKey> {
        if self.header_names.is_empty() {
            return None;
        }
        self.header_names
            .iter()
            .map(|name| message.header.get(name).and_then(CorrelationKey::from_header))
            .collect::<Option<Vec<_>>>()
            .map(CorrelationKey::Composite)
    }
}
