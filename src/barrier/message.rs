//! Message types handled by the barrier
//!
//! A message is an opaque string payload plus a header map. The barrier never
//! changes a message it was given; the only header it adds (the reply channel
//! on re-dispatch) is applied to a copy made through [`MessageBuilder`].

use crate::barrier::channel::ChannelRef;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Header carrying the default correlation key
pub const CORRELATION_ID: &str = "correlation_id";
/// Header naming where replies for this message should go
pub const REPLY_CHANNEL: &str = "reply_channel";
/// Position of the message within its group (1-based)
pub const SEQUENCE_NUMBER: &str = "sequence_number";
/// Total number of messages expected in the group
pub const SEQUENCE_SIZE: &str = "sequence_size";

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A single header value
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Channel(ChannelRef),
}

impl HeaderValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelRef> {
        match self {
            HeaderValue::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    /// Short name of the variant, used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            HeaderValue::Text(_) => "text",
            HeaderValue::Integer(_) => "integer",
            HeaderValue::Boolean(_) => "boolean",
            HeaderValue::Channel(_) => "channel",
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Integer(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Boolean(value)
    }
}

impl From<ChannelRef> for HeaderValue {
    fn from(value: ChannelRef) -> Self {
        HeaderValue::Channel(value)
    }
}

/// Header information for a message
#[derive(Debug, Clone)]
pub struct MessageHeader {
    /// Process-unique identifier assigned at creation
    pub id: u64,
    /// Timestamp when the message was created
    pub timestamp: SystemTime,
    headers: HashMap<String, HeaderValue>,
}

impl MessageHeader {
    fn new() -> Self {
        Self {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            timestamp: SystemTime::now(),
            headers: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.headers.iter()
    }

    pub fn reply_channel(&self) -> Option<&HeaderValue> {
        self.get(REPLY_CHANNEL)
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.get(SEQUENCE_NUMBER).and_then(HeaderValue::as_integer)
    }

    pub fn sequence_size(&self) -> Option<i64> {
        self.get(SEQUENCE_SIZE).and_then(HeaderValue::as_integer)
    }
}

/// A message travelling through the barrier
///
/// # Example
///
/// ```rust
/// use msgbarrier::barrier::api::{Message, CORRELATION_ID, SEQUENCE_SIZE};
///
/// let message = Message::new("order line 1")
///     .with_header(CORRELATION_ID, "order-17")
///     .with_header(SEQUENCE_SIZE, 3i64);
/// assert_eq!(message.header.sequence_size(), Some(3));
/// ```
#[derive(Debug, Clone)]
pub struct Message {
    /// Message metadata
    pub header: MessageHeader,
    /// Message payload (application-specific data)
    pub payload: String,
}

impl Message {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            header: MessageHeader::new(),
            payload: payload.into(),
        }
    }

    /// Add or replace a header while constructing a message
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.header.headers.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> u64 {
        self.header.id
    }
}

/// Builds a modified copy of an existing message
///
/// The copy keeps the original id and timestamp so that log lines and
/// delivery errors still refer to the message the caller sent.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    pub fn from_message(message: &Message) -> Self {
        Self {
            message: message.clone(),
        }
    }

    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.message.header.headers.insert(name.into(), value.into());
        self
    }

    /// Set a header only when the message does not already carry it
    pub fn set_header_if_absent(
        mut self,
        name: impl Into<String>,
        value: impl Into<HeaderValue>,
    ) -> Self {
        self.message
            .header
            .headers
            .entry(name.into())
            .or_insert_with(|| value.into());
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}
