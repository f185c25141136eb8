//! Destination abstraction
//!
//! Released and discarded messages leave the barrier through a
//! [`MessageChannel`]. A failed send is reported as `false`, never as a panic;
//! the barrier escalates it to a delivery error. Retrying is the channel's
//! business, not the barrier's.

use crate::barrier::message::Message;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A destination messages can be sent to
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Name used in logs and delivery errors
    fn name(&self) -> &str;

    /// Send a message, waiting at most `timeout` for the destination to accept it
    ///
    /// Returns `false` when the message was not accepted.
    async fn send(&self, message: Message, timeout: Duration) -> bool;
}

/// Shared handle to a channel
///
/// Two handles are equal only when they point at the same channel instance.
#[derive(Clone)]
pub struct ChannelRef(Arc<dyn MessageChannel>);

impl ChannelRef {
    pub fn new(channel: impl MessageChannel + 'static) -> Self {
        Self(Arc::new(channel))
    }

    pub fn from_arc(channel: Arc<dyn MessageChannel>) -> Self {
        Self(channel)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn send(&self, message: Message, timeout: Duration) -> bool {
        self.0.send(message, timeout).await
    }

    fn data_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ChannelRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.data_ptr(), other.data_ptr())
    }
}

impl Eq for ChannelRef {}

impl fmt::Debug for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelRef").field(&self.name()).finish()
    }
}

/// Bounded in-memory channel backed by a tokio mpsc queue
///
/// # Example
///
/// ```rust
/// use msgbarrier::barrier::api::{ChannelRef, Message, QueueChannel};
/// use std::time::Duration;
///
/// # async fn example() {
/// let (channel, mut receiver) = QueueChannel::bounded("output", 16);
/// let output = ChannelRef::new(channel);
/// assert!(output.send(Message::new("done"), Duration::from_millis(10)).await);
/// assert_eq!(receiver.recv().await.unwrap().payload, "done");
/// # }
/// ```
pub struct QueueChannel {
    name: String,
    sender: mpsc::Sender<Message>,
}

impl QueueChannel {
    /// Create a channel holding at most `capacity` undelivered messages
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                name: name.into(),
                sender,
            },
            receiver,
        )
    }
}

#[async_trait]
impl MessageChannel for QueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message, timeout: Duration) -> bool {
        let message_id = message.id();
        match self.sender.send_timeout(message, timeout).await {
            Ok(()) => true,
            Err(e) => {
                log::debug!(
                    "Channel '{}' did not accept message {}: {}",
                    self.name,
                    message_id,
                    e
                );
                false
            }
        }
    }
}
