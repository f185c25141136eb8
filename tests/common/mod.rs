//! Common test utilities and helpers
//!
//! Record builders and channel helpers shared by the integration tests.

use msgbarrier::barrier::api::{
    ChannelRef, Message, QueueChannel, CORRELATION_ID, SEQUENCE_NUMBER, SEQUENCE_SIZE,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// One part of a group announced to have `size` parts
pub fn part(key: &str, number: i64, size: i64) -> Message {
    Message::new(format!("{}-{}", key, number))
        .with_header(CORRELATION_ID, key)
        .with_header(SEQUENCE_NUMBER, number)
        .with_header(SEQUENCE_SIZE, size)
}

/// A queue channel wrapped for handler use, plus its receiving end
pub fn queue(name: &str) -> (ChannelRef, mpsc::Receiver<Message>) {
    let (channel, receiver) = QueueChannel::bounded(name, 256);
    (ChannelRef::new(channel), receiver)
}

/// Receive payloads until `count` arrived or `wait` elapsed
pub async fn collect(
    receiver: &mut mpsc::Receiver<Message>,
    count: usize,
    wait: Duration,
) -> Vec<String> {
    let mut payloads = Vec::new();
    let deadline = tokio::time::Instant::now() + wait;
    while payloads.len() < count {
        match tokio::time::timeout_at(deadline, receiver.recv()).await {
            Ok(Some(message)) => payloads.push(message.payload),
            _ => break,
        }
    }
    payloads
}
