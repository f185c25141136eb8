//! Reply routing for released messages
//!
//! Precedence: a configured output channel always wins; otherwise the
//! message's own `reply_channel` header; otherwise the caller's default.
//! When the chosen destination is not the default, the default is stamped
//! into the outgoing copy's `reply_channel` header (unless one is present)
//! so a further downstream reply can still find its way back.

use crate::barrier::channel::ChannelRef;
use crate::barrier::error::{BarrierError, BarrierResult};
use crate::barrier::message::{Message, MessageBuilder, REPLY_CHANNEL};
use std::time::Duration;

/// Picks destinations for released messages and sends them
#[derive(Debug, Clone)]
pub struct ReplyRouter {
    output_channel: Option<ChannelRef>,
    send_timeout: Duration,
}

impl ReplyRouter {
    pub fn new(output_channel: Option<ChannelRef>, send_timeout: Duration) -> Self {
        Self {
            output_channel,
            send_timeout,
        }
    }

    pub fn output_channel(&self) -> Option<&ChannelRef> {
        self.output_channel.as_ref()
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Read a usable reply channel from the message headers
    ///
    /// A `reply_channel` header of any other type is ignored with a warning.
    pub fn reply_channel_from_message(message: &Message) -> Option<ChannelRef> {
        let value = message.header.reply_channel()?;
        match value.as_channel() {
            Some(channel) => Some(channel.clone()),
            None => {
                log::warn!(
                    "Ignoring '{}' header of type {} on message {}; only channel references can receive replies",
                    REPLY_CHANNEL,
                    value.kind(),
                    message.id()
                );
                None
            }
        }
    }

    /// Choose the destination and build the message to send there
    pub fn resolve(
        &self,
        message: Message,
        default_reply: Option<&ChannelRef>,
    ) -> BarrierResult<(ChannelRef, Message)> {
        let destination = self
            .output_channel
            .clone()
            .or_else(|| Self::reply_channel_from_message(&message))
            .or_else(|| default_reply.cloned())
            .ok_or(BarrierError::NoReplyDestination {
                message_id: message.id(),
            })?;

        let message = match default_reply {
            Some(default) if *default != destination => MessageBuilder::from_message(&message)
                .set_header_if_absent(REPLY_CHANNEL, default.clone())
                .build(),
            _ => message,
        };

        Ok((destination, message))
    }

    /// Route and send a single message
    pub async fn send_reply(
        &self,
        message: Message,
        default_reply: Option<&ChannelRef>,
    ) -> BarrierResult<()> {
        let (destination, message) = self.resolve(message, default_reply)?;
        let message_id = message.id();
        if destination.send(message, self.send_timeout).await {
            Ok(())
        } else {
            Err(BarrierError::Delivery {
                message_id,
                channel: destination.name().to_string(),
            })
        }
    }

    /// Route and send every message, returning the number delivered
    ///
    /// A failure does not stop the remaining sends; the first failure is
    /// returned once all messages were attempted.
    pub async fn send_replies(
        &self,
        messages: Vec<Message>,
        default_reply: Option<&ChannelRef>,
    ) -> BarrierResult<usize> {
        let mut delivered = 0;
        let mut first_error = None;

        for message in messages {
            match self.send_reply(message, default_reply).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    log::error!("Release dispatch failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(delivered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::channel::QueueChannel;
    use crate::barrier::message::HeaderValue;

    fn channel(name: &str) -> (ChannelRef, tokio::sync::mpsc::Receiver<Message>) {
        let (channel, receiver) = QueueChannel::bounded(name, 8);
        (ChannelRef::new(channel), receiver)
    }

    fn router(output: Option<ChannelRef>) -> ReplyRouter {
        ReplyRouter::new(output, Duration::from_millis(50))
    }

    #[test]
    fn test_output_channel_overrides_everything() {
        let (output, _o) = channel("output");
        let (header, _h) = channel("header");
        let (default, _d) = channel("default");
        let message = Message::new("x").with_header(REPLY_CHANNEL, header);

        let (destination, sent) = router(Some(output.clone()))
            .resolve(message, Some(&default))
            .unwrap();

        assert_eq!(destination, output);
        // Header already present, so the default does not overwrite it
        assert_ne!(
            sent.header.reply_channel().and_then(HeaderValue::as_channel),
            Some(&default)
        );
    }

    #[test]
    fn test_header_channel_used_without_output_channel() {
        let (header, _h) = channel("header");
        let (default, _d) = channel("default");
        let message = Message::new("x").with_header(REPLY_CHANNEL, header.clone());

        let (destination, sent) = router(None).resolve(message, Some(&default)).unwrap();

        assert_eq!(destination, header);
        assert_eq!(
            sent.header.reply_channel().and_then(HeaderValue::as_channel),
            Some(&header)
        );
    }

    #[test]
    fn test_default_stamped_when_header_absent() {
        let (output, _o) = channel("output");
        let (default, _d) = channel("default");

        let (destination, sent) = router(Some(output.clone()))
            .resolve(Message::new("x"), Some(&default))
            .unwrap();

        assert_eq!(destination, output);
        assert_eq!(
            sent.header.reply_channel().and_then(HeaderValue::as_channel),
            Some(&default)
        );
    }

    #[test]
    fn test_default_used_when_nothing_else_resolves() {
        let (default, _d) = channel("default");
        let message = Message::new("x").with_header(REPLY_CHANNEL, "not-a-channel");

        let (destination, sent) = router(None).resolve(message, Some(&default)).unwrap();

        assert_eq!(destination, default);
        // Destination equals the default, so nothing is stamped
        assert_eq!(
            sent.header.reply_channel(),
            Some(&HeaderValue::from("not-a-channel"))
        );
    }

    #[test]
    fn test_no_destination_is_an_error() {
        let message = Message::new("x");
        let id = message.id();

        match router(None).resolve(message, None) {
            Err(BarrierError::NoReplyDestination { message_id }) => assert_eq!(message_id, id),
            other => panic!("Expected NoReplyDestination, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_replies_attempts_all_and_reports_failure() {
        let (closed, receiver) = channel("closed");
        drop(receiver);
        let (working, mut working_rx) = channel("working");

        // First message falls back to the closed default, second names a
        // working reply channel of its own
        let failing = Message::new("lost");
        let failing_id = failing.id();
        let delivered = Message::new("delivered").with_header(REPLY_CHANNEL, working.clone());

        let result = router(None)
            .send_replies(vec![failing, delivered], Some(&closed))
            .await;
        match result {
            Err(BarrierError::Delivery {
                message_id,
                channel,
            }) => {
                assert_eq!(message_id, failing_id);
                assert_eq!(channel, "closed");
            }
            other => panic!("Expected Delivery error, got {:?}", other),
        }
        assert_eq!(working_rx.try_recv().unwrap().payload, "delivered");
        assert!(working_rx.try_recv().is_err());
    }
}
