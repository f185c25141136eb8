//! Completion hooks and admission policies
//!
//! The barrier core does not know what makes a group complete. After every
//! mutation it asks the pattern's [`CompletionHook`], and before every
//! admission it asks the [`AdmissionPolicy`]. Both run under the barrier's
//! lock, so they must be quick and must not block.

use crate::barrier::collection::{MessageCollection, SequencedMessages};
use crate::barrier::message::Message;
use crate::barrier::store::Barrier;

/// What the hook wants done after a mutation
#[derive(Debug)]
pub enum ReleaseDecision {
    /// Keep waiting
    Hold,
    /// Dispatch these messages but keep the group open
    Emit(Vec<Message>),
    /// Dispatch these messages and finalize the group
    Complete(Vec<Message>),
}

impl ReleaseDecision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReleaseDecision::Complete(_))
    }

    pub fn into_messages(self) -> Vec<Message> {
        match self {
            ReleaseDecision::Hold => Vec::new(),
            ReleaseDecision::Emit(messages) | ReleaseDecision::Complete(messages) => messages,
        }
    }
}

/// Decides whether and how a barrier releases its contents
///
/// Messages a hook wants released must be taken out of the barrier's
/// collection (for example with `drain`). When the group is finalized,
/// whatever is still left in the collection is routed to the discard
/// destination. On a timeout with partial results enabled, the reaper marks
/// the barrier complete before calling the hook.
pub trait CompletionHook<C: MessageCollection>: Send + Sync {
    fn on_mutated(&self, barrier: &mut Barrier<C>) -> ReleaseDecision;
}

impl<C, F> CompletionHook<C> for F
where
    C: MessageCollection,
    F: Fn(&mut Barrier<C>) -> ReleaseDecision + Send + Sync,
{
    fn on_mutated(&self, barrier: &mut Barrier<C>) -> ReleaseDecision {
        self(barrier)
    }
}

/// Decides whether a message may join a barrier
///
/// Messages for a completed barrier never reach the policy; the handler
/// treats them as stragglers first. A policy can only narrow admission.
pub trait AdmissionPolicy<C: MessageCollection>: Send + Sync {
    fn can_admit(&self, message: &Message, barrier: &Barrier<C>) -> bool;
}

/// Default policy: refuse messages once the group is complete
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectCompleted;

impl<C: MessageCollection> AdmissionPolicy<C> for RejectCompleted {
    fn can_admit(&self, message: &Message, barrier: &Barrier<C>) -> bool {
        if barrier.is_complete() {
            log::debug!(
                "Message {} received after group '{}' already completed",
                message.id(),
                barrier.key()
            );
            return false;
        }
        true
    }
}

/// Aggregation hook: complete once every announced part has arrived
///
/// The group size comes from the `sequence_size` header of the first message
/// in the collection. Without that header the group only ends by timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceSizeCompletion;

impl<C: MessageCollection> CompletionHook<C> for SequenceSizeCompletion {
    fn on_mutated(&self, barrier: &mut Barrier<C>) -> ReleaseDecision {
        if barrier.is_complete() {
            return ReleaseDecision::Complete(barrier.messages_mut().drain());
        }
        let expected = barrier
            .messages()
            .iter()
            .next()
            .and_then(|first| first.header.sequence_size());
        match expected {
            Some(size) if size > 0 && barrier.messages().len() as i64 >= size => {
                ReleaseDecision::Complete(barrier.messages_mut().drain())
            }
            _ => ReleaseDecision::Hold,
        }
    }
}

/// Resequencing hook: release messages in `sequence_number` order
///
/// Each call emits the contiguous run starting at the next expected number.
/// The group completes once `sequence_size` messages have been emitted. On a
/// forced completion everything still held is released in order, gaps and all.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResequencingRelease;

impl CompletionHook<SequencedMessages> for ResequencingRelease {
    fn on_mutated(&self, barrier: &mut Barrier<SequencedMessages>) -> ReleaseDecision {
        if barrier.is_complete() {
            let mut released = barrier.messages_mut().take_in_order();
            released.extend(barrier.messages_mut().drain());
            return ReleaseDecision::Complete(released);
        }

        let run = barrier.messages_mut().take_in_order();
        let messages = barrier.messages();
        let finished = messages
            .expected_size()
            .is_some_and(|size| messages.released() as i64 >= size);

        match (finished, run.is_empty()) {
            (true, _) => ReleaseDecision::Complete(run),
            (false, true) => ReleaseDecision::Hold,
            (false, false) => ReleaseDecision::Emit(run),
        }
    }
}
