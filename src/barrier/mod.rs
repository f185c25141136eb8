//! Message Barrier Component
//!
//! Groups related messages by a correlation key, holds each group until a
//! pluggable completion hook decides to release it, and expires groups that
//! take too long. Finished keys are remembered for a while so that late
//! arrivals are discarded instead of opening a new group.
//!
//! # Overview
//!
//! - **Correlation**: a [`CorrelationStrategy`](correlation::CorrelationStrategy)
//!   maps a message to its group key; no key is a hard error for the caller
//! - **Per-key locking**: each group has its own lock, so unrelated keys never
//!   contend; the registry lock only covers lookups and removals
//! - **Pluggable completion**: aggregation, resequencing and similar patterns
//!   are [`CompletionHook`](hook::CompletionHook) implementations over a
//!   collection type of their choosing
//! - **Timeouts**: a periodic reaper evicts stale groups, either discarding
//!   them or force-releasing what was collected
//! - **Straggler detection**: a bounded FIFO of recently finished keys
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  message ─────▶ │    MessageBarrierHandler     │
//!                 │  correlation ─▶ key          │
//!                 └──────┬───────────────┬───────┘
//!                        │               │ key finished?
//!                        ▼               ▼
//!            ┌──────────────────┐  ┌────────────────────┐
//!            │ BarrierRegistry  │  │ CompletedKeyCache  │
//!            │ key ─▶ Barrier   │  │ FIFO + set         │
//!            └────────┬─────────┘  └────────────────────┘
//!                     │ per-barrier lock      ▲
//!                     ▼                       │ record on finalize
//!            ┌──────────────────┐             │
//!            │ admit + hook     │─────────────┘
//!            └────────┬─────────┘
//!                     │ released messages (lock dropped)
//!                     ▼
//!            ┌──────────────────┐         ┌─────────────────┐
//!            │   ReplyRouter    │────────▶│ MessageChannel  │
//!            └──────────────────┘         └─────────────────┘
//!                     ▲
//!            ┌────────┴─────────┐
//!            │ Reaper (periodic)│ timeout ─▶ partial release or discard
//!            └──────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use msgbarrier::barrier::api::*;
//!
//! # async fn example() -> BarrierResult<()> {
//! let (output, mut released) = QueueChannel::bounded("output", 64);
//! let (discards, _discarded) = QueueChannel::bounded("discards", 64);
//!
//! let config = BarrierConfig {
//!     timeout_ms: 5_000,
//!     send_partial_results_on_timeout: true,
//!     ..Default::default()
//! };
//!
//! let handler = MessageBarrierHandler::<Vec<Message>>::builder(SequenceSizeCompletion)
//!     .config(config)
//!     .output_channel(ChannelRef::new(output))
//!     .discard_channel(ChannelRef::new(discards))
//!     .build()?;
//!
//! let message = Message::new("part 1 of 2")
//!     .with_header(CORRELATION_ID, "batch-7")
//!     .with_header(SEQUENCE_SIZE, 2i64);
//! assert_eq!(handler.handle(message).await?, HandleOutcome::Held);
//!
//! while let Some(message) = released.recv().await {
//!     println!("{}", message.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod channel;
pub mod collection;
pub mod config;
pub mod correlation;
pub mod error;
pub mod handler;
pub mod hook;
pub mod message;
mod reaper;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod store;
pub mod tracking;
pub mod types;

#[cfg(test)]
mod tests;
