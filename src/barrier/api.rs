//! Public API for the barrier system
//!
//! External modules should import from here rather than directly from the
//! individual modules.

// Handler and lifecycle
pub use crate::barrier::handler::{MessageBarrierHandler, MessageBarrierHandlerBuilder};
pub use crate::barrier::types::{BarrierStats, HandleOutcome, ReapReport};

// Configuration
pub use crate::barrier::config::{BarrierConfig, BarrierSettings};

// Messages and channels
pub use crate::barrier::channel::{ChannelRef, MessageChannel, QueueChannel};
pub use crate::barrier::message::{
    HeaderValue, Message, MessageBuilder, MessageHeader, CORRELATION_ID, REPLY_CHANNEL,
    SEQUENCE_NUMBER, SEQUENCE_SIZE,
};

// Correlation
pub use crate::barrier::correlation::{
    CompositeHeaderStrategy, CorrelationKey, CorrelationStrategy, HeaderCorrelationStrategy,
};

// Group state and completion patterns
pub use crate::barrier::collection::{MessageCollection, SequencedMessages};
pub use crate::barrier::hook::{
    AdmissionPolicy, CompletionHook, RejectCompleted, ReleaseDecision, ResequencingRelease,
    SequenceSizeCompletion,
};
pub use crate::barrier::store::{Barrier, BarrierHandle};

// Building blocks
pub use crate::barrier::registry::BarrierRegistry;
pub use crate::barrier::router::ReplyRouter;
pub use crate::barrier::scheduler::{PeriodicCallback, ScheduledTask, TaskScheduler, TokioScheduler};
pub use crate::barrier::tracking::CompletedKeyCache;

// Error handling
pub use crate::barrier::error::{BarrierError, BarrierResult};
