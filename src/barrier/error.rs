//! Barrier Error Types

use crate::core::error_handling::ContextualError;

#[derive(Debug, thiserror::Error)]
pub enum BarrierError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Message {message_id} has no resolvable correlation key")]
    MissingCorrelationKey { message_id: u64 },

    #[error("Failed to deliver message {message_id} to '{channel}'")]
    Delivery { message_id: u64, channel: String },

    #[error("Unable to determine a reply destination for message {message_id}")]
    NoReplyDestination { message_id: u64 },

    #[error("Synchronisation failure: {message}")]
    Synchronisation { message: String },

    #[error("Scheduler failure: {message}")]
    Scheduler { message: String },
}

impl BarrierError {
    pub(crate) fn sync(message: String) -> Self {
        BarrierError::Synchronisation { message }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        BarrierError::Configuration {
            message: message.into(),
        }
    }
}

impl ContextualError for BarrierError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, BarrierError::Configuration { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            BarrierError::Configuration { message } => Some(message),
            _ => None,
        }
    }
}

/// Result type for barrier operations
pub type BarrierResult<T> = Result<T, BarrierError>;
