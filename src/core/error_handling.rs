//! Generic error handling utilities
//!
//! Provides unified error reporting that works across error types while
//! keeping the distinction between operator mistakes and runtime failures.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// A misconfigured timeout is something the operator can fix; a failed
/// dispatch to a destination is not.
///
/// # Implementation Consistency
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`. When it returns `false`, `user_message()` should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the user can act on directly
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors log their own message; system errors log the
/// operation context and keep the detail at debug level.
///
/// # Examples
/// ```rust,no_run
/// # use msgbarrier::core::error_handling::log_error_with_context;
/// # use msgbarrier::barrier::api::BarrierError;
/// let err = BarrierError::Configuration {
///     message: "'reaper_interval_ms' must be a positive value".to_string(),
/// };
/// log_error_with_context(&err, "Loading barrier configuration");
/// // Logs: "FATAL: Configuration error: 'reaper_interval_ms' must be a positive value"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
