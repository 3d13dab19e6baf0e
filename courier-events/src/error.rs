//! Dispatcher errors

use crate::handler::EventHandlerError;

/// A failure reported by one handler during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Position of the handler in registration order
    pub position: usize,

    /// Error the handler signaled
    pub error: EventHandlerError,
}

/// Event dispatcher errors
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("Handler already registered for event: {event_name}")]
    HandlerAlreadyExists { event_name: String },

    #[error("Cannot fan out dispatch: {0}")]
    RuntimeUnavailable(String),

    #[error("{count} handler(s) failed for event: {event_name}", count = .failures.len())]
    HandlersFailed {
        event_name: String,
        failures: Vec<HandlerFailure>,
    },
}

impl DispatcherError {
    /// Check if this error came from registering a duplicate handler
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DispatcherError::HandlerAlreadyExists { .. })
    }
}

pub type Result<T> = std::result::Result<T, DispatcherError>;
