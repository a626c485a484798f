//! Error types for the animation engine.

use thiserror::Error;

use crate::easing::EasingError;

/// Result type for animation operations.
pub type Result<T> = std::result::Result<T, AnimationError>;

/// Errors raised by the timing model.
///
/// Everything except [`AnimationError::Abort`] is raised synchronously by the
/// offending call. `Abort` only ever reaches consumers through a rejected
/// [`AnimationPromise`](crate::promise::AnimationPromise).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// The operation is not valid in the animation's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The animation was cancelled while a handle was pending.
    #[error("the animation was aborted")]
    Abort,

    /// A value failed validation.
    #[error("type error: {0}")]
    Type(String),
}

impl AnimationError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Whether this is the asynchronous cancellation signal.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

impl From<EasingError> for AnimationError {
    fn from(err: EasingError) -> Self {
        Self::Type(err.to_string())
    }
}

impl From<serde_json::Error> for AnimationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Type(format!("malformed keyframes: {err}"))
    }
}
