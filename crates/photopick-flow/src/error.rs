//! Flow error types.

use photopick_google::PickerError;
use thiserror::Error;

use crate::state::FlowState;

/// Result type for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors surfaced by the picker flow.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The requested step is not allowed from the current state.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: FlowState, to: FlowState },

    /// A picker API call failed, or the selection timed out.
    #[error(transparent)]
    Picker(#[from] PickerError),

    /// The picker window could not be opened.
    #[error("failed to open picker window: {message}")]
    Opener { message: String },

    /// Polling was stopped before it produced an outcome.
    #[error("polling was stopped before the selection completed")]
    Stopped,
}

impl FlowError {
    pub fn opener(message: impl Into<String>) -> Self {
        Self::Opener {
            message: message.into(),
        }
    }

    /// Text suitable for the error state of a UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Picker(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Returns true if the user has to sign in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Picker(e) if e.requires_reauth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photopick_google::error::MESSAGE_TIMEOUT;

    #[test]
    fn invalid_transition_display() {
        let err = FlowError::InvalidTransition {
            from: FlowState::Complete,
            to: FlowState::Idle,
        };
        assert_eq!(err.to_string(), "cannot move from complete to idle");
    }

    #[test]
    fn user_message_uses_picker_mapping() {
        let err = FlowError::from(PickerError::timeout("deadline elapsed"));
        assert_eq!(err.user_message(), MESSAGE_TIMEOUT);

        let err = FlowError::from(PickerError::from_http_status(401, None, "expired"));
        assert!(err.requires_reauth());
        assert!(!FlowError::Stopped.requires_reauth());
    }
}
