//! Client error types.

use std::fmt;

use photopick_flow::FlowError;
use photopick_google::PickerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// A Google API or sign-in call failed.
    Picker(PickerError),
    /// The picker flow ended in its error state.
    Flow(FlowError),
    /// IO error.
    Io(std::io::Error),
    /// The user pressed Ctrl-C while waiting for the selection.
    Interrupted,
}

impl ClientError {
    /// Returns true if running `photopick auth google` would help.
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::Picker(err) => err.requires_reauth(),
            Self::Flow(err) => err.requires_reauth(),
            _ => false,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Picker(err) => write!(f, "{}", err.user_message()),
            Self::Flow(err) => write!(f, "{}", err.user_message()),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Picker(err) => Some(err),
            Self::Flow(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<PickerError> for ClientError {
    fn from(err: PickerError) -> Self {
        Self::Picker(err)
    }
}

impl From<FlowError> for ClientError {
    fn from(err: FlowError) -> Self {
        Self::Flow(err)
    }
}
