//! Flow states and the transitions allowed between them.

use std::fmt;

use serde::Serialize;

/// Where a picker interaction currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    /// A session exists and the picker window is being opened.
    Picking,
    /// The poll coordinator is waiting for the user to finish.
    Polling,
    /// The user finished picking.
    Complete,
    /// Something failed; the only way out is retry.
    Error,
}

impl FlowState {
    /// Returns true if the machine may move from `self` to `next`.
    ///
    /// ```text
    /// idle -> picking -> polling -> complete
    ///   |        |          |
    ///   +--------+----------+--> error -> idle
    /// ```
    pub fn can_transition_to(self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (Idle, Picking)
                | (Idle, Error)
                | (Picking, Polling)
                | (Picking, Error)
                | (Polling, Complete)
                | (Polling, Error)
                | (Error, Idle)
        )
    }

    /// Returns true while the external picker window is expected to be open.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Picking | Self::Polling)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Picking => "picking",
            Self::Polling => "polling",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The observable state of a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub session_id: Option<String>,
    pub error_message: Option<String>,
    /// Set once the monitor sees the picker window closed. Informational only.
    pub window_closed: bool,
}
