use serde::{Deserialize, Serialize};

/// Lifecycle of the tracker session
///
/// `Connecting → Live ⇄ Degraded → Terminated`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Logging in for the first time
    Connecting = 0,
    /// Receiving messages
    Live = 1,
    /// Capture lost, reconnecting
    Degraded = 2,
    /// Reconnection attempts exhausted; requires a restart
    Terminated = 3,
}

impl SessionState {
    /// Decode from the atomic representation
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Live,
            2 => Self::Degraded,
            _ => Self::Terminated,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get display text for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting...",
            Self::Live => "Live",
            Self::Degraded => "Reconnecting...",
            Self::Terminated => "Disconnected",
        }
    }

    /// Whether outgoing messages may be transmitted
    pub fn accepts_sends(&self) -> bool {
        matches!(self, Self::Live)
    }
}
