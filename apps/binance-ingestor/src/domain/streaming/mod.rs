//! Ingestion Client States
//!
//! ```text
//! Idle ─► Connecting ─► Streaming ◄─► Reconnecting
//!              │             │              │
//!              └─────────────┴──► Stopping ─┴─► Stopped
//! ```
//!
//! `Stopped` is terminal. The transport never changes these states itself;
//! it only reports connection outcomes to the client.

use serde::Serialize;

/// Lifecycle state of the ingestion client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    /// Constructed, not yet started.
    #[default]
    Idle,
    /// First connection attempt in progress.
    Connecting,
    /// Connected and reading frames.
    Streaming,
    /// Waiting out a backoff delay or retrying a connect.
    Reconnecting,
    /// Stop requested; flushing and closing.
    Stopping,
    /// Terminal.
    Stopped,
}

impl ClientState {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    /// Numeric code exported on the state gauge.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Streaming => 2,
            Self::Reconnecting => 3,
            Self::Stopping => 4,
            Self::Stopped => 5,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether the transition `self -> next` is part of the lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting | Self::Stopping)
                | (
                    Self::Connecting,
                    Self::Streaming | Self::Reconnecting | Self::Stopping
                )
                | (Self::Streaming, Self::Reconnecting | Self::Stopping)
                | (Self::Reconnecting, Self::Streaming | Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(ClientState::default(), ClientState::Idle);
    }

    #[test_case(ClientState::Idle, ClientState::Connecting ; "start")]
    #[test_case(ClientState::Connecting, ClientState::Streaming ; "connected")]
    #[test_case(ClientState::Connecting, ClientState::Reconnecting ; "first attempt failed")]
    #[test_case(ClientState::Streaming, ClientState::Reconnecting ; "stream dropped")]
    #[test_case(ClientState::Reconnecting, ClientState::Streaming ; "reconnected")]
    #[test_case(ClientState::Reconnecting, ClientState::Stopping ; "stop while reconnecting")]
    #[test_case(ClientState::Stopping, ClientState::Stopped ; "stopped")]
    fn allowed_transitions(from: ClientState, to: ClientState) {
        assert!(from.can_transition_to(to));
    }

    #[test_case(ClientState::Stopped, ClientState::Connecting ; "restart after stop")]
    #[test_case(ClientState::Idle, ClientState::Streaming ; "skip connecting")]
    #[test_case(ClientState::Stopping, ClientState::Streaming ; "resume while stopping")]
    fn rejected_transitions(from: ClientState, to: ClientState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn only_stopped_is_terminal() {
        assert!(ClientState::Stopped.is_terminal());
        assert!(!ClientState::Stopping.is_terminal());
        assert!(!ClientState::Idle.is_terminal());
    }

    #[test]
    fn display_matches_label() {
        assert_eq!(ClientState::Reconnecting.to_string(), "reconnecting");
    }
}
