//! Connection health of a single stream.

use core::fmt;

/// Lifecycle state of one stream client.
///
/// Exactly one status holds per client at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConnectionStatus {
    /// Created, never connected.
    #[default]
    Idle,
    /// First open in progress.
    Connecting,
    /// Open and authenticated; messages flow.
    Connected,
    /// Lost the connection and waiting to retry (or retrying).
    Reconnecting,
    /// Gave up. Only a manual connect leaves this state.
    Failed,
    /// Closed by the caller.
    Closed,
}

/// How alarming a status is, for indicator colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusSeverity {
    Muted,
    Success,
    Warning,
    Error,
}

impl ConnectionStatus {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting…",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting…",
            ConnectionStatus::Failed => "failed",
            ConnectionStatus::Closed => "closed",
        }
    }

    pub fn severity(&self) -> StatusSeverity {
        match self {
            ConnectionStatus::Idle | ConnectionStatus::Connecting | ConnectionStatus::Closed => {
                StatusSeverity::Muted
            }
            ConnectionStatus::Connected => StatusSeverity::Success,
            ConnectionStatus::Reconnecting => StatusSeverity::Warning,
            ConnectionStatus::Failed => StatusSeverity::Error,
        }
    }

    /// Returns true while a connection is open or being established.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting | ConnectionStatus::Connected | ConnectionStatus::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_matches_status() {
        assert_eq!(ConnectionStatus::Connected.severity(), StatusSeverity::Success);
        assert_eq!(ConnectionStatus::Reconnecting.severity(), StatusSeverity::Warning);
        assert_eq!(ConnectionStatus::Failed.severity(), StatusSeverity::Error);
        assert_eq!(ConnectionStatus::Closed.severity(), StatusSeverity::Muted);
    }

    #[test]
    fn only_live_states_are_active() {
        assert!(ConnectionStatus::Reconnecting.is_active());
        assert!(!ConnectionStatus::Failed.is_active());
        assert!(!ConnectionStatus::Idle.is_active());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Reconnecting).unwrap();
        assert_eq!(json, "\"reconnecting\"");
    }
}
