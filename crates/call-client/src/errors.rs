//! Call client error types.

use thiserror::Error;

/// Errors surfaced by the call state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The capture device refused access. Aborts only the call attempt.
    #[error("Media access denied: {0}")]
    MediaAccessDenied(String),

    /// A remote description or candidate could not be applied, or arrived
    /// where the link's role does not expect it.
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// The realtime transport or the session actor went away.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CallError::MediaAccessDenied("camera blocked".to_string()).to_string(),
            "Media access denied: camera blocked"
        );
        assert_eq!(
            CallError::Signaling("unexpected answer".to_string()).to_string(),
            "Signaling error: unexpected answer"
        );
        assert_eq!(
            CallError::Connectivity("socket closed".to_string()).to_string(),
            "Connectivity error: socket closed"
        );
        assert_eq!(
            CallError::InvalidState("already in a call".to_string()).to_string(),
            "Invalid state: already in a call"
        );
    }
}
