use thiserror::Error;

/// Custom error types for the debate server
#[derive(Debug, Error)]
pub enum DebateError {
    /// Protocol validation errors: recoverable, routed to the room error topic
    #[error("The debate has not started yet")]
    NotStarted,

    #[error("It is not your turn to speak")]
    WrongTurn,

    #[error("Only a seated debater may do that")]
    NotDebater,

    #[error("An end-of-debate request is already pending")]
    RequestInFlight,

    #[error("There is no pending end-of-debate request")]
    NoPendingRequest,

    #[error("You cannot answer your own end-of-debate request")]
    SelfDecisionNotAllowed,

    #[error("Both debater seats are already taken")]
    RoomFull,

    #[error("The debate has already started")]
    AlreadyStarted,

    /// Lookup errors: surfaced to the transport caller
    #[error("Room {0} not found")]
    RoomNotFound(i64),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Room {0} is no longer active")]
    RoomInactive(i64),

    #[error("Only the room owner may do that")]
    NotOwner,

    /// Infrastructure errors: logged, never user-visible
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Broadcast error: {0}")]
    Broadcast(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type alias for Results using DebateError
pub type Result<T> = std::result::Result<T, DebateError>;

impl DebateError {
    /// Helper to create Storage errors with context
    pub fn storage(msg: impl Into<String>) -> Self {
        DebateError::Storage(msg.into())
    }

    /// Helper to create Broadcast errors with context
    pub fn broadcast(msg: impl Into<String>) -> Self {
        DebateError::Broadcast(msg.into())
    }

    /// Whether this error is a protocol validation failure that should be
    /// reported on the room's error topic rather than returned to the caller.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DebateError::NotStarted
                | DebateError::WrongTurn
                | DebateError::NotDebater
                | DebateError::RequestInFlight
                | DebateError::NoPendingRequest
                | DebateError::SelfDecisionNotAllowed
                | DebateError::RoomFull
                | DebateError::AlreadyStarted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DebateError::RoomNotFound(42);
        assert_eq!(err.to_string(), "Room 42 not found");
    }

    #[test]
    fn test_validation_classification() {
        assert!(DebateError::WrongTurn.is_validation());
        assert!(DebateError::SelfDecisionNotAllowed.is_validation());
        assert!(!DebateError::RoomNotFound(1).is_validation());
        assert!(!DebateError::storage("disk gone").is_validation());
    }
}
