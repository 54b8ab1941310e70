use thiserror::Error;

/// Error types for WebSocket session handling
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("No handler implemented for action: {0}")]
    NotImplemented(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WsError {
    /// Whether the error is caused by the caller rather than by infrastructure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_) | Self::DuplicateSession(_) | Self::NotImplemented(_)
        )
    }
}

/// Type alias for Results using WsError
pub type Result<T> = std::result::Result<T, WsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WsError::SessionNotFound("abc=".to_string());
        assert_eq!(err.to_string(), "Session not found: abc=");

        let err = WsError::NotImplemented("chat".to_string());
        assert_eq!(err.to_string(), "No handler implemented for action: chat");
    }

    #[test]
    fn test_client_errors() {
        assert!(WsError::DuplicateSession("x".into()).is_client_error());
        assert!(!WsError::Store("throttled".into()).is_client_error());
        assert!(!WsError::Delivery("boom".into()).is_client_error());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: WsError = json_err.into();
        assert!(matches!(err, WsError::Serialization(_)));
    }
}
