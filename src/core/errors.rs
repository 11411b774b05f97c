use thiserror::Error;

#[derive(Error, Debug)]
pub enum NakamaError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: u16, message: String },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("WebSocket is not connected")]
    NotConnected,

    #[error("WebSocket read failed: {message}")]
    TransportRead {
        message: String,
        /// The peer closed the connection, or it dropped without a close handshake.
        unexpected_close: bool,
    },

    #[error("WebSocket write failed: {0}")]
    TransportWrite(String),

    #[error("Session refresh failed: {0}")]
    SessionRefresh(#[source] Box<NakamaError>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl NakamaError {
    /// Whether a read error means the connection ended outside of a local `close()`.
    pub fn is_unexpected_close(&self) -> bool {
        matches!(
            self,
            Self::TransportRead {
                unexpected_close: true,
                ..
            }
        )
    }

    /// Whether the REST surface rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::ApiError { code, .. } => *code == 401,
            Self::SessionRefresh(inner) => inner.is_unauthorized(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_close_classification() {
        let abnormal = NakamaError::TransportRead {
            message: "reset without closing handshake".to_string(),
            unexpected_close: true,
        };
        let protocol = NakamaError::TransportRead {
            message: "invalid frame".to_string(),
            unexpected_close: false,
        };

        assert!(abnormal.is_unexpected_close());
        assert!(!protocol.is_unexpected_close());
        assert!(!NakamaError::NotConnected.is_unexpected_close());
    }

    #[test]
    fn test_unauthorized_through_refresh_wrapper() {
        let err = NakamaError::SessionRefresh(Box::new(NakamaError::ApiError {
            code: 401,
            message: "Refresh token invalid or expired.".to_string(),
        }));
        assert!(err.is_unauthorized());
        assert!(err.to_string().starts_with("Session refresh failed"));
    }
}
