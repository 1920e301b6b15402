use bridge_traits::BridgeError;
use core_stream::StreamError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Event timeout: '{event}' not acknowledged within {after:?}")]
    Timeout { event: String, after: Duration },

    #[error("Renderer rejected '{event}': {message}")]
    Rejected { event: String, message: String },

    #[error("Nearby session is closed")]
    SessionClosed,

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl MapError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MapError::Timeout { .. } | MapError::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let error = MapError::Timeout {
            event: "set:route".to_string(),
            after: Duration::from_secs(12),
        };

        assert!(error.to_string().starts_with("Event timeout"));
        assert!(error.to_string().contains("set:route"));
        assert!(error.is_retryable());
    }

    #[test]
    fn test_conversions() {
        let error: MapError = StreamError::Closed.into();
        assert_eq!(error.to_string(), "Stream error: Stream closed");
        assert!(!error.is_retryable());

        let error: MapError = BridgeError::AckDropped("mount:navigation".to_string()).into();
        assert!(matches!(error, MapError::Bridge(_)));
    }
}
