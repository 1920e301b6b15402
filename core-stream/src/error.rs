use thiserror::Error;

/// Errors raised by or propagated through a [`Stream`](crate::Stream).
///
/// `Closed` is returned synchronously to the caller that tried to register a
/// listener on a finished stream. `Fault` is never returned: it travels
/// through the error hooks of a pipe chain via [`Stream::error`](crate::Stream::error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream closed")]
    Closed,

    #[error("{0}")]
    Fault(String),
}

impl StreamError {
    /// Wraps a message into a propagated fault.
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }
}

impl From<&str> for StreamError {
    fn from(message: &str) -> Self {
        Self::Fault(message.to_string())
    }
}

impl From<String> for StreamError {
    fn from(message: String) -> Self {
        Self::Fault(message)
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_message() {
        assert_eq!(StreamError::Closed.to_string(), "Stream closed");
    }

    #[test]
    fn test_raw_messages_become_faults() {
        assert_eq!(
            StreamError::from("boom"),
            StreamError::Fault("boom".to_string())
        );
        assert_eq!(StreamError::from(String::from("x")).to_string(), "x");
        assert_eq!(StreamError::fault("Invalid Data").to_string(), "Invalid Data");
    }
}
