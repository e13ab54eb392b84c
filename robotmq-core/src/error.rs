/// robotmq Error Types
///
/// One error taxonomy shared by the wire codecs, the broker and the client.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::endpoint::EndpointError;

/// Main error type for robotmq operations
#[derive(Error, Debug)]
pub enum RmqError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Endpoint could not be parsed or bound
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// Malformed frame, unknown command or wrong-sized field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A data command named a topic the broker does not hold
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    /// Rejected locally before any network activity
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The broker answered with an `Error` frame
    #[error("Broker returned error: {0}")]
    Remote(String),

    /// Request attempt did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Client gave up after the retry ceiling
    #[error("No reply after {attempts} attempts")]
    ExhaustedRetries { attempts: u32 },

    /// Shared-memory segment or lock could not be created, opened or mapped
    #[error("Shared memory fault on `{segment}`: {source}")]
    SharedMemory {
        segment: String,
        #[source]
        source: io::Error,
    },

    /// Bytes carry the descriptor magic but do not decode
    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// Descriptor does not reference this ring
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Socket closed
    #[error("Socket closed")]
    SocketClosed,
}

/// Result type alias for robotmq operations
pub type Result<T> = std::result::Result<T, RmqError>;

impl RmqError {
    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a malformed descriptor error
    pub fn malformed_descriptor(msg: impl Into<String>) -> Self {
        Self::MalformedDescriptor(msg.into())
    }

    /// Create an invalid descriptor error
    pub fn invalid_descriptor(msg: impl Into<String>) -> Self {
        Self::InvalidDescriptor(msg.into())
    }

    /// Wrap an OS-level failure on a named shared-memory object
    pub fn shared_memory(segment: impl Into<String>, source: impl Into<io::Error>) -> Self {
        Self::SharedMemory {
            segment: segment.into(),
            source: source.into(),
        }
    }

    /// Check if a fresh transport and a resend can cure this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::Interrupted
            ),
            Self::Timeout(_) | Self::SocketClosed => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(RmqError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(RmqError::SocketClosed.is_retryable());
        assert!(RmqError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)).is_retryable());
        assert!(!RmqError::Remote("boom".into()).is_retryable());
        assert!(!RmqError::protocol("bad frame").is_retryable());
        assert!(!RmqError::invalid_argument("empty").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = RmqError::ExhaustedRetries { attempts: 4 };
        assert_eq!(err.to_string(), "No reply after 4 attempts");

        let err = RmqError::shared_memory("/rmq_x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().starts_with("Shared memory fault on `/rmq_x`"));
    }
}
