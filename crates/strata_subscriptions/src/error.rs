//! Error types for the subscription layer.

use std::error::Error as StdError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type alias for subscription operations.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Errors raised by the subscription server.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("none of the requested protocols are supported: {0}")]
    UnsupportedProtocol(String),

    #[error("the server is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// A failure of the physical connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("{0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

impl ConnectionError {
    /// Wraps an arbitrary application error.
    pub fn other(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }

    /// Classifies the failure by its innermost cause.
    #[must_use]
    pub fn failure(&self) -> ConnectionFailure {
        let mut innermost: &(dyn StdError + 'static) = self;
        while let Some(source) = innermost.source() {
            innermost = source;
        }

        let is_socket = matches!(self, Self::Closed)
            || innermost.is::<std::io::Error>()
            || innermost.is::<tungstenite::Error>()
            || innermost.is::<tungstenite::error::ProtocolError>();
        if is_socket {
            ConnectionFailure::Socket
        } else {
            ConnectionFailure::General
        }
    }
}

/// How a connection failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The socket itself failed. No close frame can be sent.
    Socket,
    /// Anything else. The connection is closed with an internal error status.
    General,
}

impl ConnectionFailure {
    #[must_use]
    pub const fn close_status(self) -> u16 {
        match self {
            Self::Socket => 1006,
            Self::General => 1011,
        }
    }
}

/// Failure to serialize an outbound message.
#[derive(Debug, Error)]
pub enum ResponseWriteError {
    #[error("failed to serialize message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message type `{0}` is not part of the {1} protocol")]
    UnsupportedMessage(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("wrapper")]
    struct Wrapper(#[source] std::io::Error);

    #[derive(Debug, Error)]
    #[error("resolver failed")]
    struct ResolverFailed;

    #[test]
    fn test_failure_classification() {
        let io = ConnectionError::Io(std::io::Error::other("reset"));
        assert_eq!(io.failure(), ConnectionFailure::Socket);

        let wrapped = ConnectionError::other(Wrapper(std::io::Error::other("reset")));
        assert_eq!(wrapped.failure(), ConnectionFailure::Socket);

        let general = ConnectionError::other(ResolverFailed);
        assert_eq!(general.failure(), ConnectionFailure::General);
        assert_eq!(general.failure().close_status(), 1011);
        assert_eq!(ConnectionError::Closed.failure(), ConnectionFailure::Socket);
    }
}
