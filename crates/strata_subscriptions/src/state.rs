//! Connection lifecycle state, shared between a client's tasks.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Accepted, waiting for the connection init message.
    Connecting,
    Open,
    /// The server sent a close frame.
    CloseSent,
    /// The client sent a close frame or terminate message.
    CloseReceived,
    Closed,
    /// The socket failed underneath the connection.
    Aborted,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// True once the connection can no longer carry messages.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::CloseSent => "close_sent",
            Self::CloseReceived => "close_received",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A cloneable handle to a connection's state.
#[derive(Debug, Clone)]
pub struct SharedConnectionState {
    inner: Arc<watch::Sender<ConnectionState>>,
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedConnectionState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(watch::Sender::new(ConnectionState::Connecting)),
        }
    }

    #[must_use]
    pub fn get(&self) -> ConnectionState {
        *self.inner.borrow()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.get().is_open()
    }

    /// Moves to `state` unless the connection already reached a terminal state.
    /// Returns the previous state.
    pub fn transition(&self, state: ConnectionState) -> ConnectionState {
        let mut previous = state;
        self.inner.send_if_modified(|current| {
            previous = *current;
            if current.is_terminal() || *current == state {
                return false;
            }
            *current = state;
            true
        });
        previous
    }

    /// Waits until the connection reaches a terminal state.
    pub async fn closed(&self) {
        let mut rx = self.inner.subscribe();
        // the sender lives as long as self
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_stick() {
        let state = SharedConnectionState::new();
        assert_eq!(state.transition(ConnectionState::Open), ConnectionState::Connecting);
        assert!(state.is_open());

        state.transition(ConnectionState::Aborted);
        assert_eq!(state.transition(ConnectionState::Open), ConnectionState::Aborted);
        assert_eq!(state.get(), ConnectionState::Aborted);
    }

    #[tokio::test]
    async fn test_closed_resolves() {
        let state = SharedConnectionState::new();
        let waiter = state.clone();
        let task = tokio::spawn(async move { waiter.closed().await });
        state.transition(ConnectionState::Closed);
        task.await.unwrap();
    }
}
