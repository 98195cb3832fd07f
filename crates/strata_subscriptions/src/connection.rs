//! The physical client connection, independent of the transport behind it.

use crate::error::ConnectionError;
use async_trait::async_trait;

/// WebSocket close status codes used by the server.
pub mod close_status {
    pub const NORMAL: u16 = 1000;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const ABNORMAL: u16 = 1006;
    pub const INTERNAL_ERROR: u16 = 1011;
    /// A frame that is not valid JSON.
    pub const INVALID_MESSAGE: u16 = 4400;
    /// A subscription started before the connection was acknowledged.
    pub const UNAUTHORIZED: u16 = 4401;
    /// The client did not initialize in time.
    pub const INIT_TIMEOUT: u16 = 4408;
    /// A second connection init message.
    pub const TOO_MANY_INIT_REQUESTS: u16 = 4429;
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFrame {
    Text(String),
    /// A binary frame whose payload is not UTF-8.
    Malformed,
    /// The client closed the connection, optionally with a status and reason.
    Close(Option<(u16, String)>),
}

impl ConnectionFrame {
    /// Decodes a binary frame. Only UTF-8 payloads carry a message.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(_) => Self::Malformed,
        }
    }
}

/// Reads frames from the client. `Ok(None)` means the stream ended.
#[async_trait]
pub trait ConnectionReader: Send {
    async fn receive(&mut self) -> Result<Option<ConnectionFrame>, ConnectionError>;
}

/// Writes frames to the client.
#[async_trait]
pub trait ConnectionWriter: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    async fn close(&mut self, status: u16, description: &str) -> Result<(), ConnectionError>;
}

/// An accepted connection, split into its halves.
pub struct ClientConnection {
    pub reader: Box<dyn ConnectionReader>,
    pub writer: Box<dyn ConnectionWriter>,
    /// The raw `Sec-WebSocket-Protocol` request header.
    pub requested_protocols: Option<String>,
    /// Identifies the peer in logs.
    pub peer: Option<String>,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("requested_protocols", &self.requested_protocols)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    pub fn new(
        reader: impl ConnectionReader + 'static,
        writer: impl ConnectionWriter + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            requested_protocols: None,
            peer: None,
        }
    }

    #[must_use]
    pub fn with_protocols(mut self, header: impl Into<String>) -> Self {
        self.requested_protocols = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }
}
