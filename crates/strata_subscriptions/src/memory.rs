//! An in-memory connection, driven from the other end by a [`MemoryClient`].
//!
//! Used by tests and by hosts that bridge their own transport into the server.

use crate::connection::{ClientConnection, ConnectionFrame, ConnectionReader, ConnectionWriter};
use crate::error::ConnectionError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// What the server wrote to a memory connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Text(String),
    Close(u16, String),
}

impl ServerFrame {
    /// The frame parsed as JSON, or `None` for close frames and invalid text.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Text(text) => serde_json::from_str(text).ok(),
            Self::Close(..) => None,
        }
    }
}

/// Creates a connected client and server connection pair.
pub fn memory_connection(protocols: Option<&str>) -> (MemoryClient, ClientConnection) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    let mut connection = ClientConnection::new(
        MemoryReader { inbound: server_rx },
        MemoryWriter { outbound: server_tx },
    )
    .with_peer("memory");
    if let Some(protocols) = protocols {
        connection = connection.with_protocols(protocols);
    }
    let client = MemoryClient {
        outbound: Some(client_tx),
        inbound: client_rx,
    };
    (client, connection)
}

/// The client end of a memory connection.
#[derive(Debug)]
pub struct MemoryClient {
    outbound: Option<mpsc::UnboundedSender<ConnectionFrame>>,
    inbound: mpsc::UnboundedReceiver<ServerFrame>,
}

impl MemoryClient {
    /// Sends a text frame. Returns false if the server stopped reading.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.outbound
            .as_ref()
            .is_some_and(|tx| tx.send(ConnectionFrame::Text(text.into())).is_ok())
    }

    /// Sends a binary frame.
    pub fn send_bytes(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.outbound
            .as_ref()
            .is_some_and(|tx| tx.send(ConnectionFrame::from_bytes(bytes.into())).is_ok())
    }

    /// Sends a JSON message as a text frame.
    pub fn send_json(&self, message: &serde_json::Value) -> bool {
        self.send_text(message.to_string())
    }

    /// Sends a close frame.
    pub fn close(&self, status: u16, reason: &str) -> bool {
        self.outbound.as_ref().is_some_and(|tx| {
            tx.send(ConnectionFrame::Close(Some((status, reason.to_string()))))
                .is_ok()
        })
    }

    /// Ends the inbound stream without a close frame, as a dropped socket would.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }

    /// Waits for the next frame from the server. `None` once the server side is gone.
    pub async fn next_frame(&mut self) -> Option<ServerFrame> {
        self.inbound.recv().await
    }

    /// Waits for the next text frame and parses it. Close frames yield `None`.
    pub async fn next_json(&mut self) -> Option<serde_json::Value> {
        self.next_frame().await.and_then(|frame| frame.json())
    }

    /// A frame the server has already written, without waiting.
    pub fn try_next_frame(&mut self) -> Option<ServerFrame> {
        self.inbound.try_recv().ok()
    }
}

struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<ConnectionFrame>,
}

#[async_trait]
impl ConnectionReader for MemoryReader {
    async fn receive(&mut self) -> Result<Option<ConnectionFrame>, ConnectionError> {
        Ok(self.inbound.recv().await)
    }
}

struct MemoryWriter {
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

#[async_trait]
impl ConnectionWriter for MemoryWriter {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.outbound
            .send(ServerFrame::Text(text))
            .map_err(|_| ConnectionError::Closed)
    }

    async fn close(&mut self, status: u16, description: &str) -> Result<(), ConnectionError> {
        self.outbound
            .send(ServerFrame::Close(status, description.to_string()))
            .map_err(|_| ConnectionError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_cross_the_pair() {
        let (mut client, mut connection) = memory_connection(Some("graphql-ws"));
        assert_eq!(connection.requested_protocols.as_deref(), Some("graphql-ws"));

        assert!(client.send_text("hello"));
        assert_eq!(
            connection.reader.receive().await.unwrap(),
            Some(ConnectionFrame::Text("hello".into()))
        );

        connection.writer.send_text(r#"{"type":"ka"}"#.into()).await.unwrap();
        assert_eq!(client.next_json().await, Some(serde_json::json!({ "type": "ka" })));

        client.disconnect();
        assert_eq!(connection.reader.receive().await.unwrap(), None);
    }
}
