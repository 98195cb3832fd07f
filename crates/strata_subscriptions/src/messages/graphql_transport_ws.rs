//! The `graphql-ws` library protocol, announced as `graphql-transport-ws`.

use super::{ClientMessageKind, MessageConverter, ServerMessage, ServerMessageKind};
use crate::error::ResponseWriteError;
use crate::protocol::SubscriptionProtocol;
use serde_json::Value;

/// Message type tokens.
pub mod tokens {
    pub const CONNECTION_INIT: &str = "connection_init";
    pub const CONNECTION_ACK: &str = "connection_ack";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const NEXT: &str = "next";
    pub const ERROR: &str = "error";
    pub const COMPLETE: &str = "complete";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphqlTransportWsConverter;

impl MessageConverter for GraphqlTransportWsConverter {
    fn protocol(&self) -> SubscriptionProtocol {
        SubscriptionProtocol::GraphqlTransportWs
    }

    fn client_kind(&self, message_type: &str) -> ClientMessageKind {
        match message_type {
            tokens::CONNECTION_INIT => ClientMessageKind::ConnectionInit,
            tokens::SUBSCRIBE => ClientMessageKind::Start,
            tokens::COMPLETE => ClientMessageKind::Stop,
            tokens::PING => ClientMessageKind::Ping,
            tokens::PONG => ClientMessageKind::Pong,
            _ => ClientMessageKind::Unknown,
        }
    }

    fn type_token(&self, kind: ServerMessageKind) -> Result<&'static str, ResponseWriteError> {
        Ok(match kind {
            ServerMessageKind::ConnectionAck => tokens::CONNECTION_ACK,
            ServerMessageKind::Data => tokens::NEXT,
            ServerMessageKind::Error => tokens::ERROR,
            ServerMessageKind::Complete => tokens::COMPLETE,
            ServerMessageKind::Ping | ServerMessageKind::KeepAlive => tokens::PING,
            ServerMessageKind::Pong => tokens::PONG,
            ServerMessageKind::ConnectionError => {
                return Err(ResponseWriteError::UnsupportedMessage(
                    kind.as_str(),
                    crate::protocol::GRAPHQL_TRANSPORT_WS,
                ))
            }
        })
    }

    fn error_payload(&self, errors: Vec<Value>) -> Value {
        Value::Array(errors)
    }

    fn keep_alive_message(&self) -> ServerMessage {
        ServerMessage::new(ServerMessageKind::Ping)
    }
}
