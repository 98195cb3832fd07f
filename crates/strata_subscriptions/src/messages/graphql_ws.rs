//! The legacy `subscriptions-transport-ws` protocol, announced as `graphql-ws`.

use super::{ClientMessageKind, MessageConverter, ServerMessageKind};
use crate::error::ResponseWriteError;
use crate::protocol::SubscriptionProtocol;
use serde_json::Value;

/// Message type tokens.
pub mod tokens {
    pub const CONNECTION_INIT: &str = "connection_init";
    pub const CONNECTION_ACK: &str = "connection_ack";
    pub const CONNECTION_ERROR: &str = "connection_error";
    pub const CONNECTION_TERMINATE: &str = "connection_terminate";
    pub const KEEP_ALIVE: &str = "ka";
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const DATA: &str = "data";
    pub const ERROR: &str = "error";
    pub const COMPLETE: &str = "complete";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphqlWsConverter;

impl MessageConverter for GraphqlWsConverter {
    fn protocol(&self) -> SubscriptionProtocol {
        SubscriptionProtocol::GraphqlWs
    }

    fn client_kind(&self, message_type: &str) -> ClientMessageKind {
        match message_type {
            tokens::CONNECTION_INIT => ClientMessageKind::ConnectionInit,
            tokens::START => ClientMessageKind::Start,
            tokens::STOP => ClientMessageKind::Stop,
            tokens::CONNECTION_TERMINATE => ClientMessageKind::ConnectionTerminate,
            _ => ClientMessageKind::Unknown,
        }
    }

    fn type_token(&self, kind: ServerMessageKind) -> Result<&'static str, ResponseWriteError> {
        Ok(match kind {
            ServerMessageKind::ConnectionAck => tokens::CONNECTION_ACK,
            ServerMessageKind::ConnectionError => tokens::CONNECTION_ERROR,
            ServerMessageKind::KeepAlive => tokens::KEEP_ALIVE,
            ServerMessageKind::Data => tokens::DATA,
            ServerMessageKind::Error => tokens::ERROR,
            ServerMessageKind::Complete => tokens::COMPLETE,
            ServerMessageKind::Ping | ServerMessageKind::Pong => {
                return Err(ResponseWriteError::UnsupportedMessage(
                    kind.as_str(),
                    crate::protocol::GRAPHQL_WS,
                ))
            }
        })
    }

    /// A single error object; the first one when there are several.
    fn error_payload(&self, errors: Vec<Value>) -> Value {
        errors.into_iter().next().unwrap_or(Value::Null)
    }
}
