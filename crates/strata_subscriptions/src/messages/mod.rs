//! Protocol messages and the converters that put them on the wire.
//!
//! Inbound frames are deserialized into a [`ClientMessage`] envelope first and classified by
//! the connection's converter. Outbound messages are built as [`ServerMessage`] values and
//! written by the same converter.

mod graphql_transport_ws;
mod graphql_ws;

pub use graphql_transport_ws::GraphqlTransportWsConverter;
pub use graphql_ws::GraphqlWsConverter;

use crate::error::ResponseWriteError;
use crate::execution::ExecutionResult;
use crate::protocol::SubscriptionProtocol;
use crate::writer::ResponseWriter;
use serde::Deserialize;
use serde_json::{Map, Value};
use strata_core::GraphMessage;
use strata_schema::ResponseOptions;

/// Field names shared by both protocols.
pub mod fields {
    pub const TYPE: &str = "type";
    pub const ID: &str = "id";
    pub const PAYLOAD: &str = "payload";
}

/// The inbound envelope. Every protocol message has this shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// What a client asked for, independent of protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientMessageKind {
    ConnectionInit,
    /// `start` or `subscribe`.
    Start,
    /// `stop`, or `complete` sent by the client.
    Stop,
    ConnectionTerminate,
    Ping,
    Pong,
    Unknown,
}

/// What the server sends, independent of protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerMessageKind {
    ConnectionAck,
    ConnectionError,
    KeepAlive,
    Data,
    Error,
    Complete,
    Ping,
    Pong,
}

impl ServerMessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionAck => "connection_ack",
            Self::ConnectionError => "connection_error",
            Self::KeepAlive => "keep_alive",
            Self::Data => "data",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}

/// The body of an outbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ServerPayload {
    #[default]
    None,
    /// An execution result, written through the response writer.
    Result(ExecutionResult),
    /// Error messages, shaped by the protocol.
    Errors(Vec<GraphMessage>),
    Json(Value),
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerMessage {
    pub kind: ServerMessageKind,
    pub id: Option<String>,
    pub payload: ServerPayload,
}

impl ServerMessage {
    pub fn new(kind: ServerMessageKind) -> Self {
        Self {
            kind,
            id: None,
            payload: ServerPayload::None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: ServerPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn ack() -> Self {
        Self::new(ServerMessageKind::ConnectionAck)
    }

    pub fn keep_alive() -> Self {
        Self::new(ServerMessageKind::KeepAlive)
    }

    pub fn data(id: impl Into<String>, result: ExecutionResult) -> Self {
        Self::new(ServerMessageKind::Data)
            .with_id(id)
            .with_payload(ServerPayload::Result(result))
    }

    pub fn complete(id: impl Into<String>) -> Self {
        Self::new(ServerMessageKind::Complete).with_id(id)
    }

    /// An error frame, tagged with the client's id when there is one.
    pub fn error(id: Option<&str>, messages: Vec<GraphMessage>) -> Self {
        Self {
            kind: ServerMessageKind::Error,
            id: id.map(str::to_string),
            payload: ServerPayload::Errors(messages),
        }
    }

    pub fn connection_error(message: GraphMessage) -> Self {
        Self::new(ServerMessageKind::ConnectionError)
            .with_payload(ServerPayload::Errors(vec![message]))
    }
}

/// Maps protocol-neutral messages to and from one protocol's wire format.
pub trait MessageConverter: Send + Sync {
    fn protocol(&self) -> SubscriptionProtocol;

    /// Classifies an inbound `type` token.
    fn client_kind(&self, message_type: &str) -> ClientMessageKind;

    /// The outbound `type` token for a message kind.
    fn type_token(&self, kind: ServerMessageKind) -> Result<&'static str, ResponseWriteError>;

    /// Shapes the payload of `error` and `connection_error` frames.
    fn error_payload(&self, errors: Vec<Value>) -> Value;

    /// The message sent on each keep-alive tick.
    fn keep_alive_message(&self) -> ServerMessage {
        ServerMessage::keep_alive()
    }

    /// Writes a message as wire text: `type` always, `id` only when set, `payload` only when
    /// there is one.
    fn write(
        &self,
        message: &ServerMessage,
        writer: &dyn ResponseWriter,
        options: &ResponseOptions,
    ) -> Result<String, ResponseWriteError> {
        let mut frame = Map::new();
        frame.insert(fields::TYPE.into(), self.type_token(message.kind)?.into());
        if let Some(id) = &message.id {
            frame.insert(fields::ID.into(), id.clone().into());
        }
        let payload = match &message.payload {
            ServerPayload::None => None,
            ServerPayload::Result(result) => Some(writer.write_result(result, options)?),
            ServerPayload::Errors(messages) => Some(self.error_payload(
                messages
                    .iter()
                    .map(|m| writer.write_message(m, options))
                    .collect(),
            )),
            ServerPayload::Json(value) => Some(value.clone()),
        };
        if let Some(payload) = payload {
            frame.insert(fields::PAYLOAD.into(), payload);
        }
        Ok(serde_json::to_string(&Value::Object(frame))?)
    }
}

static GRAPHQL_WS: GraphqlWsConverter = GraphqlWsConverter;
static GRAPHQL_TRANSPORT_WS: GraphqlTransportWsConverter = GraphqlTransportWsConverter;

/// The converter for a protocol.
#[must_use]
pub fn converter(protocol: SubscriptionProtocol) -> &'static dyn MessageConverter {
    match protocol {
        SubscriptionProtocol::GraphqlWs => &GRAPHQL_WS,
        SubscriptionProtocol::GraphqlTransportWs => &GRAPHQL_TRANSPORT_WS,
    }
}
