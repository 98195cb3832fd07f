//! WebSocket transport over `tokio-tungstenite`.

use crate::connection::{ClientConnection, ConnectionFrame, ConnectionReader, ConnectionWriter};
use crate::error::ConnectionError;
use crate::options::SubscriptionServerOptions;
use crate::protocol::{negotiate, SubscriptionProtocol};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::trace;

/// Reads protocol frames from a WebSocket. Pings and pongs are answered by tungstenite.
pub struct WebSocketReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> ConnectionReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<ConnectionFrame>, ConnectionError> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    return Ok(Some(ConnectionFrame::Text(text.as_str().to_string())));
                }
                Ok(Message::Binary(bytes)) => {
                    return Ok(Some(ConnectionFrame::from_bytes(bytes.to_vec())));
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame.map(|f| (u16::from(f.code), f.reason.as_str().to_string()));
                    return Ok(Some(ConnectionFrame::Close(reason)));
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(None)
    }
}

/// Writes protocol frames to a WebSocket.
pub struct WebSocketWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> ConnectionWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.sink.send(Message::text(text)).await?;
        Ok(())
    }

    async fn close(&mut self, status: u16, description: &str) -> Result<(), ConnectionError> {
        let frame = CloseFrame {
            code: CloseCode::from(status),
            reason: description.to_string().into(),
        };
        match self.sink.send(Message::Close(Some(frame))).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Wraps an established WebSocket.
pub fn from_stream<S>(stream: WebSocketStream<S>, requested_protocols: Option<String>) -> ClientConnection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = stream.split();
    let mut connection = ClientConnection::new(WebSocketReader { stream }, WebSocketWriter { sink });
    connection.requested_protocols = requested_protocols;
    connection
}

/// Performs the WebSocket handshake on a raw stream.
///
/// The requested name of the negotiated protocol is echoed in `Sec-WebSocket-Protocol`.
/// A request naming only unsupported protocols is refused with `400 Bad Request`.
pub async fn accept<S>(
    stream: S,
    options: &SubscriptionServerOptions,
) -> Result<ClientConnection, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut requested = None;
    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        let header_value = request
            .headers()
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let protocol = negotiate(
            header_value.as_deref(),
            &options.supported_protocols,
            options.default_protocol,
        );
        let Some(protocol) = protocol else {
            let mut refused = ErrorResponse::new(Some("Unsupported subprotocol".to_string()));
            *refused.status_mut() = StatusCode::BAD_REQUEST;
            return Err(refused);
        };
        if let Some(header_value) = &header_value {
            // Clients only accept a name they asked for.
            let echoed = header_value
                .split(',')
                .map(str::trim)
                .find(|name| SubscriptionProtocol::from_name(name) == Some(protocol))
                .unwrap_or(protocol.name());
            if let Ok(value) = HeaderValue::from_str(echoed) {
                response.headers_mut().insert(header::SEC_WEBSOCKET_PROTOCOL, value);
            }
        }
        trace!(%protocol, "websocket handshake accepted");
        requested = Some(header_value.unwrap_or_else(|| protocol.name().to_string()));
        Ok(response)
    };

    let socket = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    Ok(from_stream(socket, requested))
}
