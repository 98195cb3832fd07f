//! The per-connection protocol state machine.
//!
//! Each client runs three tasks: a reader forwarding inbound frames, a single writer that owns
//! the outbound half of the connection, and the proxy loop that processes one inbound message
//! or event at a time.

use crate::connection::{close_status, ConnectionFrame, ConnectionReader, ConnectionWriter};
use crate::error::{ConnectionError, ConnectionFailure};
use crate::event::{SubscriptionEvent, SubscriptionEventName};
use crate::execution::{ExecutionResult, QueryRequest, SubscriptionAction};
use crate::keep_alive::KeepAliveTimer;
use crate::messages::{
    ClientMessage, ClientMessageKind, MessageConverter, ServerMessage, ServerMessageKind,
};
use crate::pipeline::{PreparationFailure, PreparedQuery};
use crate::protocol::SubscriptionProtocol;
use crate::server::{ClientId, ServerInner};
use crate::state::{ConnectionState, SharedConnectionState};
use crate::subscription::{ClientSubscription, SubscriptionCollection};
use std::sync::Arc;
use strata_core::{codes, GraphMessage, GraphMessageCollection};
use strata_syntax::OperationType;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Work for the writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Message(ServerMessage),
    Close(u16, String),
}

/// What the reader task hands to the proxy loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    Frame(ConnectionFrame),
    Failed(ConnectionError),
}

/// Forwards frames until the stream ends, fails, or the proxy stops listening.
pub(crate) async fn read_frames(mut reader: Box<dyn ConnectionReader>, inbound: mpsc::Sender<Inbound>) {
    loop {
        let received = tokio::select! {
            received = reader.receive() => received,
            () = inbound.closed() => break,
        };
        let next = match received {
            Ok(Some(frame)) => Inbound::Frame(frame),
            Ok(None) => break,
            Err(error) => {
                let _ = inbound.send(Inbound::Failed(error)).await;
                break;
            }
        };
        if inbound.send(next).await.is_err() {
            break;
        }
    }
}

/// Serializes and sends outbound messages in order. Messages that fail to serialize are
/// logged and skipped.
pub(crate) async fn write_frames(
    mut writer: Box<dyn ConnectionWriter>,
    mut outbound: mpsc::Receiver<Outbound>,
    server: Arc<ServerInner>,
    converter: &'static dyn MessageConverter,
    client: ClientId,
) {
    let options = server.schema.options;
    while let Some(next) = outbound.recv().await {
        let sent = match next {
            Outbound::Message(message) => {
                match converter.write(&message, server.writer.as_ref(), &options) {
                    Ok(text) => writer.send_text(text).await,
                    Err(error) => {
                        error!(%client, kind = message.kind.as_str(), error = %error, "skipping outbound message");
                        continue;
                    }
                }
            }
            Outbound::Close(status, description) => {
                let closed = writer.close(status, &description).await;
                if let Err(error) = closed {
                    trace!(%client, error = %error, "close frame not delivered");
                }
                break;
            }
        };
        if let Err(error) = sent {
            debug!(%client, error = %error, "outbound send failed");
            break;
        }
    }
}

/// The protocol state machine for one client.
pub(crate) struct SubscriptionClientProxy {
    id: ClientId,
    server: Arc<ServerInner>,
    converter: &'static dyn MessageConverter,
    state: SharedConnectionState,
    subscriptions: SubscriptionCollection,
    keep_alive: KeepAliveTimer,
    outbound: mpsc::Sender<Outbound>,
    /// The state entered once teardown finishes.
    final_state: ConnectionState,
}

impl SubscriptionClientProxy {
    pub(crate) fn new(
        id: ClientId,
        server: Arc<ServerInner>,
        protocol: SubscriptionProtocol,
        state: SharedConnectionState,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            server,
            converter: crate::messages::converter(protocol),
            state,
            subscriptions: SubscriptionCollection::new(),
            keep_alive: KeepAliveTimer::new(),
            outbound,
            final_state: ConnectionState::Closed,
        }
    }

    fn protocol(&self) -> SubscriptionProtocol {
        self.converter.protocol()
    }

    /// Processes inbound messages and events until the connection ends, then releases
    /// everything the client held.
    pub(crate) async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        mut events: mpsc::Receiver<Arc<SubscriptionEvent>>,
    ) {
        let init_timeout = tokio::time::sleep(self.server.options.connection_init_timeout);
        tokio::pin!(init_timeout);
        let shutdown = self.server.shutdown.clone();

        loop {
            let awaiting_init = self.state.get() == ConnectionState::Connecting;
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    self.close(close_status::NORMAL, "Server shutting down").await;
                    break;
                }
                next = inbound.recv() => {
                    let keep_going = match next {
                        Some(Inbound::Frame(frame)) => self.on_frame(frame).await,
                        Some(Inbound::Failed(error)) => {
                            self.on_failure(&error).await;
                            false
                        }
                        None => {
                            debug!(client = %self.id, "connection stream ended");
                            self.final_state = ConnectionState::Aborted;
                            false
                        }
                    };
                    if !keep_going || self.state.get() == ConnectionState::CloseSent {
                        break;
                    }
                }
                Some(event) = events.recv() => self.on_event(&event).await,
                () = &mut init_timeout, if awaiting_init => {
                    info!(client = %self.id, "connection init timed out");
                    self.close(close_status::INIT_TIMEOUT, "Connection initialisation timeout").await;
                    break;
                }
            }
        }

        self.finalize().await;
    }

    async fn send(&self, message: ServerMessage) {
        if self.outbound.send(Outbound::Message(message)).await.is_err() {
            trace!(client = %self.id, "writer is gone, message dropped");
        }
    }

    async fn send_error(&self, id: Option<&str>, code: &str, text: impl Into<String>) {
        let message = GraphMessage::critical(code, text);
        self.send(ServerMessage::error(id, vec![message])).await;
    }

    async fn close(&self, status: u16, description: &str) {
        self.state.transition(ConnectionState::CloseSent);
        let _ = self
            .outbound
            .send(Outbound::Close(status, description.to_string()))
            .await;
    }

    /// Returns false when the connection should end.
    async fn on_frame(&mut self, frame: ConnectionFrame) -> bool {
        let text = match frame {
            ConnectionFrame::Text(text) => Some(text),
            ConnectionFrame::Malformed => {
                debug!(client = %self.id, "frame is not UTF-8");
                None
            }
            ConnectionFrame::Close(reason) => {
                debug!(client = %self.id, ?reason, "client closed the connection");
                self.state.transition(ConnectionState::CloseReceived);
                return false;
            }
        };

        let value = text.and_then(|text| match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(client = %self.id, error = %error, "frame is not JSON");
                None
            }
        });
        let message = match value {
            Some(value) => serde_json::from_value::<ClientMessage>(value).ok(),
            None => {
                if self.protocol() == SubscriptionProtocol::GraphqlTransportWs {
                    self.close(close_status::INVALID_MESSAGE, "Invalid message received").await;
                    return false;
                }
                None
            }
        };
        let Some(message) = message else {
            self.on_unknown(None).await;
            return true;
        };

        trace!(client = %self.id, message_type = %message.message_type, "message received");
        match self.converter.client_kind(&message.message_type) {
            ClientMessageKind::ConnectionInit => self.on_init().await,
            ClientMessageKind::Start => {
                self.on_start(message.id, message.payload).await;
                true
            }
            ClientMessageKind::Stop => {
                self.on_stop(message.id.as_deref()).await;
                true
            }
            ClientMessageKind::ConnectionTerminate => {
                self.state.transition(ConnectionState::CloseReceived);
                self.close(close_status::NORMAL, "Connection terminated").await;
                false
            }
            ClientMessageKind::Ping => {
                self.send(ServerMessage::new(ServerMessageKind::Pong)).await;
                true
            }
            ClientMessageKind::Pong => true,
            ClientMessageKind::Unknown => {
                self.on_unknown(message.id.as_deref()).await;
                true
            }
        }
    }

    async fn on_init(&mut self) -> bool {
        if self.state.get() != ConnectionState::Connecting {
            if self.protocol() == SubscriptionProtocol::GraphqlTransportWs {
                self.close(close_status::TOO_MANY_INIT_REQUESTS, "Too many initialisation requests")
                    .await;
                return false;
            }
            self.send(ServerMessage::ack()).await;
            return true;
        }

        self.state.transition(ConnectionState::Open);
        self.send(ServerMessage::ack()).await;
        if let Some(interval) = self.server.options.keep_alive_interval {
            self.keep_alive.start(
                interval,
                self.converter.keep_alive_message(),
                self.state.clone(),
                self.outbound.clone(),
            );
        }
        debug!(client = %self.id, protocol = %self.protocol(), "connection acknowledged");
        true
    }

    async fn on_unknown(&self, id: Option<&str>) {
        self.send_error(
            id,
            codes::BAD_REQUEST,
            format!(
                "The last message was not understood by the {} protocol.",
                self.protocol()
            ),
        )
        .await;
    }

    async fn on_start(&mut self, id: Option<String>, payload: Option<serde_json::Value>) {
        let Some(id) = id else {
            self.send_error(None, codes::BAD_REQUEST, "A subscription message requires an id.")
                .await;
            return;
        };
        if !self.state.is_open() {
            if self.protocol() == SubscriptionProtocol::GraphqlTransportWs {
                self.close(close_status::UNAUTHORIZED, "Unauthorized").await;
                return;
            }
            self.send_error(
                Some(&id),
                codes::SUBSCRIPTION_ERROR,
                "The connection has not been initialized.",
            )
            .await;
            return;
        }
        if self.subscriptions.contains(&id) {
            self.send_error(
                Some(&id),
                codes::SUBSCRIPTION_ERROR,
                format!("Subscriber for id '{id}' already exists."),
            )
            .await;
            return;
        }

        let request = match payload.map(serde_json::from_value::<QueryRequest>) {
            Some(Ok(request)) => request,
            Some(Err(error)) => {
                let text = format!("The subscription payload is not a valid request: {error}.");
                self.send_error(Some(&id), codes::BAD_REQUEST, text).await;
                return;
            }
            None => {
                let text = "The subscription message carries no query.";
                self.send_error(Some(&id), codes::BAD_REQUEST, text).await;
                return;
            }
        };

        let prepared = match self.server.pipeline.prepare(request) {
            Ok(prepared) => prepared,
            Err(PreparationFailure::Syntax(messages)) if is_single_syntax_error(&messages) => {
                self.send(ServerMessage::error(Some(&id), messages.into_vec()))
                    .await;
                return;
            }
            Err(failure) => {
                debug!(client = %self.id, %id, "document rejected");
                let result = ExecutionResult::from_messages(failure.into_messages());
                self.send(ServerMessage::data(id.clone(), result)).await;
                self.send(ServerMessage::complete(id)).await;
                return;
            }
        };

        if prepared.plan.operation_type == OperationType::Subscription {
            self.subscribe(id, prepared).await;
            return;
        }

        let result = self
            .server
            .executor
            .execute(&self.server.schema, &prepared, None)
            .await;
        self.send(ServerMessage::data(id.clone(), result)).await;
        self.send(ServerMessage::complete(id)).await;
    }

    async fn subscribe(&mut self, id: String, prepared: PreparedQuery) {
        if let Some(max) = self.server.options.max_subscriptions_per_client {
            if self.subscriptions.len() >= max {
                self.send_error(
                    Some(&id),
                    codes::SUBSCRIPTION_ERROR,
                    format!("The client already has the maximum of {max} active subscriptions."),
                )
                .await;
                return;
            }
        }

        let event = prepared
            .event_name()
            .or_else(|| prepared.plan.subscription_root().map(|root| root.field_name.as_str()))
            .unwrap_or_default()
            .to_string();
        let route = SubscriptionEventName::new(&self.server.schema.name, event);
        let subscription = ClientSubscription {
            id: id.clone(),
            route: route.clone(),
            query: Arc::new(prepared),
        };
        if self.subscriptions.add(subscription).is_err() {
            return;
        }
        self.server.register_route(self.id, route.clone()).await;
        debug!(client = %self.id, %id, route = %route, "subscription started");
    }

    async fn on_stop(&mut self, id: Option<&str>) {
        let Some(id) = id else {
            self.send_error(None, codes::BAD_REQUEST, "A stop message requires an id.")
                .await;
            return;
        };
        match self.subscriptions.remove(id) {
            Some(subscription) => {
                self.server
                    .release_route(self.id, &subscription.route)
                    .await;
                self.send(ServerMessage::complete(id)).await;
                debug!(client = %self.id, %id, "subscription stopped");
            }
            None => {
                self.send_error(
                    Some(id),
                    codes::SUBSCRIPTION_ERROR,
                    format!("No active subscription with id '{id}'."),
                )
                .await;
            }
        }
    }

    async fn on_event(&mut self, event: &SubscriptionEvent) {
        if !self.state.is_open() {
            return;
        }
        for subscription in self.subscriptions.for_route(&event.route()) {
            let result = self
                .server
                .executor
                .execute(&self.server.schema, &subscription.query, Some(event))
                .await;
            match result.action {
                SubscriptionAction::Skip => {
                    trace!(client = %self.id, id = %subscription.id, "event skipped");
                }
                SubscriptionAction::Continue => {
                    self.send(ServerMessage::data(subscription.id.clone(), result))
                        .await;
                }
                SubscriptionAction::Complete => {
                    self.send(ServerMessage::data(subscription.id.clone(), result))
                        .await;
                    self.subscriptions.remove(&subscription.id);
                    self.server
                        .release_route(self.id, &subscription.route)
                        .await;
                    self.send(ServerMessage::complete(subscription.id.clone()))
                        .await;
                }
            }
        }
    }

    async fn on_failure(&mut self, error: &ConnectionError) {
        let failure = error.failure();
        warn!(client = %self.id, error = %error, ?failure, "connection failed");
        match failure {
            ConnectionFailure::Socket => self.final_state = ConnectionState::Aborted,
            ConnectionFailure::General => {
                self.close(failure.close_status(), "Internal server error").await;
            }
        }
    }

    async fn finalize(mut self) {
        self.keep_alive.stop();
        let released = self.subscriptions.drain();
        for subscription in &released {
            self.server.release_route(self.id, &subscription.route).await;
        }
        self.server.remove_client(self.id).await;
        self.state.transition(self.final_state);
        info!(
            client = %self.id,
            subscriptions = released.len(),
            "client disconnected"
        );
    }
}

fn is_single_syntax_error(messages: &GraphMessageCollection) -> bool {
    messages.len() == 1 && messages.iter().all(|m| m.code == codes::SYNTAX_ERROR)
}
