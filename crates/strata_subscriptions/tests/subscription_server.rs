//! Integration tests for the subscription server over in-memory connections.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_schema::Schema;
use strata_subscriptions::{
    memory_connection, ConnectionError, ConnectionState, ConnectionWriter, ExecutionResult, MemoryClient, PreparedQuery,
    ProjectionExecutor, QueryExecutor, ServerFrame, SubscriptionAction, SubscriptionError,
    SubscriptionEvent, SubscriptionEventName, SubscriptionEventPublisher,
    SubscriptionEventRouter, SubscriptionServer, SubscriptionServerOptions,
};

const SCHEMA: &str = r#"{
    "name": "reviews",
    "types": {
        "Query": {
            "kind": "OBJECT",
            "fields": { "hero": { "type": "Character" } }
        },
        "Subscription": {
            "kind": "OBJECT",
            "fields": {
                "reviewAdded": { "type": "Review", "event_name": "REVIEW_ADDED" },
                "heroChanged": { "type": "Character", "event_name": "HERO_CHANGED" }
            }
        },
        "Character": {
            "kind": "INTERFACE",
            "fields": { "name": { "type": "String" } }
        },
        "Human": {
            "kind": "OBJECT",
            "implements": ["Character"],
            "fields": { "name": { "type": "String" } }
        },
        "Review": {
            "kind": "OBJECT",
            "fields": { "stars": { "type": "Int!" } }
        }
    }
}"#;

const REVIEWS: &str = "subscription { reviewAdded { stars } }";

fn schema() -> Arc<Schema> {
    Arc::new(Schema::from_json(SCHEMA).unwrap())
}

struct Harness {
    router: Arc<SubscriptionEventRouter>,
    server: SubscriptionServer,
}

impl Harness {
    fn new() -> Self {
        Self::with_options(SubscriptionServerOptions::default())
    }

    fn with_options(options: SubscriptionServerOptions) -> Self {
        let router = Arc::new(SubscriptionEventRouter::default());
        let server = SubscriptionServer::builder(schema(), router.clone())
            .options(options)
            .executor(ActionExecutor(
                ProjectionExecutor::new()
                    .with_root_value(json!({ "hero": { "__typename": "Human", "name": "Leia" } })),
            ))
            .build();
        Self { router, server }
    }

    async fn connect(&self, protocol: &str) -> MemoryClient {
        let (client, connection) = memory_connection(Some(protocol));
        self.server.serve(connection).await.unwrap();
        client
    }

    /// Connects and completes the init handshake.
    async fn open(&self, protocol: &str) -> MemoryClient {
        let mut client = self.connect(protocol).await;
        client.send_json(&json!({ "type": "connection_init" }));
        assert_eq!(client.next_json().await.unwrap()["type"], "connection_ack");
        client
    }

    async fn publish(&self, event: &str, data: Value) -> usize {
        self.server
            .publisher()
            .publish(SubscriptionEvent::new("reviews", event, data))
            .await
    }
}

/// Lets tests pick the subscription action through the event data.
struct ActionExecutor(ProjectionExecutor);

#[async_trait]
impl QueryExecutor for ActionExecutor {
    async fn execute(
        &self,
        schema: &Schema,
        query: &PreparedQuery,
        event: Option<&SubscriptionEvent>,
    ) -> ExecutionResult {
        let action = match event.and_then(|e| e.data.get("action")).and_then(Value::as_str) {
            Some("skip") => SubscriptionAction::Skip,
            Some("complete") => SubscriptionAction::Complete,
            _ => SubscriptionAction::Continue,
        };
        self.0.execute(schema, query, event).await.with_action(action)
    }
}

/// Waits until every message sent so far on a legacy connection has been processed.
async fn sync_legacy(client: &mut MemoryClient) {
    client.send_json(&json!({ "type": "stop", "id": "sync" }));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["id"], "sync");
}

/// Waits until every message sent so far on a transport-ws connection has been processed.
async fn sync_transport(client: &mut MemoryClient) {
    client.send_json(&json!({ "type": "ping" }));
    assert_eq!(client.next_json().await.unwrap(), json!({ "type": "pong" }));
}

fn start(id: &str, query: &str) -> Value {
    json!({ "type": "start", "id": id, "payload": { "query": query } })
}

fn first_error(frame: &Value) -> &str {
    let payload = &frame["payload"];
    let error = if payload.is_array() { &payload[0] } else { payload };
    error["message"].as_str().unwrap_or_default()
}

/// Test the legacy protocol from start to stop.
#[tokio::test]
async fn test_legacy_subscription_lifecycle() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&start("1", REVIEWS));
    sync_legacy(&mut client).await;

    assert_eq!(harness.publish("REVIEW_ADDED", json!({ "stars": 5 })).await, 1);
    assert_eq!(
        client.next_json().await.unwrap(),
        json!({ "type": "data", "id": "1", "payload": { "data": { "reviewAdded": { "stars": 5 } } } })
    );

    client.send_json(&json!({ "type": "stop", "id": "1" }));
    assert_eq!(client.next_json().await.unwrap(), json!({ "type": "complete", "id": "1" }));

    client.send_json(&json!({ "type": "stop", "id": "1" }));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(first_error(&reply), "No active subscription with id '1'.");

    let route = SubscriptionEventName::new("reviews", "REVIEW_ADDED");
    assert_eq!(harness.router.receiver_count(&route).await, 0);
}

/// Test a second start with an id in use is rejected and the first keeps running.
#[tokio::test]
async fn test_duplicate_subscription_id() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&start("1", REVIEWS));
    client.send_json(&start("1", "subscription { heroChanged { name } }"));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "1");
    assert_eq!(first_error(&reply), "Subscriber for id '1' already exists.");

    harness.publish("REVIEW_ADDED", json!({ "stars": 3 })).await;
    let data = client.next_json().await.unwrap();
    assert_eq!(data["payload"]["data"]["reviewAdded"]["stars"], 3);
}

/// Test events only reach clients subscribed to their route.
#[tokio::test]
async fn test_event_fan_out_is_scoped_to_routes() {
    let harness = Harness::new();
    let mut reviews = harness.open("graphql-ws").await;
    let mut heroes = harness.open("graphql-ws").await;

    reviews.send_json(&start("r", REVIEWS));
    sync_legacy(&mut reviews).await;
    heroes.send_json(&start("h", "subscription { heroChanged { name } }"));
    sync_legacy(&mut heroes).await;

    assert_eq!(harness.publish("REVIEW_ADDED", json!({ "stars": 1 })).await, 1);
    assert_eq!(reviews.next_json().await.unwrap()["id"], "r");
    assert_eq!(heroes.try_next_frame(), None);

    assert_eq!(harness.publish("UNKNOWN", json!({})).await, 0);
}

/// Writes through until `stalled` is set, then never finishes a write again.
struct StallingWriter {
    frames: tokio::sync::mpsc::UnboundedSender<String>,
    stalled: Arc<AtomicBool>,
}

#[async_trait]
impl ConnectionWriter for StallingWriter {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        if self.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        let _ = self.frames.send(text);
        Ok(())
    }

    async fn close(&mut self, _status: u16, _description: &str) -> Result<(), ConnectionError> {
        Ok(())
    }
}

/// Test a client that stops reading does not hold up publishing to the others.
#[tokio::test]
async fn test_stalled_client_does_not_block_fan_out() {
    let harness = Harness::with_options(
        SubscriptionServerOptions::default()
            .no_keep_alive()
            .outbound_buffer(1),
    );

    let (stalled, mut connection) = memory_connection(Some("graphql-ws"));
    let (frames_tx, mut frames) = tokio::sync::mpsc::unbounded_channel();
    let stall = Arc::new(AtomicBool::new(false));
    connection.writer = Box::new(StallingWriter {
        frames: frames_tx,
        stalled: stall.clone(),
    });
    harness.server.serve(connection).await.unwrap();

    stalled.send_json(&json!({ "type": "connection_init" }));
    stalled.send_json(&start("s", REVIEWS));
    stalled.send_json(&json!({ "type": "stop", "id": "sync" }));
    let ack: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    assert_eq!(ack["type"], "connection_ack");
    let synced: Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    assert_eq!(synced["id"], "sync");
    stall.store(true, Ordering::SeqCst);

    let mut healthy = harness.open("graphql-ws").await;
    healthy.send_json(&start("h", REVIEWS));
    sync_legacy(&mut healthy).await;

    for stars in 0..20 {
        tokio::time::timeout(
            Duration::from_secs(2),
            harness.publish("REVIEW_ADDED", json!({ "stars": stars })),
        )
        .await
        .expect("publishing blocked on the stalled client");
        let data = healthy.next_json().await.unwrap();
        assert_eq!(data["id"], "h");
        assert_eq!(data["payload"]["data"]["reviewAdded"]["stars"], stars);
    }
}

/// Test queries over the subscription transport answer once and complete.
#[tokio::test]
async fn test_query_completes_immediately() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&start("q", "{ hero { name } }"));
    assert_eq!(
        client.next_json().await.unwrap(),
        json!({ "type": "data", "id": "q", "payload": { "data": { "hero": { "name": "Leia" } } } })
    );
    assert_eq!(client.next_json().await.unwrap(), json!({ "type": "complete", "id": "q" }));
}

/// Test a single syntax error gets a dedicated error frame and validation errors a result.
#[tokio::test]
async fn test_rejected_documents() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&start("1", "subscription { reviewAdded { stars }"));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "1");
    assert_eq!(reply["payload"]["extensions"]["code"], "SYNTAX_ERROR");

    client.send_json(&start("2", "subscription { reviewAdded { nope } }"));
    let data = client.next_json().await.unwrap();
    assert_eq!(data["type"], "data");
    assert_eq!(data["payload"]["errors"][0]["extensions"]["rule"], "5.3.1");
    assert!(data["payload"].get("data").is_none());
    assert_eq!(client.next_json().await.unwrap(), json!({ "type": "complete", "id": "2" }));
}

/// Test unknown message types are reported without closing the connection.
#[tokio::test]
async fn test_unknown_message_type() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&json!({ "type": "subscribe", "id": "1" }));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["type"], "error");
    insta::assert_snapshot!(
        first_error(&reply),
        @"The last message was not understood by the graphql-ws protocol."
    );

    client.send_text("not json");
    assert_eq!(client.next_json().await.unwrap()["type"], "error");

    client.send_bytes(vec![0xff, 0xfe]);
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(
        first_error(&reply),
        "The last message was not understood by the graphql-ws protocol."
    );

    client.send_json(&start("q", "{ hero { name } }"));
    assert_eq!(client.next_json().await.unwrap()["type"], "data");
}

/// Test executor actions: skip sends nothing, complete sends the result and a completion.
#[tokio::test]
async fn test_subscription_actions() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;
    client.send_json(&start("1", REVIEWS));
    sync_legacy(&mut client).await;

    harness
        .publish("REVIEW_ADDED", json!({ "stars": 1, "action": "skip" }))
        .await;
    harness
        .publish("REVIEW_ADDED", json!({ "stars": 2, "action": "complete" }))
        .await;

    let data = client.next_json().await.unwrap();
    assert_eq!(data["payload"]["data"]["reviewAdded"]["stars"], 2);
    assert_eq!(client.next_json().await.unwrap(), json!({ "type": "complete", "id": "1" }));

    client.send_json(&json!({ "type": "stop", "id": "1" }));
    assert_eq!(client.next_json().await.unwrap()["type"], "error");
}

/// Test the per-client subscription limit.
#[tokio::test]
async fn test_subscription_limit() {
    let harness =
        Harness::with_options(SubscriptionServerOptions::default().max_subscriptions_per_client(1));
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&start("1", REVIEWS));
    client.send_json(&start("2", REVIEWS));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["id"], "2");
    assert_eq!(
        first_error(&reply),
        "The client already has the maximum of 1 active subscriptions."
    );
}

/// Test the graphql-transport-ws protocol tokens.
#[tokio::test]
async fn test_transport_ws_subscription() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-transport-ws").await;

    client.send_json(&json!({ "type": "subscribe", "id": "a", "payload": { "query": REVIEWS } }));
    sync_transport(&mut client).await;
    harness.publish("REVIEW_ADDED", json!({ "stars": 4 })).await;
    assert_eq!(
        client.next_json().await.unwrap(),
        json!({ "type": "next", "id": "a", "payload": { "data": { "reviewAdded": { "stars": 4 } } } })
    );

    client.send_json(&json!({ "type": "complete", "id": "a" }));
    assert_eq!(client.next_json().await.unwrap(), json!({ "type": "complete", "id": "a" }));

    client.send_json(&json!({ "type": "pong" }));
    client.send_json(&json!({ "type": "subscribe", "id": "b", "payload": { "query": "{ hero {" } }));
    let reply = client.next_json().await.unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["payload"][0]["extensions"]["code"], "SYNTAX_ERROR");
}

/// Test the graphql-transport-ws close codes.
#[tokio::test]
async fn test_transport_ws_close_codes() {
    let harness = Harness::new();

    let mut early = harness.connect("graphql-transport-ws").await;
    early.send_json(&json!({ "type": "subscribe", "id": "a", "payload": { "query": REVIEWS } }));
    assert_eq!(early.next_frame().await, Some(ServerFrame::Close(4401, "Unauthorized".into())));

    let mut twice = harness.open("graphql-transport-ws").await;
    twice.send_json(&json!({ "type": "connection_init" }));
    assert_eq!(
        twice.next_frame().await,
        Some(ServerFrame::Close(4429, "Too many initialisation requests".into()))
    );

    let mut garbage = harness.open("graphql-transport-ws").await;
    garbage.send_text("{");
    assert_eq!(
        garbage.next_frame().await,
        Some(ServerFrame::Close(4400, "Invalid message received".into()))
    );

    let mut binary = harness.open("graphql-transport-ws").await;
    binary.send_bytes(vec![0xc3, 0x28]);
    assert_eq!(
        binary.next_frame().await,
        Some(ServerFrame::Close(4400, "Invalid message received".into()))
    );
}

/// Test unsupported protocols are refused.
#[tokio::test]
async fn test_unsupported_protocol() {
    let harness = Harness::new();
    let (mut client, connection) = memory_connection(Some("mqtt"));

    let error = harness.server.serve(connection).await.unwrap_err();
    assert!(matches!(error, SubscriptionError::UnsupportedProtocol(ref p) if p == "mqtt"));
    assert_eq!(
        client.next_frame().await,
        Some(ServerFrame::Close(1002, "Unsupported subprotocol".into()))
    );
}

/// Test a client that never initializes is closed after the timeout.
#[tokio::test(start_paused = true)]
async fn test_connection_init_timeout() {
    let harness = Harness::with_options(
        SubscriptionServerOptions::default().connection_init_timeout(Duration::from_secs(3)),
    );
    let mut client = harness.connect("graphql-ws").await;

    assert_eq!(
        client.next_frame().await,
        Some(ServerFrame::Close(4408, "Connection initialisation timeout".into()))
    );
}

/// Test keep-alive messages use each protocol's token.
#[tokio::test(start_paused = true)]
async fn test_keep_alive_messages() {
    let harness = Harness::with_options(
        SubscriptionServerOptions::default().keep_alive(Duration::from_secs(30)),
    );

    let mut legacy = harness.open("graphql-ws").await;
    assert_eq!(legacy.next_json().await.unwrap(), json!({ "type": "ka" }));
    assert_eq!(legacy.next_json().await.unwrap(), json!({ "type": "ka" }));

    let mut transport = harness.open("graphql-transport-ws").await;
    assert_eq!(transport.next_json().await.unwrap(), json!({ "type": "ping" }));
}

/// Test a dropped client releases its subscriptions and routes.
#[tokio::test]
async fn test_disconnect_releases_subscriptions() {
    let harness = Harness::new();
    let (mut client, connection) = memory_connection(Some("graphql-ws"));
    let session = harness.server.serve(connection).await.unwrap();

    client.send_json(&json!({ "type": "connection_init" }));
    client.next_json().await.unwrap();
    client.send_json(&start("1", REVIEWS));
    sync_legacy(&mut client).await;
    let route = SubscriptionEventName::new("reviews", "REVIEW_ADDED");
    assert_eq!(harness.router.receiver_count(&route).await, 1);

    client.disconnect();
    session.closed().await;

    assert_eq!(session.state(), ConnectionState::Aborted);
    assert_eq!(harness.router.receiver_count(&route).await, 0);
    assert_eq!(harness.server.client_count().await, 0);
    assert_eq!(harness.publish("REVIEW_ADDED", json!({ "stars": 1 })).await, 0);
}

/// Test connection_terminate closes normally.
#[tokio::test]
async fn test_connection_terminate() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    client.send_json(&json!({ "type": "connection_terminate" }));
    assert_eq!(
        client.next_frame().await,
        Some(ServerFrame::Close(1000, "Connection terminated".into()))
    );
}

/// Test shutdown closes every connection.
#[tokio::test]
async fn test_shutdown() {
    let harness = Harness::new();
    let mut client = harness.open("graphql-ws").await;

    harness.server.shutdown().await;
    assert_eq!(
        client.next_frame().await,
        Some(ServerFrame::Close(1000, "Server shutting down".into()))
    );

    let (_late, connection) = memory_connection(Some("graphql-ws"));
    assert!(matches!(
        harness.server.serve(connection).await,
        Err(SubscriptionError::ShuttingDown)
    ));
}
