//! GraphQL subscriptions over WebSocket for strata.
//!
//! A [`SubscriptionServer`] takes over client connections, speaks either the legacy
//! `graphql-ws` protocol or `graphql-transport-ws`, and runs one protocol state machine per
//! client. Application code publishes [`SubscriptionEvent`]s through a
//! [`SubscriptionEventRouter`]; the server re-executes each matching subscription against the
//! event data and pushes the result to its client.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_schema::Schema;
//! use strata_subscriptions::{
//!     memory_connection, SubscriptionEvent, SubscriptionEventPublisher,
//!     SubscriptionEventRouter, SubscriptionServer,
//! };
//!
//! # async fn run(schema: Schema) -> Result<(), Box<dyn std::error::Error>> {
//! let router = Arc::new(SubscriptionEventRouter::default());
//! let server = SubscriptionServer::new(Arc::new(schema), router);
//!
//! let (client, connection) = memory_connection(Some("graphql-ws"));
//! server.serve(connection).await?;
//!
//! server
//!     .publisher()
//!     .publish(SubscriptionEvent::new("reviews", "REVIEW_ADDED", serde_json::json!({ "stars": 5 })))
//!     .await;
//! # drop(client);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod event;
pub mod execution;
pub mod keep_alive;
pub mod memory;
pub mod messages;
pub mod options;
pub mod pipeline;
pub mod protocol;
mod proxy;
pub mod router;
pub mod server;
pub mod state;
pub mod subscription;
pub mod websocket;
pub mod writer;

pub use connection::{close_status, ClientConnection, ConnectionFrame, ConnectionReader, ConnectionWriter};
pub use error::{
    ConnectionError, ConnectionFailure, ResponseWriteError, SubscriptionError, SubscriptionResult,
};
pub use event::{SubscriptionEvent, SubscriptionEventName};
pub use execution::{
    ExecutionResult, ProjectionExecutor, QueryExecutor, QueryRequest, SubscriptionAction,
};
pub use keep_alive::KeepAliveTimer;
pub use memory::{memory_connection, MemoryClient, ServerFrame};
pub use messages::{
    ClientMessage, ClientMessageKind, MessageConverter, ServerMessage, ServerMessageKind,
    ServerPayload,
};
pub use options::{SubscriptionEventRouterOptions, SubscriptionServerOptions};
pub use pipeline::{DocumentPipeline, PreparationFailure, PreparedQuery};
pub use protocol::{negotiate, SubscriptionProtocol};
pub use router::{
    InProcessEventPublisher, SubscriptionEventPublisher, SubscriptionEventReceiver,
    SubscriptionEventRouter,
};
pub use server::{ClientId, ClientSession, SubscriptionServer, SubscriptionServerBuilder};
pub use state::{ConnectionState, SharedConnectionState};
pub use subscription::{ClientSubscription, SubscriptionCollection};
pub use writer::{JsonResponseWriter, ResponseWriter};

#[cfg(test)]
pub(crate) mod tests {
    use strata_schema::Schema;

    pub(crate) const SCHEMA: &str = r#"{
        "name": "reviews",
        "types": {
            "Query": {
                "kind": "OBJECT",
                "fields": {
                    "hero": { "type": "Character" }
                }
            },
            "Subscription": {
                "kind": "OBJECT",
                "fields": {
                    "reviewAdded": { "type": "Review", "event_name": "REVIEW_ADDED" },
                    "heroChanged": { "type": "Character" }
                }
            },
            "Character": {
                "kind": "INTERFACE",
                "fields": { "name": { "type": "String" } }
            },
            "Human": {
                "kind": "OBJECT",
                "implements": ["Character"],
                "fields": {
                    "name": { "type": "String" },
                    "height": { "type": "Float" }
                }
            },
            "Review": {
                "kind": "OBJECT",
                "fields": {
                    "stars": { "type": "Int!" },
                    "commentary": { "type": "String" }
                }
            }
        }
    }"#;

    pub(crate) fn schema() -> Schema {
        Schema::from_json(SCHEMA).unwrap()
    }
}
