//! The subscription server: accepts connections and fans router events out to clients.

use crate::connection::{close_status, ClientConnection};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::event::{SubscriptionEvent, SubscriptionEventName};
use crate::execution::{ProjectionExecutor, QueryExecutor};
use crate::options::SubscriptionServerOptions;
use crate::pipeline::DocumentPipeline;
use crate::protocol::{negotiate, SubscriptionProtocol};
use crate::proxy::{read_frames, write_frames, SubscriptionClientProxy};
use crate::router::{InProcessEventPublisher, SubscriptionEventReceiver, SubscriptionEventRouter};
use crate::state::{ConnectionState, SharedConnectionState};
use crate::writer::{JsonResponseWriter, ResponseWriter};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_schema::Schema;
use strata_validation::ValidationOptions;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Identifies a connected client within one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Shared server state. Registered with the router as the receiver for every route a
/// client listens on.
pub(crate) struct ServerInner {
    pub(crate) schema: Arc<Schema>,
    pub(crate) pipeline: DocumentPipeline,
    pub(crate) executor: Arc<dyn QueryExecutor>,
    pub(crate) writer: Arc<dyn ResponseWriter>,
    pub(crate) options: SubscriptionServerOptions,
    pub(crate) shutdown: CancellationToken,
    router: Arc<SubscriptionEventRouter>,
    clients: RwLock<FxHashMap<ClientId, mpsc::Sender<Arc<SubscriptionEvent>>>>,
    /// Route → client → number of that client's subscriptions on the route.
    routes: Mutex<FxHashMap<SubscriptionEventName, FxHashMap<ClientId, usize>>>,
    tracker: TaskTracker,
    next_client: AtomicU64,
}

impl ServerInner {
    fn as_receiver(self: &Arc<Self>) -> Arc<dyn SubscriptionEventReceiver> {
        self.clone()
    }

    /// Records a client's interest in a route. The server starts listening on the route with
    /// its first subscription.
    pub(crate) async fn register_route(self: &Arc<Self>, client: ClientId, route: SubscriptionEventName) {
        let mut routes = self.routes.lock().await;
        let listeners = routes.entry(route.clone()).or_default();
        let first = listeners.is_empty();
        *listeners.entry(client).or_default() += 1;
        if first {
            self.router.add_receiver(route.clone(), self.as_receiver()).await;
            debug!(route = %route, "server listening on route");
        }
    }

    /// Drops one subscription's interest in a route. The server stops listening once no
    /// client has a subscription on it.
    pub(crate) async fn release_route(self: &Arc<Self>, client: ClientId, route: &SubscriptionEventName) {
        let mut routes = self.routes.lock().await;
        let Some(listeners) = routes.get_mut(route) else {
            return;
        };
        if let Some(count) = listeners.get_mut(&client) {
            *count -= 1;
            if *count == 0 {
                listeners.remove(&client);
            }
        }
        if listeners.is_empty() {
            routes.remove(route);
            self.router.remove_receiver(route, &self.as_receiver()).await;
            debug!(route = %route, "server stopped listening on route");
        }
    }

    pub(crate) async fn remove_client(&self, client: ClientId) {
        self.clients.write().await.remove(&client);
    }
}

#[async_trait]
impl SubscriptionEventReceiver for ServerInner {
    async fn receive_event(&self, event: Arc<SubscriptionEvent>) {
        let route = event.route();
        let interested: Vec<ClientId> = {
            let routes = self.routes.lock().await;
            routes
                .get(&route)
                .map(|listeners| listeners.keys().copied().collect())
                .unwrap_or_default()
        };
        let senders: Vec<_> = {
            let clients = self.clients.read().await;
            interested
                .iter()
                .filter_map(|id| clients.get(id).map(|tx| (*id, tx.clone())))
                .collect()
        };
        // A client that stops draining its queue loses events; it never holds up the others.
        for (client, sender) in senders {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        %client,
                        event_name = %event.event_name,
                        "client event queue is full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(%client, "client is gone, event dropped");
                }
            }
        }
    }
}

/// A GraphQL over WebSocket subscription server.
#[derive(Clone)]
pub struct SubscriptionServer {
    inner: Arc<ServerInner>,
}

impl fmt::Debug for SubscriptionServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionServer")
            .field("schema", &self.inner.schema.name)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SubscriptionServer`].
pub struct SubscriptionServerBuilder {
    schema: Arc<Schema>,
    router: Arc<SubscriptionEventRouter>,
    options: SubscriptionServerOptions,
    validation: ValidationOptions,
    executor: Arc<dyn QueryExecutor>,
    writer: Arc<dyn ResponseWriter>,
}

impl SubscriptionServerBuilder {
    #[must_use]
    pub fn options(mut self, options: SubscriptionServerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn validation(mut self, options: ValidationOptions) -> Self {
        self.validation = options;
        self
    }

    #[must_use]
    pub fn executor(mut self, executor: impl QueryExecutor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    #[must_use]
    pub fn writer(mut self, writer: impl ResponseWriter + 'static) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    pub fn build(self) -> SubscriptionServer {
        let pipeline = DocumentPipeline::with_validation(self.schema.clone(), self.validation);
        SubscriptionServer {
            inner: Arc::new(ServerInner {
                schema: self.schema,
                pipeline,
                executor: self.executor,
                writer: self.writer,
                options: self.options,
                shutdown: CancellationToken::new(),
                router: self.router,
                clients: RwLock::new(FxHashMap::default()),
                routes: Mutex::new(FxHashMap::default()),
                tracker: TaskTracker::new(),
                next_client: AtomicU64::new(1),
            }),
        }
    }
}

/// A connection the server took over.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: ClientId,
    pub protocol: SubscriptionProtocol,
    state: SharedConnectionState,
}

impl ClientSession {
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Waits until the connection has been torn down.
    pub async fn closed(&self) {
        self.state.closed().await;
    }
}

impl SubscriptionServer {
    pub fn builder(schema: Arc<Schema>, router: Arc<SubscriptionEventRouter>) -> SubscriptionServerBuilder {
        SubscriptionServerBuilder {
            schema,
            router,
            options: SubscriptionServerOptions::default(),
            validation: ValidationOptions::default(),
            executor: Arc::new(ProjectionExecutor::new()),
            writer: Arc::new(JsonResponseWriter),
        }
    }

    /// A server with default options and the projection executor.
    pub fn new(schema: Arc<Schema>, router: Arc<SubscriptionEventRouter>) -> Self {
        Self::builder(schema, router).build()
    }

    #[must_use]
    pub fn options(&self) -> &SubscriptionServerOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    /// A publisher delivering into this server's router.
    #[must_use]
    pub fn publisher(&self) -> InProcessEventPublisher {
        InProcessEventPublisher::new(self.inner.router.clone())
    }

    pub async fn client_count(&self) -> usize {
        self.inner.clients.read().await.len()
    }

    /// Picks the protocol a connection requesting `header` would get.
    #[must_use]
    pub fn negotiate(&self, header: Option<&str>) -> Option<SubscriptionProtocol> {
        let options = &self.inner.options;
        negotiate(header, &options.supported_protocols, options.default_protocol)
    }

    /// Takes over a connection and serves it in the background.
    ///
    /// Fails when no requested protocol is supported or the server is shutting down; the
    /// connection is closed in both cases.
    pub async fn serve(&self, connection: ClientConnection) -> SubscriptionResult<ClientSession> {
        let ClientConnection {
            reader,
            mut writer,
            requested_protocols,
            peer,
        } = connection;

        if self.inner.shutdown.is_cancelled() {
            let _ = writer.close(close_status::NORMAL, "Server shutting down").await;
            return Err(SubscriptionError::ShuttingDown);
        }
        let Some(protocol) = self.negotiate(requested_protocols.as_deref()) else {
            let requested = requested_protocols.unwrap_or_default();
            warn!(peer = peer.as_deref().unwrap_or("-"), %requested, "no supported protocol requested");
            let _ = writer
                .close(close_status::PROTOCOL_ERROR, "Unsupported subprotocol")
                .await;
            return Err(SubscriptionError::UnsupportedProtocol(requested));
        };

        let id = ClientId(self.inner.next_client.fetch_add(1, Ordering::Relaxed));
        let capacity = self.inner.options.outbound_buffer.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        self.inner.clients.write().await.insert(id, event_tx);

        let state = SharedConnectionState::new();
        let proxy = SubscriptionClientProxy::new(
            id,
            self.inner.clone(),
            protocol,
            state.clone(),
            outbound_tx,
        );
        let converter = crate::messages::converter(protocol);
        self.inner.tracker.spawn(read_frames(reader, inbound_tx));
        self.inner
            .tracker
            .spawn(write_frames(writer, outbound_rx, self.inner.clone(), converter, id));
        self.inner.tracker.spawn(proxy.run(inbound_rx, event_rx));

        info!(client = %id, %protocol, peer = peer.as_deref().unwrap_or("-"), "client connected");
        Ok(ClientSession { id, protocol, state })
    }

    /// Closes every connection and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("subscription server stopped");
    }
}
