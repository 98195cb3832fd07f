//! The event router: fans published events out to the receivers listening on their route.

use crate::event::{SubscriptionEvent, SubscriptionEventName};
use crate::options::SubscriptionEventRouterOptions;
use async_trait::async_trait;
use futures::future::join_all;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, trace};

/// Something that wants the events of one or more routes.
#[async_trait]
pub trait SubscriptionEventReceiver: Send + Sync {
    async fn receive_event(&self, event: Arc<SubscriptionEvent>);
}

/// Publishes events without knowing who listens.
#[async_trait]
pub trait SubscriptionEventPublisher: Send + Sync {
    /// Publishes an event. Returns the number of receivers it was handed to.
    async fn publish(&self, event: SubscriptionEvent) -> usize;
}

/// Routes published events to receivers by [`SubscriptionEventName`].
pub struct SubscriptionEventRouter {
    receivers: RwLock<FxHashMap<SubscriptionEventName, Vec<Arc<dyn SubscriptionEventReceiver>>>>,
    dispatch_limit: Arc<Semaphore>,
}

impl std::fmt::Debug for SubscriptionEventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEventRouter")
            .field("available_dispatches", &self.dispatch_limit.available_permits())
            .finish_non_exhaustive()
    }
}

impl Default for SubscriptionEventRouter {
    fn default() -> Self {
        Self::new(SubscriptionEventRouterOptions::default())
    }
}

impl SubscriptionEventRouter {
    pub fn new(options: SubscriptionEventRouterOptions) -> Self {
        Self {
            receivers: RwLock::new(FxHashMap::default()),
            dispatch_limit: Arc::new(Semaphore::new(options.max_concurrent_dispatches.max(1))),
        }
    }

    /// Registers a receiver for a route. Registering the same receiver twice has no effect.
    pub async fn add_receiver(
        &self,
        route: SubscriptionEventName,
        receiver: Arc<dyn SubscriptionEventReceiver>,
    ) {
        let mut receivers = self.receivers.write().await;
        let listeners = receivers.entry(route.clone()).or_default();
        if listeners.iter().any(|r| Arc::ptr_eq(r, &receiver)) {
            return;
        }
        listeners.push(receiver);
        debug!(route = %route, listeners = listeners.len(), "receiver added");
    }

    /// Removes a receiver from a route. Returns whether it was registered.
    pub async fn remove_receiver(
        &self,
        route: &SubscriptionEventName,
        receiver: &Arc<dyn SubscriptionEventReceiver>,
    ) -> bool {
        let mut receivers = self.receivers.write().await;
        let Some(listeners) = receivers.get_mut(route) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|r| !Arc::ptr_eq(r, receiver));
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            receivers.remove(route);
        }
        if removed {
            debug!(route = %route, "receiver removed");
        }
        removed
    }

    /// Removes a receiver from every route it listens on.
    pub async fn remove_receiver_everywhere(&self, receiver: &Arc<dyn SubscriptionEventReceiver>) {
        let mut receivers = self.receivers.write().await;
        receivers.retain(|_, listeners| {
            listeners.retain(|r| !Arc::ptr_eq(r, receiver));
            !listeners.is_empty()
        });
    }

    pub async fn receiver_count(&self, route: &SubscriptionEventName) -> usize {
        self.receivers.read().await.get(route).map_or(0, Vec::len)
    }

    pub async fn route_count(&self) -> usize {
        self.receivers.read().await.len()
    }

    /// Hands an event to every receiver of its route. Returns the number of receivers.
    pub async fn raise_published_event(&self, event: SubscriptionEvent) -> usize {
        let route = event.route();
        let listeners = {
            let receivers = self.receivers.read().await;
            receivers.get(&route).cloned().unwrap_or_default()
        };
        if listeners.is_empty() {
            trace!(route = %route, "event has no receivers");
            return 0;
        }

        let event = Arc::new(event);
        let deliveries = listeners.iter().map(|receiver| {
            let event = event.clone();
            let limit = self.dispatch_limit.clone();
            async move {
                // the semaphore is never closed
                let _permit = limit.acquire_owned().await.ok();
                receiver.receive_event(event).await;
            }
        });
        join_all(deliveries).await;

        debug!(route = %route, event_id = %event.id, receivers = listeners.len(), "event dispatched");
        listeners.len()
    }
}

/// Publishes straight into a router in the same process.
#[derive(Debug, Clone)]
pub struct InProcessEventPublisher {
    router: Arc<SubscriptionEventRouter>,
}

impl InProcessEventPublisher {
    pub fn new(router: Arc<SubscriptionEventRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl SubscriptionEventPublisher for InProcessEventPublisher {
    async fn publish(&self, event: SubscriptionEvent) -> usize {
        self.router.raise_published_event(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SubscriptionEventReceiver for Recorder {
        async fn receive_event(&self, event: Arc<SubscriptionEvent>) {
            self.seen.lock().await.push(event.event_name.clone());
        }
    }

    fn route(event: &str) -> SubscriptionEventName {
        SubscriptionEventName::new("schema", event)
    }

    #[tokio::test]
    async fn test_events_reach_only_their_route() {
        let router = Arc::new(SubscriptionEventRouter::default());
        let added = Arc::new(Recorder::default());
        let removed = Arc::new(Recorder::default());
        router.add_receiver(route("ADDED"), added.clone()).await;
        router.add_receiver(route("REMOVED"), removed.clone()).await;

        let publisher = InProcessEventPublisher::new(router.clone());
        let delivered = publisher
            .publish(SubscriptionEvent::new("schema", "ADDED", serde_json::json!(1)))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(*added.seen.lock().await, vec!["ADDED"]);
        assert!(removed.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_receivers_are_registered_once() {
        let router = SubscriptionEventRouter::default();
        let receiver: Arc<dyn SubscriptionEventReceiver> = Arc::new(Recorder::default());
        router.add_receiver(route("ADDED"), receiver.clone()).await;
        router.add_receiver(route("ADDED"), receiver.clone()).await;
        assert_eq!(router.receiver_count(&route("ADDED")).await, 1);

        assert!(router.remove_receiver(&route("ADDED"), &receiver).await);
        assert!(!router.remove_receiver(&route("ADDED"), &receiver).await);
        assert_eq!(router.route_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_everywhere() {
        let router = SubscriptionEventRouter::default();
        let receiver: Arc<dyn SubscriptionEventReceiver> = Arc::new(Recorder::default());
        let other: Arc<dyn SubscriptionEventReceiver> = Arc::new(Recorder::default());
        router.add_receiver(route("A"), receiver.clone()).await;
        router.add_receiver(route("B"), receiver.clone()).await;
        router.add_receiver(route("B"), other).await;

        router.remove_receiver_everywhere(&receiver).await;
        assert_eq!(router.route_count().await, 1);
        assert_eq!(router.receiver_count(&route("B")).await, 1);
        assert_eq!(
            router
                .raise_published_event(SubscriptionEvent::new("schema", "A", serde_json::Value::Null))
                .await,
            0
        );
    }
}
