//! A client's active subscriptions.

use crate::event::SubscriptionEventName;
use crate::pipeline::PreparedQuery;
use indexmap::IndexMap;
use std::sync::Arc;

/// One subscription opened by a client.
#[derive(Debug, Clone)]
pub struct ClientSubscription {
    /// The id the client chose.
    pub id: String,
    pub route: SubscriptionEventName,
    pub query: Arc<PreparedQuery>,
}

/// Subscriptions keyed by client-chosen id, in the order they were started.
#[derive(Debug, Default)]
pub struct SubscriptionCollection {
    by_id: IndexMap<String, ClientSubscription>,
}

impl SubscriptionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription. An id already in use is rejected and the existing one kept.
    pub fn add(&mut self, subscription: ClientSubscription) -> Result<(), ClientSubscription> {
        if self.by_id.contains_key(&subscription.id) {
            return Err(subscription);
        }
        self.by_id.insert(subscription.id.clone(), subscription);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientSubscription> {
        self.by_id.shift_remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Subscriptions listening on a route.
    #[must_use]
    pub fn for_route(&self, route: &SubscriptionEventName) -> Vec<ClientSubscription> {
        self.by_id
            .values()
            .filter(|s| &s.route == route)
            .cloned()
            .collect()
    }

    /// Removes and returns every subscription.
    pub fn drain(&mut self) -> Vec<ClientSubscription> {
        self.by_id.drain(..).map(|(_, s)| s).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::QueryRequest;
    use crate::pipeline::DocumentPipeline;
    use crate::tests::schema;

    fn subscription(id: &str, event: &str) -> ClientSubscription {
        let pipeline = DocumentPipeline::new(Arc::new(schema()));
        let query = pipeline
            .prepare(QueryRequest::new("subscription { reviewAdded { stars } }"))
            .unwrap();
        ClientSubscription {
            id: id.to_string(),
            route: SubscriptionEventName::new("reviews", event),
            query: Arc::new(query),
        }
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let mut subscriptions = SubscriptionCollection::new();
        subscriptions.add(subscription("1", "A")).unwrap();
        let rejected = subscriptions.add(subscription("1", "B")).unwrap_err();

        assert_eq!(rejected.route.event, "B");
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions.for_route(&SubscriptionEventName::new("reviews", "A")).len(), 1);
    }

    #[test]
    fn test_remove_and_drain() {
        let mut subscriptions = SubscriptionCollection::new();
        subscriptions.add(subscription("1", "A")).unwrap();
        subscriptions.add(subscription("2", "A")).unwrap();

        assert!(subscriptions.remove("1").is_some());
        assert!(subscriptions.remove("1").is_none());
        assert_eq!(subscriptions.drain().len(), 1);
        assert!(subscriptions.is_empty());
    }
}
