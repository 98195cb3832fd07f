//! Published subscription events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// The route an event travels on: a schema and an event name within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionEventName {
    pub schema: String,
    pub event: String,
}

impl SubscriptionEventName {
    pub fn new(schema: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            event: event.into(),
        }
    }
}

impl fmt::Display for SubscriptionEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}", self.schema, self.event)
    }
}

/// A fact published by application code. Never changes once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub id: String,
    pub schema_type_name: String,
    pub event_name: String,
    pub data: serde_json::Value,
    /// The graph type of `data`, used as its `__typename` when the data carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type_name: Option<String>,
}

impl SubscriptionEvent {
    pub fn new(
        schema_type_name: impl Into<String>,
        event_name: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed).to_string(),
            schema_type_name: schema_type_name.into(),
            event_name: event_name.into(),
            data,
            data_type_name: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_data_type(mut self, type_name: impl Into<String>) -> Self {
        self.data_type_name = Some(type_name.into());
        self
    }

    /// The route the event is delivered on.
    #[must_use]
    pub fn route(&self) -> SubscriptionEventName {
        SubscriptionEventName::new(&self.schema_type_name, &self.event_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_route() {
        let event = SubscriptionEvent::new("reviews", "REVIEW_ADDED", serde_json::json!({}))
            .with_data_type("Review");
        assert_eq!(event.route(), SubscriptionEventName::new("reviews", "REVIEW_ADDED"));
        assert_eq!(event.route().to_string(), "[reviews]:REVIEW_ADDED");
        assert_eq!(event.data_type_name.as_deref(), Some("Review"));
        assert_ne!(
            event.id,
            SubscriptionEvent::new("reviews", "REVIEW_ADDED", serde_json::Value::Null).id
        );
    }
}
