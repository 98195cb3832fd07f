//! Server and router configuration.

use crate::protocol::SubscriptionProtocol;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Subscription server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionServerOptions {
    /// Interval between keep-alive messages. `None` disables keep-alive.
    #[serde(with = "duration_ms::option")]
    pub keep_alive_interval: Option<Duration>,
    /// Protocols the server accepts, in order of preference.
    pub supported_protocols: Vec<SubscriptionProtocol>,
    /// Protocol used when the client does not request one.
    pub default_protocol: Option<SubscriptionProtocol>,
    /// Maximum number of active subscriptions per client. `None` means unlimited.
    pub max_subscriptions_per_client: Option<usize>,
    /// Time a client has to send its connection init message.
    #[serde(with = "duration_ms")]
    pub connection_init_timeout: Duration,
    /// Capacity of each client's outbound and event queues.
    pub outbound_buffer: usize,
}

impl Default for SubscriptionServerOptions {
    fn default() -> Self {
        Self {
            keep_alive_interval: Some(Duration::from_secs(120)),
            supported_protocols: vec![
                SubscriptionProtocol::GraphqlTransportWs,
                SubscriptionProtocol::GraphqlWs,
            ],
            default_protocol: Some(SubscriptionProtocol::GraphqlWs),
            max_subscriptions_per_client: None,
            connection_init_timeout: Duration::from_secs(10),
            outbound_buffer: 64,
        }
    }
}

impl SubscriptionServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn no_keep_alive(mut self) -> Self {
        self.keep_alive_interval = None;
        self
    }

    #[must_use]
    pub fn protocols(mut self, protocols: impl IntoIterator<Item = SubscriptionProtocol>) -> Self {
        self.supported_protocols = protocols.into_iter().collect();
        self
    }

    #[must_use]
    pub fn default_protocol(mut self, protocol: Option<SubscriptionProtocol>) -> Self {
        self.default_protocol = protocol;
        self
    }

    #[must_use]
    pub fn max_subscriptions_per_client(mut self, max: usize) -> Self {
        self.max_subscriptions_per_client = Some(max);
        self
    }

    #[must_use]
    pub fn connection_init_timeout(mut self, timeout: Duration) -> Self {
        self.connection_init_timeout = timeout;
        self
    }

    #[must_use]
    pub fn outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }
}

/// Event router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionEventRouterOptions {
    /// Maximum number of receivers an event is handed to at once.
    pub max_concurrent_dispatches: usize,
}

impl Default for SubscriptionEventRouterOptions {
    fn default() -> Self {
        Self {
            max_concurrent_dispatches: 50,
        }
    }
}

/// Durations as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}
