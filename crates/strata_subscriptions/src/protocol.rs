//! Sub-protocol names and negotiation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The legacy Apollo protocol name.
pub const GRAPHQL_WS: &str = "graphql-ws";
/// Alternate names clients use for the legacy protocol.
pub const SUBSCRIPTIONS_TRANSPORT_WS: &str = "subscriptions-transport-ws";
pub const SUBSCRIPTION_TRANSPORT_WS: &str = "subscription-transport-ws";
/// The graphql-ws library protocol name.
pub const GRAPHQL_TRANSPORT_WS: &str = "graphql-transport-ws";

/// A supported GraphQL over WebSocket protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionProtocol {
    /// The legacy `subscriptions-transport-ws` protocol, announced as `graphql-ws`.
    #[serde(
        rename = "graphql-ws",
        alias = "subscriptions-transport-ws",
        alias = "subscription-transport-ws"
    )]
    GraphqlWs,
    /// The `graphql-ws` library protocol, announced as `graphql-transport-ws`.
    #[serde(rename = "graphql-transport-ws")]
    GraphqlTransportWs,
}

impl SubscriptionProtocol {
    pub const ALL: [Self; 2] = [Self::GraphqlTransportWs, Self::GraphqlWs];

    /// The name echoed back in the `Sec-WebSocket-Protocol` header.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GraphqlWs => GRAPHQL_WS,
            Self::GraphqlTransportWs => GRAPHQL_TRANSPORT_WS,
        }
    }

    /// Every name a client may request the protocol by.
    #[must_use]
    pub const fn names(self) -> &'static [&'static str] {
        match self {
            Self::GraphqlWs => &[GRAPHQL_WS, SUBSCRIPTION_TRANSPORT_WS, SUBSCRIPTIONS_TRANSPORT_WS],
            Self::GraphqlTransportWs => &[GRAPHQL_TRANSPORT_WS],
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|protocol| protocol.names().iter().any(|n| n.eq_ignore_ascii_case(name)))
    }
}

impl fmt::Display for SubscriptionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Picks the protocol for a connection from the client's `Sec-WebSocket-Protocol` header.
///
/// The first requested name the server supports wins. Without a header the default protocol
/// is used. Returns `None` when nothing acceptable was requested.
#[must_use]
pub fn negotiate(
    requested: Option<&str>,
    supported: &[SubscriptionProtocol],
    default: Option<SubscriptionProtocol>,
) -> Option<SubscriptionProtocol> {
    let requested = requested.map(str::trim).filter(|h| !h.is_empty());
    let Some(header) = requested else {
        return default.filter(|d| supported.contains(d));
    };

    header
        .split(',')
        .filter_map(|name| SubscriptionProtocol::from_name(name.trim()))
        .find(|protocol| supported.contains(protocol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!(
            SubscriptionProtocol::from_name("subscriptions-transport-ws"),
            Some(SubscriptionProtocol::GraphqlWs)
        );
        assert_eq!(
            SubscriptionProtocol::from_name("subscription-transport-ws"),
            Some(SubscriptionProtocol::GraphqlWs)
        );
        assert_eq!(
            SubscriptionProtocol::from_name("graphql-transport-ws"),
            Some(SubscriptionProtocol::GraphqlTransportWs)
        );
        assert_eq!(SubscriptionProtocol::from_name("mqtt"), None);
        assert_eq!(SubscriptionProtocol::GraphqlWs.to_string(), "graphql-ws");
    }

    #[test]
    fn test_negotiate_prefers_client_order() {
        let all = SubscriptionProtocol::ALL;
        assert_eq!(
            negotiate(Some("mqtt, graphql-ws, graphql-transport-ws"), &all, None),
            Some(SubscriptionProtocol::GraphqlWs)
        );
        assert_eq!(
            negotiate(Some("graphql-ws"), &[SubscriptionProtocol::GraphqlTransportWs], None),
            None
        );
    }

    #[test]
    fn test_negotiate_default() {
        let all = SubscriptionProtocol::ALL;
        assert_eq!(
            negotiate(None, &all, Some(SubscriptionProtocol::GraphqlWs)),
            Some(SubscriptionProtocol::GraphqlWs)
        );
        assert_eq!(negotiate(Some("  "), &all, None), None);
    }
}
