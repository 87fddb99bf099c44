//! Destination grammar for exchange and queue targets.

use std::fmt::{Display, Formatter};

const EXCHANGE_SEGMENT: &str = "exchange";
const QUEUE_SEGMENT: &str = "queue";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Exchange {
        exchange: String,
        routing_key: Option<String>,
    },
    Queue {
        queue: String,
    },
}

impl Destination {
    pub fn exchange(exchange: impl Into<String>) -> Self {
        Destination::Exchange {
            exchange: exchange.into(),
            routing_key: None,
        }
    }

    /// An empty `routing_key` addresses the bare exchange.
    pub fn exchange_with_key(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        let routing_key = routing_key.into();
        Destination::Exchange {
            exchange: exchange.into(),
            routing_key: (!routing_key.is_empty()).then_some(routing_key),
        }
    }

    pub fn queue(queue: impl Into<String>) -> Self {
        Destination::Queue {
            queue: queue.into(),
        }
    }

    pub fn routing_key(&self) -> Option<&str> {
        match self {
            Destination::Exchange { routing_key, .. } => routing_key.as_deref(),
            Destination::Queue { .. } => None,
        }
    }

    /// Parses a destination, tolerating a leading `/`.
    ///
    /// Anything after the `<kind>/<name>` base is kept as the routing key, so routing keys may
    /// themselves contain `/`. Queue destinations never carry a routing key.
    pub fn parse(destination: &str) -> Option<Self> {
        let mut segments = destination.trim_start_matches('/').splitn(3, '/');
        let kind = segments.next()?;
        let name = segments.next().filter(|name| !name.is_empty())?;
        let rest = segments.next();

        match (kind, rest) {
            (EXCHANGE_SEGMENT, rest) => Some(Destination::exchange_with_key(
                name,
                rest.unwrap_or_default(),
            )),
            (QUEUE_SEGMENT, None) => Some(Destination::queue(name)),
            _ => None,
        }
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Exchange {
                exchange,
                routing_key: Some(routing_key),
            } => write!(f, "{EXCHANGE_SEGMENT}/{exchange}/{routing_key}"),
            Destination::Exchange { exchange, .. } => write!(f, "{EXCHANGE_SEGMENT}/{exchange}"),
            Destination::Queue { queue } => write!(f, "{QUEUE_SEGMENT}/{queue}"),
        }
    }
}
