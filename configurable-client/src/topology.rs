//! Topology file read by the client: connection settings, entities to declare and
//! messages to publish once everything is wired.

use rbbt::{ConnectionConfig, ConsumeOptions, ExchangeOptions, Properties, QueueOptions};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse topology: {0}")]
    Parse(#[from] json5::Error),
    #[error("message #{index} must name exactly one of `exchange` or `queue`")]
    AmbiguousTarget { index: usize },
}

#[derive(Debug, Deserialize)]
pub struct Topology {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub exchanges: Vec<ExchangeEntry>,
    #[serde(default)]
    pub queues: Vec<QueueEntry>,
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: ExchangeOptions,
}

#[derive(Debug, Deserialize)]
pub struct QueueEntry {
    pub exchange: String,
    /// Empty for a server-named queue.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub options: QueueOptions,
    pub bind: Option<BindEntry>,
    pub consume: Option<ConsumeOptions>,
}

#[derive(Debug, Deserialize)]
pub struct BindEntry {
    pub exchange: String,
    #[serde(default)]
    pub routing_key: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageEntry {
    pub exchange: Option<String>,
    pub queue: Option<String>,
    #[serde(default)]
    pub routing_key: String,
    pub body: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Where a configured message is published.
#[derive(Debug, PartialEq, Eq)]
pub enum Target<'a> {
    Exchange { name: &'a str, routing_key: &'a str },
    Queue(&'a str),
}

impl MessageEntry {
    pub fn target(&self) -> Option<Target<'_>> {
        match (&self.exchange, &self.queue) {
            (Some(name), None) => Some(Target::Exchange {
                name,
                routing_key: &self.routing_key,
            }),
            (None, Some(name)) => Some(Target::Queue(name)),
            _ => None,
        }
    }
}

impl Topology {
    pub fn from_json5_str(text: &str) -> Result<Self, TopologyError> {
        let topology: Topology = json5::from_str(text)?;
        if let Some(index) = topology
            .messages
            .iter()
            .position(|message| message.target().is_none())
        {
            return Err(TopologyError::AmbiguousTarget { index });
        }
        Ok(topology)
    }

    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let text = fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json5_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::{Target, Topology, TopologyError};

    #[test]
    fn bundled_topology_parses() {
        let topology = Topology::from_json5_str(include_str!("../configs/orders.json5"))
            .expect("bundled topology");

        assert_eq!(topology.connection.url, "ws://localhost:15674/ws");
        assert_eq!(topology.connection.channel_max, 16);
        assert_eq!(topology.exchanges.len(), 1);
        assert!(topology.exchanges[0].options.durable);
        assert_eq!(topology.queues.len(), 2);
        assert!(topology.queues[1].name.is_empty());
        assert_eq!(
            topology.messages[0].target(),
            Some(Target::Exchange {
                name: "orders",
                routing_key: "created"
            })
        );
        assert_eq!(
            topology.messages[0].properties.message_id.as_deref(),
            Some("order-1")
        );
        assert_eq!(topology.messages[2].target(), Some(Target::Queue("audit")));
    }

    #[test]
    fn message_with_two_targets_is_rejected() {
        let text = r#"{
            connection: { url: "ws://localhost/ws" },
            messages: [{ exchange: "a", queue: "b", body: "x" }],
        }"#;

        let err = Topology::from_json5_str(text).expect_err("two targets");

        assert!(matches!(err, TopologyError::AmbiguousTarget { index: 0 }));
    }
}
