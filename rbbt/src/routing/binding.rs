//! Queue binding descriptor.

use crate::routing::destination::Destination;
use crate::routing::headers;
use crate::transport::Headers;
use serde_json::json;

/// The exchange and routing key a queue is currently bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Binding {
    exchange: String,
    routing_key: String,
}

impl Binding {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn destination(&self) -> Destination {
        Destination::exchange_with_key(&self.exchange, &self.routing_key)
    }

    /// Headers that let the far side associate a watch with `queue_name`'s binding.
    pub(crate) fn bind_headers(&self, queue_name: &str) -> Headers {
        let mut out = Headers::new();
        out.insert(headers::X_QUEUE_NAME.to_string(), queue_name.to_string());
        out.insert(headers::EXCHANGE.to_string(), self.exchange.clone());
        out.insert(headers::ROUTING_KEY.to_string(), self.routing_key.clone());
        out
    }

    /// Value of the `x-unbind` header signalling removal of this binding.
    pub(crate) fn unbind_header(&self) -> String {
        json!({
            "exchange": self.exchange,
            "routing_key": self.routing_key,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::Binding;
    use crate::routing::Destination;

    #[test]
    fn destination_uses_exchange_and_routing_key() {
        let binding = Binding::new("orders", "created");

        assert_eq!(
            binding.destination(),
            Destination::exchange_with_key("orders", "created")
        );
        assert_eq!(binding.destination().to_string(), "exchange/orders/created");
    }

    #[test]
    fn bind_headers_tag_queue_exchange_and_key() {
        let headers = Binding::new("orders", "created").bind_headers("rbbt.gen-q");

        assert_eq!(headers.get("x-queue-name").unwrap(), "rbbt.gen-q");
        assert_eq!(headers.get("exchange").unwrap(), "orders");
        assert_eq!(headers.get("routing_key").unwrap(), "created");
    }

    #[test]
    fn unbind_header_is_json_object() {
        let header = Binding::new("orders", "created").unbind_header();
        let value: serde_json::Value = serde_json::from_str(&header).expect("valid json");

        assert_eq!(value["exchange"], "orders");
        assert_eq!(value["routing_key"], "created");
    }
}
