//! Header keys of record and header-building helpers.

use crate::transport::Headers;

pub const PASSIVE: &str = "passive";
pub const DURABLE: &str = "durable";
pub const AUTO_DELETE: &str = "auto-delete";
pub const EXCLUSIVE: &str = "exclusive";
pub const INTERNAL: &str = "internal";

pub const ACK: &str = "ack";
/// Every delivery must be acknowledged explicitly.
pub const ACK_CLIENT: &str = "client";
pub const SUBSCRIPTION_ID: &str = "id";

pub const X_QUEUE_NAME: &str = "x-queue-name";
pub const EXCHANGE: &str = "exchange";
pub const ROUTING_KEY: &str = "routing_key";
pub const X_UNBIND: &str = "x-unbind";

pub const DESTINATION: &str = "destination";
pub const MESSAGE_ID: &str = "message-id";
pub const REDELIVERED: &str = "redelivered";
pub const CONTENT_LENGTH: &str = "content-length";

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_ENCODING: &str = "content-encoding";
pub const PERSISTENT: &str = "persistent";
pub const PRIORITY: &str = "priority";
pub const CORRELATION_ID: &str = "correlation-id";
pub const REPLY_TO: &str = "reply-to";
pub const EXPIRATION: &str = "expiration";
pub const TIMESTAMP: &str = "timestamp";
pub const TYPE: &str = "type";
pub const USER_ID: &str = "user-id";
pub const APP_ID: &str = "app-id";
pub const CLUSTER_ID: &str = "cluster-id";

#[inline(always)]
pub fn flag(value: bool) -> String {
    let value = if value { "true" } else { "false" };
    value.to_string()
}

#[inline(always)]
pub(crate) fn insert_flag(headers: &mut Headers, key: &str, value: bool) {
    headers.insert(key.to_string(), flag(value));
}

/// Adds the ack-mode header. Auto-acknowledged subscriptions omit it.
pub(crate) fn insert_ack_mode(headers: &mut Headers, no_ack: bool) {
    if !no_ack {
        headers.insert(ACK.to_string(), ACK_CLIENT.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::{flag, insert_ack_mode, ACK};
    use crate::transport::Headers;

    #[test]
    fn flags_render_as_lowercase_strings() {
        assert_eq!(flag(true), "true");
        assert_eq!(flag(false), "false");
    }

    #[test]
    fn ack_mode_header_tracks_no_ack() {
        let mut explicit = Headers::new();
        insert_ack_mode(&mut explicit, false);
        assert_eq!(explicit.get(ACK).map(String::as_str), Some("client"));

        let mut auto = Headers::new();
        insert_ack_mode(&mut auto, true);
        assert!(!auto.contains_key(ACK));
    }
}
