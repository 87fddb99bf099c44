//! Inbound frame to [`Message`] translation.

use crate::message::{Body, Message, Properties};
use crate::routing::headers;
use crate::transport::Frame;
use serde_json::Value;

/// Segments of the `<kind>/<name>` base every destination starts with.
const BASE_SEGMENTS: usize = 2;

/// Translates `frame` into a [`Message`]. Never fails: absent optional headers fall back
/// to their defaults.
pub(crate) fn message_from_frame(exchange: &str, frame: &Frame) -> Message {
    let mut frame_headers = frame.headers.clone();

    let message_id = frame_headers.remove(headers::MESSAGE_ID);
    let redelivered = frame_headers
        .remove(headers::REDELIVERED)
        .is_some_and(|value| value == "true");
    let body_size = frame_headers
        .remove(headers::CONTENT_LENGTH)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let routing_key = frame_headers
        .get(headers::DESTINATION)
        .map(|destination| trailing_routing_key(destination).to_string())
        .unwrap_or_default();

    let body = match &frame.binary_body {
        Some(bytes) if !bytes.is_empty() || frame.body.is_empty() => Body::Binary(bytes.clone()),
        _ => Body::Text(frame.body.clone()),
    };

    Message {
        exchange: exchange.to_string(),
        routing_key,
        properties: Properties {
            message_id,
            headers: frame_headers
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
            ..Default::default()
        },
        body_size,
        body,
        redelivered,
    }
}

/// Everything past the `<kind>/<name>` base of `destination`, or `""`.
fn trailing_routing_key(destination: &str) -> &str {
    destination
        .trim_start_matches('/')
        .splitn(BASE_SEGMENTS + 1, '/')
        .nth(BASE_SEGMENTS)
        .unwrap_or_default()
}
