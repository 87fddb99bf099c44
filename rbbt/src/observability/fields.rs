//! Formatting helpers for event fields.

use crate::message::Body;
use crate::transport::Headers;

pub fn body_kind(body: &Body) -> &'static str {
    if body.is_binary() {
        "binary"
    } else {
        "text"
    }
}

/// Renders header keys only; values may carry credentials or payload data.
pub fn format_header_keys(headers: &Headers) -> String {
    let keys: Vec<&str> = headers.keys().map(String::as_str).collect();
    format!("[{}]", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::{body_kind, format_header_keys};
    use crate::message::Body;
    use crate::transport::Headers;

    #[test]
    fn header_keys_render_sorted_without_values() {
        let mut headers = Headers::new();
        headers.insert("durable".to_string(), "true".to_string());
        headers.insert("ack".to_string(), "client".to_string());

        assert_eq!(format_header_keys(&headers), "[ack, durable]");
    }

    #[test]
    fn body_kind_names_payload_field() {
        assert_eq!(body_kind(&Body::from("a")), "text");
        assert_eq!(body_kind(&Body::from(vec![1u8])), "binary");
    }
}
