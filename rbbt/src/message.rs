/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Message bodies, AMQP basic properties and the inbound [`Message`].

use crate::data_plane::frame_translation::message_from_frame;
use crate::routing::headers;
use crate::transport::{Frame, Headers};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Payload of a message: text or raw bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn is_binary(&self) -> bool {
        matches!(self, Body::Binary(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Text(String::new())
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Binary(bytes.to_vec())
    }
}

/// AMQP basic properties carried alongside a body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: BTreeMap<String, Value>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

impl Properties {
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Flattens the properties into publish headers.
    ///
    /// Custom `headers` entries are written first so that a named property always wins
    /// over a header entry spelled the same way.
    pub fn publish_headers(&self) -> Headers {
        let mut out: Headers = self
            .headers
            .iter()
            .map(|(key, value)| (key.clone(), header_value(value)))
            .collect();

        let text_properties = [
            (headers::CONTENT_TYPE, &self.content_type),
            (headers::CONTENT_ENCODING, &self.content_encoding),
            (headers::CORRELATION_ID, &self.correlation_id),
            (headers::REPLY_TO, &self.reply_to),
            (headers::EXPIRATION, &self.expiration),
            (headers::MESSAGE_ID, &self.message_id),
            (headers::TYPE, &self.kind),
            (headers::USER_ID, &self.user_id),
            (headers::APP_ID, &self.app_id),
            (headers::CLUSTER_ID, &self.cluster_id),
        ];
        for (key, value) in text_properties {
            if let Some(value) = value {
                out.insert(key.to_string(), value.clone());
            }
        }

        if let Some(delivery_mode) = self.delivery_mode {
            out.insert(
                headers::PERSISTENT.to_string(),
                headers::flag(delivery_mode == 2),
            );
        }
        if let Some(priority) = self.priority {
            out.insert(headers::PRIORITY.to_string(), priority.to_string());
        }
        if let Some(timestamp) = self.timestamp {
            out.insert(headers::TIMESTAMP.to_string(), timestamp.to_string());
        }

        out
    }
}

fn header_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A message delivered through an exchange or queue subscription.
///
/// Built once per inbound frame and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub(crate) exchange: String,
    pub(crate) routing_key: String,
    pub(crate) properties: Properties,
    pub(crate) body_size: u64,
    pub(crate) body: Body,
    pub(crate) redelivered: bool,
}

impl Message {
    /// Translates an inbound frame received through `exchange`.
    pub fn from_frame(exchange: &str, frame: &Frame) -> Self {
        message_from_frame(exchange, frame)
    }

    /// Name of the exchange the message arrived through.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn message_id(&self) -> Option<&str> {
        self.properties.message_id.as_deref()
    }

    pub fn body_size(&self) -> u64 {
        self.body_size
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered
    }
}
