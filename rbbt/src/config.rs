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

//! Connection configuration and the connect-time snapshot handed to a [`crate::Connector`].

use crate::error::ErrorKind;
use crate::transport::Headers;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_VHOST: &str = "/";
const DEFAULT_CREDENTIAL: &str = "guest";
const DEFAULT_HEARTBEAT_MS: u64 = 5000;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// URL schemes of the duplex streaming transports a session can run over.
pub const STREAMING_SCHEMES: [&str; 2] = ["ws", "wss"];

pub const CONNECT_HEADER_HOST: &str = "host";
pub const CONNECT_HEADER_LOGIN: &str = "login";
pub const CONNECT_HEADER_PASSCODE: &str = "passcode";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse connection config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub url: String,
    pub vhost: String,
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    /// Upper bound on registered exchanges; `0` disables the cap.
    pub channel_max: usize,
    pub frame_max: Option<u32>,
    pub heartbeat_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            vhost: DEFAULT_VHOST.to_string(),
            username: DEFAULT_CREDENTIAL.to_string(),
            password: DEFAULT_CREDENTIAL.to_string(),
            name: None,
            channel_max: 0,
            frame_max: None,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        url: impl Into<String>,
        vhost: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            vhost: vhost.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("reading connection config from {path:?}");
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// Label used in logs and errors: the configured name, else the URL.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.url.clone())
    }
}

/// Owned snapshot of a [`ConnectionConfig`] taken at connect time.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub broker_url: Url,
    pub connect_headers: Headers,
    pub heartbeat_incoming: Duration,
    pub heartbeat_outgoing: Duration,
    pub reconnect_delay: Duration,
    pub frame_max: Option<u32>,
    pub name: Option<String>,
}

impl ConnectParams {
    /// Validates the URL and applies credential defaults for empty fields.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, ErrorKind> {
        let broker_url =
            Url::parse(&config.url).map_err(|err| ErrorKind::InvalidUrl(err.to_string()))?;

        if !STREAMING_SCHEMES.contains(&broker_url.scheme()) {
            return Err(ErrorKind::InvalidProtocol {
                scheme: broker_url.scheme().to_string(),
            });
        }

        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };

        let mut connect_headers = Headers::new();
        connect_headers.insert(
            CONNECT_HEADER_HOST.to_string(),
            or_default(&config.vhost, DEFAULT_VHOST),
        );
        connect_headers.insert(
            CONNECT_HEADER_LOGIN.to_string(),
            or_default(&config.username, DEFAULT_CREDENTIAL),
        );
        connect_headers.insert(
            CONNECT_HEADER_PASSCODE.to_string(),
            or_default(&config.password, DEFAULT_CREDENTIAL),
        );

        let heartbeat = Duration::from_millis(config.heartbeat_ms);

        Ok(Self {
            broker_url,
            connect_headers,
            heartbeat_incoming: heartbeat,
            heartbeat_outgoing: heartbeat,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            frame_max: config.frame_max,
            name: config.name.clone(),
        })
    }
}

impl Debug for ConnectParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let visible_headers: Headers = self
            .connect_headers
            .iter()
            .filter(|(key, _)| key.as_str() != CONNECT_HEADER_PASSCODE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        f.debug_struct("ConnectParams")
            .field("broker_url", &self.broker_url.as_str())
            .field("connect_headers", &visible_headers)
            .field("heartbeat_incoming", &self.heartbeat_incoming)
            .field("heartbeat_outgoing", &self.heartbeat_outgoing)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("frame_max", &self.frame_max)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
