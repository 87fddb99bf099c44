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

//! Boundary with the publish/subscribe transport.
//!
//! The entity-routing core never speaks a wire protocol itself. It drives a [`Session`]
//! obtained from a [`Connector`], registers [`FrameListener`]s against destination strings,
//! and publishes [`Publish`] requests. Handshakes, heartbeats, reconnection and framing all
//! live behind these traits.

use crate::config::ConnectParams;
use crate::message::Body;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Header bag exchanged with the transport.
pub type Headers = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport session is not active")]
    Inactive,
    #[error("transport refused {operation}: {reason}")]
    Refused {
        operation: &'static str,
        reason: String,
    },
}

impl TransportError {
    pub fn refused(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Refused {
            operation,
            reason: reason.into(),
        }
    }
}

/// Settles a delivered frame with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self, headers: &Headers) -> Result<(), TransportError>;

    async fn nack(&self, headers: &Headers) -> Result<(), TransportError>;
}

/// One inbound frame as handed over by the transport.
#[derive(Clone, Default)]
pub struct Frame {
    pub body: String,
    pub binary_body: Option<Vec<u8>>,
    pub headers: Headers,
    acknowledger: Option<Arc<dyn Acknowledger>>,
}

impl Frame {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn binary(body: impl Into<Vec<u8>>) -> Self {
        Self {
            binary_body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_acknowledger(mut self, acknowledger: Arc<dyn Acknowledger>) -> Self {
        self.acknowledger = Some(acknowledger);
        self
    }

    /// Acknowledges the frame. Frames without an acknowledger settle trivially.
    pub async fn ack(&self) -> Result<(), TransportError> {
        match &self.acknowledger {
            Some(acknowledger) => acknowledger.ack(&self.headers).await,
            None => Ok(()),
        }
    }

    pub async fn nack(&self) -> Result<(), TransportError> {
        match &self.acknowledger {
            Some(acknowledger) => acknowledger.nack(&self.headers).await,
            None => Ok(()),
        }
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("body_len", &self.body.len())
            .field(
                "binary_body_len",
                &self.binary_body.as_ref().map(|bytes| bytes.len()),
            )
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// An outbound publish request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publish {
    pub destination: String,
    pub body: Body,
    pub headers: Headers,
}

/// Receives the frames of one watch. Calls for a single watch are sequential.
#[async_trait]
pub trait FrameListener: Send + Sync {
    async fn on_frame(&self, frame: Frame);
}

/// Handle for a registered watch.
#[async_trait]
pub trait Subscription: Send + Sync {
    async fn unsubscribe(&self) -> Result<(), TransportError>;
}

/// A live transport session.
#[async_trait]
pub trait Session: Send + Sync {
    async fn activate(&self) -> Result<(), TransportError>;

    async fn deactivate(&self) -> Result<(), TransportError>;

    fn is_active(&self) -> bool;

    /// Opens a watch on `destination` and routes its frames to `listener`.
    async fn watch(
        &self,
        destination: &str,
        headers: Headers,
        listener: Arc<dyn FrameListener>,
    ) -> Result<Box<dyn Subscription>, TransportError>;

    async fn publish(&self, message: Publish) -> Result<(), TransportError>;
}

/// Builds sessions from a snapshot of the connection configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: ConnectParams) -> Result<Arc<dyn Session>, TransportError>;
}
