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

//! # rbbt
//!
//! `rbbt` maps AMQP-style messaging entities (exchanges, queues, bindings, routing keys,
//! acknowledgement modes) onto a generic publish/subscribe transport that only knows how to
//! watch a destination, publish to a destination and settle delivered frames.
//!
//! Typical usage is entity-first: a [`Connection`] declares [`Exchange`]s, an exchange
//! declares [`Queue`]s, and queues bind to exchanges by routing key. The transport is
//! injected through the [`Connector`] and [`Session`] traits.
//!
//! ## Bind and consume
//!
//! ```
//! use std::sync::Arc;
//! use rbbt::{
//!     Connection, ConnectionConfig, ConsumeOptions, ExchangeOptions, Message, Properties,
//!     QueueOptions,
//! };
//! use integration_test_utils::LoopbackConnector;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = ConnectionConfig::new("ws://localhost:15674/ws", "/", "guest", "guest");
//! let connection = Connection::new(config, Arc::new(LoopbackConnector::default()));
//! connection.connect().await.unwrap();
//!
//! let orders = connection
//!     .exchange("orders", ExchangeOptions::default())
//!     .await
//!     .unwrap();
//! let queue = orders
//!     .queue("", QueueOptions::default().exclusive(true))
//!     .await
//!     .unwrap();
//! assert!(queue.name().starts_with("rbbt.gen-"));
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! queue.bind("orders", "created").await.unwrap();
//! queue
//!     .subscribe(
//!         ConsumeOptions::default(),
//!         Arc::new(move |message: Message| {
//!             let _ = tx.send(message);
//!         }),
//!     )
//!     .await
//!     .unwrap();
//!
//! orders
//!     .send("hello", "created", &Properties::default())
//!     .await
//!     .unwrap();
//!
//! let message = rx.recv().await.unwrap();
//! assert_eq!(message.routing_key(), "created");
//! assert_eq!(message.body().as_text(), Some("hello"));
//!
//! connection.close().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: outward `Connection`/`Exchange`/`Queue` surface
//! - Control plane: name-keyed exchange and queue registries
//! - Routing: destination grammar, header keys of record, bindings and anonymous naming
//! - Data plane: frame translation, delivery gating and subscription handle swapping
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries and tests
//! are responsible for one-time `tracing_subscriber` initialization at process boundaries.

mod api;
pub use api::{Connection, Exchange, Queue};

pub mod config;
pub use config::{ConfigError, ConnectParams, ConnectionConfig};

mod control_plane;
mod data_plane;
pub use data_plane::delivery_listener::MessageListener;

pub mod error;
pub use error::{ErrorKind, RbbtError};

pub mod message;
pub use message::{Body, Message, Properties};

#[doc(hidden)]
pub mod observability;

pub mod options;
pub use options::{ConsumeOptions, ExchangeOptions, QueueFlags, QueueOptions};

pub mod routing;
pub use routing::{Binding, Destination, NameGenerator, RandomNameGenerator};

pub mod transport;
pub use transport::{
    Acknowledger, Connector, Frame, FrameListener, Headers, Publish, Session, Subscription,
    TransportError,
};

#[cfg(test)]
mod test_support;
