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

//! Routing layer.
//!
//! Encapsulates the destination grammar shared with the peer, the header keys of record,
//! the queue binding descriptor and anonymous entity naming.
//!
//! | Target | Destination |
//! |---|---|
//! | Exchange, no routing key | `exchange/<exchangeName>` |
//! | Exchange, with routing key | `exchange/<exchangeName>/<routingKey>` |
//! | Queue, unbound | `queue/<queueName>` |
//! | Queue, bound | `exchange/<exchangeName>/<routingKey>` |
//!
//! ```
//! use rbbt::routing::{Binding, Destination};
//!
//! assert_eq!(Destination::exchange("orders").to_string(), "exchange/orders");
//! assert_eq!(
//!     Destination::exchange_with_key("orders", "created").to_string(),
//!     "exchange/orders/created"
//! );
//! assert_eq!(Destination::queue("audit").to_string(), "queue/audit");
//!
//! let binding = Binding::new("orders", "created");
//! assert_eq!(binding.destination(), Destination::exchange_with_key("orders", "created"));
//! ```

pub mod binding;
pub mod destination;
pub mod headers;
pub mod name_generator;

pub use binding::Binding;
pub use destination::Destination;
pub use name_generator::{NameGenerator, RandomNameGenerator};
