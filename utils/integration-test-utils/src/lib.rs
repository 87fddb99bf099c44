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

//! Shared helpers for rbbt integration tests, doctests and demos.
//!
//! - [`LoopbackConnector`] / [`LoopbackSession`]: an in-process transport that routes every
//!   publish straight back to matching watches.
//! - [`init_logging`]: one-time `tracing_subscriber` initialization honoring `RUST_LOG`.

mod logging;
mod loopback;

pub use logging::init_logging;
pub use loopback::{LoopbackConnector, LoopbackSession};
