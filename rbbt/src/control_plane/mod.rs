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

//! Control-plane layer.
//!
//! Owns the entity namespaces: the exchange registry of a connection and the queue
//! registry of each exchange. Both are name-keyed maps behind an async mutex; lookups are
//! idempotent for named entities and capacity-checked at insertion time.

pub(crate) mod registry;
