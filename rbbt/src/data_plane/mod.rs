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

//! Data-plane layer.
//!
//! Owns the inbound path: translating frames into [`crate::Message`]s, applying the
//! ack-mode policy around application listeners, and swapping subscription handles so a
//! replaced watch is inert before its successor becomes observable.

pub(crate) mod delivery_listener;
pub(crate) mod frame_translation;
pub(crate) mod subscription_slot;
