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

//! Declaration and consumption options for exchanges and queues.

use crate::routing::headers::{self, insert_flag};
use crate::transport::Headers;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOptions {
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
}

impl ExchangeOptions {
    /// Headers describing the exchange declaration.
    pub(crate) fn declare_headers(&self) -> Headers {
        let mut out = self.lifecycle_headers();
        insert_flag(&mut out, headers::INTERNAL, self.internal);
        out
    }

    pub(crate) fn lifecycle_headers(&self) -> Headers {
        let mut out = Headers::new();
        insert_flag(&mut out, headers::PASSIVE, self.passive);
        insert_flag(&mut out, headers::DURABLE, self.durable);
        insert_flag(&mut out, headers::AUTO_DELETE, self.auto_delete);
        out
    }
}

/// Requested queue flags. Unset flags default by whether the queue is named.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    pub passive: bool,
    pub durable: Option<bool>,
    pub auto_delete: Option<bool>,
    pub exclusive: Option<bool>,
}

impl QueueOptions {
    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = Some(durable);
        self
    }

    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = Some(auto_delete);
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = Some(exclusive);
        self
    }

    /// Anonymous queues default to transient and exclusive, named queues to durable
    /// and shared.
    pub fn resolve(&self, anonymous: bool) -> QueueFlags {
        QueueFlags {
            passive: self.passive,
            durable: self.durable.unwrap_or(!anonymous),
            auto_delete: self.auto_delete.unwrap_or(anonymous),
            exclusive: self.exclusive.unwrap_or(anonymous),
        }
    }
}

/// Effective queue flags, fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFlags {
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub exclusive: bool,
}

impl QueueFlags {
    pub(crate) fn headers(&self) -> Headers {
        let mut out = Headers::new();
        insert_flag(&mut out, headers::PASSIVE, self.passive);
        insert_flag(&mut out, headers::DURABLE, self.durable);
        insert_flag(&mut out, headers::AUTO_DELETE, self.auto_delete);
        insert_flag(&mut out, headers::EXCLUSIVE, self.exclusive);
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumeOptions {
    /// When set, the transport settles deliveries on its own.
    pub no_ack: bool,
    pub exclusive: bool,
    /// Consumer tag, sent as the subscription id when non-empty.
    pub tag: Option<String>,
}

impl ConsumeOptions {
    pub fn no_ack(mut self, no_ack: bool) -> Self {
        self.no_ack = no_ack;
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub(crate) fn apply(&self, out: &mut Headers) {
        headers::insert_ack_mode(out, self.no_ack);
        if let Some(tag) = self.tag.as_deref().filter(|tag| !tag.is_empty()) {
            out.insert(headers::SUBSCRIPTION_ID.to_string(), tag.to_string());
        }
    }
}
