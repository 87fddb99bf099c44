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

use crate::transport::TransportError;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    #[error("client not connected")]
    NotConnected,
    #[error("client is closed")]
    ClientClosed,
    #[error("exchange is closed")]
    ExchangeClosed,
    #[error("queue is closed")]
    QueueClosed,
    #[error("invalid protocol {scheme:?}, use ws or wss")]
    InvalidProtocol { scheme: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("max number of channels reached ({channel_max})")]
    TooManyChannels { channel_max: usize },
    #[error("no free name after {attempts} generated candidates")]
    NameUnavailable { attempts: usize },
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Error raised by entity operations, labelled with the connection it concerns.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} [connection: {connection}]")]
pub struct RbbtError {
    kind: ErrorKind,
    connection: String,
}

impl RbbtError {
    pub(crate) fn new(kind: impl Into<ErrorKind>, connection: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            connection: connection.into(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Label of the connection the failing operation ran against.
    pub fn connection(&self) -> &str {
        &self.connection
    }
}
