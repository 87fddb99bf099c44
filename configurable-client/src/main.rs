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

mod topology;

use clap::Parser;
use integration_test_utils::LoopbackConnector;
use rbbt::{Connection, Message, Queue, RbbtError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use topology::{Target, Topology, TopologyError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CLIENT_TAG: &str = "configurable-client:";

#[derive(Debug, Parser)]
#[command(version, about = "Declares a topology from a JSON5 file and publishes through it", long_about = None)]
struct Cli {
    /// Topology file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
    /// Keep consuming until Ctrl-C instead of closing once every message is sent
    #[arg(long)]
    linger: bool,
}

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Rbbt(#[from] RbbtError),
    #[error("no queue named {0:?} was declared")]
    UnknownQueue(String),
    #[error("unable to wait for Ctrl-C: {0}")]
    Signal(std::io::Error),
}

fn log_delivery(consumer: String) -> impl Fn(Message) + Send + Sync {
    move |message: Message| {
        info!(
            "{} {} <- {}/{} [{} bytes] {:?}",
            CLIENT_TAG,
            consumer,
            message.exchange(),
            message.routing_key(),
            message.body_size(),
            message.body()
        );
    }
}

async fn declare_queues(
    connection: &Connection,
    topology: &Topology,
) -> Result<HashMap<String, Queue>, ClientError> {
    let mut declared = HashMap::new();
    for entry in &topology.queues {
        let exchange = connection
            .exchange(&entry.exchange, Default::default())
            .await?;
        let queue = exchange.queue(&entry.name, entry.options).await?;

        if let Some(bind) = &entry.bind {
            queue.bind(&bind.exchange, &bind.routing_key).await?;
        }
        if let Some(consume) = &entry.consume {
            queue
                .subscribe(consume.clone(), Arc::new(log_delivery(queue.name().to_string())))
                .await?;
        }
        info!("{} declared queue {}", CLIENT_TAG, queue.name());
        declared.insert(queue.name().to_string(), queue);
    }
    Ok(declared)
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let topology = Topology::from_file(&cli.config)?;
    let connector = Arc::new(LoopbackConnector::default());
    let connection = Connection::new(topology.connection.clone(), connector);
    connection.connect().await?;

    for entry in &topology.exchanges {
        let exchange = connection.exchange(&entry.name, entry.options).await?;
        info!("{} declared exchange {}", CLIENT_TAG, exchange.name());
    }
    let queues = declare_queues(&connection, &topology).await?;

    for message in &topology.messages {
        match message.target() {
            Some(Target::Exchange { name, routing_key }) => {
                let exchange = connection.exchange(name, Default::default()).await?;
                exchange
                    .send(message.body.as_str(), routing_key, &message.properties)
                    .await?;
            }
            Some(Target::Queue(name)) => {
                let queue = queues
                    .get(name)
                    .ok_or_else(|| ClientError::UnknownQueue(name.to_string()))?;
                queue
                    .send(message.body.as_str(), &message.properties)
                    .await?;
            }
            None => {}
        }
    }

    if cli.linger {
        info!("{} consuming until Ctrl-C", CLIENT_TAG);
        tokio::signal::ctrl_c().await.map_err(ClientError::Signal)?;
    }

    connection.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{} {}", CLIENT_TAG, err);
            ExitCode::FAILURE
        }
    }
}
