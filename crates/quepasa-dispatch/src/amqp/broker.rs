// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker seam and its lapin implementation.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ConnectionProperties, ExchangeKind};
use strum::IntoEnumIterator;

use quepasa_core::QuepasaError;

use crate::routing::{RoutingKey, EXCHANGE};

/// Exchange and queue names declared on every new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    /// `(queue, routing_key)` bindings.
    pub bindings: Vec<(String, RoutingKey)>,
}

impl Topology {
    /// Standard topology: one durable queue per routing key, named
    /// `<prefix>.<key>`.
    pub fn standard(queue_prefix: &str) -> Self {
        Self {
            exchange: EXCHANGE.to_string(),
            bindings: RoutingKey::iter()
                .map(|key| (format!("{queue_prefix}.{key}"), key))
                .collect(),
        }
    }
}

/// One publish as handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub message_id: String,
    pub routing_key: RoutingKey,
    pub body: Vec<u8>,
}

/// Opens broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Arc<dyn BrokerChannel>, QuepasaError>;
}

/// A live channel on one broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Idempotently declares the exchange, queues, and bindings.
    async fn declare(&self, topology: &Topology) -> Result<(), QuepasaError>;

    async fn publish(&self, exchange: &str, publication: &Publication)
    -> Result<(), QuepasaError>;

    async fn close(&self);
}

fn amqp_error(context: &str, e: lapin::Error) -> QuepasaError {
    QuepasaError::Transport {
        message: format!("amqp {context} failed"),
        source: Some(Box::new(e)),
    }
}

/// [`BrokerConnector`] backed by lapin.
#[derive(Debug, Default, Clone, Copy)]
pub struct LapinConnector;

#[async_trait]
impl BrokerConnector for LapinConnector {
    async fn connect(&self, uri: &str) -> Result<Arc<dyn BrokerChannel>, QuepasaError> {
        let connection = lapin::Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| amqp_error("connect", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| amqp_error("channel open", e))?;
        Ok(Arc::new(LapinChannel {
            connection,
            channel,
        }))
    }
}

struct LapinChannel {
    connection: lapin::Connection,
    channel: lapin::Channel,
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn declare(&self, topology: &Topology) -> Result<(), QuepasaError> {
        self.channel
            .exchange_declare(
                &topology.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| amqp_error("exchange declare", e))?;

        for (queue, key) in &topology.bindings {
            self.channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| amqp_error("queue declare", e))?;
            self.channel
                .queue_bind(
                    queue,
                    &topology.exchange,
                    key.as_str(),
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| amqp_error("queue bind", e))?;
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        publication: &Publication,
    ) -> Result<(), QuepasaError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json".into())
            .with_message_id(publication.message_id.clone().into());
        self.channel
            .basic_publish(
                exchange,
                publication.routing_key.as_str(),
                BasicPublishOptions::default(),
                &publication.body,
                properties,
            )
            .await
            .map_err(|e| amqp_error("publish", e))?
            .await
            .map_err(|e| amqp_error("publish confirm", e))?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.connection.close(200, "closing").await {
            tracing::debug!(error = %e, "amqp connection close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_topology_binds_three_queues() {
        let topology = Topology::standard("quepasa");
        assert_eq!(topology.exchange, "quepasa.exchange");
        assert_eq!(
            topology.bindings,
            vec![
                ("quepasa.prod".to_string(), RoutingKey::Prod),
                ("quepasa.events".to_string(), RoutingKey::Events),
                ("quepasa.history".to_string(), RoutingKey::History),
            ]
        );
    }
}
