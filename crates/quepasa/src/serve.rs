// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `quepasa serve` implementation.
//!
//! Wires metrics, storage, dispatch, the realtime hub, and the tenant
//! registry together, then serves the HTTP API until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use quepasa_config::QuepasaConfig;
use quepasa_core::{ConnectionFactory, PluginAdapter, QuepasaError, StorageAdapter};
use quepasa_dispatch::amqp::{AmqpOptions, AmqpRegistry, LapinConnector};
use quepasa_dispatch::{Dispatcher, WebhookSender};
use quepasa_gateway::{GatewayConfig, GatewayState, RealtimeHub, start_server};
use quepasa_prometheus::PrometheusAdapter;
use quepasa_service::{Registry, ServiceContext, ServiceOptions, install_signal_handler};
use quepasa_storage::SqliteStorage;

use crate::upstream::OfflineConnectionFactory;

/// AMQP client tuning taken from the `[rabbitmq]` section.
pub fn amqp_options(config: &QuepasaConfig) -> AmqpOptions {
    let rabbitmq = &config.rabbitmq;
    AmqpOptions {
        cache_length: rabbitmq.cache_length,
        reconnect_interval: Duration::from_secs(rabbitmq.reconnect_interval_secs),
        ensure_timeout: Duration::from_secs(rabbitmq.ensure_timeout_secs),
        queue_prefix: rabbitmq.queue.clone(),
    }
}

/// Runs the gateway until a shutdown signal arrives.
pub async fn run_serve(config: QuepasaConfig) -> Result<(), QuepasaError> {
    info!(version = env!("CARGO_PKG_VERSION"), "quepasa starting");

    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => Some(Arc::new(adapter)),
        Err(e) => {
            warn!(error = %e, "prometheus exporter unavailable, /metrics disabled");
            None
        }
    };

    let factory: Arc<dyn ConnectionFactory> = Arc::new(OfflineConnectionFactory);
    let storage = Arc::new(
        SqliteStorage::new(config.database.clone()).with_wid_resolver(Arc::clone(&factory)),
    );

    let shutdown = install_signal_handler();

    let amqp = Arc::new(AmqpRegistry::new(
        Arc::new(LapinConnector),
        amqp_options(&config),
        shutdown.clone(),
    ));
    let global_amqp = config.rabbitmq.connection_string.trim();
    if !global_amqp.is_empty() {
        amqp.acquire(global_amqp).await;
        info!("global rabbitmq client started");
    }

    let webhook = WebhookSender::new(Duration::from_secs(config.dispatch.webhook_timeout_secs))?;
    let dispatcher = Arc::new(Dispatcher::new(webhook, amqp));

    let master_key = Some(config.auth.master_key.trim().to_string());
    let hub = Arc::new(RealtimeHub::new(master_key));

    let ctx = ServiceContext {
        storage: storage.clone(),
        factory,
        dispatcher,
        hub: Some(hub.clone()),
        options: Arc::new(ServiceOptions::from_config(&config)),
    };
    let registry = Registry::new(ctx, shutdown.clone());
    registry.start().await?;
    match storage.health_check().await {
        Ok(status) => info!(adapter = storage.name(), ?status, "storage ready"),
        Err(e) => warn!(adapter = storage.name(), error = %e, "storage health check failed"),
    }

    let gateway_config = GatewayConfig::from_config(&config);
    let mut state = GatewayState::new(Arc::clone(&registry), hub, gateway_config.clone());
    if let Some(adapter) = prometheus {
        state = state.with_prometheus(Arc::new(move || adapter.render()));
    }

    let served = start_server(&gateway_config, state, shutdown.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "http server stopped with an error");
    }

    info!("shutting down");
    registry.shutdown().await;
    if let Err(e) = storage.close().await {
        warn!(error = %e, "closing storage failed");
    }
    info!("quepasa stopped");
    served
}
