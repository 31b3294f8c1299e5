// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for registry-level integration testing.
//!
//! `TestHarness` assembles a registry over a temp SQLite database, a mock
//! connection factory, and an in-memory AMQP broker.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use quepasa_config::DatabaseConfig;
use quepasa_core::{QuepasaError, RealtimeDispatch, ServerRecord, StorageAdapter};
use quepasa_dispatch::amqp::{AmqpOptions, AmqpRegistry};
use quepasa_dispatch::testing::MockBroker;
use quepasa_dispatch::{Dispatcher, WebhookSender};
use quepasa_service::{Registry, Server, ServiceContext, ServiceOptions};
use quepasa_storage::SqliteStorage;

use crate::mock_connection::{MockConnection, MockConnectionFactory};

/// Builder for test environments.
pub struct TestHarnessBuilder {
    options: ServiceOptions,
    hub: Option<Arc<dyn RealtimeDispatch>>,
    start: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let options = ServiceOptions {
            restart_delay: Duration::from_millis(10),
            ..ServiceOptions::default()
        };
        Self {
            options,
            hub: None,
            start: true,
        }
    }

    /// Adjust service options before the registry is built.
    pub fn with_options(mut self, change: impl FnOnce(&mut ServiceOptions)) -> Self {
        change(&mut self.options);
        self
    }

    pub fn with_hub(mut self, hub: Arc<dyn RealtimeDispatch>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Leave the registry unstarted (storage not yet initialized).
    pub fn unstarted(mut self) -> Self {
        self.start = false;
        self
    }

    pub async fn build(self) -> Result<TestHarness, QuepasaError> {
        let temp_dir = TempDir::new().map_err(|e| QuepasaError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("quepasa.sqlite");
        let factory = Arc::new(MockConnectionFactory::new());
        let broker = MockBroker::new();
        let options = Arc::new(self.options);

        let wiring = Wiring {
            db_path,
            factory,
            broker,
            options,
            hub: self.hub,
        };
        let (storage, registry, shutdown) = wiring.assemble()?;
        if self.start {
            registry.start().await?;
        }

        Ok(TestHarness {
            registry,
            storage,
            shutdown,
            wiring,
            _temp_dir: temp_dir,
        })
    }
}

/// Everything that survives a simulated restart.
struct Wiring {
    db_path: PathBuf,
    factory: Arc<MockConnectionFactory>,
    broker: MockBroker,
    options: Arc<ServiceOptions>,
    hub: Option<Arc<dyn RealtimeDispatch>>,
}

impl Wiring {
    fn assemble(
        &self,
    ) -> Result<(Arc<SqliteStorage>, Arc<Registry>, CancellationToken), QuepasaError> {
        let shutdown = CancellationToken::new();
        let storage = Arc::new(
            SqliteStorage::new(DatabaseConfig {
                database: self.db_path.to_string_lossy().to_string(),
                ..DatabaseConfig::default()
            })
            .with_wid_resolver(self.factory.clone()),
        );

        let amqp = AmqpRegistry::new(
            Arc::new(self.broker.clone()),
            AmqpOptions {
                reconnect_interval: Duration::from_millis(50),
                ensure_timeout: Duration::from_millis(200),
                ..AmqpOptions::default()
            },
            shutdown.clone(),
        );
        let dispatcher = Dispatcher::new(WebhookSender::new(Duration::from_secs(5))?, Arc::new(amqp));

        let ctx = ServiceContext {
            storage: storage.clone(),
            factory: self.factory.clone(),
            dispatcher: Arc::new(dispatcher),
            hub: self.hub.clone(),
            options: Arc::clone(&self.options),
        };
        let registry = Registry::new(ctx, shutdown.clone());
        Ok((storage, registry, shutdown))
    }
}

/// A registry wired to mocks, plus handles for assertions.
pub struct TestHarness {
    pub registry: Arc<Registry>,
    pub storage: Arc<SqliteStorage>,
    pub shutdown: CancellationToken,
    wiring: Wiring,
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A started registry with default options.
    pub async fn new() -> Result<Self, QuepasaError> {
        Self::builder().build().await
    }

    pub fn factory(&self) -> &Arc<MockConnectionFactory> {
        &self.wiring.factory
    }

    pub fn broker(&self) -> &MockBroker {
        &self.wiring.broker
    }

    pub fn options(&self) -> &Arc<ServiceOptions> {
        &self.wiring.options
    }

    /// Shuts the current registry down and boots a new one from the same
    /// database, as a process restart would.
    pub async fn reboot(&mut self) -> Result<(), QuepasaError> {
        self.registry.shutdown().await;
        self.storage.close().await?;
        let (storage, registry, shutdown) = self.wiring.assemble()?;
        self.storage = storage;
        self.registry = registry;
        self.shutdown = shutdown;
        self.registry.start().await
    }

    /// Stores a verified server row and starts it against a mock connection.
    pub async fn ready_server(
        &self,
        token: &str,
        owner: &str,
        wid: &str,
    ) -> Result<(Arc<Server>, Arc<MockConnection>), QuepasaError> {
        let mut record = ServerRecord::new(token, owner);
        record.wid = Some(wid.to_string());
        record.verified = true;
        self.storage.upsert_server(&record).await?;

        let server = self.registry.get_or_create_server_from_token(token).await?;
        server.start().await?;
        let connection = self
            .factory()
            .for_wid(wid)
            .ok_or_else(|| QuepasaError::NotFound(format!("no connection for {wid}")))?;
        Ok((server, connection))
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
