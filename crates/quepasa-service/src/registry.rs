// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide registry of tenant servers and pending pairings.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quepasa_core::phone::phone_from_wid;
use quepasa_core::{
    ConnectionOptions, ConnectionState, DispatchingRecord, HealthStats, PairedCallback,
    QuepasaError, ServerHealth, ServerRecord, User,
};

use crate::options::LEGACY_DEFAULT_USER;
use crate::pairing::Pairing;
use crate::password::{hash_password, verify_password};
use crate::server::{Server, ServiceContext};

/// Owns every server of this process.
pub struct Registry {
    ctx: ServiceContext,
    servers: RwLock<HashMap<String, Arc<Server>>>,
    pairings: Mutex<HashMap<String, Arc<Pairing>>>,
    init_lock: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl Registry {
    pub fn new(ctx: ServiceContext, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            servers: RwLock::new(HashMap::new()),
            pairings: Mutex::new(HashMap::new()),
            init_lock: tokio::sync::Mutex::new(()),
            shutdown,
        })
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Opens storage (running migrations), seeds the default user, loads
    /// every server with its routes, and starts those that should run.
    pub async fn start(&self) -> Result<(), QuepasaError> {
        let _guard = self.init_lock.lock().await;
        self.ctx.storage.initialize().await?;
        self.seed_user().await?;

        let records = self.ctx.storage.list_servers().await?;
        let mut routes: HashMap<String, Vec<DispatchingRecord>> = HashMap::new();
        for route in self.ctx.storage.list_all_dispatching().await? {
            routes.entry(route.context.clone()).or_default().push(route);
        }

        let mut servers = self.servers.write().await;
        for record in records {
            let token = record.token.clone();
            let server = Server::new(record, self.ctx.clone());
            server
                .load_routes(routes.remove(&token).unwrap_or_default())
                .await;

            let state = server.state();
            if state == ConnectionState::UnPrepared || state.is_valid_to_start() {
                spawn_initialize(Arc::clone(&server));
            } else {
                debug!(token = %token, %state, "server left idle");
            }
            servers.insert(token, server);
        }
        info!(servers = servers.len(), "registry started");
        Ok(())
    }

    async fn seed_user(&self) -> Result<(), QuepasaError> {
        let options = &self.ctx.options;
        match (&options.seed_user, &options.seed_password) {
            (Some(username), Some(password)) => {
                if !self.ctx.storage.user_exists(username).await? {
                    self.create_user(username, Some(password)).await?;
                    info!(username = %username, "default user created");
                }
            }
            (Some(username), None) => {
                warn!(username = %username, "default user has no password, refusing to create it");
            }
            (None, _) => {
                if !self.ctx.storage.user_exists(LEGACY_DEFAULT_USER).await? {
                    self.create_user(LEGACY_DEFAULT_USER, None).await?;
                    info!(username = LEGACY_DEFAULT_USER, "legacy default user seeded");
                }
            }
        }
        Ok(())
    }

    // --- users ---

    /// Creates a user; `None` creates an account that can never log in.
    pub async fn create_user(
        &self,
        username: &str,
        password: Option<&str>,
    ) -> Result<User, QuepasaError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(QuepasaError::Validation("empty username".into()));
        }
        let password_hash = match password {
            Some(password) if !password.is_empty() => Some(hash_password(password)?),
            Some(_) => return Err(QuepasaError::Validation("empty password".into())),
            None => None,
        };
        let user = User {
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        self.ctx.storage.create_user(&user).await?;
        Ok(user)
    }

    /// True when the user exists and the password matches its hash.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, QuepasaError> {
        let Some(user) = self.ctx.storage.get_user(username).await? else {
            return Ok(false);
        };
        Ok(user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash)))
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool, QuepasaError> {
        self.ctx.storage.user_exists(username).await
    }

    // --- lookups ---

    pub async fn servers(&self) -> Vec<Arc<Server>> {
        self.servers.read().await.values().cloned().collect()
    }

    /// Case-insensitive token lookup.
    pub async fn find_by_token(&self, token: &str) -> Option<Arc<Server>> {
        let servers = self.servers.read().await;
        if let Some(server) = servers.get(token) {
            return Some(Arc::clone(server));
        }
        servers
            .values()
            .find(|s| s.token().eq_ignore_ascii_case(token))
            .cloned()
    }

    pub async fn get_servers_for_user(&self, username: &str) -> Vec<Arc<Server>> {
        self.servers
            .read()
            .await
            .values()
            .filter(|s| s.owner() == username)
            .cloned()
            .collect()
    }

    async fn insert(&self, server: Arc<Server>) -> Arc<Server> {
        self.servers
            .write()
            .await
            .entry(server.token().to_string())
            .or_insert(server)
            .clone()
    }

    /// Returns the cached server, else loads it, else creates an empty row.
    pub async fn get_or_create_server_from_token(
        &self,
        token: &str,
    ) -> Result<Arc<Server>, QuepasaError> {
        if let Some(server) = self.find_by_token(token).await {
            return Ok(server);
        }
        let _guard = self.init_lock.lock().await;
        if let Some(server) = self.find_by_token(token).await {
            return Ok(server);
        }

        let server = match self.ctx.storage.get_server(token).await? {
            Some(record) => {
                let routes = self.ctx.storage.list_dispatching(token).await?;
                let server = Server::new(record, self.ctx.clone());
                server.load_routes(routes).await;
                server
            }
            None => {
                let record = ServerRecord::new(token, "");
                self.ctx.storage.upsert_server(&record).await?;
                info!(token, "empty server created");
                Server::new(record, self.ctx.clone())
            }
        };
        Ok(self.insert(server).await)
    }

    /// Finds the user's server for the phone behind `wid`, else mints one.
    pub async fn get_or_create_server(
        &self,
        username: &str,
        wid: &str,
    ) -> Result<Arc<Server>, QuepasaError> {
        let phone = phone_from_wid(wid);
        if !phone.is_empty() {
            let existing = self
                .get_servers_for_user(username)
                .await
                .into_iter()
                .find(|s| phone_from_wid(&s.wid()) == phone);
            if let Some(server) = existing {
                server.set_paired(username, wid);
                server.save("wid updated").await?;
                return Ok(server);
            }
        }

        let token = Uuid::new_v4().to_string();
        let mut record = ServerRecord::new(&token, username);
        record.wid = Some(wid.to_string());
        self.ctx.storage.upsert_server(&record).await?;
        info!(token = %token, username, "server created");
        Ok(self.insert(Server::new(record, self.ctx.clone())).await)
    }

    // --- pairing ---

    /// Opens a pairing connection. It expires after the configured pairing
    /// timeout unless upstream links a device first.
    pub async fn start_pairing(
        self: &Arc<Self>,
        username: &str,
        token: Option<String>,
    ) -> Result<Arc<Pairing>, QuepasaError> {
        let options = &self.ctx.options;
        let connection = self
            .ctx
            .factory
            .create(ConnectionOptions {
                wid: None,
                reconnect: false,
                history_sync_days: options.history_sync_days,
                presence: options.presence.clone(),
            })
            .await?;

        let pairing = Arc::new(Pairing::new(
            Uuid::new_v4().to_string(),
            token,
            username.to_string(),
            options.history_sync_days,
            Arc::clone(&connection),
        ));
        self.lock_pairings()
            .insert(pairing.id().to_string(), Arc::clone(&pairing));

        let registry = Arc::downgrade(self);
        let paired = Arc::clone(&pairing);
        let callback: PairedCallback = Arc::new(move |wid: String| {
            let registry = registry.clone();
            let pairing = Arc::clone(&paired);
            tokio::spawn(async move {
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                match registry.append_paired(&pairing, &wid).await {
                    Ok(server) => info!(token = %server.token(), wid = %wid, "device paired"),
                    Err(e) => warn!(wid = %wid, error = %e, "failed to attach paired device"),
                }
            });
        });
        connection.on_paired(callback);

        let registry = Arc::downgrade(self);
        let expiring = Arc::clone(&pairing);
        let timeout = options.pairing_timeout;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {}
                _ = shutdown.cancelled() => {}
            }
            if let Some(registry) = registry.upgrade() {
                registry.lock_pairings().remove(expiring.id());
            }
            if let Some(connection) = expiring.take_connection() {
                info!(pairing = %expiring.id(), username = %expiring.username(), "pairing expired");
                connection.dispose("pairing expired").await;
            }
        });

        debug!(pairing = %pairing.id(), username, "pairing started");
        Ok(pairing)
    }

    fn lock_pairings(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Pairing>>> {
        self.pairings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pending_pairings(&self) -> usize {
        self.lock_pairings().len()
    }

    /// Turns a linked pairing into a verified server owning its connection.
    pub async fn append_paired(
        &self,
        pairing: &Pairing,
        wid: &str,
    ) -> Result<Arc<Server>, QuepasaError> {
        let server = match pairing.token() {
            Some(token) => self.get_or_create_server_from_token(token).await?,
            None => self.get_or_create_server(pairing.username(), wid).await?,
        };
        server.set_paired(pairing.username(), wid);
        server.save("paired").await?;

        self.lock_pairings().remove(pairing.id());
        if let Some(connection) = pairing.take_connection() {
            server.set_connection(connection).await;
        }

        let ready = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = ready.ensure_ready().await {
                warn!(token = %ready.token(), error = %e, "server not ready after pairing");
            }
        });
        Ok(server)
    }

    // --- removal and health ---

    /// Deletes the server (upstream credentials, routes, row) and forgets it.
    pub async fn delete(&self, token: &str, cause: &str) -> Result<(), QuepasaError> {
        let server = self
            .find_by_token(token)
            .await
            .ok_or_else(|| QuepasaError::NotFound(format!("server not found: {token}")))?;
        server.delete(cause).await?;
        self.servers.write().await.remove(server.token());
        Ok(())
    }

    pub async fn get_health(&self) -> Vec<ServerHealth> {
        let mut items: Vec<ServerHealth> = self
            .servers
            .read()
            .await
            .values()
            .map(|s| s.health())
            .collect();
        items.sort_by(|a, b| a.token.cmp(&b.token));
        items
    }

    pub async fn health_stats(&self) -> HealthStats {
        HealthStats::from_states(
            self.servers
                .read()
                .await
                .values()
                .map(|s| s.state().is_healthy()),
        )
    }

    /// Stops every server and closes all AMQP clients.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for server in self.servers().await {
            if let Err(e) = server.stop("shutdown").await {
                warn!(token = %server.token(), error = %e, "stop during shutdown failed");
            }
        }
        self.ctx.dispatcher.amqp().close_all().await;
        info!("registry shut down");
    }
}

fn spawn_initialize(server: Arc<Server>) {
    tokio::spawn(async move {
        info!(token = %server.token(), "initializing server");
        if let Err(e) = server.start().await {
            warn!(token = %server.token(), error = %e, "initializing server failed");
        }
    });
}
