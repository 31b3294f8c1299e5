// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One tenant server: its upstream connection, routes, and lifecycle.
//!
//! The state exposed to callers is derived from three facts (verified,
//! stop requested, connection present) plus the connection's own status;
//! it is never stored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use quepasa_core::phone::{USER_SUFFIX, format_endpoint, phone_from_wid, remove_digit9};
use quepasa_core::{
    Chat, ChatPresence, Connection, ConnectionFactory, ConnectionHandler, ConnectionOptions,
    ConnectionState, DispatchingRecord, GroupInfo, Message, MessageStatus, MessageType,
    PolicyKind, PolicyProvider, ProfilePicture, QuepasaError, RealtimeDispatch, RouteKind,
    SendResponse, ServerHealth, ServerRecord, StorageAdapter, TriState,
};
use quepasa_dispatch::{Dispatcher, Route, RouteState};
use quepasa_prometheus::recording;

use crate::handler::Handler;
use crate::options::ServiceOptions;
use crate::routes::{HUB_SINK_ID, HubSink, RouteSink, route_sink_id};

/// Collaborators shared by the registry and every server.
#[derive(Clone)]
pub struct ServiceContext {
    pub storage: Arc<dyn StorageAdapter>,
    pub factory: Arc<dyn ConnectionFactory>,
    pub dispatcher: Arc<Dispatcher>,
    pub hub: Option<Arc<dyn RealtimeDispatch>>,
    pub options: Arc<ServiceOptions>,
}

/// In-memory activity timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    pub start: Option<DateTime<Utc>>,
    pub last_message: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
}

/// A tenant bound to one upstream account.
pub struct Server {
    token: String,
    record: RwLock<ServerRecord>,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    connection_lock: tokio::sync::Mutex<()>,
    stop_requested: AtomicBool,
    timestamps: Mutex<Timestamps>,
    routes: tokio::sync::Mutex<Vec<Arc<Route>>>,
    handler: Arc<Handler>,
    ctx: ServiceContext,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read()
        .map(|guard| guard.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

impl Server {
    pub fn new(record: ServerRecord, ctx: ServiceContext) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let handler = Arc::new(Handler::new(
                record.token.clone(),
                weak.clone(),
                Arc::clone(&ctx.options),
            ));
            Self {
                token: record.token.clone(),
                record: RwLock::new(record),
                connection: RwLock::new(None),
                connection_lock: tokio::sync::Mutex::new(()),
                stop_requested: AtomicBool::new(false),
                timestamps: Mutex::new(Timestamps::default()),
                routes: tokio::sync::Mutex::new(Vec::new()),
                handler,
                ctx,
            }
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// Snapshot of the persisted row.
    pub fn record(&self) -> ServerRecord {
        read(&self.record)
    }

    fn update_record(&self, change: impl FnOnce(&mut ServerRecord)) -> ServerRecord {
        let mut guard = self
            .record
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut guard);
        guard.clone()
    }

    pub fn wid(&self) -> String {
        self.record
            .read()
            .map(|r| r.wid.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().wid.clone())
            .unwrap_or_default()
    }

    pub fn owner(&self) -> String {
        self.record().owner
    }

    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        read(&self.connection)
    }

    fn replace_connection(
        &self,
        connection: Option<Arc<dyn Connection>>,
    ) -> Option<Arc<dyn Connection>> {
        let mut guard = self
            .connection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, connection)
    }

    fn stamps(&self) -> MutexGuard<'_, Timestamps> {
        self.timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn timestamps(&self) -> Timestamps {
        *self.stamps()
    }

    pub(crate) fn touch_message(&self) {
        self.stamps().last_message = Some(Utc::now());
    }

    pub(crate) fn touch_event(&self) {
        self.stamps().last_event = Some(Utc::now());
    }

    pub(crate) fn reset_start(&self) {
        self.stamps().start = Some(Utc::now());
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        let verified = self.record().verified;
        let stopping = self.stop_requested();
        match self.connection() {
            None if !verified => ConnectionState::UnVerified,
            None if stopping => ConnectionState::Stopped,
            None => ConnectionState::UnPrepared,
            Some(c) if stopping => {
                if c.is_connected() {
                    ConnectionState::Stopping
                } else {
                    ConnectionState::Stopped
                }
            }
            Some(c) => c.status(),
        }
    }

    pub fn health(&self) -> ServerHealth {
        let state = self.state();
        ServerHealth {
            token: self.token.clone(),
            wid: self.wid(),
            state: state.to_string(),
            state_code: state.code(),
        }
    }

    fn devel_log(&self, event: &str) {
        if self.record().devel {
            debug!(token = %self.token, wid = %self.wid(), event, "devel lifecycle");
        }
    }

    // --- persistence ---

    /// Persists the record with a fresh `updated_at`.
    pub async fn save(&self, reason: &str) -> Result<(), QuepasaError> {
        let record = self.update_record(|r| r.updated_at = Utc::now());
        debug!(token = %self.token, reason, "saving server");
        self.ctx.storage.upsert_server(&record).await
    }

    /// Updates `verified`, saving only when it changed. The in-memory change
    /// is kept when saving fails.
    pub async fn mark_verified(&self, verified: bool) -> Result<(), QuepasaError> {
        let mut changed = false;
        self.update_record(|r| {
            changed = r.verified != verified;
            r.verified = verified;
        });
        if !changed {
            return Ok(());
        }
        info!(token = %self.token, verified, "verification changed");
        self.save("mark verified").await
    }

    pub(crate) fn set_paired(&self, owner: &str, wid: &str) {
        self.update_record(|r| {
            r.owner = owner.to_string();
            r.wid = Some(wid.to_string());
            r.verified = true;
        });
    }

    // --- lifecycle ---

    fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            wid: self.record().wid,
            reconnect: true,
            history_sync_days: self.ctx.options.history_sync_days,
            presence: self.ctx.options.presence.clone(),
        }
    }

    /// Registers every route sink and the realtime hub on the handler.
    async fn attach_sinks(self: &Arc<Self>) {
        for route in self.routes.lock().await.iter() {
            self.handler.register(Arc::new(RouteSink::new(
                Arc::clone(route),
                Arc::clone(&self.ctx.dispatcher),
                Arc::downgrade(self),
                Arc::clone(&self.ctx.options),
            )));
        }
        if let Some(hub) = &self.ctx.hub {
            self.handler
                .register(Arc::new(HubSink::new(Arc::clone(hub), self.token.clone())));
        }
    }

    /// Connects the server, creating its connection when absent.
    ///
    /// Safe to call repeatedly; an already connected server is left alone.
    pub async fn start(self: &Arc<Self>) -> Result<(), QuepasaError> {
        let _guard = self.connection_lock.lock().await;
        let record = self.record();
        if record.wid.is_some() && !record.verified {
            return Err(QuepasaError::Unverified);
        }

        info!(token = %self.token, wid = %self.wid(), "starting server");
        self.devel_log("start");
        self.stop_requested.store(false, Ordering::SeqCst);

        let connection = match self.connection() {
            Some(connection) => connection,
            None => {
                let created = match self.ctx.factory.create(self.connection_options()).await {
                    Ok(created) => created,
                    Err(QuepasaError::Unauthorized(reason)) => {
                        self.mark_verified(false).await?;
                        return Err(QuepasaError::Unauthorized(reason));
                    }
                    Err(e) => return Err(e),
                };
                self.replace_connection(Some(Arc::clone(&created)));
                created
            }
        };

        let handler: Arc<dyn ConnectionHandler> = self.handler.clone();
        connection.set_handler(handler);
        self.attach_sinks().await;

        if connection.is_connected() {
            debug!(token = %self.token, "already connected");
            return Ok(());
        }

        match connection.connect().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(token = %self.token, error = %e, "connection failed");
                if let Some(failed) = self.replace_connection(None) {
                    failed.dispose("start failed").await;
                }
                self.handler.clear();
                if let QuepasaError::Unauthorized(_) = &e {
                    self.mark_verified(false).await?;
                }
                Err(e)
            }
        }
    }

    /// Starts the server unless it is already running, as done after pairing.
    pub async fn ensure_ready(self: &Arc<Self>) -> Result<(), QuepasaError> {
        match self.state() {
            ConnectionState::Ready | ConnectionState::Connected | ConnectionState::Connecting => {
                self.attach_sinks().await;
                Ok(())
            }
            _ => self.start().await,
        }
    }

    /// Requests a stop: disposes the connection and clears every sink.
    pub async fn stop(&self, cause: &str) -> Result<(), QuepasaError> {
        let _guard = self.connection_lock.lock().await;
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(token = %self.token, cause, "stopping server");
        self.devel_log("stop");

        self.handler.on_stopped(cause).await;
        if let Some(connection) = self.replace_connection(None) {
            connection.dispose(&format!("stop: {cause}")).await;
        }
        self.handler.clear();
        Ok(())
    }

    /// Stop, wait, start.
    pub async fn restart(self: &Arc<Self>) -> Result<(), QuepasaError> {
        self.stop("restart").await?;
        tokio::time::sleep(self.ctx.options.restart_delay).await;
        info!(token = %self.token, "re-initializing server");
        self.start().await
    }

    /// Drops the connection without marking the server as stopped.
    pub async fn disconnect(&self, cause: &str) {
        let _guard = self.connection_lock.lock().await;
        if let Some(connection) = self.replace_connection(None) {
            info!(token = %self.token, cause, "disconnecting server");
            connection.dispose(cause).await;
        }
    }

    /// Hands a freshly paired connection to this server.
    pub async fn set_connection(self: &Arc<Self>, connection: Arc<dyn Connection>) {
        {
            let _guard = self.connection_lock.lock().await;
            if let Some(previous) = self.replace_connection(Some(Arc::clone(&connection)))
                && !Arc::ptr_eq(&previous, &connection)
            {
                previous.dispose("connection replaced").await;
            }
            let handler: Arc<dyn ConnectionHandler> = self.handler.clone();
            connection.set_handler(handler);
            self.stop_requested.store(false, Ordering::SeqCst);
        }
        self.attach_sinks().await;
    }

    /// Logs out upstream, drops every route and the stored row. Irreversible.
    pub async fn delete(&self, cause: &str) -> Result<(), QuepasaError> {
        let _guard = self.connection_lock.lock().await;
        info!(token = %self.token, cause, "deleting server");
        self.stop_requested.store(true, Ordering::SeqCst);

        if let Some(connection) = self.replace_connection(None) {
            if let Err(e) = connection.delete().await {
                warn!(token = %self.token, error = %e, "upstream delete failed");
            }
            connection.dispose(&format!("delete: {cause}")).await;
        }

        self.handler.on_deleted(cause).await;
        let routes = std::mem::take(&mut *self.routes.lock().await);
        for route in &routes {
            self.ctx.dispatcher.close_route(route).await;
        }
        self.handler.clear();
        self.ctx.storage.delete_server(&self.token).await
    }

    // --- messaging ---

    fn ready_connection(&self) -> Result<Arc<dyn Connection>, QuepasaError> {
        let state = self.state();
        if state != ConnectionState::Ready {
            return Err(QuepasaError::NotReady {
                wid: self.wid(),
                state,
            });
        }
        self.connection().ok_or(QuepasaError::InvalidConnection)
    }

    /// Formats the recipient and, when enabled, checks the variant without
    /// the Brazilian ninth digit.
    async fn resolve_chat_id(
        &self,
        connection: &dyn Connection,
        raw: &str,
    ) -> Result<String, QuepasaError> {
        let chat_id = format_endpoint(raw)?;
        if !self.ctx.options.remove_digit9 || !chat_id.ends_with(USER_SUFFIX) {
            return Ok(chat_id);
        }

        let phone = format!("+{}", phone_from_wid(&chat_id));
        let Some(without9) = remove_digit9(&phone) else {
            return Ok(chat_id);
        };
        let valid = connection.is_on_whatsapp(&[phone, without9]).await?;
        match valid.into_iter().next() {
            Some(found) => {
                debug!(token = %self.token, chat_id = %found, "found valid destination");
                Ok(found)
            }
            None => Ok(chat_id),
        }
    }

    async fn send_one(
        &self,
        connection: &dyn Connection,
        mut msg: Message,
        source: &str,
    ) -> Result<SendResponse, QuepasaError> {
        match connection.send(&msg).await {
            Ok(response) => {
                recording::record_message_sent();
                msg.id = response.id.clone();
                msg.timestamp = response.timestamp;
                msg.from_me = true;
                msg.from_internal = true;
                if msg.status < MessageStatus::Delivered {
                    msg.status = MessageStatus::Delivered;
                }
                self.handler.message(msg, source).await;
                Ok(response)
            }
            Err(e) => {
                recording::record_message_send_error();
                warn!(token = %self.token, chat_id = %msg.chat.id, error = %e, "send failed");
                Err(e)
            }
        }
    }

    /// Sends a message. Audio with a caption goes out as a text followed by
    /// the audio.
    pub async fn send(&self, mut msg: Message) -> Result<SendResponse, QuepasaError> {
        let connection = self.ready_connection()?;
        if msg.text.trim().is_empty() && !msg.has_attachment() && msg.poll.is_none() {
            return Err(QuepasaError::Validation("empty message content".into()));
        }
        msg.chat.id = self.resolve_chat_id(connection.as_ref(), &msg.chat.id).await?;
        if msg.timestamp.timestamp() == 0 {
            msg.timestamp = Utc::now();
        }

        if msg.has_attachment() && msg.kind == MessageType::Audio && !msg.text.is_empty() {
            let mut text_msg = msg.clone();
            text_msg.kind = MessageType::Text;
            text_msg.attachment = None;
            self.send_one(connection.as_ref(), text_msg, "text and audio")
                .await?;

            if !msg.id.is_empty() {
                msg.id = format!("{}-audio", msg.id);
            }
            msg.text.clear();
        }

        self.send_one(connection.as_ref(), msg, "server send").await
    }

    pub fn get_message(&self, id: &str) -> Result<Arc<Message>, QuepasaError> {
        self.handler.store().get_by_id(id)
    }

    /// Cached messages newer than `after`, newest first. Asks upstream for
    /// history when `after` predates the oldest cached message.
    pub async fn get_messages(&self, after: DateTime<Utc>) -> Vec<Arc<Message>> {
        let store = self.handler.store();
        let predates = store
            .get_leading()
            .is_some_and(|leading| after < leading.timestamp);
        if predates
            && let Ok(connection) = self.ready_connection()
            && let Err(e) = connection.history_sync(after).await
        {
            warn!(token = %self.token, error = %e, "requested history sync failed");
        }
        store.get_by_time(after)
    }

    pub async fn download(&self, id: &str, use_cache: bool) -> Result<Vec<u8>, QuepasaError> {
        let msg = self.get_message(id)?;
        if use_cache
            && let Some(content) = msg.attachment.as_ref().and_then(|a| a.content.clone())
        {
            return Ok(content);
        }
        self.ready_connection()?.download(&msg, use_cache).await
    }

    pub async fn revoke(&self, id: &str) -> Result<(), QuepasaError> {
        let msg = self.get_message(id)?;
        info!(token = %self.token, message_id = id, "revoking message");
        self.ready_connection()?.revoke(&msg).await
    }

    /// Revokes every cached message whose id starts with `prefix`, returning
    /// how many were revoked and the errors of the others.
    pub async fn revoke_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<(usize, Vec<QuepasaError>), QuepasaError> {
        let connection = self.ready_connection()?;
        let mut revoked = 0;
        let mut errors = Vec::new();
        for msg in self.handler.store().get_by_prefix(prefix) {
            info!(token = %self.token, message_id = %msg.id, prefix, "revoking message by prefix");
            match connection.revoke(&msg).await {
                Ok(()) => revoked += 1,
                Err(e) => errors.push(e),
            }
        }
        Ok((revoked, errors))
    }

    pub async fn edit(&self, id: &str, new_text: &str) -> Result<(), QuepasaError> {
        if new_text.trim().is_empty() {
            return Err(QuepasaError::Validation("empty edit content".into()));
        }
        let msg = self.get_message(id)?;
        info!(token = %self.token, message_id = id, "editing message");
        self.ready_connection()?.edit(&msg, new_text).await
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), QuepasaError> {
        let msg = self.get_message(id)?;
        self.ready_connection()?.mark_read(&msg).await?;
        self.handler.store().update_status(id, MessageStatus::Read);
        Ok(())
    }

    // --- pass-throughs ---

    pub async fn contacts(&self) -> Result<Vec<Chat>, QuepasaError> {
        self.ready_connection()?.contacts().await
    }

    pub async fn is_on_whatsapp(&self, phones: &[String]) -> Result<Vec<String>, QuepasaError> {
        self.ready_connection()?.is_on_whatsapp(phones).await
    }

    pub async fn invite_link(&self, chat_id: &str) -> Result<String, QuepasaError> {
        let chat_id = format_endpoint(chat_id)?;
        self.ready_connection()?.invite_link(&chat_id).await
    }

    pub async fn groups(&self) -> Result<Vec<GroupInfo>, QuepasaError> {
        self.ready_connection()?.groups().await
    }

    pub async fn group_info(&self, chat_id: &str) -> Result<GroupInfo, QuepasaError> {
        let chat_id = format_endpoint(chat_id)?;
        self.ready_connection()?.group_info(&chat_id).await
    }

    pub async fn profile_picture(&self, chat_id: &str) -> Result<ProfilePicture, QuepasaError> {
        let chat_id = format_endpoint(chat_id)?;
        self.ready_connection()?.profile_picture(&chat_id).await
    }

    pub async fn send_presence(
        &self,
        chat_id: &str,
        presence: ChatPresence,
    ) -> Result<(), QuepasaError> {
        let chat_id = format_endpoint(chat_id)?;
        self.ready_connection()?
            .send_presence(&chat_id, presence)
            .await
    }

    // --- settings ---

    /// Flips one policy flag by name and saves.
    pub async fn toggle(&self, key: &str) -> Result<TriState, QuepasaError> {
        let kind: PolicyKind = key
            .parse()
            .map_err(|_| QuepasaError::Validation(format!("invalid toggle key: {key}")))?;
        let current = self
            .ctx
            .options
            .global
            .resolve_server(kind, &self.record());
        let value = self.record().policy(kind).toggled(current);
        self.update_record(|r| r.set_policy(kind, value));
        self.save("toggle").await?;
        Ok(value)
    }

    /// Sets one policy flag by name and saves.
    pub async fn set_policy(&self, key: &str, value: TriState) -> Result<(), QuepasaError> {
        let kind: PolicyKind = key
            .parse()
            .map_err(|_| QuepasaError::Validation(format!("invalid policy key: {key}")))?;
        self.update_record(|r| r.set_policy(kind, value));
        self.save("set policy").await
    }

    pub async fn toggle_devel(&self) -> Result<bool, QuepasaError> {
        let record = self.update_record(|r| r.devel = !r.devel);
        self.save("toggle devel").await?;
        Ok(record.devel)
    }

    // --- routes ---

    pub async fn routes(&self) -> Vec<Arc<Route>> {
        self.routes.lock().await.clone()
    }

    pub async fn routes_of(&self, kind: RouteKind) -> Vec<Arc<Route>> {
        self.routes
            .lock()
            .await
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    fn sink_for(self: &Arc<Self>, route: &Arc<Route>) -> Arc<RouteSink> {
        Arc::new(RouteSink::new(
            Arc::clone(route),
            Arc::clone(&self.ctx.dispatcher),
            Arc::downgrade(self),
            Arc::clone(&self.ctx.options),
        ))
    }

    /// Opens routes loaded from storage at boot.
    pub async fn load_routes(self: &Arc<Self>, records: Vec<DispatchingRecord>) {
        let mut routes = self.routes.lock().await;
        for record in records {
            let route = Arc::new(
                self.ctx
                    .dispatcher
                    .open_route(record, RouteState::default())
                    .await,
            );
            self.handler.register(self.sink_for(&route));
            routes.push(route);
        }
    }

    /// Adds or replaces the route keyed by its connection string, keeping the
    /// failure bookkeeping of a replaced route. Returns true when it is new.
    pub async fn upsert_route(
        self: &Arc<Self>,
        mut record: DispatchingRecord,
    ) -> Result<bool, QuepasaError> {
        record.context = self.token.clone();
        self.ctx.storage.upsert_dispatching(&record).await?;

        let mut routes = self.routes.lock().await;
        let position = routes
            .iter()
            .position(|r| r.connection_string() == record.connection_string);
        let state = position
            .map(|i| routes[i].state())
            .unwrap_or_default();
        let route = Arc::new(self.ctx.dispatcher.open_route(record, state).await);

        let created = match position {
            Some(i) => {
                let previous = std::mem::replace(&mut routes[i], Arc::clone(&route));
                self.handler
                    .unregister(&route_sink_id(previous.connection_string()));
                self.ctx.dispatcher.close_route(&previous).await;
                false
            }
            None => {
                routes.push(Arc::clone(&route));
                true
            }
        };
        if !self.stop_requested() {
            self.handler.register(self.sink_for(&route));
        }
        info!(token = %self.token, route = %route.connection_string(), created, "route saved");
        Ok(created)
    }

    /// Removes one route. Returns false when none matched.
    pub async fn remove_route(&self, connection_string: &str) -> Result<bool, QuepasaError> {
        let mut routes = self.routes.lock().await;
        let Some(position) = routes
            .iter()
            .position(|r| r.connection_string() == connection_string)
        else {
            return Ok(false);
        };
        self.ctx
            .storage
            .delete_dispatching(&self.token, connection_string)
            .await?;
        let route = routes.remove(position);
        self.handler.unregister(&route_sink_id(connection_string));
        self.ctx.dispatcher.close_route(&route).await;
        info!(token = %self.token, route = connection_string, "route removed");
        Ok(true)
    }

    /// Removes every route of `kind`, or all routes when `kind` is `None`.
    pub async fn clear_routes(&self, kind: Option<RouteKind>) -> Result<usize, QuepasaError> {
        let mut routes = self.routes.lock().await;
        let (removed, kept): (Vec<_>, Vec<_>) = routes
            .drain(..)
            .partition(|r| kind.is_none_or(|k| r.kind() == k));
        *routes = kept;

        if kind.is_none() {
            self.ctx.storage.clear_dispatching(&self.token).await?;
        }
        for route in &removed {
            if kind.is_some() {
                self.ctx
                    .storage
                    .delete_dispatching(&self.token, route.connection_string())
                    .await?;
            }
            self.handler
                .unregister(&route_sink_id(route.connection_string()));
            self.ctx.dispatcher.close_route(route).await;
        }
        Ok(removed.len())
    }

    pub fn has_realtime_sink(&self) -> bool {
        self.handler.sink_ids().iter().any(|id| id == HUB_SINK_ID)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("token", &self.token)
            .field("wid", &self.wid())
            .field("state", &self.state())
            .finish()
    }
}
