// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-server ingress: upstream callbacks, caching, and fan-out to sinks.
//!
//! Sink registration is serialized by a mutex; dispatch reads a lock-free
//! snapshot of the sink list and spawns one task per sink.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use quepasa_cache::MessageStore;
use quepasa_core::phone::phone_from_wid;
use quepasa_core::{
    Chat, Connection, ConnectionHandler, Message, MessageSink, MessageStatus, MessageType,
    PolicyKind,
};
use quepasa_dispatch::validate_for_dispatch;
use quepasa_prometheus::recording;

use crate::options::ServiceOptions;
use crate::server::Server;

type SinkList = Vec<Arc<dyn MessageSink>>;

/// Receives upstream events for one server.
pub struct Handler {
    token: String,
    server: Weak<Server>,
    store: MessageStore,
    sinks: ArcSwap<SinkList>,
    register_lock: Mutex<()>,
    options: Arc<ServiceOptions>,
}

impl Handler {
    pub(crate) fn new(token: String, server: Weak<Server>, options: Arc<ServiceOptions>) -> Self {
        Self {
            token,
            server,
            store: MessageStore::new(options.cache_days),
            sinks: ArcSwap::from_pointee(Vec::new()),
            register_lock: Mutex::new(()),
            options,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    fn registration(&self) -> MutexGuard<'_, ()> {
        self.register_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a sink. A sink whose id is already registered is ignored.
    pub fn register(&self, sink: Arc<dyn MessageSink>) -> bool {
        let _guard = self.registration();
        let current = self.sinks.load();
        if current.iter().any(|s| s.id() == sink.id()) {
            return false;
        }
        let mut next: SinkList = current.iter().cloned().collect();
        next.push(sink);
        self.sinks.store(Arc::new(next));
        true
    }

    /// Removes the sink with `id`, keeping every other registration.
    pub fn unregister(&self, id: &str) -> bool {
        let _guard = self.registration();
        let current = self.sinks.load();
        let next: SinkList = current.iter().filter(|s| s.id() != id).cloned().collect();
        let removed = next.len() != current.len();
        if removed {
            self.sinks.store(Arc::new(next));
        }
        removed
    }

    pub fn clear(&self) {
        let _guard = self.registration();
        self.sinks.store(Arc::new(Vec::new()));
    }

    pub fn sink_ids(&self) -> Vec<String> {
        self.sinks.load().iter().map(|s| s.id().to_string()).collect()
    }

    /// Fills missing chat and participant details from the contact manager.
    async fn enrich(&self, connection: &dyn Connection, msg: &mut Message) {
        enrich_chat(connection, &mut msg.chat).await;
        if let Some(participant) = msg.participant.as_mut() {
            enrich_chat(connection, participant).await;
        }
    }

    fn synopsis_for(&self, in_reply: &str) -> Option<String> {
        if self.options.synopsis_length == 0 {
            return None;
        }
        let cached = self.store.get_by_id(in_reply).ok()?;
        Some(synopsis(&cached.text, self.options.synopsis_length))
    }

    /// Caches the message and fans it out when the cache accepted it.
    async fn append(&self, msg: Message, source: &str) {
        if let Some(stored) = self.store.append(msg, source) {
            self.store.cleanup(self.options.cache_length);
            self.trigger(stored);
        }
    }

    /// Sends an accepted message to every registered sink.
    pub fn trigger(&self, msg: Arc<Message>) {
        if let Err(reason) = validate_for_dispatch(&msg, self.options.dispatch_unhandled) {
            debug!(token = %self.token, message_id = %msg.id, %reason, "message not dispatched");
            return;
        }

        if let Some(server) = self.server.upgrade() {
            if msg.is_event() {
                server.touch_event();
            } else {
                server.touch_message();
            }
        }

        let sinks = self.sinks.load_full();
        for sink in sinks.iter() {
            let sink = Arc::clone(sink);
            let msg = Arc::clone(&msg);
            tokio::spawn(async move {
                sink.deliver(msg).await;
            });
        }
    }

    fn wid(&self) -> String {
        self.server
            .upgrade()
            .map(|server| server.wid())
            .unwrap_or_default()
    }

    fn lifecycle_message(
        &self,
        event: &str,
        cause: &str,
        details: Option<&str>,
        text: String,
    ) -> Message {
        let wid = self.wid();
        let digits = phone_from_wid(&wid);
        let phone = if digits.is_empty() {
            String::new()
        } else {
            format!("+{digits}")
        };
        let now = Utc::now();

        let mut info = json!({
            "event": event,
            "cause": cause,
            "wid": wid,
            "phone": phone,
            "timestamp": now.to_rfc3339(),
        });
        if let Some(details) = details.filter(|d| !d.is_empty()) {
            info["details"] = json!(details);
        }

        Message {
            id: format!("SYSTEM-{}", Uuid::new_v4()),
            timestamp: now,
            kind: MessageType::System,
            chat: Chat::system(),
            text,
            wid,
            info: Some(info),
            ..Default::default()
        }
    }

    pub(crate) async fn on_stopped(&self, cause: &str) {
        let msg = self.lifecycle_message(
            "stopped",
            cause,
            None,
            format!("WhatsApp server manually stopped: {cause}"),
        );
        self.append(msg, "lifecycle").await;
    }

    pub(crate) async fn on_deleted(&self, cause: &str) {
        let msg = self.lifecycle_message(
            "deleted",
            cause,
            None,
            format!("WhatsApp server was deleted: {cause}"),
        );
        self.append(msg, "lifecycle").await;
    }
}

async fn enrich_chat(connection: &dyn Connection, chat: &mut Chat) {
    if chat.id.is_empty() || (!chat.title.is_empty() && !chat.phone.is_empty()) {
        return;
    }
    let Some(info) = connection.contact_info(&chat.id).await else {
        return;
    };
    if chat.title.is_empty() {
        chat.title = info.title;
    }
    if chat.phone.is_empty() {
        chat.phone = info.phone;
    }
    if chat.lid.is_empty() {
        chat.lid = info.lid;
    }
}

/// First `length - 4` characters of `text` followed by `" ..."` when it is
/// longer than that, else the whole text.
pub(crate) fn synopsis(text: &str, length: usize) -> String {
    let max = length.saturating_sub(4);
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head} ...")
    } else {
        text.to_string()
    }
}

/// Gives an unhandled message a unique id and a readable text.
pub(crate) fn mark_unhandled(msg: &mut Message) {
    msg.id = format!("{}-unhandled-{}", msg.id, Uuid::new_v4());
    if msg.text.is_empty()
        && let Some(content) = &msg.content
    {
        msg.text = content.describe();
    }
}

#[async_trait]
impl ConnectionHandler for Handler {
    async fn message(&self, mut msg: Message, source: &str) {
        let Some(server) = self.server.upgrade() else {
            recording::record_message_receive_error();
            warn!(token = %self.token, message_id = %msg.id, "message for a released server dropped");
            return;
        };

        let record = server.record();
        let global = &self.options.global;
        if msg.from_group() && !global.resolve_server(PolicyKind::Groups, &record) {
            trace!(token = %self.token, message_id = %msg.id, "group message skipped");
            return;
        }
        if msg.from_broadcast() && !global.resolve_server(PolicyKind::Broadcasts, &record) {
            trace!(token = %self.token, message_id = %msg.id, "broadcast message skipped");
            return;
        }

        if let Some(connection) = server.connection() {
            self.enrich(connection.as_ref(), &mut msg).await;
        }

        if !msg.in_reply.is_empty()
            && msg.synopsis.is_empty()
            && let Some(synopsis) = self.synopsis_for(&msg.in_reply)
        {
            msg.synopsis = synopsis;
        }

        if msg.kind == MessageType::Unhandled {
            mark_unhandled(&mut msg);
        }

        msg.wid = server.wid();
        if !msg.from_internal {
            recording::record_message_received();
        }
        trace!(token = %self.token, message_id = %msg.id, chat_id = %msg.chat.id, source, "appending message");
        self.append(msg, source).await;
    }

    async fn receipt(&self, mut msg: Message) {
        msg.wid = self.wid();
        self.trigger(Arc::new(msg));
    }

    async fn message_status_update(&self, id: &str, status: MessageStatus) {
        if self.store.update_status(id, status) {
            trace!(token = %self.token, message_id = id, %status, "message status advanced");
        }
    }

    async fn logged_out(&self, reason: &str) {
        warn!(token = %self.token, reason, "logged out by upstream");
        if let Some(server) = self.server.upgrade()
            && let Err(e) = server.mark_verified(false).await
        {
            warn!(token = %self.token, error = %e, "failed to persist logout");
        }
    }

    async fn on_connected(&self) {
        let Some(server) = self.server.upgrade() else {
            return;
        };
        server.reset_start();
        info!(token = %self.token, wid = %server.wid(), "connected");
        if let Err(e) = server.mark_verified(true).await {
            warn!(token = %self.token, error = %e, "failed to persist verification after connect");
        }
    }

    async fn on_disconnected(&self, cause: &str, details: &str) {
        let text = if details.is_empty() {
            format!("WhatsApp disconnected: {cause}")
        } else {
            format!("WhatsApp disconnected: {cause} - {details}")
        };
        let msg = self.lifecycle_message("disconnected", cause, Some(details), text);
        self.append(msg, "lifecycle").await;
    }
}
