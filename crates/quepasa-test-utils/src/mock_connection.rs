// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock upstream connection for deterministic testing.
//!
//! `MockConnection` implements `Connection` entirely in memory. Tests inject
//! inbound traffic with `emit_message()`, simulate a linked device with
//! `emit_paired()`, and assert on captured sends, revokes, and syncs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quepasa_core::phone::{USER_SUFFIX, phone_from_wid};
use quepasa_core::{
    Chat, ChatPresence, Connection, ConnectionFactory, ConnectionHandler, ConnectionOptions,
    ConnectionState, GroupInfo, Message, MessageStatus, PairedCallback, ProfilePicture,
    QuepasaError, SendResponse,
};

struct MockState {
    wid: Option<String>,
    status: ConnectionState,
    reconnect: bool,
    unauthorized: bool,
    fail_connect: bool,
    fail_send: bool,
    handler: Option<Arc<dyn ConnectionHandler>>,
    paired: Option<PairedCallback>,
    sent: Vec<Message>,
    registered: HashSet<String>,
    contacts: Vec<Chat>,
    disposed: Option<String>,
    deleted: bool,
    history_syncs: Vec<DateTime<Utc>>,
    revoked: Vec<String>,
    edited: Vec<(String, String)>,
    marked_read: Vec<String>,
    presences: Vec<(String, ChatPresence)>,
    download: Vec<u8>,
}

/// An in-memory upstream session.
pub struct MockConnection {
    state: Mutex<MockState>,
    counter: AtomicUsize,
}

impl MockConnection {
    /// A disconnected connection bound to `wid` (or pairing when `None`).
    pub fn new(wid: Option<String>) -> Self {
        Self {
            state: Mutex::new(MockState {
                wid,
                status: ConnectionState::Disconnected,
                reconnect: false,
                unauthorized: false,
                fail_connect: false,
                fail_send: false,
                handler: None,
                paired: None,
                sent: Vec::new(),
                registered: HashSet::new(),
                contacts: Vec::new(),
                disposed: None,
                deleted: false,
                history_syncs: Vec::new(),
                revoked: Vec::new(),
                edited: Vec::new(),
                marked_read: Vec::new(),
                presences: Vec::new(),
                download: Vec::new(),
            }),
            counter: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // --- configuration ---

    /// Makes `connect()` fail as if upstream revoked the credentials.
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.lock().unauthorized = unauthorized;
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.lock().fail_send = fail;
    }

    pub fn set_status(&self, status: ConnectionState) {
        self.lock().status = status;
    }

    /// Marks phone numbers (digits, any format) as registered on the network.
    pub fn register_phones(&self, phones: &[&str]) {
        let mut state = self.lock();
        for phone in phones {
            state.registered.insert(phone_from_wid(phone));
        }
    }

    pub fn add_contact(&self, chat: Chat) {
        self.lock().contacts.push(chat);
    }

    pub fn set_download(&self, bytes: Vec<u8>) {
        self.lock().download = bytes;
    }

    // --- inspection ---

    pub fn sent(&self) -> Vec<Message> {
        self.lock().sent.clone()
    }

    pub fn disposed(&self) -> Option<String> {
        self.lock().disposed.clone()
    }

    pub fn is_deleted(&self) -> bool {
        self.lock().deleted
    }

    pub fn history_syncs(&self) -> Vec<DateTime<Utc>> {
        self.lock().history_syncs.clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.lock().revoked.clone()
    }

    pub fn edited(&self) -> Vec<(String, String)> {
        self.lock().edited.clone()
    }

    pub fn marked_read(&self) -> Vec<String> {
        self.lock().marked_read.clone()
    }

    pub fn presences(&self) -> Vec<(String, ChatPresence)> {
        self.lock().presences.clone()
    }

    pub fn reconnect(&self) -> bool {
        self.lock().reconnect
    }

    pub fn has_handler(&self) -> bool {
        self.lock().handler.is_some()
    }

    // --- upstream events ---

    fn handler(&self) -> Option<Arc<dyn ConnectionHandler>> {
        self.lock().handler.clone()
    }

    /// Pushes an inbound message into the attached handler.
    pub async fn emit_message(&self, msg: Message) {
        if let Some(handler) = self.handler() {
            handler.message(msg, "mock").await;
        }
    }

    pub async fn emit_receipt(&self, msg: Message) {
        if let Some(handler) = self.handler() {
            handler.receipt(msg).await;
        }
    }

    pub async fn emit_status(&self, id: &str, status: MessageStatus) {
        if let Some(handler) = self.handler() {
            handler.message_status_update(id, status).await;
        }
    }

    pub async fn emit_logged_out(&self, reason: &str) {
        if let Some(handler) = self.handler() {
            handler.logged_out(reason).await;
        }
    }

    pub async fn emit_disconnected(&self, cause: &str, details: &str) {
        self.lock().status = ConnectionState::Disconnected;
        if let Some(handler) = self.handler() {
            handler.on_disconnected(cause, details).await;
        }
    }

    /// Simulates the device being linked to `wid`.
    pub fn emit_paired(&self, wid: &str) {
        let callback = {
            let mut state = self.lock();
            state.wid = Some(wid.to_string());
            state.paired.clone()
        };
        if let Some(callback) = callback {
            callback(wid.to_string());
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn wid(&self) -> Option<String> {
        self.lock().wid.clone()
    }

    fn status(&self) -> ConnectionState {
        self.lock().status
    }

    fn is_connected(&self) -> bool {
        matches!(
            self.lock().status,
            ConnectionState::Connected | ConnectionState::Fetching | ConnectionState::Ready
        )
    }

    fn set_handler(&self, handler: Arc<dyn ConnectionHandler>) {
        self.lock().handler = Some(handler);
    }

    fn set_reconnect(&self, enabled: bool) {
        self.lock().reconnect = enabled;
    }

    fn on_paired(&self, callback: PairedCallback) {
        self.lock().paired = Some(callback);
    }

    async fn connect(&self) -> Result<(), QuepasaError> {
        let handler = {
            let mut state = self.lock();
            if state.unauthorized {
                return Err(QuepasaError::Unauthorized("device logged out".into()));
            }
            if state.fail_connect {
                return Err(QuepasaError::transport("upstream unreachable"));
            }
            state.status = ConnectionState::Ready;
            state.handler.clone()
        };
        if let Some(handler) = handler {
            handler.on_connected().await;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), QuepasaError> {
        self.lock().status = ConnectionState::Disconnected;
        Ok(())
    }

    async fn dispose(&self, reason: &str) {
        let mut state = self.lock();
        state.status = ConnectionState::Disconnected;
        state.disposed = Some(reason.to_string());
    }

    async fn delete(&self) -> Result<(), QuepasaError> {
        self.lock().deleted = true;
        Ok(())
    }

    async fn send(&self, msg: &Message) -> Result<SendResponse, QuepasaError> {
        let mut state = self.lock();
        if state.fail_send {
            return Err(QuepasaError::transport("send rejected"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = if msg.id.is_empty() {
            format!("MOCK{n}")
        } else {
            msg.id.clone()
        };
        state.sent.push(msg.clone());
        Ok(SendResponse {
            id,
            timestamp: Utc::now(),
        })
    }

    async fn download(&self, msg: &Message, _use_cache: bool) -> Result<Vec<u8>, QuepasaError> {
        let state = self.lock();
        if state.download.is_empty() {
            return Err(QuepasaError::NotFound(format!("no media for {}", msg.id)));
        }
        Ok(state.download.clone())
    }

    async fn revoke(&self, msg: &Message) -> Result<(), QuepasaError> {
        self.lock().revoked.push(msg.id.clone());
        Ok(())
    }

    async fn edit(&self, msg: &Message, new_text: &str) -> Result<(), QuepasaError> {
        self.lock()
            .edited
            .push((msg.id.clone(), new_text.to_string()));
        Ok(())
    }

    async fn mark_read(&self, msg: &Message) -> Result<(), QuepasaError> {
        self.lock().marked_read.push(msg.id.clone());
        Ok(())
    }

    async fn is_on_whatsapp(&self, phones: &[String]) -> Result<Vec<String>, QuepasaError> {
        let state = self.lock();
        Ok(phones
            .iter()
            .map(|p| phone_from_wid(p.trim_start_matches('+')))
            .filter(|digits| state.registered.contains(digits))
            .map(|digits| format!("{digits}{USER_SUFFIX}"))
            .collect())
    }

    async fn contacts(&self) -> Result<Vec<Chat>, QuepasaError> {
        Ok(self.lock().contacts.clone())
    }

    async fn contact_info(&self, chat_id: &str) -> Option<Chat> {
        self.lock()
            .contacts
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
    }

    async fn invite_link(&self, chat_id: &str) -> Result<String, QuepasaError> {
        Ok(format!("https://chat.whatsapp.com/{}", phone_from_wid(chat_id)))
    }

    async fn groups(&self) -> Result<Vec<GroupInfo>, QuepasaError> {
        Ok(Vec::new())
    }

    async fn group_info(&self, chat_id: &str) -> Result<GroupInfo, QuepasaError> {
        Ok(GroupInfo {
            id: chat_id.to_string(),
            title: "mock group".into(),
            ..Default::default()
        })
    }

    async fn profile_picture(&self, chat_id: &str) -> Result<ProfilePicture, QuepasaError> {
        Ok(ProfilePicture {
            id: "1".into(),
            chat_id: chat_id.to_string(),
            url: format!("https://pps.example/{}", phone_from_wid(chat_id)),
        })
    }

    async fn send_presence(
        &self,
        chat_id: &str,
        presence: ChatPresence,
    ) -> Result<(), QuepasaError> {
        self.lock()
            .presences
            .push((chat_id.to_string(), presence));
        Ok(())
    }

    async fn history_sync(&self, after: DateTime<Utc>) -> Result<(), QuepasaError> {
        self.lock().history_syncs.push(after);
        Ok(())
    }

    async fn pairing_qr(&self) -> Result<String, QuepasaError> {
        Ok("2@mock-qr-payload".into())
    }

    async fn pair_code(&self, phone: &str) -> Result<String, QuepasaError> {
        let digits = phone_from_wid(phone.trim_start_matches('+'));
        let tail: String = digits.chars().rev().take(4).collect();
        Ok(format!("MOCK-{tail}"))
    }
}

/// Factory returning [`MockConnection`]s and remembering each one.
#[derive(Default)]
pub struct MockConnectionFactory {
    created: Mutex<Vec<(ConnectionOptions, Arc<MockConnection>)>>,
    unauthorized: std::sync::atomic::AtomicBool,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create()` itself fail with `Unauthorized`.
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ConnectionOptions, Arc<MockConnection>)>> {
        self.created.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn created(&self) -> usize {
        self.lock().len()
    }

    /// The most recently created connection.
    pub fn last(&self) -> Option<Arc<MockConnection>> {
        self.lock().last().map(|(_, c)| Arc::clone(c))
    }

    pub fn last_options(&self) -> Option<ConnectionOptions> {
        self.lock().last().map(|(o, _)| o.clone())
    }

    /// The latest connection created for `wid`.
    pub fn for_wid(&self, wid: &str) -> Option<Arc<MockConnection>> {
        self.lock()
            .iter()
            .rev()
            .find(|(o, _)| o.wid.as_deref() == Some(wid))
            .map(|(_, c)| Arc::clone(c))
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(
        &self,
        options: ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, QuepasaError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(QuepasaError::Unauthorized("no stored session".into()));
        }
        let connection = Arc::new(MockConnection::new(options.wid.clone()));
        connection.set_reconnect(options.reconnect);
        self.lock().push((options, Arc::clone(&connection)));
        Ok(connection)
    }

    async fn canonical_wid(&self, legacy_wid: &str) -> Option<String> {
        let phone = legacy_wid.strip_suffix("@migrated")?;
        Some(format!("{phone}:1{USER_SUFFIX}"))
    }
}
