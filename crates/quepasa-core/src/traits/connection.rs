// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The upstream connection capability and its event callbacks.
//!
//! A [`Connection`] wraps one session against the chat network. Inbound
//! traffic (messages, receipts, status updates, lifecycle) is pushed into
//! the attached [`ConnectionHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::QuepasaError;
use crate::message::{Chat, Message, MessageStatus};
use crate::state::ConnectionState;

/// Invoked with the new wid once a pairing connection is linked.
pub type PairedCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Result of a successful upstream send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub participants: Vec<Chat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePicture {
    pub id: String,
    #[serde(rename = "chatid")]
    pub chat_id: String,
    pub url: String,
}

/// Typing indicators and availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChatPresence {
    Composing,
    Recording,
    Paused,
}

/// Options used to construct a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Existing session to resume; `None` starts a new pairing.
    pub wid: Option<String>,
    pub reconnect: bool,
    pub history_sync_days: u32,
    /// Account presence announced after connecting (`available`/`unavailable`).
    pub presence: Option<String>,
}

/// Receiver of upstream events.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// A new or updated inbound message. `source` labels its origin for logs.
    async fn message(&self, msg: Message, source: &str);

    /// A read/delivery receipt; never cached.
    async fn receipt(&self, msg: Message);

    async fn message_status_update(&self, id: &str, status: MessageStatus);

    /// Upstream revoked the credentials.
    async fn logged_out(&self, reason: &str);

    async fn on_connected(&self);

    async fn on_disconnected(&self, cause: &str, details: &str);
}

/// One upstream session.
#[async_trait]
pub trait Connection: Send + Sync {
    fn wid(&self) -> Option<String>;

    fn status(&self) -> ConnectionState;

    fn is_connected(&self) -> bool;

    fn set_handler(&self, handler: Arc<dyn ConnectionHandler>);

    fn set_reconnect(&self, enabled: bool);

    /// Registers the callback fired when a pairing links a device.
    fn on_paired(&self, callback: PairedCallback);

    /// Connects; an `Unauthorized` error means credentials were revoked.
    async fn connect(&self) -> Result<(), QuepasaError>;

    async fn disconnect(&self) -> Result<(), QuepasaError>;

    /// Releases every resource; in-flight calls return errors afterwards.
    async fn dispose(&self, reason: &str);

    /// Logs out and removes the stored credentials.
    async fn delete(&self) -> Result<(), QuepasaError>;

    async fn send(&self, msg: &Message) -> Result<SendResponse, QuepasaError>;

    async fn download(&self, msg: &Message, use_cache: bool) -> Result<Vec<u8>, QuepasaError>;

    async fn revoke(&self, msg: &Message) -> Result<(), QuepasaError>;

    async fn edit(&self, msg: &Message, new_text: &str) -> Result<(), QuepasaError>;

    async fn mark_read(&self, msg: &Message) -> Result<(), QuepasaError>;

    /// Returns the subset of `phones` registered upstream, as wids.
    async fn is_on_whatsapp(&self, phones: &[String]) -> Result<Vec<String>, QuepasaError>;

    async fn contacts(&self) -> Result<Vec<Chat>, QuepasaError>;

    /// Title/phone/lid enrichment for a chat or participant id.
    async fn contact_info(&self, chat_id: &str) -> Option<Chat>;

    async fn invite_link(&self, chat_id: &str) -> Result<String, QuepasaError>;

    async fn groups(&self) -> Result<Vec<GroupInfo>, QuepasaError>;

    async fn group_info(&self, chat_id: &str) -> Result<GroupInfo, QuepasaError>;

    async fn profile_picture(&self, chat_id: &str) -> Result<ProfilePicture, QuepasaError>;

    async fn send_presence(
        &self,
        chat_id: &str,
        presence: ChatPresence,
    ) -> Result<(), QuepasaError>;

    /// Asks upstream to replay history newer than `after`.
    async fn history_sync(&self, after: DateTime<Utc>) -> Result<(), QuepasaError>;

    /// Returns the next pairing QR payload.
    async fn pairing_qr(&self) -> Result<String, QuepasaError>;

    /// Requests a phone-number pairing code.
    async fn pair_code(&self, phone: &str) -> Result<String, QuepasaError>;
}

/// Builds connections for servers and pairings.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        options: ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, QuepasaError>;

    /// Maps a legacy `…@migrated` wid onto the canonical stored session id.
    async fn canonical_wid(&self, _legacy_wid: &str) -> Option<String> {
        None
    }
}
