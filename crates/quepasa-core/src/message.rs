// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The normalized message model shared by ingress, cache, and dispatch.
//!
//! The JSON shape of [`Message`] is the public webhook contract. Fields that
//! only matter internally (`content`, the dispatch error flag) never
//! serialize.

use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumString};

/// Id of the synthetic message used to carry read receipts.
pub const READ_RECEIPT_ID: &str = "readreceipt";

/// Chat id used for gateway-generated lifecycle messages.
pub const SYSTEM_CHAT_ID: &str = "system";

const SYSTEM_CHAT_TITLE: &str = "Internal System Message";

/// Kind of a message.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    #[default]
    Unhandled,
    Image,
    Document,
    Audio,
    Video,
    Text,
    Location,
    Contact,
    Call,
    System,
    Group,
    Revoke,
    Poll,
}

/// Delivery status. Ordering is significant: status only ever advances.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Unknown,
    Error,
    Imported,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn is_unknown(&self) -> bool {
        *self == Self::Unknown
    }
}

/// A chat or participant reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub lid: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub title: String,
}

impl Chat {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn system() -> Self {
        Self {
            id: SYSTEM_CHAT_ID.into(),
            title: SYSTEM_CHAT_TITLE.into(),
            ..Default::default()
        }
    }
}

impl Serialize for Chat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            lid: Option<&'a str>,
            #[serde(skip_serializing_if = "str_is_empty")]
            phone: &'a str,
            #[serde(skip_serializing_if = "str_is_empty")]
            title: &'a str,
        }

        let lid = (!self.lid.is_empty() && self.lid != self.id).then_some(self.lid.as_str());
        Wire {
            id: &self.id,
            lid,
            phone: &self.phone,
            title: &self.title,
        }
        .serialize(serializer)
    }
}

fn str_is_empty(s: &&str) -> bool {
    s.is_empty()
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Attachment metadata. The bytes themselves never serialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime: String,
    #[serde(rename = "filelength", default, skip_serializing_if = "is_zero_u64")]
    pub length: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Vec<u8>>,
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

/// A poll carried by a `poll` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub selections: u32,
}

/// The upstream payload attached to a message, used for duplicate detection.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamContent {
    /// A decoded protocol message as a JSON tree.
    Structured(Value),
    /// A payload the connection could not map onto a known type.
    Unknown { type_tag: String, raw: Vec<u8> },
}

impl UpstreamContent {
    /// Whether two contents describe the same message.
    ///
    /// Structured contents match on their `conversation` text when both have
    /// one, and otherwise on the whole tree with every
    /// `conversionDelaySeconds` key removed.
    pub fn semantically_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Structured(a), Self::Structured(b)) => {
                if let (Some(x), Some(y)) = (conversation(a), conversation(b)) {
                    return x == y;
                }
                strip_volatile(a) == strip_volatile(b)
            }
            (
                Self::Unknown {
                    type_tag: ta,
                    raw: ra,
                },
                Self::Unknown {
                    type_tag: tb,
                    raw: rb,
                },
            ) => ta == tb && ra == rb,
            _ => false,
        }
    }

    /// Deterministic text rendering used for unhandled messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Structured(v) => v.to_string(),
            Self::Unknown { type_tag, raw } => format!(
                "[Type: {type_tag}] {}",
                base64::engine::general_purpose::STANDARD.encode(raw)
            ),
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            Self::Structured(_) => "structured",
            Self::Unknown { type_tag, .. } => type_tag,
        }
    }
}

fn conversation(v: &Value) -> Option<&str> {
    v.get("conversation").and_then(Value::as_str)
}

fn strip_volatile(v: &Value) -> Value {
    match v {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != "conversionDelaySeconds")
                .map(|(k, v)| (k.clone(), strip_volatile(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_volatile).collect()),
        other => other.clone(),
    }
}

/// Best-effort flag set when the last dispatch of a message failed.
#[derive(Debug, Default)]
pub struct DispatchErrorFlag(AtomicBool);

impl DispatchErrorFlag {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Clone for DispatchErrorFlag {
    fn clone(&self) -> Self {
        Self(AtomicBool::new(self.is_set()))
    }
}

/// A normalized chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "trackid", default, skip_serializing_if = "String::is_empty")]
    pub track_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Chat>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(rename = "fromme", default)]
    pub from_me: bool,
    #[serde(rename = "frominternal", default)]
    pub from_internal: bool,
    #[serde(rename = "fromhistory", default, skip_serializing_if = "is_false")]
    pub from_history: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub edited: bool,
    #[serde(rename = "forwardingscore", default, skip_serializing_if = "is_zero")]
    pub forwarding_score: u32,
    #[serde(rename = "inreply", default, skip_serializing_if = "String::is_empty")]
    pub in_reply: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub synopsis: String,
    #[serde(default, skip_serializing_if = "MessageStatus::is_unknown")]
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub wid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(skip)]
    pub content: Option<UpstreamContent>,
    #[serde(skip)]
    pub dispatch_error: DispatchErrorFlag,
}

impl Message {
    /// A text message addressed to `chat_id`, stamped now.
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: MessageType::Text,
            chat: Chat::new(chat_id),
            text: text.into(),
            ..Default::default()
        }
    }

    /// The synthetic receipt message fed to `Trigger` without caching.
    pub fn read_receipt(chat: Chat, info: Value) -> Self {
        Self {
            id: READ_RECEIPT_ID.into(),
            timestamp: Utc::now(),
            kind: MessageType::System,
            chat,
            info: Some(info),
            ..Default::default()
        }
    }

    pub fn is_read_receipt(&self) -> bool {
        self.id == READ_RECEIPT_ID
    }

    pub fn from_group(&self) -> bool {
        self.chat.id.ends_with("@g.us")
    }

    pub fn from_broadcast(&self) -> bool {
        let id = self.chat.id.as_str();
        id == "status" || id == "status@broadcast" || id.ends_with("@newsletter")
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Events update the server's "last event" timestamp; everything else is
    /// a regular message.
    pub fn is_event(&self) -> bool {
        self.is_read_receipt()
            || matches!(self.kind, MessageType::Unhandled | MessageType::System)
    }

    /// Content equality against a previously cached copy. Missing content on
    /// either side never counts as a duplicate.
    pub fn same_content(&self, other: &Message) -> bool {
        match (&self.content, &other.content) {
            (Some(a), Some(b)) => a.semantically_eq(b),
            _ => false,
        }
    }
}
