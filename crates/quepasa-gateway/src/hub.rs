// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime hub: pushes every dispatched message to the WebSocket clients
//! bound to the server's token or to the master key.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use quepasa_core::{Message, RealtimeDispatch};

/// Per-client outbound buffer.
const CLIENT_BUFFER: usize = 64;

struct HubClient {
    token: String,
    tx: mpsc::Sender<String>,
}

/// Connected realtime clients keyed by connection id.
pub struct RealtimeHub {
    clients: DashMap<String, HubClient>,
    master_key: Option<String>,
}

impl RealtimeHub {
    pub fn new(master_key: Option<String>) -> Self {
        Self {
            clients: DashMap::new(),
            master_key: master_key.filter(|k| !k.is_empty()),
        }
    }

    /// Registers a client bound to `token` (a server token or the master key).
    /// Returns the connection id and the receiving end of its buffer.
    pub fn subscribe(&self, token: impl Into<String>) -> (String, mpsc::Receiver<String>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.insert(
            id.clone(),
            HubClient {
                token: token.into(),
                tx,
            },
        );
        (id, rx)
    }

    pub fn unsubscribe(&self, id: &str) {
        self.clients.remove(id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn is_master(&self, token: &str) -> bool {
        self.master_key.as_deref() == Some(token)
    }
}

impl RealtimeDispatch for RealtimeHub {
    fn dispatch(&self, token: &str, msg: &Message) {
        if self.clients.is_empty() {
            return;
        }
        let payload = match serde_json::to_string(msg) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(token = %token, message_id = %msg.id, error = %e, "realtime payload serialization failed");
                return;
            }
        };

        for entry in self.clients.iter() {
            let client = entry.value();
            if client.token != token && !self.is_master(&client.token) {
                continue;
            }
            if let Err(e) = client.tx.try_send(payload.clone()) {
                debug!(client = %entry.key(), error = %e, "realtime client not keeping up, message dropped");
            }
        }
    }

    fn has_active_connections(&self, token: &str) -> bool {
        self.clients.iter().any(|c| c.value().token == token)
    }
}
