// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference-counted AMQP clients keyed by connection string.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::broker::BrokerConnector;
use super::client::{redact_uri, AmqpClient, AmqpOptions};

struct Entry {
    client: Arc<AmqpClient>,
    refs: usize,
}

/// Owns one [`AmqpClient`] per connection string.
pub struct AmqpRegistry {
    connector: Arc<dyn BrokerConnector>,
    options: AmqpOptions,
    clients: Mutex<HashMap<String, Entry>>,
    shutdown: CancellationToken,
}

impl AmqpRegistry {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        options: AmqpOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            connector,
            options,
            clients: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn options(&self) -> &AmqpOptions {
        &self.options
    }

    /// Returns the client for `uri`, creating it on first use, and takes a
    /// reference on it.
    pub async fn acquire(&self, uri: &str) -> Arc<AmqpClient> {
        let mut clients = self.clients.lock().await;
        let entry = clients.entry(uri.to_string()).or_insert_with(|| {
            debug!(uri = %redact_uri(uri), "creating amqp client");
            Entry {
                client: AmqpClient::start(
                    uri,
                    self.connector.clone(),
                    self.options.clone(),
                    &self.shutdown,
                ),
                refs: 0,
            }
        });
        entry.refs += 1;
        entry.client.clone()
    }

    pub async fn get(&self, uri: &str) -> Option<Arc<AmqpClient>> {
        self.clients.lock().await.get(uri).map(|e| e.client.clone())
    }

    pub async fn ref_count(&self, uri: &str) -> usize {
        self.clients.lock().await.get(uri).map_or(0, |e| e.refs)
    }

    /// Drops one reference; the client is closed when the last one goes.
    pub async fn release(&self, uri: &str) {
        let closing = {
            let mut clients = self.clients.lock().await;
            match clients.get_mut(uri) {
                Some(entry) if entry.refs > 1 => {
                    entry.refs -= 1;
                    None
                }
                Some(_) => clients.remove(uri).map(|e| e.client),
                None => None,
            }
        };
        if let Some(client) = closing {
            client.close().await;
        }
    }

    /// Closes the client for `uri` regardless of references.
    pub async fn close(&self, uri: &str) {
        let removed = self.clients.lock().await.remove(uri);
        if let Some(entry) = removed {
            entry.client.close().await;
        }
    }

    pub async fn close_all(&self) {
        let drained: Vec<_> = self.clients.lock().await.drain().collect();
        for (_, entry) in drained {
            entry.client.close().await;
        }
    }
}
