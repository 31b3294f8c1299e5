// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory broker for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quepasa_core::QuepasaError;

use crate::amqp::{BrokerChannel, BrokerConnector, Publication, Topology};
use crate::routing::RoutingKey;

#[derive(Default)]
struct BrokerState {
    up: AtomicBool,
    connects: AtomicUsize,
    declares: AtomicUsize,
    published: Mutex<Vec<(String, Publication)>>,
}

/// A broker that can be taken down and brought back.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<BrokerState>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// A broker that starts up.
    pub fn new() -> Self {
        let broker = Self {
            state: Arc::new(BrokerState::default()),
        };
        broker.set_up(true);
        broker
    }

    pub fn set_up(&self, up: bool) {
        self.state.up.store(up, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn declares(&self) -> usize {
        self.state.declares.load(Ordering::SeqCst)
    }

    /// Everything acknowledged so far, as `(exchange, publication)`.
    pub fn published(&self) -> Vec<(String, Publication)> {
        self.state
            .published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn routing_keys(&self) -> Vec<RoutingKey> {
        self.published()
            .into_iter()
            .map(|(_, p)| p.routing_key)
            .collect()
    }
}

#[async_trait]
impl BrokerConnector for MockBroker {
    async fn connect(&self, _uri: &str) -> Result<Arc<dyn BrokerChannel>, QuepasaError> {
        if !self.state.up.load(Ordering::SeqCst) {
            return Err(QuepasaError::transport("broker unreachable"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockChannel {
            state: self.state.clone(),
        }))
    }
}

struct MockChannel {
    state: Arc<BrokerState>,
}

#[async_trait]
impl BrokerChannel for MockChannel {
    fn is_connected(&self) -> bool {
        self.state.up.load(Ordering::SeqCst)
    }

    async fn declare(&self, _topology: &Topology) -> Result<(), QuepasaError> {
        if !self.is_connected() {
            return Err(QuepasaError::transport("broker unreachable"));
        }
        self.state.declares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        publication: &Publication,
    ) -> Result<(), QuepasaError> {
        if !self.is_connected() {
            return Err(QuepasaError::transport("broker unreachable"));
        }
        if let Ok(mut published) = self.state.published.lock() {
            published.push((exchange.to_string(), publication.clone()));
        }
        Ok(())
    }

    async fn close(&self) {}
}
