// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream connection factory used by `serve`.
//!
//! No WhatsApp protocol client ships with this binary. Servers and pairings
//! are still created and persisted, but every connect attempt fails with
//! [`QuepasaError::InvalidConnection`], so servers stay idle until a real
//! [`ConnectionFactory`] is wired in.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use quepasa_core::{Connection, ConnectionFactory, ConnectionOptions, QuepasaError};

/// Factory that refuses every connection.
#[derive(Debug, Default)]
pub struct OfflineConnectionFactory;

#[async_trait]
impl ConnectionFactory for OfflineConnectionFactory {
    async fn create(
        &self,
        options: ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, QuepasaError> {
        warn!(
            wid = options.wid.as_deref().unwrap_or("<pairing>"),
            "no upstream client available, connection refused"
        );
        Err(QuepasaError::InvalidConnection)
    }
}
