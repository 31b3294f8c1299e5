// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending device pairings.
//!
//! A pairing owns a connection before any server row exists. It is resolved
//! into a server when upstream reports the linked wid, or disposed when it
//! expires.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use quepasa_core::{Connection, QuepasaError};

pub struct Pairing {
    id: String,
    token: Option<String>,
    username: String,
    history_sync_days: u32,
    created_at: DateTime<Utc>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

impl Pairing {
    pub(crate) fn new(
        id: String,
        token: Option<String>,
        username: String,
        history_sync_days: u32,
        connection: Arc<dyn Connection>,
    ) -> Self {
        Self {
            id,
            token,
            username,
            history_sync_days,
            created_at: Utc::now(),
            connection: Mutex::new(Some(connection)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Server token to reuse, when re-pairing an existing server.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn history_sync_days(&self) -> u32 {
        self.history_sync_days
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn connection(&self) -> Result<Arc<dyn Connection>, QuepasaError> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(QuepasaError::InvalidConnection)
    }

    /// Hands the connection over; later calls return `None`.
    pub(crate) fn take_connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Next QR payload to show the user.
    pub async fn qr(&self) -> Result<String, QuepasaError> {
        self.connection()?.pairing_qr().await
    }

    /// Phone-number pairing code for `phone`.
    pub async fn pair_code(&self, phone: &str) -> Result<String, QuepasaError> {
        let phone = quepasa_core::phone::phone_if_valid(phone)
            .ok_or_else(|| QuepasaError::Validation(format!("invalid phone: {phone}")))?;
        self.connection()?.pair_code(&phone).await
    }

    pub fn is_resolved(&self) -> bool {
        self.connection
            .lock()
            .map(|c| c.is_none())
            .unwrap_or(true)
    }
}

impl std::fmt::Debug for Pairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pairing")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("username", &self.username)
            .finish()
    }
}
