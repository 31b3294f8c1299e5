// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for users, servers, and routes.

use async_trait::async_trait;

use crate::error::QuepasaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DispatchingRecord, ServerRecord, User};

/// Persistence backend for the three gateway tables.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies pending migrations.
    async fn initialize(&self) -> Result<(), QuepasaError>;

    /// Closes the backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), QuepasaError>;

    // --- Users ---

    async fn get_user(&self, username: &str) -> Result<Option<User>, QuepasaError>;

    /// Inserts a user; fails if the username is taken.
    async fn create_user(&self, user: &User) -> Result<(), QuepasaError>;

    async fn user_exists(&self, username: &str) -> Result<bool, QuepasaError>;

    // --- Servers ---

    async fn get_server(&self, token: &str) -> Result<Option<ServerRecord>, QuepasaError>;

    async fn list_servers(&self) -> Result<Vec<ServerRecord>, QuepasaError>;

    async fn list_servers_for_user(
        &self,
        username: &str,
    ) -> Result<Vec<ServerRecord>, QuepasaError>;

    /// Inserts or updates by token. `updated_at` is taken from the record.
    async fn upsert_server(&self, record: &ServerRecord) -> Result<(), QuepasaError>;

    /// Deletes a server row and its routes.
    async fn delete_server(&self, token: &str) -> Result<(), QuepasaError>;

    // --- Routes ---

    async fn list_dispatching(
        &self,
        context: &str,
    ) -> Result<Vec<DispatchingRecord>, QuepasaError>;

    async fn list_all_dispatching(&self) -> Result<Vec<DispatchingRecord>, QuepasaError>;

    /// Updates the route if `(context, connection_string)` exists, else inserts.
    async fn upsert_dispatching(&self, record: &DispatchingRecord) -> Result<(), QuepasaError>;

    async fn delete_dispatching(
        &self,
        context: &str,
        connection_string: &str,
    ) -> Result<(), QuepasaError>;

    async fn clear_dispatching(&self, context: &str) -> Result<(), QuepasaError>;
}
