// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use quepasa_config::DatabaseConfig;
use quepasa_core::{
    AdapterType, ConnectionFactory, DispatchingRecord, HealthStatus, PluginAdapter, QuepasaError,
    ServerRecord, StorageAdapter, User,
};

use crate::database::Database;
use crate::migrations::{self, MigrationSource};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened and migrated by [`StorageAdapter::initialize`];
/// every other call fails until then.
pub struct SqliteStorage {
    config: DatabaseConfig,
    db: OnceCell<Database>,
    wid_resolver: Option<Arc<dyn ConnectionFactory>>,
}

impl SqliteStorage {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            wid_resolver: None,
        }
    }

    /// Resolve legacy `@migrated` wids through `factory` after migrating.
    pub fn with_wid_resolver(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.wid_resolver = Some(factory);
        self
    }

    fn db(&self) -> Result<&Database, QuepasaError> {
        self.db.get().ok_or_else(|| QuepasaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Open the database without touching the schema.
    pub async fn open_only(&self) -> Result<&Database, QuepasaError> {
        self.db
            .get_or_try_init(|| Database::open(&self.config.database))
            .await
    }

    /// Apply migrations and the post-migration steps owed to them.
    ///
    /// Returns the versions applied by this call.
    pub async fn migrate(&self) -> Result<Vec<i64>, QuepasaError> {
        let db = self.open_only().await?;
        let source = MigrationSource::from_setting(&self.config.migrations);
        let applied = migrations::run_migrations(db, &source).await?;
        migrations::run_post_migrations(db, &applied, self.wid_resolver.as_ref()).await?;
        Ok(applied)
    }

    pub async fn count_users(&self) -> Result<u64, QuepasaError> {
        queries::users::count_users(self.db()?).await
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), QuepasaError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, QuepasaError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), QuepasaError> {
        if let Some(db) = self.db.get() {
            self.checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), QuepasaError> {
        if self.db.initialized() {
            return Err(QuepasaError::Storage {
                source: "storage already initialized".into(),
            });
        }
        self.migrate().await?;
        debug!(path = %self.config.database, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), QuepasaError> {
        let db = self.db()?;
        self.checkpoint(db).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Users ---

    async fn get_user(&self, username: &str) -> Result<Option<User>, QuepasaError> {
        queries::users::get_user(self.db()?, username).await
    }

    async fn create_user(&self, user: &User) -> Result<(), QuepasaError> {
        queries::users::create_user(self.db()?, user).await
    }

    async fn user_exists(&self, username: &str) -> Result<bool, QuepasaError> {
        queries::users::user_exists(self.db()?, username).await
    }

    // --- Servers ---

    async fn get_server(&self, token: &str) -> Result<Option<ServerRecord>, QuepasaError> {
        queries::servers::get_server(self.db()?, token).await
    }

    async fn list_servers(&self) -> Result<Vec<ServerRecord>, QuepasaError> {
        queries::servers::list_servers(self.db()?, None).await
    }

    async fn list_servers_for_user(
        &self,
        username: &str,
    ) -> Result<Vec<ServerRecord>, QuepasaError> {
        queries::servers::list_servers(self.db()?, Some(username)).await
    }

    async fn upsert_server(&self, record: &ServerRecord) -> Result<(), QuepasaError> {
        queries::servers::upsert_server(self.db()?, record).await
    }

    async fn delete_server(&self, token: &str) -> Result<(), QuepasaError> {
        queries::servers::delete_server(self.db()?, token).await
    }

    // --- Routes ---

    async fn list_dispatching(
        &self,
        context: &str,
    ) -> Result<Vec<DispatchingRecord>, QuepasaError> {
        queries::dispatching::list_dispatching(self.db()?, Some(context)).await
    }

    async fn list_all_dispatching(&self) -> Result<Vec<DispatchingRecord>, QuepasaError> {
        queries::dispatching::list_dispatching(self.db()?, None).await
    }

    async fn upsert_dispatching(&self, record: &DispatchingRecord) -> Result<(), QuepasaError> {
        queries::dispatching::upsert_dispatching(self.db()?, record).await
    }

    async fn delete_dispatching(
        &self,
        context: &str,
        connection_string: &str,
    ) -> Result<(), QuepasaError> {
        queries::dispatching::delete_dispatching(self.db()?, context, connection_string).await
    }

    async fn clear_dispatching(&self, context: &str) -> Result<(), QuepasaError> {
        queries::dispatching::clear_dispatching(self.db()?, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quepasa_core::{RouteKind, TriState};
    use tempfile::tempdir;

    async fn storage_in(dir: &tempfile::TempDir) -> SqliteStorage {
        let config = DatabaseConfig {
            database: dir.path().join("test.sqlite").to_str().unwrap().to_string(),
            ..DatabaseConfig::default()
        };
        let storage = SqliteStorage::new(config);
        storage.initialize().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let storage = SqliteStorage::new(DatabaseConfig::default());
        let err = storage.get_server("x").await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn double_initialize_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_and_close() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn user_create_and_duplicate() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        let user = User {
            username: "ops@example.com".into(),
            password_hash: Some("$argon2id$stub".into()),
            created_at: Utc::now(),
        };
        storage.create_user(&user).await.unwrap();
        assert!(storage.user_exists("ops@example.com").await.unwrap());
        assert!(!storage.user_exists("nobody").await.unwrap());

        let loaded = storage.get_user("ops@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.password_hash.as_deref(), Some("$argon2id$stub"));

        let dup = storage.create_user(&user).await.unwrap_err();
        assert!(matches!(dup, QuepasaError::Validation(_)));
        assert_eq!(storage.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn server_upsert_keeps_created_at_and_updates_fields() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let mut record = ServerRecord::new("tok-1", "ops");
        storage.upsert_server(&record).await.unwrap();

        record.wid = Some("5511999999999@s.whatsapp.net".into());
        record.verified = true;
        record.groups = TriState::False;
        record.calls = TriState::True;
        let original_created = record.created_at;
        record.created_at = Utc::now() + chrono::Duration::days(1);
        storage.upsert_server(&record).await.unwrap();

        let loaded = storage.get_server("tok-1").await.unwrap().unwrap();
        assert_eq!(loaded.wid.as_deref(), Some("5511999999999@s.whatsapp.net"));
        assert!(loaded.verified);
        assert_eq!(loaded.groups, TriState::False);
        assert_eq!(loaded.calls, TriState::True);
        assert_eq!(loaded.direct, TriState::Unset);
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            original_created.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn wid_cannot_be_held_by_two_servers() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let mut first = ServerRecord::new("tok-a", "alice");
        first.wid = Some("5511999999999@s.whatsapp.net".into());
        storage.upsert_server(&first).await.unwrap();

        let mut second = ServerRecord::new("tok-b", "bob");
        second.wid = first.wid.clone();
        let err = storage.upsert_server(&second).await.unwrap_err();
        assert!(matches!(err, QuepasaError::Validation(_)));
        assert_eq!(storage.list_servers().await.unwrap().len(), 1);

        // Re-saving the holder is fine, and unpaired servers never collide.
        storage.upsert_server(&first).await.unwrap();
        second.wid = None;
        storage.upsert_server(&second).await.unwrap();
        let mut blank = ServerRecord::new("tok-c", "bob");
        blank.wid = Some(String::new());
        storage.upsert_server(&blank).await.unwrap();
        let mut other_blank = ServerRecord::new("tok-d", "bob");
        other_blank.wid = Some(String::new());
        storage.upsert_server(&other_blank).await.unwrap();
        assert_eq!(storage.list_servers().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn servers_filter_by_owner() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        storage
            .upsert_server(&ServerRecord::new("a", "alice"))
            .await
            .unwrap();
        storage
            .upsert_server(&ServerRecord::new("b", "bob"))
            .await
            .unwrap();

        assert_eq!(storage.list_servers().await.unwrap().len(), 2);
        let alice = storage.list_servers_for_user("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].token, "a");
    }

    #[tokio::test]
    async fn dispatching_upsert_updates_in_place() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let mut route = DispatchingRecord::new("tok", RouteKind::Webhook, "http://hook");
        storage.upsert_dispatching(&route).await.unwrap();

        route.forward_internal = true;
        route.track_id = "crm".into();
        route.extra = Some(serde_json::json!({"tenant": 7}));
        storage.upsert_dispatching(&route).await.unwrap();

        let routes = storage.list_dispatching("tok").await.unwrap();
        assert_eq!(routes.len(), 1);
        assert!(routes[0].forward_internal);
        assert_eq!(routes[0].track_id, "crm");
        assert_eq!(routes[0].extra, Some(serde_json::json!({"tenant": 7})));
    }

    #[tokio::test]
    async fn string_extra_keeps_its_type_through_storage() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let mut route = DispatchingRecord::new("tok", RouteKind::Webhook, "http://hook");
        route.extra = Some(serde_json::json!("42"));
        storage.upsert_dispatching(&route).await.unwrap();

        let routes = storage.list_dispatching("tok").await.unwrap();
        assert_eq!(routes[0].extra, Some(serde_json::json!("42")));
    }

    #[tokio::test]
    async fn amqp_routes_round_trip_kind() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        let route = DispatchingRecord::new("tok", RouteKind::Amqp, "amqp://broker");
        storage.upsert_dispatching(&route).await.unwrap();

        let all = storage.list_all_dispatching().await.unwrap();
        assert_eq!(all[0].kind, RouteKind::Amqp);
    }

    #[tokio::test]
    async fn delete_server_cascades_routes() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        storage
            .upsert_server(&ServerRecord::new("tok", "ops"))
            .await
            .unwrap();
        for url in ["http://a", "http://b"] {
            storage
                .upsert_dispatching(&DispatchingRecord::new("tok", RouteKind::Webhook, url))
                .await
                .unwrap();
        }
        storage
            .upsert_dispatching(&DispatchingRecord::new("other", RouteKind::Webhook, "http://c"))
            .await
            .unwrap();

        storage.delete_server("tok").await.unwrap();
        assert!(storage.get_server("tok").await.unwrap().is_none());
        assert!(storage.list_dispatching("tok").await.unwrap().is_empty());
        assert_eq!(storage.list_dispatching("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_and_clear_routes() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;
        for url in ["http://a", "http://b", "http://c"] {
            storage
                .upsert_dispatching(&DispatchingRecord::new("tok", RouteKind::Webhook, url))
                .await
                .unwrap();
        }
        storage.delete_dispatching("tok", "http://b").await.unwrap();
        assert_eq!(storage.list_dispatching("tok").await.unwrap().len(), 2);

        storage.clear_dispatching("tok").await.unwrap();
        assert!(storage.list_dispatching("tok").await.unwrap().is_empty());
    }
}
