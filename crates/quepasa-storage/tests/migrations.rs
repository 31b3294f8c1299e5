// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Migration runner and post-migration step tests.

use std::sync::Arc;

use async_trait::async_trait;
use quepasa_config::DatabaseConfig;
use quepasa_core::{
    Connection, ConnectionFactory, ConnectionOptions, QuepasaError, ServerRecord, StorageAdapter,
};
use quepasa_storage::migrations::{self, MigrationSource};
use quepasa_storage::{Database, SqliteStorage};
use tempfile::tempdir;

/// Resolves every legacy wid whose phone starts with 55.
struct BrazilOnlyStore;

#[async_trait]
impl ConnectionFactory for BrazilOnlyStore {
    async fn create(
        &self,
        _options: ConnectionOptions,
    ) -> Result<Arc<dyn Connection>, QuepasaError> {
        Err(QuepasaError::InvalidConnection)
    }

    async fn canonical_wid(&self, legacy_wid: &str) -> Option<String> {
        let phone = legacy_wid.strip_suffix("@migrated")?;
        phone
            .starts_with("55")
            .then(|| format!("{phone}:12@s.whatsapp.net"))
    }
}

fn config_in(dir: &tempfile::TempDir, migrations: &str) -> DatabaseConfig {
    DatabaseConfig {
        database: dir.path().join("q.sqlite").to_str().unwrap().to_string(),
        migrations: migrations.to_string(),
        ..DatabaseConfig::default()
    }
}

#[tokio::test]
async fn embedded_migrations_apply_once() {
    let dir = tempdir().unwrap();
    let storage = SqliteStorage::new(config_in(&dir, "true"));
    let first = storage.migrate().await.unwrap();
    assert_eq!(first, vec![1, 2, 3]);
    let second = storage.migrate().await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn disabled_migrations_leave_schema_empty() {
    let dir = tempdir().unwrap();
    let storage = SqliteStorage::new(config_in(&dir, "false"));
    storage.initialize().await.unwrap();
    assert!(storage.list_servers().await.is_err());
}

#[tokio::test]
async fn directory_migrations_are_loaded_from_disk() {
    let dir = tempdir().unwrap();
    let sql_dir = dir.path().join("sql");
    std::fs::create_dir(&sql_dir).unwrap();
    std::fs::write(
        sql_dir.join("V1__scratch.sql"),
        "CREATE TABLE scratch (id INTEGER PRIMARY KEY);",
    )
    .unwrap();

    let db = Database::open(dir.path().join("d.sqlite").to_str().unwrap())
        .await
        .unwrap();
    let applied = migrations::run_migrations(&db, &MigrationSource::Directory(sql_dir))
        .await
        .unwrap();
    assert_eq!(applied, vec![1]);
}

#[tokio::test]
async fn legacy_wids_are_rewritten_when_store_knows_them() {
    let dir = tempdir().unwrap();
    let storage = SqliteStorage::new(config_in(&dir, "true"));
    storage.migrate().await.unwrap();

    let mut known = ServerRecord::new("known", "ops");
    known.wid = Some("5511988887777@migrated".into());
    let mut unknown = ServerRecord::new("unknown", "ops");
    unknown.wid = Some("14155550000@migrated".into());
    storage.upsert_server(&known).await.unwrap();
    storage.upsert_server(&unknown).await.unwrap();

    let db = storage.open_only().await.unwrap();
    let updated = migrations::rewrite_migrated_wids(db, &BrazilOnlyStore)
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let known = storage.get_server("known").await.unwrap().unwrap();
    assert_eq!(known.wid.as_deref(), Some("5511988887777:12@s.whatsapp.net"));
    let unknown = storage.get_server("unknown").await.unwrap().unwrap();
    assert_eq!(unknown.wid.as_deref(), Some("14155550000@migrated"));
}

#[tokio::test]
async fn unique_wid_migration_keeps_the_newest_holder() {
    let dir = tempdir().unwrap();
    let sql_dir = dir.path().join("sql");
    std::fs::create_dir(&sql_dir).unwrap();
    for (name, sql) in [
        (
            "V1__initial_schema.sql",
            include_str!("../migrations/V1__initial_schema.sql"),
        ),
        (
            "V2__calls_and_legacy_wids.sql",
            include_str!("../migrations/V2__calls_and_legacy_wids.sql"),
        ),
    ] {
        std::fs::write(sql_dir.join(name), sql).unwrap();
    }

    let db = Database::open(dir.path().join("d.sqlite").to_str().unwrap())
        .await
        .unwrap();
    let source = MigrationSource::Directory(sql_dir.clone());
    assert_eq!(migrations::run_migrations(&db, &source).await.unwrap(), vec![1, 2]);

    db.connection()
        .call(|conn| {
            conn.execute_batch(
                "INSERT INTO servers (token, wid, created_at, updated_at) VALUES
                   ('old', '5511999999999@s.whatsapp.net', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                   ('new', '5511999999999@s.whatsapp.net', '2024-01-01T00:00:00Z', '2024-06-01T00:00:00Z'),
                   ('blank-a', '', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'),
                   ('blank-b', '', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');",
            )
        })
        .await
        .unwrap();

    std::fs::write(
        sql_dir.join("V3__unique_server_wid.sql"),
        include_str!("../migrations/V3__unique_server_wid.sql"),
    )
    .unwrap();
    assert_eq!(migrations::run_migrations(&db, &source).await.unwrap(), vec![3]);

    let holders: Vec<(String, Option<String>)> = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT token, wid FROM servers ORDER BY token")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .unwrap();
    assert_eq!(
        holders,
        vec![
            ("blank-a".to_string(), Some(String::new())),
            ("blank-b".to_string(), Some(String::new())),
            ("new".to_string(), Some("5511999999999@s.whatsapp.net".to_string())),
            ("old".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn legacy_rewrite_skips_wids_already_paired() {
    let dir = tempdir().unwrap();
    let storage = SqliteStorage::new(config_in(&dir, "true"));
    storage.migrate().await.unwrap();

    let mut current = ServerRecord::new("current", "ops");
    current.wid = Some("5511988887777:12@s.whatsapp.net".into());
    let mut legacy = ServerRecord::new("legacy", "ops");
    legacy.wid = Some("5511988887777@migrated".into());
    storage.upsert_server(&current).await.unwrap();
    storage.upsert_server(&legacy).await.unwrap();

    let db = storage.open_only().await.unwrap();
    let updated = migrations::rewrite_migrated_wids(db, &BrazilOnlyStore)
        .await
        .unwrap();
    assert_eq!(updated, 0);

    let legacy = storage.get_server("legacy").await.unwrap().unwrap();
    assert_eq!(legacy.wid.as_deref(), Some("5511988887777@migrated"));
}
