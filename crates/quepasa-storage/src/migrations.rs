// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations using refinery, plus programmatic post-migration steps.
//!
//! SQL files under `migrations/` are compiled into the binary. Deployments may
//! point `MIGRATIONS` at a directory to run their own files instead, or set it
//! to `false` to leave the schema alone. Refinery records applied versions in
//! `refinery_schema_history`.

use std::path::PathBuf;
use std::sync::Arc;

use quepasa_core::{ConnectionFactory, QuepasaError};
use rusqlite::{ErrorCode, params};
use tracing::{info, warn};

use crate::database::Database;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Version whose SQL tags legacy wids with `@migrated`.
pub const LEGACY_WID_MIGRATION: i64 = 2;

const MIGRATED_SUFFIX: &str = "@migrated";

/// Where migrations come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationSource {
    Embedded,
    Directory(PathBuf),
    Disabled,
}

impl MigrationSource {
    /// Interpret the `MIGRATIONS` setting: a boolean, or a directory path.
    pub fn from_setting(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "1" | "t" | "true" | "yes" => Self::Embedded,
            "0" | "f" | "false" | "no" => Self::Disabled,
            _ => Self::Directory(PathBuf::from(raw.trim())),
        }
    }
}

fn migration_err(message: impl std::fmt::Display) -> QuepasaError {
    QuepasaError::Storage {
        source: format!("migration failed: {message}").into(),
    }
}

/// Run pending migrations and return the versions applied by this call.
pub async fn run_migrations(
    db: &Database,
    source: &MigrationSource,
) -> Result<Vec<i64>, QuepasaError> {
    let runner = match source {
        MigrationSource::Disabled => {
            info!("migrations disabled");
            return Ok(Vec::new());
        }
        MigrationSource::Embedded => embedded::migrations::runner(),
        MigrationSource::Directory(dir) => {
            let loaded = refinery::load_sql_migrations(dir).map_err(migration_err)?;
            if loaded.is_empty() {
                warn!(dir = %dir.display(), "no migrations found");
                return Ok(Vec::new());
            }
            refinery::Runner::new(&loaded)
        }
    };

    let applied = db
        .connection()
        .call(move |conn| -> Result<Vec<i64>, refinery::Error> {
            let report = runner.run(conn)?;
            Ok(report
                .applied_migrations()
                .iter()
                .map(|m| i64::from(m.version()))
                .collect())
        })
        .await
        .map_err(migration_err)?;

    for version in &applied {
        info!(version, "migration applied");
    }
    Ok(applied)
}

/// Run the programmatic steps owed to versions applied in this boot.
pub async fn run_post_migrations(
    db: &Database,
    applied: &[i64],
    resolver: Option<&Arc<dyn ConnectionFactory>>,
) -> Result<(), QuepasaError> {
    if applied.contains(&LEGACY_WID_MIGRATION) {
        match resolver {
            Some(factory) => {
                let updated = rewrite_migrated_wids(db, factory.as_ref()).await?;
                info!(updated, "legacy wids resolved");
            }
            None => warn!("legacy wids left unresolved: no session store available"),
        }
    }
    Ok(())
}

/// Replace every `<phone>@migrated` wid with the canonical id the upstream store knows.
///
/// Rows the store cannot resolve, or whose canonical wid another server
/// already holds, are left as they are.
pub async fn rewrite_migrated_wids(
    db: &Database,
    factory: &dyn ConnectionFactory,
) -> Result<usize, QuepasaError> {
    let pending: Vec<(String, String)> = db
        .connection()
        .call(|conn| -> Result<Vec<(String, String)>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT token, wid FROM servers WHERE wid LIKE '%' || ?1")?;
            let rows = stmt.query_map(params![MIGRATED_SUFFIX], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    let mut updated = 0;
    for (token, legacy) in pending {
        let Some(canonical) = factory.canonical_wid(&legacy).await else {
            warn!(token = %token, wid = %legacy, "no session store for legacy wid");
            continue;
        };
        let target = canonical.clone();
        let key = token.clone();
        let result = db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE servers SET wid = ?1 WHERE token = ?2",
                    params![target, key],
                )
            })
            .await;
        match result {
            Ok(_) => updated += 1,
            Err(tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                warn!(token = %token, wid = %canonical, "canonical wid already paired elsewhere");
            }
            Err(e) => return Err(crate::database::map_tr_err(e)),
        }
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_parses_booleans_and_paths() {
        assert_eq!(MigrationSource::from_setting("true"), MigrationSource::Embedded);
        assert_eq!(MigrationSource::from_setting(""), MigrationSource::Embedded);
        assert_eq!(MigrationSource::from_setting("FALSE"), MigrationSource::Disabled);
        assert_eq!(
            MigrationSource::from_setting("/opt/sql"),
            MigrationSource::Directory(PathBuf::from("/opt/sql"))
        );
    }
}
