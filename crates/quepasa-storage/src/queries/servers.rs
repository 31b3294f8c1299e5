// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server queries.

use quepasa_core::{QuepasaError, ServerRecord, TriState};
use rusqlite::{ErrorCode, params};

use crate::database::{Database, format_timestamp, map_tr_err, parse_timestamp};

const SERVER_COLUMNS: &str = "token, wid, user, verified, devel, groups, direct, broadcasts, \
     readreceipts, calls, readupdate, created_at, updated_at";

fn server_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServerRecord> {
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    Ok(ServerRecord {
        token: row.get(0)?,
        wid: row.get::<_, Option<String>>(1)?.filter(|w| !w.is_empty()),
        owner: row.get(2)?,
        verified: row.get(3)?,
        devel: row.get(4)?,
        groups: TriState::from_i64(row.get(5)?),
        direct: TriState::from_i64(row.get(6)?),
        broadcasts: TriState::from_i64(row.get(7)?),
        read_receipts: TriState::from_i64(row.get(8)?),
        calls: TriState::from_i64(row.get(9)?),
        read_update: TriState::from_i64(row.get(10)?),
        created_at: parse_timestamp(&created_at, 11)?,
        updated_at: parse_timestamp(&updated_at, 12)?,
    })
}

pub async fn get_server(db: &Database, token: &str) -> Result<Option<ServerRecord>, QuepasaError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SERVER_COLUMNS} FROM servers WHERE token = ?1");
            match conn.query_row(&sql, params![token], server_from_row) {
                Ok(server) => Ok(Some(server)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// All servers, or only those owned by `owner`, oldest first.
pub async fn list_servers(
    db: &Database,
    owner: Option<&str>,
) -> Result<Vec<ServerRecord>, QuepasaError> {
    let owner = owner.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<ServerRecord>, rusqlite::Error> {
            match &owner {
                Some(owner) => {
                    let sql = format!(
                        "SELECT {SERVER_COLUMNS} FROM servers WHERE user = ?1 ORDER BY created_at"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![owner], server_from_row)?;
                    rows.collect()
                }
                None => {
                    let sql = format!("SELECT {SERVER_COLUMNS} FROM servers ORDER BY created_at");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], server_from_row)?;
                    rows.collect()
                }
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert, or overwrite every column but `created_at` when the token exists.
///
/// A wid already held by another token is a validation error.
pub async fn upsert_server(db: &Database, record: &ServerRecord) -> Result<(), QuepasaError> {
    let r = record.clone();
    let wid = record.wid.clone().unwrap_or_default();
    let result = db
        .connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO servers (token, wid, user, verified, devel, groups, direct, broadcasts,
                     readreceipts, calls, readupdate, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(token) DO UPDATE SET
                     wid = excluded.wid,
                     user = excluded.user,
                     verified = excluded.verified,
                     devel = excluded.devel,
                     groups = excluded.groups,
                     direct = excluded.direct,
                     broadcasts = excluded.broadcasts,
                     readreceipts = excluded.readreceipts,
                     calls = excluded.calls,
                     readupdate = excluded.readupdate,
                     updated_at = excluded.updated_at",
                params![
                    r.token,
                    r.wid,
                    r.owner,
                    r.verified,
                    r.devel,
                    r.groups.as_i64(),
                    r.direct.as_i64(),
                    r.broadcasts.as_i64(),
                    r.read_receipts.as_i64(),
                    r.calls.as_i64(),
                    r.read_update.as_i64(),
                    format_timestamp(&r.created_at),
                    format_timestamp(&r.updated_at),
                ],
            )?;
            Ok(())
        })
        .await;

    match result {
        Err(tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(e, _)))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            Err(QuepasaError::Validation(format!(
                "wid already paired to another server: {wid}"
            )))
        }
        other => other.map_err(map_tr_err),
    }
}

/// Delete the server row and every route it owns in one transaction.
pub async fn delete_server(db: &Database, token: &str) -> Result<(), QuepasaError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM dispatching WHERE context = ?1", params![token])?;
            tx.execute("DELETE FROM servers WHERE token = ?1", params![token])?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}
