// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route (dispatching) queries.
//!
//! AMQP routes are stored with type `rabbitmq` so rows written by older
//! deployments load unchanged.

use quepasa_core::extra::{get_extra_text, parse_extra};
use quepasa_core::{DispatchingRecord, QuepasaError, RouteKind, TriState};
use rusqlite::params;

use crate::database::{Database, format_timestamp, map_tr_err, parse_timestamp};

const DISPATCHING_COLUMNS: &str = "context, connection_string, type, forwardinternal, trackid, \
     readreceipts, groups, broadcasts, calls, extra, created_at";

fn kind_to_column(kind: RouteKind) -> &'static str {
    match kind {
        RouteKind::Webhook => "webhook",
        RouteKind::Amqp => "rabbitmq",
    }
}

fn kind_from_column(raw: &str) -> RouteKind {
    match raw.to_ascii_lowercase().as_str() {
        "rabbitmq" | "amqp" => RouteKind::Amqp,
        _ => RouteKind::Webhook,
    }
}

fn dispatching_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DispatchingRecord> {
    let kind: String = row.get(2)?;
    let extra: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    Ok(DispatchingRecord {
        context: row.get(0)?,
        connection_string: row.get(1)?,
        kind: kind_from_column(&kind),
        forward_internal: row.get(3)?,
        track_id: row.get(4)?,
        read_receipts: TriState::from_i64(row.get(5)?),
        groups: TriState::from_i64(row.get(6)?),
        broadcasts: TriState::from_i64(row.get(7)?),
        calls: TriState::from_i64(row.get(8)?),
        extra: extra.filter(|e| !e.is_empty()).map(|e| parse_extra(&e)),
        created_at: parse_timestamp(&created_at, 10)?,
    })
}

/// Routes of one server, or of every server when `context` is `None`.
pub async fn list_dispatching(
    db: &Database,
    context: Option<&str>,
) -> Result<Vec<DispatchingRecord>, QuepasaError> {
    let context = context.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<DispatchingRecord>, rusqlite::Error> {
            match &context {
                Some(context) => {
                    let sql = format!(
                        "SELECT {DISPATCHING_COLUMNS} FROM dispatching WHERE context = ?1 \
                         ORDER BY created_at"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![context], dispatching_from_row)?;
                    rows.collect()
                }
                None => {
                    let sql = format!(
                        "SELECT {DISPATCHING_COLUMNS} FROM dispatching ORDER BY context, created_at"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], dispatching_from_row)?;
                    rows.collect()
                }
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Update the route keyed by `(context, connection_string)`, inserting when absent.
pub async fn upsert_dispatching(
    db: &Database,
    record: &DispatchingRecord,
) -> Result<(), QuepasaError> {
    let r = record.clone();
    let extra = r.extra.as_ref().map(get_extra_text);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO dispatching (context, connection_string, type, forwardinternal,
                     trackid, readreceipts, groups, broadcasts, calls, extra, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(context, connection_string) DO UPDATE SET
                     type = excluded.type,
                     forwardinternal = excluded.forwardinternal,
                     trackid = excluded.trackid,
                     readreceipts = excluded.readreceipts,
                     groups = excluded.groups,
                     broadcasts = excluded.broadcasts,
                     calls = excluded.calls,
                     extra = excluded.extra",
                params![
                    r.context,
                    r.connection_string,
                    kind_to_column(r.kind),
                    r.forward_internal,
                    r.track_id,
                    r.read_receipts.as_i64(),
                    r.groups.as_i64(),
                    r.broadcasts.as_i64(),
                    r.calls.as_i64(),
                    extra,
                    format_timestamp(&r.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_dispatching(
    db: &Database,
    context: &str,
    connection_string: &str,
) -> Result<(), QuepasaError> {
    let context = context.to_string();
    let connection_string = connection_string.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM dispatching WHERE context = ?1 AND connection_string = ?2",
                params![context, connection_string],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn clear_dispatching(db: &Database, context: &str) -> Result<(), QuepasaError> {
    let context = context.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM dispatching WHERE context = ?1", params![context])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
