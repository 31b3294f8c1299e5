// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User queries.

use quepasa_core::{QuepasaError, User};
use rusqlite::{ErrorCode, params};

use crate::database::{Database, format_timestamp, map_tr_err, parse_timestamp};

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(2)?;
    Ok(User {
        username: row.get(0)?,
        password_hash: row.get(1)?,
        created_at: parse_timestamp(&created_at, 2)?,
    })
}

pub async fn get_user(db: &Database, username: &str) -> Result<Option<User>, QuepasaError> {
    let username = username.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT username, password, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            );
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a user. A taken username is a validation error, not a storage failure.
pub async fn create_user(db: &Database, user: &User) -> Result<(), QuepasaError> {
    let user = user.clone();
    let username = user.username.clone();
    let result = db
        .connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
                params![
                    user.username,
                    user.password_hash,
                    format_timestamp(&user.created_at)
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
                "user already exists: {username}"
            )))
        }
        other => other.map_err(map_tr_err),
    }
}

pub async fn user_exists(db: &Database, username: &str) -> Result<bool, QuepasaError> {
    let username = username.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_users(db: &Database) -> Result<u64, QuepasaError> {
    let count: i64 = db
        .connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)?;
    Ok(count.max(0) as u64)
}
