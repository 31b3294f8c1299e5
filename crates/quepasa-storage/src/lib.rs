// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Quepasa gateway.
//!
//! WAL-mode SQLite behind `tokio-rusqlite`, refinery migrations with
//! post-migration steps, and typed queries for users, servers, and routes.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use migrations::MigrationSource;
