// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Quepasa integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a real upstream session or broker.
//!
//! # Components
//!
//! - [`MockConnection`] - In-memory upstream session with event injection
//! - [`MockConnectionFactory`] - Factory that records every connection it builds
//! - [`TestHarness`] - Registry over a temp SQLite database and a mock broker

pub mod harness;
pub mod mock_connection;

pub use harness::{TestHarness, TestHarnessBuilder, eventually};
pub use mock_connection::{MockConnection, MockConnectionFactory};
pub use quepasa_dispatch::testing::MockBroker;
