// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server lifecycle and the tenant registry for the Quepasa gateway.
//!
//! The [`Registry`] owns every [`Server`]. Each server owns one upstream
//! connection and a [`Handler`] that caches inbound traffic and fans it out
//! to webhook, AMQP, and realtime sinks.

pub mod handler;
pub mod options;
pub mod pairing;
pub mod password;
pub mod registry;
pub mod routes;
pub mod server;
pub mod shutdown;

pub use handler::Handler;
pub use options::{LEGACY_DEFAULT_USER, ServiceOptions};
pub use pairing::Pairing;
pub use password::{hash_password, verify_password};
pub use registry::Registry;
pub use routes::{HUB_SINK_ID, route_sink_id};
pub use server::{Server, ServiceContext, Timestamps};
pub use shutdown::install_signal_handler;
