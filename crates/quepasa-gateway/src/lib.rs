// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API and realtime hub for the Quepasa gateway.
//!
//! Exposes the server-scoped REST endpoints under header or path token auth,
//! fleet health and metrics, device pairing, and a WebSocket feed of every
//! dispatched message.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod media;
pub mod server;
pub mod ws;

pub use auth::{AuthConfig, MASTER_KEY_HEADER, TOKEN_HEADER, USER_HEADER};
pub use error::ApiError;
pub use hub::RealtimeHub;
pub use server::{GatewayConfig, GatewayState, build_router, start_server};
