// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch engine for the Quepasa gateway.
//!
//! A [`Route`] is a webhook URL or an AMQP connection string owned by one
//! server. The [`Dispatcher`] delivers messages to routes, records
//! success/failure on the route, and emits delivery metrics.

pub mod amqp;
pub mod engine;
pub mod envelope;
pub mod route;
pub mod routing;
pub mod validate;
pub mod webhook;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::Dispatcher;
pub use route::{DropReason, Route, RouteState};
pub use routing::{RoutingKey, EXCHANGE};
pub use validate::validate_for_dispatch;
pub use webhook::WebhookSender;
