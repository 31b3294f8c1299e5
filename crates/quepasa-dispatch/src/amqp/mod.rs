// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMQP delivery: broker seam, cached client, and client registry.

pub mod broker;
pub mod client;
pub mod registry;

pub use broker::{BrokerChannel, BrokerConnector, LapinConnector, Publication, Topology};
pub use client::{AmqpClient, AmqpOptions, PublishOutcome};
pub use registry::AmqpRegistry;
