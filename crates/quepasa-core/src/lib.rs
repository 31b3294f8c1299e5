// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Quepasa gateway.
//!
//! Provides the message model, tri-state policies, chat id helpers, the
//! error taxonomy, and the adapter traits every other crate builds on.

pub mod error;
pub mod extra;
pub mod message;
pub mod phone;
pub mod policy;
pub mod state;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::QuepasaError;
pub use message::{
    Attachment, Chat, Message, MessageStatus, MessageType, Poll, UpstreamContent,
};
pub use policy::{GlobalPolicy, PolicyKind, PolicyOverride, PolicyProvider, TriState};
pub use state::ConnectionState;
pub use types::{
    AdapterType, DispatchingRecord, HealthStats, HealthStatus, RouteKind, ServerHealth,
    ServerRecord, User,
};

pub use traits::{
    ChatPresence, Connection, ConnectionFactory, ConnectionHandler, ConnectionOptions, GroupInfo,
    MessageSink, PairedCallback, PluginAdapter, ProfilePicture, RealtimeDispatch, SendResponse,
    StorageAdapter,
};
