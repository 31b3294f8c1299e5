// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.

pub mod adapter;
pub mod connection;
pub mod sink;
pub mod storage;

pub use adapter::PluginAdapter;
pub use connection::{
    ChatPresence, Connection, ConnectionFactory, ConnectionHandler, ConnectionOptions, GroupInfo,
    PairedCallback, ProfilePicture, SendResponse,
};
pub use sink::{MessageSink, RealtimeDispatch};
pub use storage::StorageAdapter;
