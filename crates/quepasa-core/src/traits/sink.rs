// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out targets for accepted messages.

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Message;

/// A registered receiver of a server's messages (a route or the realtime hub).
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Stable identity used to deduplicate registrations.
    fn id(&self) -> &str;

    /// Delivers one message. Failures are recorded by the sink itself.
    async fn deliver(&self, msg: Arc<Message>);
}

/// In-process pub/sub for realtime clients.
pub trait RealtimeDispatch: Send + Sync {
    /// Sends `msg` to every client bound to `token` or to the master key.
    fn dispatch(&self, token: &str, msg: &Message);

    fn has_active_connections(&self, token: &str) -> bool;
}
