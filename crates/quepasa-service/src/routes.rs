// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message sinks registered on a server's handler.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{debug, warn};

use quepasa_core::{Message, MessageSink, RealtimeDispatch};
use quepasa_dispatch::{Dispatcher, Route};

use crate::options::ServiceOptions;
use crate::server::Server;

/// Sink id of a route.
pub fn route_sink_id(connection_string: &str) -> String {
    format!("route:{connection_string}")
}

/// Delivers to one webhook or AMQP route after the per-route filters.
pub(crate) struct RouteSink {
    id: String,
    route: Arc<Route>,
    dispatcher: Arc<Dispatcher>,
    server: Weak<Server>,
    options: Arc<ServiceOptions>,
}

impl RouteSink {
    pub(crate) fn new(
        route: Arc<Route>,
        dispatcher: Arc<Dispatcher>,
        server: Weak<Server>,
        options: Arc<ServiceOptions>,
    ) -> Self {
        Self {
            id: route_sink_id(route.connection_string()),
            route,
            dispatcher,
            server,
            options,
        }
    }
}

#[async_trait]
impl MessageSink for RouteSink {
    fn id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, msg: Arc<Message>) {
        // Results for a server that is gone are discarded.
        let Some(server) = self.server.upgrade() else {
            return;
        };
        let record = server.record();
        if let Err(reason) = self.route.accepts(&msg, &self.options.global, &record) {
            debug!(
                token = %record.token,
                route = %self.route.connection_string(),
                message_id = %msg.id,
                %reason,
                "message filtered by route"
            );
            return;
        }

        let wid = server.wid();
        if let Err(e) = self.dispatcher.deliver(&self.route, &wid, &msg).await {
            warn!(
                token = %record.token,
                route = %self.route.connection_string(),
                message_id = %msg.id,
                error = %e,
                "dispatch failed"
            );
        }
    }
}

/// Sink id of the realtime hub.
pub const HUB_SINK_ID: &str = "realtime";

/// Forwards every message to realtime clients bound to the server.
pub(crate) struct HubSink {
    hub: Arc<dyn RealtimeDispatch>,
    token: String,
}

impl HubSink {
    pub(crate) fn new(hub: Arc<dyn RealtimeDispatch>, token: String) -> Self {
        Self { hub, token }
    }
}

#[async_trait]
impl MessageSink for HubSink {
    fn id(&self) -> &str {
        HUB_SINK_ID
    }

    async fn deliver(&self, msg: Arc<Message>) {
        self.hub.dispatch(&self.token, &msg);
    }
}
