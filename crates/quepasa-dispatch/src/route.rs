// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A configured delivery route and its failure bookkeeping.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use quepasa_core::{
    policy, DispatchingRecord, GlobalPolicy, Message, MessageType, PolicyKind, PolicyProvider,
    RouteKind, TriState,
};

use crate::amqp::AmqpClient;

/// Why a message was not delivered to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    ReadReceipts,
    Groups,
    Broadcasts,
    Calls,
    InternalLoop,
    Unhandled,
    EmptyText,
}

/// Last attempt timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteState {
    pub failure_at: Option<DateTime<Utc>>,
    pub success_at: Option<DateTime<Utc>>,
}

impl RouteState {
    /// `success_at` never moves backwards.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.success_at = Some(self.success_at.map_or(at, |prev| prev.max(at)));
        self.failure_at = None;
    }

    /// Keeps the first failure of a streak.
    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.failure_at.get_or_insert(at);
    }

    pub fn is_failing(&self) -> bool {
        match (self.failure_at, self.success_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(f), Some(s)) => f > s,
        }
    }
}

/// A webhook or AMQP endpoint owned by one server.
#[derive(Debug)]
pub struct Route {
    record: DispatchingRecord,
    state: Mutex<RouteState>,
    amqp: Option<Arc<AmqpClient>>,
}

impl Route {
    pub(crate) fn new(
        record: DispatchingRecord,
        state: RouteState,
        amqp: Option<Arc<AmqpClient>>,
    ) -> Self {
        Self {
            record,
            state: Mutex::new(state),
            amqp,
        }
    }

    /// A route with no AMQP client attached, for webhooks and tests.
    pub fn detached(record: DispatchingRecord) -> Self {
        Self::new(record, RouteState::default(), None)
    }

    pub fn record(&self) -> &DispatchingRecord {
        &self.record
    }

    pub fn kind(&self) -> RouteKind {
        self.record.kind
    }

    pub fn connection_string(&self) -> &str {
        &self.record.connection_string
    }

    pub(crate) fn amqp_client(&self) -> Option<&Arc<AmqpClient>> {
        self.amqp.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, RouteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> RouteState {
        *self.lock()
    }

    pub fn mark_success(&self) {
        self.lock().record_success(Utc::now());
    }

    pub fn mark_failure(&self) {
        self.lock().record_failure(Utc::now());
    }

    /// Applies the per-route filters in order.
    pub fn accepts(
        &self,
        msg: &Message,
        global: &GlobalPolicy,
        server: &dyn PolicyProvider,
    ) -> Result<(), DropReason> {
        let allowed = |kind| policy::resolve(kind, global, Some(server), Some(self));

        if msg.is_read_receipt() && !allowed(PolicyKind::ReadReceipts) {
            return Err(DropReason::ReadReceipts);
        }
        if msg.from_group() && !allowed(PolicyKind::Groups) {
            return Err(DropReason::Groups);
        }
        if msg.from_broadcast() && !allowed(PolicyKind::Broadcasts) {
            return Err(DropReason::Broadcasts);
        }
        if msg.kind == MessageType::Call && !allowed(PolicyKind::Calls) {
            return Err(DropReason::Calls);
        }
        if msg.from_internal {
            let track_id = self.record.track_id.as_str();
            let forward = self.record.forward_internal
                && (track_id.is_empty() || track_id != msg.track_id);
            if !forward {
                return Err(DropReason::InternalLoop);
            }
        }
        Ok(())
    }
}

impl PolicyProvider for Route {
    fn policy(&self, kind: PolicyKind) -> TriState {
        self.record.policy(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quepasa_core::ServerRecord;

    fn route(configure: impl FnOnce(&mut DispatchingRecord)) -> Route {
        let mut record = DispatchingRecord::new("T", RouteKind::Webhook, "http://hook");
        configure(&mut record);
        Route::detached(record)
    }

    fn server() -> ServerRecord {
        ServerRecord::new("T", "alice")
    }

    #[test]
    fn groups_false_drops_group_messages() {
        let r = route(|r| r.groups = TriState::False);
        let m = Message::text("12345-678@g.us", "hi");
        assert_eq!(
            r.accepts(&m, &GlobalPolicy::default(), &server()),
            Err(DropReason::Groups)
        );
    }

    #[test]
    fn unset_route_inherits_server_policy() {
        let r = route(|_| {});
        let mut s = server();
        s.calls = TriState::False;
        let mut m = Message::text("5511@s.whatsapp.net", "");
        m.kind = MessageType::Call;
        assert_eq!(
            r.accepts(&m, &GlobalPolicy::default(), &s),
            Err(DropReason::Calls)
        );
    }

    #[test]
    fn read_receipts_default_to_dropped() {
        let r = route(|_| {});
        let m = Message::read_receipt(Default::default(), serde_json::json!({}));
        assert_eq!(
            r.accepts(&m, &GlobalPolicy::default(), &server()),
            Err(DropReason::ReadReceipts)
        );
        let r = route(|r| r.read_receipts = TriState::True);
        assert!(r.accepts(&m, &GlobalPolicy::default(), &server()).is_ok());
    }

    #[test]
    fn broadcasts_are_dropped_by_default() {
        let r = route(|_| {});
        let m = Message::text("status@broadcast", "story");
        assert_eq!(
            r.accepts(&m, &GlobalPolicy::default(), &server()),
            Err(DropReason::Broadcasts)
        );
    }

    #[test]
    fn matching_track_id_breaks_loop() {
        let r = route(|r| {
            r.forward_internal = true;
            r.track_id = "bot-A".into();
        });
        let mut m = Message::text("5511@s.whatsapp.net", "echo");
        m.from_internal = true;
        m.track_id = "bot-A".into();
        assert_eq!(
            r.accepts(&m, &GlobalPolicy::default(), &server()),
            Err(DropReason::InternalLoop)
        );
        m.track_id = "bot-B".into();
        assert!(r.accepts(&m, &GlobalPolicy::default(), &server()).is_ok());
    }

    #[test]
    fn internal_messages_need_forward_internal() {
        let r = route(|_| {});
        let mut m = Message::text("5511@s.whatsapp.net", "echo");
        m.from_internal = true;
        assert_eq!(
            r.accepts(&m, &GlobalPolicy::default(), &server()),
            Err(DropReason::InternalLoop)
        );
    }

    #[test]
    fn state_transitions() {
        let mut state = RouteState::default();
        assert!(!state.is_failing());
        let t0 = Utc::now();
        state.record_failure(t0);
        state.record_failure(t0 + chrono::Duration::seconds(5));
        assert_eq!(state.failure_at, Some(t0));
        assert!(state.is_failing());
        state.record_success(t0 + chrono::Duration::seconds(10));
        assert!(state.failure_at.is_none());
        state.record_success(t0);
        assert_eq!(state.success_at, Some(t0 + chrono::Duration::seconds(10)));
    }
}
