// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by persistence, the service layer, and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::policy::{PolicyKind, PolicyProvider, TriState};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Observability,
    Connection,
}

/// A user allowed to pair servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// PHC formatted hash, `None` for accounts that can never log in.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted row for one tenant server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub token: String,
    pub wid: Option<String>,
    pub owner: String,
    pub verified: bool,
    pub devel: bool,
    pub groups: TriState,
    pub direct: TriState,
    pub broadcasts: TriState,
    pub read_receipts: TriState,
    pub calls: TriState,
    pub read_update: TriState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServerRecord {
    /// A fresh, unverified row owned by `owner`.
    pub fn new(token: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            token: token.into(),
            wid: None,
            owner: owner.into(),
            verified: false,
            devel: false,
            groups: TriState::Unset,
            direct: TriState::Unset,
            broadcasts: TriState::Unset,
            read_receipts: TriState::Unset,
            calls: TriState::Unset,
            read_update: TriState::Unset,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_policy(&mut self, kind: PolicyKind, value: TriState) {
        match kind {
            PolicyKind::Groups => self.groups = value,
            PolicyKind::Direct => self.direct = value,
            PolicyKind::Broadcasts => self.broadcasts = value,
            PolicyKind::ReadReceipts => self.read_receipts = value,
            PolicyKind::Calls => self.calls = value,
            PolicyKind::ReadUpdate => self.read_update = value,
        }
    }
}

impl PolicyProvider for ServerRecord {
    fn policy(&self, kind: PolicyKind) -> TriState {
        match kind {
            PolicyKind::Groups => self.groups,
            PolicyKind::Direct => self.direct,
            PolicyKind::Broadcasts => self.broadcasts,
            PolicyKind::ReadReceipts => self.read_receipts,
            PolicyKind::Calls => self.calls,
            PolicyKind::ReadUpdate => self.read_update,
        }
    }
}

/// Transport of a route.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RouteKind {
    Webhook,
    Amqp,
}

/// Persisted row for one route (a webhook or AMQP endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchingRecord {
    /// Owner server token.
    pub context: String,
    pub connection_string: String,
    pub kind: RouteKind,
    pub forward_internal: bool,
    pub track_id: String,
    pub read_receipts: TriState,
    pub groups: TriState,
    pub broadcasts: TriState,
    pub calls: TriState,
    pub extra: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl DispatchingRecord {
    pub fn new(
        context: impl Into<String>,
        kind: RouteKind,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            connection_string: connection_string.into(),
            kind,
            forward_internal: false,
            track_id: String::new(),
            read_receipts: TriState::Unset,
            groups: TriState::Unset,
            broadcasts: TriState::Unset,
            calls: TriState::Unset,
            extra: None,
            created_at: Utc::now(),
        }
    }
}

impl PolicyProvider for DispatchingRecord {
    fn policy(&self, kind: PolicyKind) -> TriState {
        match kind {
            PolicyKind::Groups => self.groups,
            PolicyKind::Broadcasts => self.broadcasts,
            PolicyKind::ReadReceipts => self.read_receipts,
            PolicyKind::Calls => self.calls,
            PolicyKind::Direct | PolicyKind::ReadUpdate => TriState::Unset,
        }
    }
}

/// One entry of the fleet health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHealth {
    pub token: String,
    pub wid: String,
    pub state: String,
    pub state_code: i32,
}

/// Aggregate over a health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub percentage: f64,
}

impl HealthStats {
    pub fn from_states<I: IntoIterator<Item = bool>>(healthy_flags: I) -> Self {
        let (mut total, mut healthy) = (0usize, 0usize);
        for ok in healthy_flags {
            total += 1;
            if ok {
                healthy += 1;
            }
        }
        let percentage = if total == 0 {
            0.0
        } else {
            (healthy as f64 / total as f64) * 100.0
        };
        Self {
            total,
            healthy,
            unhealthy: total - healthy,
            percentage,
        }
    }

    /// The fleet is considered fine when every server is healthy.
    pub fn all_healthy(&self) -> bool {
        self.total > 0 && self.unhealthy == 0
    }
}
