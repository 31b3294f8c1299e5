// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tri-state policy flags and their resolution across route, server, and
//! process-wide defaults.
//!
//! A flag left [`TriState::Unset`] inherits from the next level up:
//! route → server → global default → built-in default. A global default may
//! also be *forced*, in which case it wins over any explicit route or server
//! value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::QuepasaError;

/// A policy flag that may be left unset to inherit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriState {
    #[default]
    Unset,
    True,
    False,
}

impl TriState {
    /// Integer encoding used by the persistence layer (`1`, `-1`, `0`).
    pub fn as_i64(self) -> i64 {
        match self {
            Self::True => 1,
            Self::False => -1,
            Self::Unset => 0,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            v if v > 0 => Self::True,
            v if v < 0 => Self::False,
            _ => Self::Unset,
        }
    }

    pub fn is_set(self) -> bool {
        self != Self::Unset
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Unset => None,
        }
    }

    /// Collapses to a bool, using `default` when unset.
    pub fn to_bool(self, default: bool) -> bool {
        self.as_option().unwrap_or(default)
    }

    /// Flips a flag: unset flips against `default`.
    pub fn toggled(self, default: bool) -> Self {
        Self::from(!self.to_bool(default))
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(Self::from).unwrap_or_default()
    }
}

impl FromStr for TriState {
    type Err = QuepasaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match PolicyOverride::from_str(s)? {
            PolicyOverride::Unset => Ok(Self::Unset),
            PolicyOverride::True => Ok(Self::True),
            PolicyOverride::False => Ok(Self::False),
            PolicyOverride::ForcedTrue | PolicyOverride::ForcedFalse => Err(
                QuepasaError::Validation(format!("forced values are not allowed here: {s}")),
            ),
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::Unset => f.write_str("unset"),
        }
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Self::Unset),
            Some(Raw::Bool(b)) => Ok(Self::from(b)),
            Some(Raw::Int(i)) => Ok(Self::from_i64(i)),
            Some(Raw::Text(s)) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// A process-wide default, which may force its value over routes and servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolicyOverride {
    #[default]
    Unset,
    True,
    False,
    ForcedTrue,
    ForcedFalse,
}

impl PolicyOverride {
    pub fn forced(self) -> Option<bool> {
        match self {
            Self::ForcedTrue => Some(true),
            Self::ForcedFalse => Some(false),
            _ => None,
        }
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::True | Self::ForcedTrue => Some(true),
            Self::False | Self::ForcedFalse => Some(false),
            Self::Unset => None,
        }
    }
}

impl FromStr for PolicyOverride {
    type Err = QuepasaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "unset" => Ok(Self::Unset),
            "1" | "t" | "true" | "yes" => Ok(Self::True),
            "-1" | "f" | "false" | "no" => Ok(Self::False),
            "2" | "forcedtrue" => Ok(Self::ForcedTrue),
            "-2" | "forcedfalse" => Ok(Self::ForcedFalse),
            other => Err(QuepasaError::Validation(format!(
                "invalid policy value: {other}"
            ))),
        }
    }
}

impl fmt::Display for PolicyOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::ForcedTrue => f.write_str("forcedtrue"),
            Self::ForcedFalse => f.write_str("forcedfalse"),
        }
    }
}

impl Serialize for PolicyOverride {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PolicyOverride {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Environment values arrive already typed, so "1" lands here as an integer.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(Self::True),
            Raw::Bool(false) => Ok(Self::False),
            Raw::Int(i) => i.to_string().parse().map_err(serde::de::Error::custom),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// The policy flags a server or route may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PolicyKind {
    Groups,
    Direct,
    Broadcasts,
    ReadReceipts,
    Calls,
    ReadUpdate,
}

impl PolicyKind {
    /// Value used when nothing along the chain is set.
    pub fn builtin_default(self) -> bool {
        match self {
            Self::Groups | Self::Direct | Self::Calls => true,
            Self::Broadcasts | Self::ReadReceipts | Self::ReadUpdate => false,
        }
    }
}

/// Anything that carries per-kind tri-state overrides.
pub trait PolicyProvider {
    fn policy(&self, kind: PolicyKind) -> TriState;
}

/// Process-wide defaults for every policy kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPolicy {
    pub groups: PolicyOverride,
    pub direct: PolicyOverride,
    pub broadcasts: PolicyOverride,
    pub read_receipts: PolicyOverride,
    pub calls: PolicyOverride,
    pub read_update: PolicyOverride,
}

impl GlobalPolicy {
    pub fn get(&self, kind: PolicyKind) -> PolicyOverride {
        match kind {
            PolicyKind::Groups => self.groups,
            PolicyKind::Direct => self.direct,
            PolicyKind::Broadcasts => self.broadcasts,
            PolicyKind::ReadReceipts => self.read_receipts,
            PolicyKind::Calls => self.calls,
            PolicyKind::ReadUpdate => self.read_update,
        }
    }

    /// Resolves `kind` for a server alone (no route).
    pub fn resolve_server(&self, kind: PolicyKind, server: &dyn PolicyProvider) -> bool {
        resolve(kind, self, Some(server), None)
    }
}

/// Resolves a policy: forced global, then route, then server, then global,
/// then the built-in default.
pub fn resolve(
    kind: PolicyKind,
    global: &GlobalPolicy,
    server: Option<&dyn PolicyProvider>,
    route: Option<&dyn PolicyProvider>,
) -> bool {
    let global = global.get(kind);
    if let Some(forced) = global.forced() {
        return forced;
    }
    route
        .and_then(|r| r.policy(kind).as_option())
        .or_else(|| server.and_then(|s| s.policy(kind).as_option()))
        .or_else(|| global.as_option())
        .unwrap_or_else(|| kind.builtin_default())
}
