// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection state of a tenant server.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state reported for a server.
///
/// The numeric `code()` is the variant position and is exposed to API
/// callers as `state_code`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum ConnectionState {
    #[default]
    Unknown,
    UnPrepared,
    UnVerified,
    Starting,
    Connecting,
    Stopping,
    Stopped,
    Restarting,
    Connected,
    Fetching,
    Ready,
    Halting,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// Numeric code of this state.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// States counted as healthy in fleet statistics.
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Ready | Self::Stopped)
    }

    /// States from which `start` may be attempted.
    pub fn is_valid_to_start(self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Stopping | Self::Disconnected | Self::Failed
        )
    }
}
