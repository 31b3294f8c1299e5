// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Quepasa gateway.

use thiserror::Error;

use crate::state::ConnectionState;

/// The primary error type used across all Quepasa crates.
#[derive(Debug, Error)]
pub enum QuepasaError {
    /// Configuration errors (invalid TOML, unsupported driver, bad env values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Bad caller input: chat id, empty content, unknown toggle key.
    #[error("{0}")]
    Validation(String),

    /// Unknown message id, server, or route.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server exists but is not in the `Ready` state.
    #[error("({wid})(ERR) server not ready, current state: {state}")]
    NotReady {
        wid: String,
        state: ConnectionState,
    },

    /// Upstream rejected the stored credentials; the server must be paired again.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Server has never been paired (no verified wid).
    #[error("server is not verified")]
    Unverified,

    /// No usable upstream connection could be obtained.
    #[error("invalid connection")]
    InvalidConnection,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Network failure talking to a webhook, the broker, or the upstream.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AMQP publish did not reach the broker; `reason` is the metric label.
    #[error("amqp publish failed ({reason}): {message}")]
    Amqp { reason: String, message: String },

    /// A cache entry could not be interpreted.
    #[error("corrupted cache entry: {0}")]
    Corrupted(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl QuepasaError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// HTTP status code used when this error reaches an API caller.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::NotReady { .. }
            | Self::Unverified
            | Self::InvalidConnection
            | Self::Unauthorized(_) => 503,
            Self::Config(_)
            | Self::Storage { .. }
            | Self::Timeout { .. }
            | Self::Transport { .. }
            | Self::Amqp { .. }
            | Self::Corrupted(_)
            | Self::Internal(_) => 500,
        }
    }

    /// True for the timeout class, which is counted separately by metrics.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_follows_error_kind() {
        assert_eq!(QuepasaError::Validation("bad".into()).http_status(), 400);
        assert_eq!(QuepasaError::NotFound("x".into()).http_status(), 404);
        assert_eq!(
            QuepasaError::NotReady {
                wid: "w".into(),
                state: ConnectionState::Connecting,
            }
            .http_status(),
            503
        );
        assert_eq!(QuepasaError::Corrupted("k".into()).http_status(), 500);
    }

    #[test]
    fn not_ready_message_carries_wid_and_state() {
        let err = QuepasaError::NotReady {
            wid: "5511999@s.whatsapp.net".into(),
            state: ConnectionState::Disconnected,
        };
        assert_eq!(
            err.to_string(),
            "(5511999@s.whatsapp.net)(ERR) server not ready, current state: Disconnected"
        );
    }
}
