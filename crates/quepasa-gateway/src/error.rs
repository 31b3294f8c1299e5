// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON error envelope returned by every failing endpoint.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use quepasa_core::QuepasaError;

/// A failed API call.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid token or master key.
    Unauthorized(String),
    /// Malformed request the service never saw.
    BadRequest(String),
    /// Anything the service layer returned.
    Service(QuepasaError),
}

impl From<QuepasaError> for ApiError {
    fn from(e: QuepasaError) -> Self {
        Self::Service(e)
    }
}

#[derive(Debug, Serialize)]
struct Envelope {
    success: bool,
    status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    debug: Vec<String>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn envelope(&self) -> Envelope {
        let (status, debug) = match self {
            Self::Unauthorized(m) | Self::BadRequest(m) => (m.clone(), Vec::new()),
            Self::Service(e) => {
                let mut debug = Vec::new();
                let mut source = std::error::Error::source(e);
                while let Some(cause) = source {
                    debug.push(cause.to_string());
                    source = cause.source();
                }
                (e.to_string(), debug)
            }
        };
        Envelope {
            success: false,
            status,
            debug,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = ?self, "request failed");
        }
        (status, Json(self.envelope())).into_response()
    }
}
