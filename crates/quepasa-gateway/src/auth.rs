// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Header authentication for the gateway.
//!
//! Server-scoped routes resolve `X-QUEPASA-TOKEN` (or the `{token}` path
//! segment, or `?token=`) to a registered server and stash it in the request
//! extensions. Fleet-wide endpoints check `X-QUEPASA-MASTERKEY` themselves.

use std::collections::HashMap;
use std::sync::Arc;

use axum::RequestExt;
use axum::extract::{Path, Query, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use quepasa_service::Server;

use crate::error::ApiError;
use crate::server::GatewayState;

pub const TOKEN_HEADER: &str = "X-QUEPASA-TOKEN";
pub const MASTER_KEY_HEADER: &str = "X-QUEPASA-MASTERKEY";
pub const USER_HEADER: &str = "X-QUEPASA-USER";
pub const CHAT_ID_HEADER: &str = "X-QUEPASA-CHATID";
pub const FILENAME_HEADER: &str = "X-QUEPASA-FILENAME";
pub const TEXT_HEADER: &str = "X-QUEPASA-TEXT";
pub const TRACK_ID_HEADER: &str = "X-QUEPASA-TRACKID";

/// Authentication settings for the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Fleet-wide key. `None` disables master access entirely.
    pub master_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("master_key", &self.master_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl AuthConfig {
    pub fn is_master_key(&self, candidate: &str) -> bool {
        self.master_key
            .as_deref()
            .is_some_and(|key| !candidate.is_empty() && key == candidate)
    }

    /// True when the request carries the configured master key.
    pub fn is_master(&self, headers: &HeaderMap) -> bool {
        header_value(headers, MASTER_KEY_HEADER).is_some_and(|v| self.is_master_key(&v))
    }
}

/// A trimmed, non-empty header value.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The server a token-authenticated request acts on.
#[derive(Clone)]
pub struct TokenServer(pub Arc<Server>);

/// Resolves the caller's server or rejects with 401.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut token = header_value(request.headers(), TOKEN_HEADER);
    if token.is_none()
        && let Ok(Path(params)) = request
            .extract_parts::<Path<HashMap<String, String>>>()
            .await
    {
        token = params.get("token").cloned();
    }
    if token.is_none()
        && let Ok(Query(params)) = request
            .extract_parts::<Query<HashMap<String, String>>>()
            .await
    {
        token = params.get("token").cloned();
    }

    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        return Err(ApiError::unauthorized("missing token"));
    };
    let Some(server) = state.registry.find_by_token(token.trim()).await else {
        tracing::debug!(token = %token, "rejected unknown token");
        return Err(ApiError::unauthorized("invalid token"));
    };

    request.extensions_mut().insert(TokenServer(server));
    Ok(next.run(request).await)
}
