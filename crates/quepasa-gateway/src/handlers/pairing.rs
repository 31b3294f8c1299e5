// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device pairing (QR and phone code) and account creation.
//!
//! Pairing needs a username: `X-QUEPASA-USER`, falling back to the owner of
//! the token's server. The master key may pair on behalf of any existing
//! user; a token may only pair for its own owner.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use quepasa_core::QuepasaError;

use crate::auth::{TOKEN_HEADER, USER_HEADER, header_value};
use crate::error::ApiError;
use crate::media;
use crate::server::GatewayState;

/// Resolves who the pairing is for and which token it should bind.
async fn pairing_target(
    state: &GatewayState,
    headers: &HeaderMap,
) -> Result<(String, Option<String>), ApiError> {
    let user = header_value(headers, USER_HEADER);
    let token = header_value(headers, TOKEN_HEADER);

    let (user, token) = if state.auth.is_master(headers) {
        let user = user.ok_or_else(|| ApiError::bad_request("missing X-QUEPASA-USER"))?;
        (user, token)
    } else {
        let token = token.ok_or_else(|| ApiError::unauthorized("missing token or master key"))?;
        let server = state
            .registry
            .find_by_token(&token)
            .await
            .ok_or_else(|| ApiError::unauthorized("invalid token"))?;
        let owner = server.owner();
        let user = match user {
            Some(user) if !owner.is_empty() && user != owner => {
                return Err(ApiError::unauthorized("user does not own this server"));
            }
            Some(user) => user,
            None if owner.is_empty() => {
                return Err(ApiError::bad_request("missing X-QUEPASA-USER"));
            }
            None => owner,
        };
        (user, Some(server.token().to_string()))
    };

    if !state.registry.user_exists(&user).await? {
        return Err(QuepasaError::NotFound(format!("user: {user}")).into());
    }
    Ok((user, token))
}

/// GET /scan
pub async fn get_scan(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (user, token) = pairing_target(&state, &headers).await?;
    let pairing = state.registry.start_pairing(&user, token).await?;
    let png = media::qr_png(&pairing.qr().await?)?;
    tracing::info!(user = %user, pairing = %pairing.id(), "pairing qr issued");
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PairCodeQuery {
    pub phone: String,
}

/// GET /paircode?phone=<e164>
pub async fn get_paircode(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<PairCodeQuery>,
) -> Result<Response, ApiError> {
    let (user, token) = pairing_target(&state, &headers).await?;
    let pairing = state.registry.start_pairing(&user, token).await?;
    let code = pairing.pair_code(&query.phone).await?;
    tracing::info!(user = %user, pairing = %pairing.id(), "pairing code issued");
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], code).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    #[serde(alias = "user", alias = "email")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub success: bool,
    pub status: String,
    pub username: String,
}

/// POST /account
///
/// Open while account setup is enabled; otherwise needs the master key.
pub async fn post_account(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<AccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    if !state.config.account_setup && !state.auth.is_master(&headers) {
        return Err(ApiError::unauthorized("account setup disabled"));
    }
    if state.registry.user_exists(body.username.trim()).await? {
        return Err(QuepasaError::Validation(format!("user already exists: {}", body.username.trim())).into());
    }
    let user = state
        .registry
        .create_user(&body.username, Some(&body.password))
        .await?;
    Ok(Json(AccountResponse {
        success: true,
        status: "account created".into(),
        username: user.username,
    }))
}
