// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint of the realtime hub.
//!
//! The client binds to a server token (`X-QUEPASA-TOKEN` or `?token=`) or to
//! the master key; every message dispatched for that token arrives as one
//! JSON text frame. Client frames are ignored apart from close.

use std::collections::HashMap;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use crate::auth::{MASTER_KEY_HEADER, TOKEN_HEADER, header_value};
use crate::error::ApiError;
use crate::server::GatewayState;

/// Authenticates during the handshake, then upgrades.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let binding = bind_token(&state, &headers, &query).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, binding)))
}

async fn bind_token(
    state: &GatewayState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<String, ApiError> {
    if let Some(key) = header_value(headers, MASTER_KEY_HEADER).or_else(|| query.get("masterkey").cloned())
        && state.auth.is_master_key(&key)
    {
        return Ok(key);
    }

    let token = header_value(headers, TOKEN_HEADER)
        .or_else(|| query.get("token").cloned())
        .ok_or_else(|| ApiError::unauthorized("missing token"))?;
    match state.registry.find_by_token(&token).await {
        Some(server) => Ok(server.token().to_string()),
        None => Err(ApiError::unauthorized("invalid token")),
    }
}

async fn handle_socket(socket: WebSocket, state: GatewayState, token: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (client_id, mut rx) = state.hub.subscribe(token);
    tracing::debug!(client = %client_id, "realtime client connected");

    let sender_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = ws_receiver.next().await {
        if let WsMessage::Close(_) = frame {
            break;
        }
    }

    state.hub.unsubscribe(&client_id);
    sender_task.abort();
    tracing::debug!(client = %client_id, "realtime client disconnected");
}
