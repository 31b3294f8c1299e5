// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server record, settings, and lifecycle commands.

use axum::extract::{Extension, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use quepasa_core::{ServerRecord, TriState};
use quepasa_service::Timestamps;

use crate::auth::TokenServer;
use crate::error::ApiError;
use crate::handlers::StatusResponse;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    #[serde(flatten)]
    pub record: ServerRecord,
    pub state: String,
    pub state_code: i32,
    pub timestamps: Timestamps,
    pub webhooks: usize,
    pub rabbitmq: usize,
    pub realtime: bool,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub status: String,
    pub server: ServerInfo,
}

async fn describe(server: &quepasa_service::Server) -> ServerInfo {
    let state = server.state();
    let routes = server.routes().await;
    let webhooks = routes
        .iter()
        .filter(|r| r.kind() == quepasa_core::RouteKind::Webhook)
        .count();
    ServerInfo {
        record: server.record(),
        state: state.to_string(),
        state_code: state.code(),
        timestamps: server.timestamps(),
        webhooks,
        rabbitmq: routes.len() - webhooks,
        realtime: server.has_realtime_sink(),
    }
}

/// GET /info
pub async fn get_info(Extension(TokenServer(server)): Extension<TokenServer>) -> Json<InfoResponse> {
    let info = describe(&server).await;
    Json(InfoResponse {
        success: true,
        status: format!("server {}", info.state),
        server: info,
    })
}

/// Settings patch; absent fields stay untouched.
#[derive(Debug, Default, Deserialize)]
pub struct InfoPatch {
    #[serde(default)]
    pub groups: Option<TriState>,
    #[serde(default)]
    pub direct: Option<TriState>,
    #[serde(default)]
    pub broadcasts: Option<TriState>,
    #[serde(default, alias = "readreceipts")]
    pub read_receipts: Option<TriState>,
    #[serde(default)]
    pub calls: Option<TriState>,
    #[serde(default, alias = "readupdate")]
    pub read_update: Option<TriState>,
    #[serde(default)]
    pub devel: Option<bool>,
}

/// PATCH /info
pub async fn patch_info(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(patch): Json<InfoPatch>,
) -> Result<Json<InfoResponse>, ApiError> {
    let policies = [
        ("groups", patch.groups),
        ("direct", patch.direct),
        ("broadcasts", patch.broadcasts),
        ("readreceipts", patch.read_receipts),
        ("calls", patch.calls),
        ("readupdate", patch.read_update),
    ];
    for (key, value) in policies {
        if let Some(value) = value {
            server.set_policy(key, value).await?;
        }
    }
    if let Some(devel) = patch.devel
        && devel != server.record().devel
    {
        server.toggle_devel().await?;
    }

    Ok(Json(InfoResponse {
        success: true,
        status: "server updated".into(),
        server: describe(&server).await,
    }))
}

/// DELETE /info
pub async fn delete_info(
    State(state): State<GatewayState>,
    Extension(TokenServer(server)): Extension<TokenServer>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.registry.delete(server.token(), "api request").await?;
    Ok(Json(StatusResponse::ok("server deleted")))
}

#[derive(Debug, Deserialize)]
pub struct CommandQuery {
    pub action: String,
}

/// POST /command?action=start|stop|restart|status
pub async fn post_command(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Query(query): Query<CommandQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    match query.action.trim().to_ascii_lowercase().as_str() {
        "start" => server.start().await?,
        "stop" => server.stop("api command").await?,
        "restart" => server.restart().await?,
        "status" => {}
        other => {
            return Err(ApiError::bad_request(format!("unknown action: {other}")));
        }
    }
    Ok(Json(StatusResponse::ok(server.state().to_string())))
}
