// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fleet health and Prometheus scrape endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use quepasa_core::{HealthStats, ServerHealth};

use crate::auth::{TOKEN_HEADER, header_value};
use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub items: Vec<ServerHealth>,
    pub stats: HealthStats,
    pub uptime_secs: u64,
}

/// GET /health and /healthapi
///
/// The master key sees every server; a token sees only its own.
pub async fn get_health(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, ApiError> {
    let (items, stats) = if state.auth.is_master(&headers) {
        (
            state.registry.get_health().await,
            state.registry.health_stats().await,
        )
    } else {
        let token = header_value(&headers, TOKEN_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing token or master key"))?;
        let server = state
            .registry
            .find_by_token(&token)
            .await
            .ok_or_else(|| ApiError::unauthorized("invalid token"))?;
        let stats = HealthStats::from_states([server.state().is_healthy()]);
        (vec![server.health()], stats)
    };

    let title = if state.config.app_title.is_empty() {
        "quepasa"
    } else {
        state.config.app_title.as_str()
    };
    Ok(Json(HealthResponse {
        success: stats.unhealthy == 0,
        status: format!("{title}: {}/{} servers healthy", stats.healthy, stats.total),
        items,
        stats,
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not enabled").into_response(),
    }
}
