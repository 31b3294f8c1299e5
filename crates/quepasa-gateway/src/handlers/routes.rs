// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook and RabbitMQ route management.

use axum::Json;
use axum::body::Bytes;
use axum::extract::Extension;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quepasa_core::{DispatchingRecord, QuepasaError, RouteKind, TriState};
use quepasa_dispatch::RouteState;

use crate::auth::TokenServer;
use crate::error::ApiError;
use crate::handlers::StatusResponse;

/// Route settings accepted by `POST /webhook` and `POST /rabbitmq`.
#[derive(Debug, Default, Deserialize)]
pub struct RouteRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "connectionstring", alias = "connectionString")]
    pub connection_string: String,
    #[serde(default, alias = "forwardinternal")]
    pub forward_internal: bool,
    #[serde(default, alias = "trackid")]
    pub track_id: String,
    #[serde(default, alias = "readreceipts")]
    pub read_receipts: TriState,
    #[serde(default)]
    pub groups: TriState,
    #[serde(default)]
    pub broadcasts: TriState,
    #[serde(default)]
    pub calls: TriState,
    #[serde(default)]
    pub extra: Option<Value>,
}

impl RouteRequest {
    fn target(&self, kind: RouteKind) -> &str {
        match kind {
            RouteKind::Webhook if !self.url.is_empty() => &self.url,
            _ if !self.connection_string.is_empty() => &self.connection_string,
            _ => &self.url,
        }
    }

    fn into_record(self, kind: RouteKind) -> Result<DispatchingRecord, QuepasaError> {
        let target = self.target(kind).trim().to_string();
        validate_target(kind, &target)?;
        let mut record = DispatchingRecord::new("", kind, target);
        record.forward_internal = self.forward_internal;
        record.track_id = self.track_id;
        record.read_receipts = self.read_receipts;
        record.groups = self.groups;
        record.broadcasts = self.broadcasts;
        record.calls = self.calls;
        record.extra = self.extra.filter(|v| !v.is_null());
        Ok(record)
    }
}

fn validate_target(kind: RouteKind, target: &str) -> Result<(), QuepasaError> {
    let schemes: &[&str] = match kind {
        RouteKind::Webhook => &["http://", "https://"],
        RouteKind::Amqp => &["amqp://", "amqps://"],
    };
    if schemes
        .iter()
        .any(|s| target.len() > s.len() && target[..s.len()].eq_ignore_ascii_case(s))
    {
        Ok(())
    } else {
        Err(QuepasaError::Validation(format!(
            "invalid {kind} target, expected {}",
            schemes.join(" or ")
        )))
    }
}

#[derive(Debug, Serialize)]
pub struct RouteView {
    #[serde(flatten)]
    pub record: DispatchingRecord,
    #[serde(flatten)]
    pub state: RouteState,
}

#[derive(Debug, Serialize)]
pub struct RouteList {
    pub success: bool,
    pub status: String,
    pub routes: Vec<RouteView>,
}

async fn list(server: &quepasa_service::Server, kind: RouteKind) -> Json<RouteList> {
    let routes: Vec<RouteView> = server
        .routes_of(kind)
        .await
        .iter()
        .map(|r| RouteView {
            record: r.record().clone(),
            state: r.state(),
        })
        .collect();
    Json(RouteList {
        success: true,
        status: format!("{} {kind} routes", routes.len()),
        routes,
    })
}

async fn upsert(
    server: &std::sync::Arc<quepasa_service::Server>,
    kind: RouteKind,
    request: RouteRequest,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = request.into_record(kind)?;
    let created = server.upsert_route(record).await?;
    Ok(Json(StatusResponse::ok(if created {
        format!("{kind} created")
    } else {
        format!("{kind} updated")
    })))
}

/// With a body naming a target, removes that route; without one, removes
/// every route of the kind.
async fn remove(
    server: &quepasa_service::Server,
    kind: RouteKind,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let request: RouteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RouteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid json body: {e}")))?
    };

    let target = request.target(kind).trim();
    if target.is_empty() {
        let removed = server.clear_routes(Some(kind)).await?;
        return Ok(Json(StatusResponse::ok(format!("{removed} {kind} routes removed"))));
    }
    if server.remove_route(target).await? {
        Ok(Json(StatusResponse::ok(format!("{kind} removed"))))
    } else {
        Err(QuepasaError::NotFound(format!("{kind} route: {target}")).into())
    }
}

/// GET /webhook
pub async fn get_webhooks(Extension(TokenServer(server)): Extension<TokenServer>) -> Json<RouteList> {
    list(&server, RouteKind::Webhook).await
}

/// POST /webhook
pub async fn post_webhook(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    upsert(&server, RouteKind::Webhook, request).await
}

/// DELETE /webhook
pub async fn delete_webhook(
    Extension(TokenServer(server)): Extension<TokenServer>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    remove(&server, RouteKind::Webhook, body).await
}

/// GET /rabbitmq
pub async fn get_rabbitmq(Extension(TokenServer(server)): Extension<TokenServer>) -> Json<RouteList> {
    list(&server, RouteKind::Amqp).await
}

/// POST /rabbitmq
pub async fn post_rabbitmq(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    upsert(&server, RouteKind::Amqp, request).await
}

/// DELETE /rabbitmq
pub async fn delete_rabbitmq(
    Extension(TokenServer(server)): Extension<TokenServer>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    remove(&server, RouteKind::Amqp, body).await
}
