// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use quepasa_config::QuepasaConfig;
use quepasa_core::QuepasaError;
use quepasa_service::Registry;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers::{health, info, messages, pairing, routes, whatsapp};
use crate::hub::RealtimeHub;
use crate::ws;

/// Gateway settings derived once from the loaded configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub http_logs: bool,
    pub app_title: String,
    pub master_key: Option<String>,
    /// Lets `POST /account` create users without the master key.
    pub account_setup: bool,
    pub compatible_mime_as_audio: bool,
    /// Timeout for fetching `url` attachments.
    pub download_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("http_logs", &self.http_logs)
            .field("app_title", &self.app_title)
            .field("master_key", &self.master_key.as_ref().map(|_| "[redacted]"))
            .field("account_setup", &self.account_setup)
            .field("compatible_mime_as_audio", &self.compatible_mime_as_audio)
            .field("download_timeout", &self.download_timeout)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_config(&QuepasaConfig::default())
    }
}

impl GatewayConfig {
    pub fn from_config(config: &QuepasaConfig) -> Self {
        let master_key = config.auth.master_key.trim();
        Self {
            host: config.web.host.clone(),
            port: config.web.port,
            http_logs: config.web.http_logs,
            app_title: config.web.app_title.clone(),
            master_key: (!master_key.is_empty()).then(|| master_key.to_string()),
            account_setup: config.auth.account_setup,
            compatible_mime_as_audio: config.whatsapp.compatible_mime_as_audio,
            download_timeout: Duration::from_secs(config.dispatch.webhook_timeout_secs.max(30)),
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<Registry>,
    pub hub: Arc<RealtimeHub>,
    pub auth: AuthConfig,
    pub config: Arc<GatewayConfig>,
    /// Client used to fetch `url` attachments.
    pub http: reqwest::Client,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(registry: Arc<Registry>, hub: Arc<RealtimeHub>, config: GatewayConfig) -> Self {
        Self {
            registry,
            hub,
            auth: AuthConfig {
                master_key: config.master_key.clone(),
            },
            config: Arc::new(config),
            http: reqwest::Client::new(),
            prometheus_render: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_prometheus(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.prometheus_render = Some(render);
        self
    }
}

/// Endpoints that exist both at the root and under `/v3/bot/{token}`.
fn bot_routes() -> Router<GatewayState> {
    Router::new()
        .route("/send", post(messages::post_send))
        .route("/send/{chatid}", post(messages::post_send))
        .route("/sendbinary", post(messages::post_send_binary))
        .route("/sendbinary/{chatid}", post(messages::post_send_binary))
        .route("/sendbinary/{chatid}/{filename}", post(messages::post_send_binary))
        .route(
            "/sendbinary/{chatid}/{filename}/{text}",
            post(messages::post_send_binary),
        )
        .route("/receive", get(messages::get_receive))
        .route("/download/{messageid}", get(messages::get_download))
}

/// Builds the full application router.
pub fn build_router(state: GatewayState) -> Router {
    // Unauthenticated or self-authenticating routes.
    let public_routes = Router::new()
        .route("/health", get(health::get_health))
        .route("/healthapi", get(health::get_health))
        .route("/metrics", get(health::get_metrics))
        .route("/scan", get(pairing::get_scan))
        .route("/paircode", get(pairing::get_paircode))
        .route("/account", post(pairing::post_account))
        .route("/ws", get(ws::ws_handler))
        .with_state(state.clone());

    // Routes acting on the server named by the token.
    let api_routes = Router::new()
        .merge(bot_routes())
        .nest("/v3/bot/{token}", bot_routes())
        .route(
            "/info",
            get(info::get_info)
                .patch(info::patch_info)
                .delete(info::delete_info),
        )
        .route("/command", post(info::post_command))
        .route(
            "/message/{messageid}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/edit", put(messages::put_edit))
        .route("/read", post(messages::post_read))
        .route(
            "/webhook",
            get(routes::get_webhooks)
                .post(routes::post_webhook)
                .delete(routes::delete_webhook),
        )
        .route(
            "/rabbitmq",
            get(routes::get_rabbitmq)
                .post(routes::post_rabbitmq)
                .delete(routes::delete_rabbitmq),
        )
        .route("/contacts", get(whatsapp::get_contacts))
        .route("/isonwhatsapp", post(whatsapp::post_is_on_whatsapp))
        .route("/invite/{chatid}", get(whatsapp::get_invite))
        .route("/groups/getall", get(whatsapp::get_groups))
        .route("/groups/get", get(whatsapp::get_group))
        .route("/chat/presence", post(whatsapp::post_presence))
        .route("/picinfo/{chatid}", get(whatsapp::get_picture))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive());

    if state.config.http_logs {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

/// Start the gateway HTTP/WebSocket server; returns once `shutdown` fires
/// and in-flight requests finish.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), QuepasaError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| QuepasaError::Transport {
            message: format!("failed to bind gateway to {addr}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!(addr = %addr, title = %config.app_title, "gateway server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| QuepasaError::Transport {
            message: "gateway server error".into(),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
