// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sending, receiving, downloading, and editing messages.

use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quepasa_core::phone::format_endpoint;
use quepasa_core::{Attachment, Chat, Message, MessageType, Poll};
use quepasa_service::Server;

use crate::auth::{CHAT_ID_HEADER, FILENAME_HEADER, TEXT_HEADER, TRACK_ID_HEADER, TokenServer, header_value};
use crate::error::ApiError;
use crate::handlers::{PathParams, StatusResponse, lookup};
use crate::media;
use crate::server::GatewayState;

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default, rename = "chatId", alias = "chatid")]
    pub chat_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Base64 bytes, optionally as a data uri.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default, alias = "inReply")]
    pub inreply: String,
    #[serde(default, alias = "trackId")]
    pub trackid: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub poll: Option<Poll>,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub wid: String,
    pub id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "trackId", skip_serializing_if = "String::is_empty")]
    pub track_id: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub status: String,
    pub message: SentMessage,
}

/// Formats the recipient, attaches content, sends, and reports the ids.
async fn deliver(
    state: &GatewayState,
    server: &Server,
    chat_id: &str,
    mut msg: Message,
    attachment: Option<Attachment>,
) -> Result<Json<SendResponse>, ApiError> {
    let chat_id = format_endpoint(chat_id)?;
    msg.chat = Chat::new(chat_id.clone());
    if msg.timestamp.timestamp() == 0 {
        msg.timestamp = Utc::now();
    }
    if msg.poll.is_some() {
        msg.kind = MessageType::Poll;
    } else if let Some(attachment) = attachment {
        msg.kind = media::kind_for_mime(&attachment.mime, state.config.compatible_mime_as_audio);
        msg.attachment = Some(attachment);
    } else {
        msg.kind = MessageType::Text;
    }

    let track_id = msg.track_id.clone();
    let response = server.send(msg).await?;
    tracing::debug!(token = %server.token(), message_id = %response.id, chat_id = %chat_id, "sent via api");

    Ok(Json(SendResponse {
        success: true,
        status: "sent".into(),
        message: SentMessage {
            wid: server.wid(),
            id: response.id,
            chat_id,
            track_id,
        },
    }))
}

/// POST /send[/{chatid}] and /v3/bot/{token}/send
///
/// Content precedence is `url`, then `content`, then text only.
pub async fn post_send(
    State(state): State<GatewayState>,
    Extension(TokenServer(server)): Extension<TokenServer>,
    PathParams(path): PathParams,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let chat_id = Some(body.chat_id.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| lookup(&path, &query, &headers, "chatid", CHAT_ID_HEADER))
        .ok_or_else(|| ApiError::bad_request("missing chatId"))?;

    let attachment = if let Some(url) = body.url.as_deref().filter(|u| !u.trim().is_empty()) {
        let mut fetched = media::fetch(&state.http, url.trim(), state.config.download_timeout).await?;
        if !body.filename.is_empty() {
            fetched.filename = body.filename.clone();
        }
        if let Some(mime) = body.mime.as_deref().filter(|m| !m.is_empty()) {
            fetched.mime = mime.to_string();
        }
        Some(fetched)
    } else if let Some(content) = body.content.as_deref().filter(|c| !c.trim().is_empty()) {
        let (bytes, embedded_mime) = media::decode_content(content)?;
        let mime = body.mime.clone().or(embedded_mime);
        Some(media::attachment(bytes, mime.as_deref(), &body.filename))
    } else {
        None
    };

    let msg = Message {
        id: body.id,
        track_id: Some(body.trackid)
            .filter(|t| !t.is_empty())
            .or_else(|| header_value(&headers, TRACK_ID_HEADER))
            .unwrap_or_default(),
        text: body.text,
        in_reply: body.inreply,
        poll: body.poll,
        ..Message::default()
    };
    deliver(&state, &server, &chat_id, msg, attachment).await
}

/// POST /sendbinary[/{chatid}[/{filename}[/{text}]]]
///
/// The raw body is the file. Parameters may also come from the query string
/// or the `X-QUEPASA-*` headers.
pub async fn post_send_binary(
    State(state): State<GatewayState>,
    Extension(TokenServer(server)): Extension<TokenServer>,
    PathParams(path): PathParams,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SendResponse>, ApiError> {
    let chat_id = lookup(&path, &query, &headers, "chatid", CHAT_ID_HEADER)
        .ok_or_else(|| ApiError::bad_request("missing chatid"))?;
    let filename = lookup(&path, &query, &headers, "filename", FILENAME_HEADER).unwrap_or_default();
    let text = lookup(&path, &query, &headers, "text", TEXT_HEADER).unwrap_or_default();
    if body.is_empty() {
        return Err(ApiError::bad_request("empty binary content"));
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|m| m != media::OCTET_STREAM);
    let attachment = media::attachment(body.to_vec(), mime.as_deref(), &filename);

    let msg = Message {
        track_id: lookup(&path, &query, &headers, "trackid", TRACK_ID_HEADER).unwrap_or_default(),
        text,
        ..Message::default()
    };
    deliver(&state, &server, &chat_id, msg, Some(attachment)).await
}

#[derive(Debug, Deserialize)]
pub struct ReceiveQuery {
    /// Unix seconds; only newer messages are returned.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReceiveResponse<'a> {
    pub success: bool,
    pub status: String,
    pub total: usize,
    pub messages: Vec<&'a Message>,
}

/// GET /receive?timestamp=<unix>
pub async fn get_receive(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Query(query): Query<ReceiveQuery>,
) -> Response {
    let after = query
        .timestamp
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .unwrap_or(DateTime::UNIX_EPOCH);
    let messages = server.get_messages(after).await;
    let body = ReceiveResponse {
        success: true,
        status: format!("found {} messages", messages.len()),
        total: messages.len(),
        messages: messages.iter().map(|m| m.as_ref()).collect(),
    };
    Json(body).into_response()
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default = "default_true")]
    pub cache: bool,
}

fn default_true() -> bool {
    true
}

/// GET /download/{messageid}?cache=true|false
pub async fn get_download(
    Extension(TokenServer(server)): Extension<TokenServer>,
    PathParams(path): PathParams,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let id = path
        .get("messageid")
        .ok_or_else(|| ApiError::bad_request("missing message id"))?;
    let bytes = server.download(id, query.cache).await?;

    let attachment = server
        .get_message(id)
        .ok()
        .and_then(|m| m.attachment.clone())
        .unwrap_or_default();
    let mime = if attachment.mime.is_empty() {
        media::OCTET_STREAM.to_string()
    } else {
        attachment.mime
    };
    let filename = if attachment.filename.is_empty() {
        id.clone()
    } else {
        attachment.filename
    };
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /message/{messageid}
pub async fn get_message(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let msg = server.get_message(&id)?;
    Ok(Json(msg.as_ref()).into_response())
}

/// DELETE /message/{messageid}
pub async fn delete_message(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    server.revoke(&id).await?;
    Ok(Json(StatusResponse::ok("revoked")))
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(rename = "messageId", alias = "messageid")]
    pub message_id: String,
    pub content: String,
}

/// PUT /edit
pub async fn put_edit(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(body): Json<EditRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    server.edit(&body.message_id, &body.content).await?;
    Ok(Json(StatusResponse::ok("edited")))
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    #[serde(rename = "messageId", alias = "messageid")]
    pub message_id: String,
}

/// POST /read
pub async fn post_read(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(body): Json<ReadRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    server.mark_read(&body.message_id).await?;
    Ok(Json(StatusResponse::ok("marked as read")))
}
