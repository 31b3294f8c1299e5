// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact, group, and presence queries passed through to the upstream.

use axum::Json;
use axum::extract::{Extension, Path, Query};
use serde::{Deserialize, Serialize};

use quepasa_core::{Chat, ChatPresence, GroupInfo, ProfilePicture};

use crate::auth::TokenServer;
use crate::error::ApiError;
use crate::handlers::StatusResponse;

#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub success: bool,
    pub total: usize,
    pub contacts: Vec<Chat>,
}

/// GET /contacts
pub async fn get_contacts(
    Extension(TokenServer(server)): Extension<TokenServer>,
) -> Result<Json<ContactsResponse>, ApiError> {
    let contacts = server.contacts().await?;
    Ok(Json(ContactsResponse {
        success: true,
        total: contacts.len(),
        contacts,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PhonesRequest {
    pub phones: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PhonesResponse {
    pub success: bool,
    pub registered: Vec<String>,
}

/// POST /isonwhatsapp
pub async fn post_is_on_whatsapp(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(body): Json<PhonesRequest>,
) -> Result<Json<PhonesResponse>, ApiError> {
    if body.phones.is_empty() {
        return Err(ApiError::bad_request("no phones given"));
    }
    let registered = server.is_on_whatsapp(&body.phones).await?;
    Ok(Json(PhonesResponse {
        success: true,
        registered,
    }))
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub success: bool,
    pub url: String,
}

/// GET /invite/{chatid}
pub async fn get_invite(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Path(chat_id): Path<String>,
) -> Result<Json<InviteResponse>, ApiError> {
    let url = server.invite_link(&chat_id).await?;
    Ok(Json(InviteResponse { success: true, url }))
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub success: bool,
    pub total: usize,
    pub groups: Vec<GroupInfo>,
}

/// GET /groups/getall
pub async fn get_groups(
    Extension(TokenServer(server)): Extension<TokenServer>,
) -> Result<Json<GroupsResponse>, ApiError> {
    let groups = server.groups().await?;
    Ok(Json(GroupsResponse {
        success: true,
        total: groups.len(),
        groups,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    #[serde(rename = "groupId", alias = "groupid")]
    pub group_id: String,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub success: bool,
    #[serde(rename = "groupinfo")]
    pub group_info: GroupInfo,
}

/// GET /groups/get?groupId=
pub async fn get_group(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<GroupResponse>, ApiError> {
    let group_info = server.group_info(&query.group_id).await?;
    Ok(Json(GroupResponse {
        success: true,
        group_info,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    #[serde(rename = "chatId", alias = "chatid")]
    pub chat_id: String,
    #[serde(rename = "type")]
    pub presence: String,
}

/// POST /chat/presence
pub async fn post_presence(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Json(body): Json<PresenceRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let presence: ChatPresence = body
        .presence
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid presence type: {}", body.presence)))?;
    server.send_presence(&body.chat_id, presence).await?;
    Ok(Json(StatusResponse::ok(format!("presence {presence} sent"))))
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub success: bool,
    pub info: ProfilePicture,
}

/// GET /picinfo/{chatid}
pub async fn get_picture(
    Extension(TokenServer(server)): Extension<TokenServer>,
    Path(chat_id): Path<String>,
) -> Result<Json<PictureResponse>, ApiError> {
    let info = server.profile_picture(&chat_id).await?;
    Ok(Json(PictureResponse {
        success: true,
        info,
    }))
}
