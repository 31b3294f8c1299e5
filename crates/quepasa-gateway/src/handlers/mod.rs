// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers, grouped by concern.

pub mod health;
pub mod info;
pub mod messages;
pub mod pairing;
pub mod routes;
pub mod whatsapp;

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{FromRequestParts, Path};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde::Serialize;

use crate::auth::header_value;

/// Path captures of the matched route; empty when it has none.
pub struct PathParams(pub HashMap<String, String>);

impl<S: Send + Sync> FromRequestParts<S> for PathParams {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let params = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();
        Ok(Self(params))
    }
}

/// First non-empty value among path capture, query parameter, and header.
pub(crate) fn lookup(
    path: &HashMap<String, String>,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    key: &str,
    header: &str,
) -> Option<String> {
    path.get(key)
        .or_else(|| query.get(key))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| header_value(headers, header))
}

/// Plain `{success: true, status}` reply.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: String,
}

impl StatusResponse {
    pub fn ok(status: impl Into<String>) -> Self {
        Self {
            success: true,
            status: status.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn lookup_prefers_path_then_query_then_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-QUEPASA-CHATID", HeaderValue::from_static("from-header"));
        let mut query = HashMap::new();
        query.insert("chatid".to_string(), "from-query".to_string());
        let mut path = HashMap::new();

        assert_eq!(
            lookup(&path, &query, &headers, "chatid", "X-QUEPASA-CHATID").as_deref(),
            Some("from-query")
        );
        path.insert("chatid".to_string(), "from-path".to_string());
        assert_eq!(
            lookup(&path, &query, &headers, "chatid", "X-QUEPASA-CHATID").as_deref(),
            Some("from-path")
        );
        assert_eq!(
            lookup(&HashMap::new(), &HashMap::new(), &headers, "chatid", "X-QUEPASA-CHATID")
                .as_deref(),
            Some("from-header")
        );
    }
}
