// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP webhook delivery.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;

use quepasa_core::QuepasaError;

pub const WID_HEADER: &str = "X-QUEPASA-WID";

/// Result of a webhook POST that reached the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResponse {
    Ok,
    /// Anything other than HTTP 200.
    Status(u16),
}

/// Posts envelopes to webhook URLs.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, QuepasaError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| QuepasaError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POSTs `body` to `url`. Only transport failures are errors; HTTP
    /// statuses come back as [`WebhookResponse`].
    pub async fn post(
        &self,
        url: &str,
        wid: &str,
        body: &Value,
    ) -> Result<WebhookResponse, QuepasaError> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(USER_AGENT, "Quepasa")
            .header(WID_HEADER, wid)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuepasaError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    QuepasaError::Transport {
                        message: format!("webhook request to {url} failed"),
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        match response.status() {
            StatusCode::OK => Ok(WebhookResponse::Ok),
            other => Ok(WebhookResponse::Status(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_json_with_gateway_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("user-agent", "Quepasa"))
            .and(header("x-quepasa-wid", "5511@s.whatsapp.net"))
            .and(body_json(json!({"id": "ABC"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WebhookSender::new(Duration::from_secs(5)).unwrap();
        let result = sender
            .post(
                &format!("{}/hook", server.uri()),
                "5511@s.whatsapp.net",
                &json!({"id": "ABC"}),
            )
            .await
            .unwrap();
        assert_eq!(result, WebhookResponse::Ok);
    }

    #[tokio::test]
    async fn non_200_is_reported_as_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let sender = WebhookSender::new(Duration::from_secs(5)).unwrap();
        let result = sender.post(&server.uri(), "w", &json!({})).await.unwrap();
        assert_eq!(result, WebhookResponse::Status(201));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let sender = WebhookSender::new(Duration::from_millis(50)).unwrap();
        let err = sender.post(&server.uri(), "w", &json!({})).await.unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
    }
}
