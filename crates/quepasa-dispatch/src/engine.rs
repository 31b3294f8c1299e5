// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of one message to one route, with bookkeeping and telemetry.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use quepasa_core::{DispatchingRecord, Message, QuepasaError, RouteKind};
use quepasa_prometheus::recording;

use crate::amqp::{AmqpRegistry, Publication, PublishOutcome};
use crate::envelope::build_envelope;
use crate::route::{Route, RouteState};
use crate::routing::RoutingKey;
use crate::webhook::{WebhookResponse, WebhookSender};

/// Sends messages over webhooks and AMQP and records the outcome on the
/// route.
pub struct Dispatcher {
    webhook: WebhookSender,
    amqp: Arc<AmqpRegistry>,
}

impl Dispatcher {
    pub fn new(webhook: WebhookSender, amqp: Arc<AmqpRegistry>) -> Self {
        Self { webhook, amqp }
    }

    pub fn amqp(&self) -> &Arc<AmqpRegistry> {
        &self.amqp
    }

    /// Builds a live route, taking an AMQP client reference when needed.
    /// `state` carries bookkeeping over from a route being replaced.
    pub async fn open_route(&self, record: DispatchingRecord, state: RouteState) -> Route {
        let client = match record.kind {
            RouteKind::Amqp => Some(self.amqp.acquire(&record.connection_string).await),
            RouteKind::Webhook => None,
        };
        Route::new(record, state, client)
    }

    /// Releases what [`Dispatcher::open_route`] acquired.
    pub async fn close_route(&self, route: &Route) {
        if route.kind() == RouteKind::Amqp {
            self.amqp.release(route.connection_string()).await;
        }
    }

    /// Delivers `msg` to `route`. Errors are already recorded on the route
    /// and in metrics; callers only log them.
    pub async fn deliver(&self, route: &Route, wid: &str, msg: &Message) -> Result<(), QuepasaError> {
        let result = match route.kind() {
            RouteKind::Webhook => self.deliver_webhook(route, wid, msg).await,
            RouteKind::Amqp => self.deliver_amqp(route, msg).await,
        };
        match &result {
            Ok(()) => {
                route.mark_success();
                msg.dispatch_error.clear();
            }
            Err(_) => {
                route.mark_failure();
                msg.dispatch_error.mark();
            }
        }
        result
    }

    async fn deliver_webhook(
        &self,
        route: &Route,
        wid: &str,
        msg: &Message,
    ) -> Result<(), QuepasaError> {
        let body = build_envelope(msg, route.record().extra.as_ref())?;
        let url = route.connection_string();

        let started = Instant::now();
        let result = self.webhook.post(url, wid, &body).await;
        recording::record_webhook_attempt(started.elapsed().as_secs_f64());

        match result {
            Ok(WebhookResponse::Ok) => {
                recording::record_webhook_success();
                debug!(url, message_id = %msg.id, "webhook delivered");
                Ok(())
            }
            Ok(WebhookResponse::Status(status)) => {
                recording::record_webhook_http_error(status);
                recording::record_webhook_error();
                warn!(url, status, message_id = %msg.id, "webhook answered with non-200 status");
                Err(QuepasaError::transport(format!(
                    "webhook {url} answered with status {status}"
                )))
            }
            Err(e) => {
                if e.is_timeout() {
                    recording::record_webhook_timeout();
                }
                recording::record_webhook_error();
                warn!(url, error = %e, message_id = %msg.id, "webhook delivery failed");
                Err(e)
            }
        }
    }

    async fn deliver_amqp(&self, route: &Route, msg: &Message) -> Result<(), QuepasaError> {
        let msg_type = msg.kind.to_string();
        let Some(client) = route.amqp_client() else {
            recording::record_rabbitmq_publish_error("client_unavailable", &msg_type);
            return Err(QuepasaError::Amqp {
                reason: "client_unavailable".into(),
                message: "route has no amqp client".into(),
            });
        };

        if !client.ensure_ready().await {
            recording::record_rabbitmq_publish_error("setup_not_ready", &msg_type);
        }

        let routing_key = RoutingKey::for_message(msg);
        let body = build_envelope(msg, route.record().extra.as_ref())?;
        let body = serde_json::to_vec(&body)
            .map_err(|e| QuepasaError::Internal(format!("failed to encode envelope: {e}")))?;
        let size = body.len();

        let started = Instant::now();
        let outcome = client
            .publish(Publication {
                message_id: next_message_id(),
                routing_key,
                body,
            })
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            PublishOutcome::Sent => {
                recording::record_rabbitmq_published(
                    routing_key.as_str(),
                    client.exchange(),
                    &msg_type,
                    elapsed,
                    size,
                );
                debug!(routing_key = %routing_key, message_id = %msg.id, "amqp message published");
                Ok(())
            }
            PublishOutcome::Cached => {
                recording::record_rabbitmq_publish_error("connection_lost_cached", &msg_type);
                recording::record_rabbitmq_published(
                    routing_key.as_str(),
                    client.exchange(),
                    &msg_type,
                    elapsed,
                    size,
                );
                Err(QuepasaError::Amqp {
                    reason: "connection_lost_cached".into(),
                    message: format!("message {} cached until the broker returns", msg.id),
                })
            }
            PublishOutcome::Dropped => {
                recording::record_rabbitmq_publish_error("cache_full", &msg_type);
                Err(QuepasaError::Amqp {
                    reason: "cache_full".into(),
                    message: format!("message {} dropped, outage cache full", msg.id),
                })
            }
        }
    }
}

/// `msg-<unix nanos>`.
fn next_message_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("msg-{nanos}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use quepasa_core::{MessageType, TriState};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::amqp::AmqpOptions;
    use crate::testing::MockBroker;

    fn dispatcher(broker: &MockBroker) -> Dispatcher {
        let options = AmqpOptions {
            cache_length: 0,
            reconnect_interval: Duration::from_millis(20),
            ensure_timeout: Duration::from_millis(60),
            queue_prefix: "quepasa".into(),
        };
        let registry = AmqpRegistry::new(Arc::new(broker.clone()), options, CancellationToken::new());
        Dispatcher::new(
            WebhookSender::new(Duration::from_secs(2)).unwrap(),
            Arc::new(registry),
        )
    }

    fn text(id: &str, body: &str) -> Message {
        let mut m = Message::text("5511999998888@s.whatsapp.net", body);
        m.id = id.into();
        m
    }

    #[tokio::test]
    async fn webhook_success_sets_success_and_clears_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let d = dispatcher(&MockBroker::new());
        let mut record = DispatchingRecord::new("T", RouteKind::Webhook, server.uri());
        record.extra = Some(json!({"k": "v"}));
        let route = d.open_route(record, RouteState::default()).await;
        route.mark_failure();

        d.deliver(&route, "wid", &text("A", "hi")).await.unwrap();
        let state = route.state();
        assert!(state.failure_at.is_none());
        assert!(state.success_at.is_some());

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["extra"]["k"], "v");
    }

    #[tokio::test]
    async fn webhook_failure_keeps_first_failure_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let d = dispatcher(&MockBroker::new());
        let route = d
            .open_route(
                DispatchingRecord::new("T", RouteKind::Webhook, server.uri()),
                RouteState::default(),
            )
            .await;
        let msg = text("A", "hi");
        assert!(d.deliver(&route, "wid", &msg).await.is_err());
        let first = route.state().failure_at;
        assert!(first.is_some());
        assert!(msg.dispatch_error.is_set());

        assert!(d.deliver(&route, "wid", &msg).await.is_err());
        assert_eq!(route.state().failure_at, first);
    }

    #[tokio::test]
    async fn amqp_routing_keys_follow_message() {
        let broker = MockBroker::new();
        let d = dispatcher(&broker);
        let route = d
            .open_route(
                DispatchingRecord::new("T", RouteKind::Amqp, "amqp://broker"),
                RouteState::default(),
            )
            .await;

        let mut unhandled = text("U", "");
        unhandled.kind = MessageType::Unhandled;
        let mut history = text("H", "old");
        history.from_history = true;

        for m in [&unhandled, &history, &text("P", "hello")] {
            d.deliver(&route, "wid", m).await.unwrap();
        }
        assert_eq!(
            broker.routing_keys(),
            vec![RoutingKey::Events, RoutingKey::History, RoutingKey::Prod]
        );
        assert!(broker
            .published()
            .iter()
            .all(|(exchange, p)| exchange == "quepasa.exchange" && p.message_id.starts_with("msg-")));
        assert_eq!(broker.declares(), 1);
    }

    #[tokio::test]
    async fn amqp_outage_caches_then_drains_in_order() {
        let broker = MockBroker::new();
        broker.set_up(false);
        let d = dispatcher(&broker);
        let route = d
            .open_route(
                DispatchingRecord::new("T", RouteKind::Amqp, "amqp://broker"),
                RouteState::default(),
            )
            .await;

        for id in ["M1", "M2", "M3"] {
            let err = d.deliver(&route, "wid", &text(id, id)).await.unwrap_err();
            assert!(matches!(err, QuepasaError::Amqp { ref reason, .. } if reason == "connection_lost_cached"));
        }
        assert!(route.state().failure_at.is_some());
        assert!(broker.published().is_empty());

        broker.set_up(true);
        let client = d.amqp().get("amqp://broker").await.unwrap();
        for _ in 0..100 {
            if client.pending_len().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let ids: Vec<String> = broker
            .published()
            .iter()
            .map(|(_, p)| {
                let v: serde_json::Value = serde_json::from_slice(&p.body).unwrap();
                v["id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(ids, ["M1", "M2", "M3"]);

        d.deliver(&route, "wid", &text("M4", "after")).await.unwrap();
        let state = route.state();
        assert!(state.success_at.is_some());
        assert!(state.failure_at.is_none());
    }

    #[tokio::test]
    async fn bounded_cache_drops_overflow() {
        let broker = MockBroker::new();
        broker.set_up(false);
        let options = AmqpOptions {
            cache_length: 2,
            reconnect_interval: Duration::from_secs(60),
            ensure_timeout: Duration::from_millis(10),
            queue_prefix: "quepasa".into(),
        };
        let registry = Arc::new(AmqpRegistry::new(
            Arc::new(broker.clone()),
            options,
            CancellationToken::new(),
        ));
        let d = Dispatcher::new(WebhookSender::new(Duration::from_secs(1)).unwrap(), registry);
        let route = d
            .open_route(
                DispatchingRecord::new("T", RouteKind::Amqp, "amqp://b"),
                RouteState::default(),
            )
            .await;

        for id in ["1", "2"] {
            d.deliver(&route, "w", &text(id, id)).await.unwrap_err();
        }
        let err = d.deliver(&route, "w", &text("3", "3")).await.unwrap_err();
        assert!(matches!(err, QuepasaError::Amqp { ref reason, .. } if reason == "cache_full"));
        assert_eq!(d.amqp().get("amqp://b").await.unwrap().pending_len().await, 2);
    }

    #[tokio::test]
    async fn routes_share_a_ref_counted_client() {
        let broker = MockBroker::new();
        let d = dispatcher(&broker);
        let record = DispatchingRecord::new("T1", RouteKind::Amqp, "amqp://shared");
        let mut other = DispatchingRecord::new("T2", RouteKind::Amqp, "amqp://shared");
        other.groups = TriState::False;

        let a = d.open_route(record, RouteState::default()).await;
        let b = d.open_route(other, RouteState::default()).await;
        assert_eq!(d.amqp().ref_count("amqp://shared").await, 2);

        d.close_route(&a).await;
        assert_eq!(d.amqp().ref_count("amqp://shared").await, 1);
        d.close_route(&b).await;
        assert!(d.amqp().get("amqp://shared").await.is_none());
    }
}
