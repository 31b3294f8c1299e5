// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; every helper is a no-op until a recorder is
//! installed, so library code can call them unconditionally.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

pub const MESSAGES_RECEIVED: &str = "quepasa_messages_received_total";
pub const MESSAGES_SENT: &str = "quepasa_messages_sent_total";
pub const MESSAGE_SEND_ERRORS: &str = "quepasa_message_send_errors_total";
pub const MESSAGE_RECEIVE_ERRORS: &str = "quepasa_message_receive_errors_total";
pub const WEBHOOKS_SENT: &str = "quepasa_webhooks_sent_total";
pub const WEBHOOK_SEND_ERRORS: &str = "quepasa_webhook_send_errors_total";
pub const WEBHOOK_SUCCESS: &str = "quepasa_webhook_success_total";
pub const WEBHOOK_TIMEOUTS: &str = "quepasa_webhook_timeouts_total";
pub const WEBHOOK_HTTP_ERRORS: &str = "quepasa_webhook_http_errors_total";
pub const WEBHOOK_DURATION: &str = "quepasa_webhook_duration_seconds";
pub const RABBITMQ_PUBLISHED: &str = "quepasa_rabbitmq_messages_published_total";
pub const RABBITMQ_PUBLISH_ERRORS: &str = "quepasa_rabbitmq_publish_errors_total";
pub const RABBITMQ_PUBLISH_DURATION: &str = "quepasa_rabbitmq_publish_duration_seconds";
pub const RABBITMQ_MESSAGE_SIZE: &str = "quepasa_rabbitmq_message_size_bytes";
pub const RABBITMQ_CACHED: &str = "quepasa_rabbitmq_cached_messages";

/// Register all Quepasa metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(MESSAGES_RECEIVED, "Inbound messages accepted into the cache");
    describe_counter!(MESSAGES_SENT, "Messages sent upstream");
    describe_counter!(MESSAGE_SEND_ERRORS, "Upstream send failures");
    describe_counter!(MESSAGE_RECEIVE_ERRORS, "Inbound messages that failed processing");
    describe_counter!(WEBHOOKS_SENT, "Webhook delivery attempts");
    describe_counter!(WEBHOOK_SEND_ERRORS, "Failed webhook deliveries");
    describe_counter!(WEBHOOK_SUCCESS, "Webhook deliveries answered with HTTP 200");
    describe_counter!(WEBHOOK_TIMEOUTS, "Webhook deliveries that timed out");
    describe_counter!(WEBHOOK_HTTP_ERRORS, "Webhook responses other than HTTP 200");
    describe_histogram!(
        WEBHOOK_DURATION,
        Unit::Seconds,
        "Webhook delivery latency in seconds"
    );
    describe_counter!(RABBITMQ_PUBLISHED, "AMQP publish attempts, cached ones included");
    describe_counter!(RABBITMQ_PUBLISH_ERRORS, "AMQP publish failures by reason");
    describe_histogram!(
        RABBITMQ_PUBLISH_DURATION,
        Unit::Seconds,
        "AMQP publish latency in seconds"
    );
    describe_histogram!(
        RABBITMQ_MESSAGE_SIZE,
        Unit::Bytes,
        "Size of published AMQP bodies"
    );
    describe_gauge!(RABBITMQ_CACHED, "Messages waiting in AMQP outage caches");
}

pub fn record_message_received() {
    metrics::counter!(MESSAGES_RECEIVED).increment(1);
}

pub fn record_message_receive_error() {
    metrics::counter!(MESSAGE_RECEIVE_ERRORS).increment(1);
}

pub fn record_message_sent() {
    metrics::counter!(MESSAGES_SENT).increment(1);
}

pub fn record_message_send_error() {
    metrics::counter!(MESSAGE_SEND_ERRORS).increment(1);
}

/// Record one webhook attempt and its latency.
pub fn record_webhook_attempt(seconds: f64) {
    metrics::counter!(WEBHOOKS_SENT).increment(1);
    metrics::histogram!(WEBHOOK_DURATION).record(seconds);
}

pub fn record_webhook_success() {
    metrics::counter!(WEBHOOK_SUCCESS).increment(1);
}

pub fn record_webhook_error() {
    metrics::counter!(WEBHOOK_SEND_ERRORS).increment(1);
}

pub fn record_webhook_timeout() {
    metrics::counter!(WEBHOOK_TIMEOUTS).increment(1);
}

pub fn record_webhook_http_error(status: u16) {
    metrics::counter!(WEBHOOK_HTTP_ERRORS, "status" => status.to_string()).increment(1);
}

/// Record a publish (sent or cached) with its latency and body size.
pub fn record_rabbitmq_published(
    routing_key: &str,
    exchange: &str,
    msg_type: &str,
    seconds: f64,
    size: usize,
) {
    metrics::counter!(RABBITMQ_PUBLISHED).increment(1);
    metrics::histogram!(
        RABBITMQ_PUBLISH_DURATION,
        "key" => routing_key.to_string(),
        "exchange" => exchange.to_string(),
        "msg_type" => msg_type.to_string()
    )
    .record(seconds);
    metrics::histogram!(
        RABBITMQ_MESSAGE_SIZE,
        "key" => routing_key.to_string(),
        "msg_type" => msg_type.to_string()
    )
    .record(size as f64);
}

pub fn record_rabbitmq_publish_error(reason: &str, msg_type: &str) {
    metrics::counter!(
        RABBITMQ_PUBLISH_ERRORS,
        "reason" => reason.to_string(),
        "msg_type" => msg_type.to_string()
    )
    .increment(1);
}

pub fn rabbitmq_cached_added() {
    metrics::gauge!(RABBITMQ_CACHED).increment(1.0);
}

pub fn rabbitmq_cached_drained(count: usize) {
    metrics::gauge!(RABBITMQ_CACHED).decrement(count as f64);
}
