// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::QuepasaConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const PRESENCE_VALUES: &[&str] = &["", "available", "unavailable"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &QuepasaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let driver = config.database.driver.trim().to_ascii_lowercase();
    if driver != "sqlite3" && driver != "sqlite" {
        fail(format!(
            "database.driver `{}` is not supported, use `sqlite3`",
            config.database.driver
        ));
    }

    if config.database.database.trim().is_empty() {
        fail("database.database must not be empty".to_string());
    }

    let host = config.web.host.trim();
    if host.is_empty() {
        fail("web.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!("web.host `{host}` is not a valid IP address or hostname"));
    }

    if config.web.port == 0 {
        fail("web.port must be greater than zero".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "logging.level `{}` must be one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if !PRESENCE_VALUES.contains(&config.whatsapp.presence.to_ascii_lowercase().as_str()) {
        fail(format!(
            "whatsapp.presence `{}` must be `available` or `unavailable`",
            config.whatsapp.presence
        ));
    }

    if config.whatsapp.pairing_timeout_secs == 0 {
        fail("whatsapp.pairing_timeout_secs must be greater than zero".to_string());
    }

    if config.dispatch.webhook_timeout_secs == 0 {
        fail("dispatch.webhook_timeout_secs must be greater than zero".to_string());
    }

    let uri = config.rabbitmq.connection_string.trim();
    if !uri.is_empty() && !(uri.starts_with("amqp://") || uri.starts_with("amqps://")) {
        fail("rabbitmq.connection_string must start with amqp:// or amqps://".to_string());
    }

    if config.rabbitmq.queue.trim().is_empty() {
        fail("rabbitmq.queue must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
