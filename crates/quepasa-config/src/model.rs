// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Quepasa gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject typos at parse time.
//! Every section carries sensible defaults so the service can start from the
//! environment alone.

use quepasa_core::{GlobalPolicy, PolicyOverride};
use serde::{Deserialize, Serialize};

/// Top-level Quepasa configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuepasaConfig {
    /// Persistence backend settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Credentials and account bootstrap.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Messaging behavior and global policy defaults.
    #[serde(default)]
    pub whatsapp: WhatsappConfig,

    /// In-memory message cache sizing.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Outbound webhook delivery settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// AMQP broker settings.
    #[serde(default)]
    pub rabbitmq: RabbitMqConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Persistence backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Backend driver. Only `sqlite3` is supported.
    #[serde(default = "default_db_driver", deserialize_with = "lenient::string")]
    pub driver: String,

    /// Server host for networked backends. Unused by sqlite.
    #[serde(default, deserialize_with = "lenient::string")]
    pub host: String,

    /// Database name; for sqlite, the file path.
    #[serde(default = "default_db_database", deserialize_with = "lenient::string")]
    pub database: String,

    /// Server port for networked backends.
    #[serde(default, deserialize_with = "lenient::string")]
    pub port: String,

    /// Login user for networked backends.
    #[serde(default, deserialize_with = "lenient::string")]
    pub user: String,

    /// Login password for networked backends.
    #[serde(default, deserialize_with = "lenient::string")]
    pub password: String,

    /// TLS mode for networked backends.
    #[serde(default, deserialize_with = "lenient::string")]
    pub sslmode: String,

    /// `true` for embedded migrations, `false` to skip, or a directory of `.sql` files.
    #[serde(default = "default_migrations", deserialize_with = "lenient::string")]
    pub migrations: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: default_db_driver(),
            host: String::new(),
            database: default_db_database(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            sslmode: String::new(),
            migrations: default_migrations(),
        }
    }
}

fn default_db_driver() -> String {
    "sqlite3".to_string()
}

fn default_db_database() -> String {
    "quepasa.sqlite".to_string()
}

fn default_migrations() -> String {
    "true".to_string()
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    /// Bind address.
    #[serde(default = "default_web_host", deserialize_with = "lenient::string")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// Log every HTTP request through the trace layer.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub http_logs: bool,

    /// Name shown to paired devices and in page titles.
    #[serde(default, deserialize_with = "lenient::string")]
    pub app_title: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            http_logs: false,
            app_title: String::new(),
        }
    }
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    31000
}

/// Credentials and account bootstrap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Master key granting access to every server and to administrative routes.
    #[serde(default, deserialize_with = "lenient::string")]
    pub master_key: String,

    /// Secret for signing session cookies of the web form.
    #[serde(default, deserialize_with = "lenient::string")]
    pub signing_secret: String,

    /// Username seeded at startup when it does not exist yet.
    #[serde(default, deserialize_with = "lenient::string")]
    pub user: String,

    /// Password for the seeded user. Seeding is refused when empty.
    #[serde(default, deserialize_with = "lenient::string")]
    pub password: String,

    /// Allow creating new accounts through the API.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub account_setup: bool,
}

/// Messaging behavior and global policy defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsappConfig {
    /// Global default for group messages.
    #[serde(default)]
    pub groups: PolicyOverride,

    /// Global default for direct (one-to-one) messages.
    #[serde(default)]
    pub direct: PolicyOverride,

    /// Global default for broadcast and status messages.
    #[serde(default)]
    pub broadcasts: PolicyOverride,

    /// Global default for read receipt events.
    #[serde(default)]
    pub read_receipts: PolicyOverride,

    /// Global default for call events.
    #[serde(default)]
    pub calls: PolicyOverride,

    /// Global default for marking chats read on send.
    #[serde(default)]
    pub read_update: PolicyOverride,

    /// Days of history requested on pairing. Zero disables history sync.
    #[serde(default)]
    pub history_sync_days: u32,

    /// Presence announced after connecting (`available` or `unavailable`).
    #[serde(default, deserialize_with = "lenient::string")]
    pub presence: String,

    /// Probe the alternate Brazilian number form when sending.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub remove_digit9: bool,

    /// Maximum characters of message text kept in a synopsis.
    #[serde(default = "default_synopsis_length")]
    pub synopsis_length: usize,

    /// Forward messages the upstream protocol could not classify.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub dispatch_unhandled: bool,

    /// Convert outgoing WAV audio to OGG before sending.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub convert_wave_to_ogg: bool,

    /// Send audio-compatible documents as voice notes.
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub compatible_mime_as_audio: bool,

    /// Seconds a pairing attempt may stay pending.
    #[serde(default = "default_pairing_timeout_secs")]
    pub pairing_timeout_secs: u64,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            groups: PolicyOverride::Unset,
            direct: PolicyOverride::Unset,
            broadcasts: PolicyOverride::Unset,
            read_receipts: PolicyOverride::Unset,
            calls: PolicyOverride::Unset,
            read_update: PolicyOverride::Unset,
            history_sync_days: 0,
            presence: String::new(),
            remove_digit9: false,
            synopsis_length: default_synopsis_length(),
            dispatch_unhandled: false,
            convert_wave_to_ogg: false,
            compatible_mime_as_audio: false,
            pairing_timeout_secs: default_pairing_timeout_secs(),
        }
    }
}

impl WhatsappConfig {
    /// Collect the per-kind global defaults.
    pub fn global_policy(&self) -> GlobalPolicy {
        GlobalPolicy {
            groups: self.groups,
            direct: self.direct,
            broadcasts: self.broadcasts,
            read_receipts: self.read_receipts,
            calls: self.calls,
            read_update: self.read_update,
        }
    }
}

fn default_synopsis_length() -> usize {
    50
}

fn default_pairing_timeout_secs() -> u64 {
    300
}

/// In-memory message cache sizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum messages kept per server. Zero means unbounded.
    #[serde(default)]
    pub length: u64,

    /// Days a cached message is retained.
    #[serde(default)]
    pub days: u32,
}

/// Outbound webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Per-request timeout for webhook POSTs.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// AMQP broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RabbitMqConfig {
    /// Broker URI used when a route does not carry its own.
    #[serde(default, deserialize_with = "lenient::string")]
    pub connection_string: String,

    /// Prefix for the standard queue names.
    #[serde(default = "default_queue", deserialize_with = "lenient::string")]
    pub queue: String,

    /// Messages held per client while the broker is unreachable.
    #[serde(default = "default_rabbitmq_cache_length")]
    pub cache_length: usize,

    /// Seconds between reconnect attempts.
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Seconds a publish waits for the client to become ready.
    #[serde(default = "default_ensure_timeout_secs")]
    pub ensure_timeout_secs: u64,
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            queue: default_queue(),
            cache_length: default_rabbitmq_cache_length(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            ensure_timeout_secs: default_ensure_timeout_secs(),
        }
    }
}

fn default_queue() -> String {
    "quepasa".to_string()
}

fn default_rabbitmq_cache_length() -> usize {
    100_000
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

fn default_ensure_timeout_secs() -> u64 {
    5
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level filter: trace, debug, info, warn or error.
    #[serde(default = "default_log_level", deserialize_with = "lenient::string")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Deserializers for values that may arrive typed from the environment.
///
/// Figment parses `MASTERKEY=1234` as an integer and `HTTPLOGS=1` as a number,
/// so plain `String`/`bool` fields would reject them.
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Scalar::deserialize(deserializer)? {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        })
    }

    pub fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Scalar::deserialize(deserializer)? {
            Scalar::Bool(b) => Ok(b),
            Scalar::Int(i) => Ok(i != 0),
            Scalar::Float(f) => Ok(f != 0.0),
            Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "" | "0" | "f" | "false" | "no" | "off" => Ok(false),
                "1" | "t" | "true" | "yes" | "on" => Ok(true),
                other => Err(serde::de::Error::custom(format!(
                    "expected a boolean, found `{other}`"
                ))),
            },
        }
    }
}
