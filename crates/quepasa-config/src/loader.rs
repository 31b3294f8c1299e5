// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./quepasa.toml` > `~/.config/quepasa/quepasa.toml` > `/etc/quepasa/quepasa.toml`,
//! then the flat environment names (`DBDRIVER`, `WEBAPIPORT`, `MASTERKEY`, ...) and
//! finally `QUEPASA_<SECTION>_<KEY>` overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::QuepasaConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/quepasa/quepasa.toml";
pub(crate) const LOCAL_CONFIG: &str = "quepasa.toml";

/// Flat environment names and the config keys they populate.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DBDRIVER", "database.driver"),
    ("DBHOST", "database.host"),
    ("DBDATABASE", "database.database"),
    ("DBPORT", "database.port"),
    ("DBUSER", "database.user"),
    ("DBPASSWORD", "database.password"),
    ("DBSSLMODE", "database.sslmode"),
    ("MIGRATIONS", "database.migrations"),
    ("WEBAPIHOST", "web.host"),
    ("WEBAPIPORT", "web.port"),
    ("HTTPLOGS", "web.http_logs"),
    ("APP_TITLE", "web.app_title"),
    ("MASTERKEY", "auth.master_key"),
    ("SIGNING_SECRET", "auth.signing_secret"),
    ("ACCOUNTSETUP", "auth.account_setup"),
    ("USER", "auth.user"),
    ("PASSWORD", "auth.password"),
    ("GROUPS", "whatsapp.groups"),
    ("DIRECT", "whatsapp.direct"),
    ("BROADCASTS", "whatsapp.broadcasts"),
    ("READRECEIPTS", "whatsapp.read_receipts"),
    ("CALLS", "whatsapp.calls"),
    ("READUPDATE", "whatsapp.read_update"),
    ("HISTORYSYNCDAYS", "whatsapp.history_sync_days"),
    ("PRESENCE", "whatsapp.presence"),
    ("REMOVEDIGIT9", "whatsapp.remove_digit9"),
    ("SYNOPSISLENGTH", "whatsapp.synopsis_length"),
    ("DISPATCHUNHANDLED", "whatsapp.dispatch_unhandled"),
    ("CONVERT_WAVE_TO_OGG", "whatsapp.convert_wave_to_ogg"),
    ("COMPATIBLE_MIME_AS_AUDIO", "whatsapp.compatible_mime_as_audio"),
    ("CACHELENGTH", "cache.length"),
    ("CACHEDAYS", "cache.days"),
    ("WEBHOOK_TIMEOUT", "dispatch.webhook_timeout_secs"),
    ("RABBITMQ_CONNECTIONSTRING", "rabbitmq.connection_string"),
    ("RABBITMQ_QUEUE", "rabbitmq.queue"),
    ("RABBITMQ_CACHELENGTH", "rabbitmq.cache_length"),
    ("LOGLEVEL", "logging.level"),
];

/// Load configuration from the standard file hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/quepasa/quepasa.toml`
/// 3. `~/.config/quepasa/quepasa.toml`
/// 4. `./quepasa.toml`
/// 5. Flat environment names
/// 6. `QUEPASA_*` environment variables
pub fn load_config() -> Result<QuepasaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no environment).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<QuepasaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuepasaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<QuepasaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuepasaConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(QuepasaConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(legacy_env_provider())
        .merge(env_provider())
}

pub(crate) fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("quepasa/quepasa.toml"))
}

/// Map a flat environment name to its dotted config key.
pub fn legacy_key(name: &str) -> Option<&'static str> {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(env, _)| env.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

/// Provider for the flat names a containerized deployment sets.
fn legacy_env_provider() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(env, _)| *env).collect();
    Env::raw()
        .only(&names)
        .map(|key| legacy_key(key.as_str()).unwrap_or(key.as_str()).into())
}

/// Create the prefixed environment provider using explicit `map()` for section-to-dot mapping.
///
/// `Env::split("_")` would turn `QUEPASA_RABBITMQ_CONNECTION_STRING` into
/// `rabbitmq.connection.string`, so only the first separator is rewritten.
fn env_provider() -> Env {
    Env::prefixed("QUEPASA_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("database_", "database.", 1)
            .replacen("web_", "web.", 1)
            .replacen("auth_", "auth.", 1)
            .replacen("whatsapp_", "whatsapp.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("dispatch_", "dispatch.", 1)
            .replacen("rabbitmq_", "rabbitmq.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_key_is_case_insensitive() {
        assert_eq!(legacy_key("dbdriver"), Some("database.driver"));
        assert_eq!(legacy_key("WEBAPIPORT"), Some("web.port"));
        assert_eq!(legacy_key("RABBITMQ_QUEUE"), Some("rabbitmq.queue"));
        assert_eq!(legacy_key("NOT_A_SETTING"), None);
    }

    #[test]
    fn every_legacy_key_targets_a_known_section() {
        let sections = [
            "database", "web", "auth", "whatsapp", "cache", "dispatch", "rabbitmq", "logging",
        ];
        for (env, key) in LEGACY_ENV_KEYS {
            let section = key.split('.').next().unwrap_or_default();
            assert!(sections.contains(&section), "{env} maps to unknown {key}");
        }
    }

    #[test]
    fn inline_toml_overrides_defaults() {
        let config = load_config_from_str("[web]\nport = 8080\n").unwrap();
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.host, "0.0.0.0");
    }
}
