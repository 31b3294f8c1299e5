// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable service settings derived once from the loaded configuration.

use std::time::Duration;

use quepasa_config::QuepasaConfig;
use quepasa_core::GlobalPolicy;

/// Username seeded when no `USER` is configured. It has no password and can
/// never log in.
pub const LEGACY_DEFAULT_USER: &str = "default@quepasa.io";

/// Settings shared by the registry, every server, and every handler.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub global: GlobalPolicy,
    /// Maximum cached messages per server; 0 is unbounded.
    pub cache_length: u64,
    pub cache_days: u32,
    /// Synopsis size for replies; 0 disables synopses.
    pub synopsis_length: usize,
    pub dispatch_unhandled: bool,
    pub remove_digit9: bool,
    pub history_sync_days: u32,
    pub presence: Option<String>,
    pub pairing_timeout: Duration,
    pub restart_delay: Duration,
    pub seed_user: Option<String>,
    pub seed_password: Option<String>,
    pub master_key: Option<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from_config(&QuepasaConfig::default())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl ServiceOptions {
    pub fn from_config(config: &QuepasaConfig) -> Self {
        let wa = &config.whatsapp;
        Self {
            global: wa.global_policy(),
            cache_length: config.cache.length,
            cache_days: config.cache.days,
            synopsis_length: wa.synopsis_length,
            dispatch_unhandled: wa.dispatch_unhandled,
            remove_digit9: wa.remove_digit9,
            history_sync_days: wa.history_sync_days,
            presence: non_empty(&wa.presence),
            pairing_timeout: Duration::from_secs(wa.pairing_timeout_secs),
            restart_delay: Duration::from_secs(1),
            seed_user: non_empty(&config.auth.user),
            seed_password: non_empty(&config.auth.password),
            master_key: non_empty(&config.auth.master_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quepasa_core::PolicyOverride;

    #[test]
    fn blank_strings_become_none() {
        let mut config = QuepasaConfig::default();
        config.auth.user = "  ".into();
        config.auth.master_key = "secret".into();
        config.whatsapp.groups = PolicyOverride::ForcedFalse;

        let options = ServiceOptions::from_config(&config);
        assert!(options.seed_user.is_none());
        assert_eq!(options.master_key.as_deref(), Some("secret"));
        assert_eq!(options.global.groups, PolicyOverride::ForcedFalse);
        assert_eq!(options.synopsis_length, 50);
        assert_eq!(options.pairing_timeout, Duration::from_secs(300));
    }
}
