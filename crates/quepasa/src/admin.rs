// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative subcommands: `migrate`, `user add`, and `health`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use quepasa_config::QuepasaConfig;
use quepasa_core::{QuepasaError, StorageAdapter, User};
use quepasa_gateway::MASTER_KEY_HEADER;
use quepasa_service::hash_password;
use quepasa_storage::SqliteStorage;

use crate::upstream::OfflineConnectionFactory;

fn storage(config: &QuepasaConfig) -> SqliteStorage {
    SqliteStorage::new(config.database.clone())
        .with_wid_resolver(Arc::new(OfflineConnectionFactory))
}

/// Applies pending migrations and reports the versions it ran.
pub async fn run_migrate(config: &QuepasaConfig) -> Result<(), QuepasaError> {
    let storage = storage(config);
    let applied = storage.migrate().await?;
    if applied.is_empty() {
        println!("database is up to date");
    } else {
        let versions: Vec<String> = applied.iter().map(i64::to_string).collect();
        println!("applied migrations: {}", versions.join(", "));
    }
    storage.close().await
}

/// Creates a user, prompting for the password when none is given.
pub async fn run_user_add(
    config: &QuepasaConfig,
    username: &str,
    password: Option<String>,
) -> Result<(), QuepasaError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(QuepasaError::Validation("empty username".into()));
    }
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("password for {username}: "))
            .map_err(|e| QuepasaError::Internal(format!("failed to read password: {e}")))?,
    };
    if password.is_empty() {
        return Err(QuepasaError::Validation("empty password".into()));
    }

    let storage = storage(config);
    storage.initialize().await?;
    if storage.user_exists(username).await? {
        storage.close().await?;
        return Err(QuepasaError::Validation(format!(
            "user already exists: {username}"
        )));
    }

    let user = User {
        username: username.to_string(),
        password_hash: Some(hash_password(&password)?),
        created_at: Utc::now(),
    };
    storage.create_user(&user).await?;
    info!(user = %username, "user created");
    println!("user created: {username}");
    storage.close().await
}

/// Base URL for the local gateway; wildcard binds are reached over loopback.
fn local_url(config: &QuepasaConfig) -> String {
    let host = match config.web.host.as_str() {
        "" | "0.0.0.0" | "::" => "127.0.0.1",
        host => host,
    };
    format!("http://{host}:{}", config.web.port)
}

/// Queries `/healthapi` with the master key and prints the summary.
pub async fn run_health(config: &QuepasaConfig, url: Option<&str>) -> Result<(), QuepasaError> {
    let base = url.map_or_else(|| local_url(config), |u| u.trim_end_matches('/').to_string());
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| QuepasaError::Internal(format!("failed to build HTTP client: {e}")))?;

    let transport = |e: reqwest::Error| QuepasaError::Transport {
        message: format!("health request to {base} failed"),
        source: Some(Box::new(e)),
    };
    let response = client
        .get(format!("{base}/healthapi"))
        .header(MASTER_KEY_HEADER, config.auth.master_key.trim())
        .send()
        .await
        .map_err(transport)?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.map_err(transport)?;

    println!(
        "{}",
        body["status"].as_str().unwrap_or("no status in response")
    );
    if status.is_success() && body["success"].as_bool() == Some(true) {
        Ok(())
    } else {
        Err(QuepasaError::Internal(format!(
            "gateway reported unhealthy (HTTP {status})"
        )))
    }
}
