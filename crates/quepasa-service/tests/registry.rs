// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry boot, user seeding, pairing, and lookups.

use std::time::Duration;

use quepasa_core::{
    ConnectionState, DispatchingRecord, QuepasaError, RouteKind, ServerRecord, StorageAdapter,
};
use quepasa_service::LEGACY_DEFAULT_USER;
use quepasa_test_utils::{TestHarness, eventually};

const WID: &str = "5511999990001:1@s.whatsapp.net";

#[tokio::test]
async fn legacy_default_user_seeded_without_login() {
    let h = TestHarness::new().await.unwrap();
    assert!(h.registry.user_exists(LEGACY_DEFAULT_USER).await.unwrap());
    assert!(!h.registry.authenticate(LEGACY_DEFAULT_USER, "").await.unwrap());
}

#[tokio::test]
async fn configured_user_seeded_with_password() {
    let h = TestHarness::builder()
        .with_options(|o| {
            o.seed_user = Some("admin@example.com".into());
            o.seed_password = Some("s3cret".into());
        })
        .build()
        .await
        .unwrap();
    assert!(h.registry.authenticate("admin@example.com", "s3cret").await.unwrap());
    assert!(!h.registry.authenticate("admin@example.com", "wrong").await.unwrap());
    assert!(!h.registry.user_exists(LEGACY_DEFAULT_USER).await.unwrap());
}

#[tokio::test]
async fn user_without_password_is_not_seeded() {
    let h = TestHarness::builder()
        .with_options(|o| o.seed_user = Some("admin@example.com".into()))
        .build()
        .await
        .unwrap();
    assert!(!h.registry.user_exists("admin@example.com").await.unwrap());
}

#[tokio::test]
async fn create_user_validates_input() {
    let h = TestHarness::new().await.unwrap();
    assert!(matches!(
        h.registry.create_user("  ", Some("pw")).await,
        Err(QuepasaError::Validation(_))
    ));
    assert!(matches!(
        h.registry.create_user("bob", Some("")).await,
        Err(QuepasaError::Validation(_))
    ));
    let user = h.registry.create_user("bob", Some("pw")).await.unwrap();
    assert!(user.password_hash.unwrap().starts_with("$argon2"));
    assert!(h.registry.authenticate("bob", "pw").await.unwrap());
}

#[tokio::test]
async fn token_lookup_is_case_insensitive_and_creates_empty_rows() {
    let h = TestHarness::new().await.unwrap();
    let created = h.registry.get_or_create_server_from_token("NewToken").await.unwrap();
    assert_eq!(created.owner(), "");
    assert!(h.storage.get_server("NewToken").await.unwrap().is_some());

    let found = h.registry.find_by_token("newtoken").await.unwrap();
    assert_eq!(found.token(), "NewToken");
    let again = h.registry.get_or_create_server_from_token("NEWTOKEN").await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&created, &again));
}

#[tokio::test]
async fn pairing_creates_a_verified_running_server() {
    let h = TestHarness::new().await.unwrap();
    let pairing = h.registry.start_pairing("alice", None).await.unwrap();
    assert_eq!(pairing.qr().await.unwrap(), "2@mock-qr-payload");
    assert!(pairing.pair_code("+5511999990001").await.unwrap().starts_with("MOCK-"));
    assert!(matches!(
        pairing.pair_code("not a phone").await,
        Err(QuepasaError::Validation(_))
    ));

    let options = h.factory().last_options().unwrap();
    assert!(options.wid.is_none());
    assert!(!options.reconnect);
    assert_eq!(h.registry.pending_pairings(), 1);

    h.factory().last().unwrap().emit_paired(WID);

    let registry = &h.registry;
    assert!(eventually(|| async move {
        registry
            .get_servers_for_user("alice")
            .await
            .first()
            .is_some_and(|s| s.state() == ConnectionState::Ready)
    })
    .await);

    assert_eq!(h.registry.pending_pairings(), 0);
    assert!(pairing.is_resolved());
    let server = &h.registry.get_servers_for_user("alice").await[0];
    let record = server.record();
    assert!(record.verified);
    assert_eq!(record.wid.as_deref(), Some(WID));
    assert!(h.storage.get_server(server.token()).await.unwrap().unwrap().verified);
}

#[tokio::test]
async fn repairing_the_same_phone_reuses_the_server() {
    let h = TestHarness::new().await.unwrap();
    let (first, _conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    h.registry.start_pairing("alice", None).await.unwrap();
    let relinked = "5511999990001:7@s.whatsapp.net";
    h.factory().last().unwrap().emit_paired(relinked);

    let registry = &h.registry;
    assert!(eventually(|| async move { registry.pending_pairings() == 0 }).await);
    let servers = h.registry.get_servers_for_user("alice").await;
    assert_eq!(servers.len(), 1);
    assert!(std::sync::Arc::ptr_eq(&servers[0], &first));
    assert_eq!(first.wid(), relinked);
}

#[tokio::test]
async fn same_phone_under_another_user_is_rejected() {
    let h = TestHarness::new().await.unwrap();
    let (_alice, _conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    let err = h.registry.get_or_create_server("bob", WID).await.unwrap_err();
    assert!(matches!(err, QuepasaError::Validation(_)));
    assert!(h.registry.get_servers_for_user("bob").await.is_empty());
    assert_eq!(h.storage.list_servers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn pairing_with_token_binds_that_server() {
    let h = TestHarness::new().await.unwrap();
    h.registry
        .start_pairing("bob", Some("BOBTOKEN".into()))
        .await
        .unwrap();
    h.factory().last().unwrap().emit_paired(WID);

    let registry = &h.registry;
    assert!(eventually(|| async move {
        registry
            .find_by_token("BOBTOKEN")
            .await
            .is_some_and(|s| s.owner() == "bob" && s.record().verified)
    })
    .await);
}

#[tokio::test]
async fn pairings_expire_and_dispose_their_connection() {
    let h = TestHarness::builder()
        .with_options(|o| o.pairing_timeout = Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let pairing = h.registry.start_pairing("alice", None).await.unwrap();
    let conn = h.factory().last().unwrap();

    let registry = &h.registry;
    assert!(eventually(|| async move { registry.pending_pairings() == 0 }).await);
    assert_eq!(conn.disposed().as_deref(), Some("pairing expired"));
    assert!(pairing.is_resolved());
    assert!(matches!(pairing.qr().await, Err(QuepasaError::InvalidConnection)));
}

#[tokio::test]
async fn reboot_restores_servers_and_routes() {
    let mut h = TestHarness::new().await.unwrap();
    let (server, _conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    server
        .upsert_route(DispatchingRecord::new("", RouteKind::Webhook, "http://127.0.0.1:9/hook"))
        .await
        .unwrap();

    let mut dormant = ServerRecord::new("DORMANT", "bob");
    dormant.wid = Some("5511999990002:1@s.whatsapp.net".into());
    h.storage.upsert_server(&dormant).await.unwrap();
    drop(server);

    h.reboot().await.unwrap();

    let restored = h.registry.find_by_token("TOKEN1").await.unwrap();
    assert_eq!(restored.routes().await.len(), 1);
    let restored_ref = &restored;
    assert!(eventually(|| async move { restored_ref.state() == ConnectionState::Ready }).await);

    let dormant = h.registry.find_by_token("DORMANT").await.unwrap();
    assert_eq!(dormant.state(), ConnectionState::UnVerified);
    assert!(h.factory().for_wid("5511999990002:1@s.whatsapp.net").is_none());
}

#[tokio::test]
async fn health_lists_every_server_sorted_by_token() {
    let h = TestHarness::new().await.unwrap();
    h.ready_server("B", "alice", WID).await.unwrap();
    h.registry.get_or_create_server_from_token("A").await.unwrap();

    let health = h.registry.get_health().await;
    let tokens: Vec<&str> = health.iter().map(|s| s.token.as_str()).collect();
    assert_eq!(tokens, ["A", "B"]);
    assert_eq!(health[0].state, ConnectionState::UnVerified.to_string());

    let stats = h.registry.health_stats().await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.unhealthy, 1);
}
