// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingress caching and the outbound messaging operations of a server.

use chrono::{Duration, Utc};
use quepasa_core::{
    Attachment, Chat, ConnectionState, Message, MessageStatus, MessageType, PolicyOverride,
    QuepasaError, TriState, UpstreamContent,
};
use quepasa_test_utils::TestHarness;

const WID: &str = "5511999990001:1@s.whatsapp.net";
const PEER: &str = "5511988887777@s.whatsapp.net";

fn inbound(id: &str, text: &str) -> Message {
    let mut msg = Message::text(PEER, text);
    msg.id = id.into();
    msg
}

#[tokio::test]
async fn inbound_messages_are_cached_once_with_server_wid() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    conn.emit_message(inbound("in1", "hello")).await;
    conn.emit_message(inbound("in1", "hello")).await;

    let cached = server.get_message("IN1").unwrap();
    assert_eq!(cached.wid, WID);
    assert_eq!(cached.text, "hello");
    assert_eq!(server.handler().store().count(), 1);
    assert!(server.timestamps().last_message.is_some());
}

#[tokio::test]
async fn group_messages_skipped_when_groups_forced_off() {
    let h = TestHarness::builder()
        .with_options(|o| o.global.groups = PolicyOverride::ForcedFalse)
        .build()
        .await
        .unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    let mut msg = Message::text("120363000000000001@g.us", "group hello");
    msg.id = "G1".into();
    conn.emit_message(msg).await;
    assert!(matches!(server.get_message("G1"), Err(QuepasaError::NotFound(_))));
}

#[tokio::test]
async fn chat_details_are_filled_from_contacts() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    conn.add_contact(Chat {
        title: "Bob".into(),
        phone: "+5511988887777".into(),
        ..Chat::new(PEER)
    });

    conn.emit_message(inbound("in1", "hi")).await;
    let cached = server.get_message("IN1").unwrap();
    assert_eq!(cached.chat.title, "Bob");
    assert_eq!(cached.chat.phone, "+5511988887777");
}

#[tokio::test]
async fn replies_carry_a_synopsis_of_the_quoted_message() {
    let h = TestHarness::builder()
        .with_options(|o| o.synopsis_length = 10)
        .build()
        .await
        .unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    conn.emit_message(inbound("orig", "abcdefghijkl")).await;
    let mut reply = inbound("reply", "sure");
    reply.in_reply = "ORIG".into();
    conn.emit_message(reply).await;

    assert_eq!(server.get_message("REPLY").unwrap().synopsis, "abcdef ...");
}

#[tokio::test]
async fn unhandled_messages_get_unique_ids_and_readable_text() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    let msg = Message {
        id: "U1".into(),
        kind: MessageType::Unhandled,
        chat: Chat::new(PEER),
        timestamp: Utc::now(),
        content: Some(UpstreamContent::Unknown {
            type_tag: "ephemeral".into(),
            raw: vec![1, 2, 3],
        }),
        ..Default::default()
    };
    conn.emit_message(msg.clone()).await;
    conn.emit_message(msg).await;

    let found = server.handler().store().get_by_prefix("U1-UNHANDLED-");
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|m| m.text == "[Type: ephemeral] AQID"));
}

#[tokio::test]
async fn status_updates_only_advance() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    conn.emit_message(inbound("in1", "hi")).await;

    conn.emit_status("IN1", MessageStatus::Read).await;
    conn.emit_status("IN1", MessageStatus::Delivered).await;
    assert_eq!(server.handler().store().get_status("IN1"), MessageStatus::Read);
}

#[tokio::test]
async fn send_formats_recipient_and_caches_the_sent_copy() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    let response = server.send(Message::text("+5511988887777", "hi")).await.unwrap();
    assert_eq!(response.id, "MOCK1");
    assert_eq!(conn.sent()[0].chat.id, PEER);

    let cached = server.get_message("MOCK1").unwrap();
    assert!(cached.from_me);
    assert!(cached.from_internal);
    assert_eq!(cached.status, MessageStatus::Delivered);
}

#[tokio::test]
async fn send_rejects_empty_content_and_unready_servers() {
    let h = TestHarness::new().await.unwrap();
    let (server, _conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    assert!(matches!(
        server.send(Message::text(PEER, "   ")).await,
        Err(QuepasaError::Validation(_))
    ));

    server.stop("test").await.unwrap();
    match server.send(Message::text(PEER, "hi")).await {
        Err(QuepasaError::NotReady { state, .. }) => assert_eq!(state, ConnectionState::Stopped),
        other => panic!("expected NotReady, got {other:?}"),
    }
}

#[tokio::test]
async fn captioned_audio_goes_out_as_text_then_audio() {
    let h = TestHarness::new().await.unwrap();
    let (_server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    let server = h.registry.find_by_token("TOKEN1").await.unwrap();

    let msg = Message {
        id: "A1".into(),
        kind: MessageType::Audio,
        chat: Chat::new(PEER),
        text: "listen".into(),
        attachment: Some(Attachment {
            mime: "audio/ogg".into(),
            content: Some(vec![0, 1, 2]),
            ..Default::default()
        }),
        ..Default::default()
    };
    server.send(msg).await.unwrap();

    let sent = conn.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].kind, MessageType::Text);
    assert_eq!(sent[0].text, "listen");
    assert!(sent[0].attachment.is_none());
    assert_eq!(sent[1].id, "A1-audio");
    assert!(sent[1].text.is_empty());
    assert!(sent[1].has_attachment());
}

#[tokio::test]
async fn ninth_digit_variant_used_when_registered() {
    let h = TestHarness::builder()
        .with_options(|o| o.remove_digit9 = true)
        .build()
        .await
        .unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    conn.register_phones(&["551188887777"]);

    server.send(Message::text("+5511988887777", "oi")).await.unwrap();
    assert_eq!(conn.sent()[0].chat.id, "551188887777@s.whatsapp.net");
}

#[tokio::test]
async fn revoke_by_prefix_counts_each_match() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    for id in ["batch-1", "batch-2", "other"] {
        conn.emit_message(inbound(id, "x")).await;
    }

    let (revoked, errors) = server.revoke_by_prefix("batch-").await.unwrap();
    assert_eq!(revoked, 2);
    assert!(errors.is_empty());
    assert_eq!(conn.revoked(), ["BATCH-1", "BATCH-2"]);
}

#[tokio::test]
async fn old_cursor_requests_history_sync() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    conn.emit_message(inbound("in1", "x")).await;

    let recent = server.get_messages(Utc::now() + Duration::minutes(1)).await;
    assert!(recent.is_empty());
    assert!(conn.history_syncs().is_empty());

    let all = server.get_messages(Utc::now() - Duration::days(2)).await;
    assert_eq!(all.len(), 1);
    assert_eq!(conn.history_syncs().len(), 1);
}

#[tokio::test]
async fn download_prefers_cached_bytes() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    let mut msg = inbound("img1", "");
    msg.kind = MessageType::Image;
    msg.attachment = Some(Attachment {
        mime: "image/png".into(),
        content: Some(vec![9, 9]),
        ..Default::default()
    });
    conn.emit_message(msg).await;

    assert_eq!(server.download("IMG1", true).await.unwrap(), vec![9, 9]);
    conn.set_download(vec![7]);
    assert_eq!(server.download("IMG1", false).await.unwrap(), vec![7]);
    assert!(matches!(
        server.download("missing", true).await,
        Err(QuepasaError::NotFound(_))
    ));
}

#[tokio::test]
async fn edit_and_mark_read_pass_through() {
    let h = TestHarness::new().await.unwrap();
    let (server, conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();
    conn.emit_message(inbound("in1", "x")).await;

    server.edit("IN1", "fixed").await.unwrap();
    assert_eq!(conn.edited(), [("IN1".to_string(), "fixed".to_string())]);
    assert!(matches!(
        server.edit("IN1", " ").await,
        Err(QuepasaError::Validation(_))
    ));

    server.mark_read("IN1").await.unwrap();
    assert_eq!(conn.marked_read(), ["IN1"]);
    assert_eq!(server.handler().store().get_status("IN1"), MessageStatus::Read);
}

#[tokio::test]
async fn toggles_flip_policies_and_persist() {
    let h = TestHarness::new().await.unwrap();
    let (server, _conn) = h.ready_server("TOKEN1", "alice", WID).await.unwrap();

    let value = server.toggle("groups").await.unwrap();
    assert_eq!(value, TriState::False);
    assert_eq!(server.record().groups, TriState::False);
    assert_eq!(server.toggle("GROUPS").await.unwrap(), TriState::True);

    assert!(matches!(
        server.toggle("colour").await,
        Err(QuepasaError::Validation(_))
    ));
    assert!(server.toggle_devel().await.unwrap());
}
