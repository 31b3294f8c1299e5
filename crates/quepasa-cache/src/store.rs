// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-server message store: the message cache plus a status overlay.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use quepasa_core::{Message, MessageStatus, QuepasaError};

use crate::cache::Cache;

/// Minimum retention of cached messages.
const MIN_RETENTION_HOURS: i64 = 124;

/// Case-insensitive message cache with content-based deduplication.
#[derive(Debug)]
pub struct MessageStore {
    messages: Cache<Arc<Message>>,
    statuses: Cache<MessageStatus>,
    retention: Duration,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MessageStore {
    /// `cache_days == 0` keeps the default retention of 124 hours.
    pub fn new(cache_days: u32) -> Self {
        let hours = (i64::from(cache_days) * 24).max(MIN_RETENTION_HOURS);
        Self {
            messages: Cache::new(),
            statuses: Cache::new(),
            retention: Duration::hours(hours),
        }
    }

    fn expiration(&self) -> DateTime<Utc> {
        Utc::now() + self.retention
    }

    /// Caches `msg` under its uppercased id.
    ///
    /// Returns the stored message when it should be fanned out, or `None`
    /// when it replaced an entry with equal content (an upstream echo).
    /// The new value is stored in both cases.
    pub fn append(&self, mut msg: Message, source: &str) -> Option<Arc<Message>> {
        msg.id = msg.id.to_uppercase();
        let msg = Arc::new(msg);
        let previous = self
            .messages
            .set(msg.id.clone(), msg.clone(), self.expiration());

        match previous {
            Some(prev) if prev.same_content(&msg) => {
                debug!(message_id = %msg.id, source, "duplicate message content, skipping fan-out");
                None
            }
            Some(_) => {
                trace!(message_id = %msg.id, source, "message updated");
                Some(msg)
            }
            None => {
                trace!(message_id = %msg.id, source, "message appended");
                Some(msg)
            }
        }
    }

    pub fn get_by_id(&self, id: &str) -> Result<Arc<Message>, QuepasaError> {
        let key = id.to_uppercase();
        let msg = self
            .messages
            .get(&key)
            .ok_or_else(|| QuepasaError::NotFound(format!("message not found: {id}")))?;
        if !msg.id.eq_ignore_ascii_case(&key) {
            return Err(QuepasaError::Corrupted(format!(
                "entry {key} holds message {}",
                msg.id
            )));
        }
        Ok(msg)
    }

    /// Every cached message whose id starts with `prefix`.
    pub fn get_by_prefix(&self, prefix: &str) -> Vec<Arc<Message>> {
        let prefix = prefix.to_uppercase();
        let mut found: Vec<_> = self
            .messages
            .values()
            .into_iter()
            .filter(|m| m.id.starts_with(&prefix))
            .collect();
        sort_ascending(&mut found);
        found
    }

    /// Messages newer than `after`, newest first.
    pub fn get_by_time(&self, after: DateTime<Utc>) -> Vec<Arc<Message>> {
        let mut found: Vec<_> = self
            .messages
            .values()
            .into_iter()
            .filter(|m| m.timestamp > after)
            .collect();
        sort_ascending(&mut found);
        found.reverse();
        found
    }

    /// The oldest cached message, used to decide whether a history sync is
    /// needed.
    pub fn get_leading(&self) -> Option<Arc<Message>> {
        self.messages
            .values()
            .into_iter()
            .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
    }

    /// All cached messages in timestamp order.
    pub fn messages(&self) -> Vec<Arc<Message>> {
        let mut all = self.messages.values();
        sort_ascending(&mut all);
        all
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Message>> {
        let key = id.to_uppercase();
        self.statuses.delete(&key);
        self.messages.delete(&key)
    }

    /// Overwrites the overlay status unconditionally.
    pub fn set_status(&self, id: &str, status: MessageStatus) {
        self.statuses
            .set(id.to_uppercase(), status, self.expiration());
    }

    /// Current status from the overlay, falling back to the cached message.
    pub fn get_status(&self, id: &str) -> MessageStatus {
        let key = id.to_uppercase();
        let cached = self.messages.get(&key).map(|m| m.status).unwrap_or_default();
        self.statuses
            .get(&key)
            .map_or(cached, |overlay| overlay.max(cached))
    }

    /// Advances the status of `id` only when `status` is greater than the
    /// current one. Returns whether anything changed.
    pub fn update_status(&self, id: &str, status: MessageStatus) -> bool {
        let key = id.to_uppercase();
        let cached = self.messages.get(&key).map(|m| m.status).unwrap_or_default();

        let advanced = self.statuses.upsert_with(key.clone(), self.expiration(), |current| {
            let current = current.copied().unwrap_or_default().max(cached);
            (status > current).then_some(status)
        });

        if advanced {
            self.messages.upsert_with(key, self.expiration(), |current| {
                let msg = current?;
                (status > msg.status).then(|| {
                    let mut updated = Message::clone(msg);
                    updated.status = status;
                    Arc::new(updated)
                })
            });
        }
        advanced
    }

    /// Evicts the oldest-expiring messages beyond `max` (0 = unbounded).
    pub fn cleanup(&self, max: u64) -> usize {
        let evicted = self.messages.cleanup(max);
        if evicted > 0 {
            debug!(evicted, max, "message cache cleanup");
        }
        self.statuses.cleanup(max);
        evicted
    }

    pub fn count(&self) -> u64 {
        self.messages.count()
    }
}

fn sort_ascending(messages: &mut [Arc<Message>]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use quepasa_core::UpstreamContent;
    use serde_json::json;

    fn msg(id: &str, text: &str) -> Message {
        let mut m = Message::text("5511999998888@s.whatsapp.net", text);
        m.id = id.into();
        m.content = Some(UpstreamContent::Structured(json!({ "conversation": text })));
        m
    }

    #[test]
    fn append_then_get_is_case_insensitive() {
        let store = MessageStore::default();
        assert!(store.append(msg("abc123", "hi"), "test").is_some());
        let found = store.get_by_id("ABC123").unwrap();
        assert_eq!(found.id, "ABC123");
        assert_eq!(store.get_by_id("abc123").unwrap().text, "hi");
    }

    #[test]
    fn equal_content_is_a_duplicate() {
        let store = MessageStore::default();
        assert!(store.append(msg("ABC123", "hi"), "upstream").is_some());
        assert!(store.append(msg("abc123", "hi"), "echo").is_none());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn changed_content_is_accepted_and_stored() {
        let store = MessageStore::default();
        store.append(msg("ABC", "hi"), "upstream");
        assert!(store.append(msg("ABC", "edited"), "upstream").is_some());
        assert_eq!(store.get_by_id("abc").unwrap().text, "edited");
    }

    #[test]
    fn missing_id_is_not_found() {
        let store = MessageStore::default();
        assert!(matches!(
            store.get_by_id("nope"),
            Err(QuepasaError::NotFound(_))
        ));
    }

    #[test]
    fn time_query_is_newest_first() {
        let store = MessageStore::default();
        let base = Utc::now() - Duration::minutes(10);
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            let mut m = msg(id, id);
            m.timestamp = base + Duration::minutes(i as i64);
            store.append(m, "test");
        }
        let ids: Vec<_> = store
            .get_by_time(base)
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(ids, ["C", "B"]);
        assert_eq!(store.get_leading().unwrap().id, "A");
    }

    #[test]
    fn prefix_query() {
        let store = MessageStore::default();
        store.append(msg("3EB0AA", "1"), "t");
        store.append(msg("3EB0AA-audio", "2"), "t");
        store.append(msg("FFFF", "3"), "t");
        assert_eq!(store.get_by_prefix("3eb0aa").len(), 2);
    }

    #[test]
    fn status_is_monotonic() {
        let store = MessageStore::default();
        store.append(msg("S1", "x"), "t");
        assert!(store.update_status("s1", MessageStatus::Read));
        assert!(!store.update_status("s1", MessageStatus::Delivered));
        assert_eq!(store.get_status("S1"), MessageStatus::Read);
        assert_eq!(store.get_by_id("S1").unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn status_overlay_works_without_message() {
        let store = MessageStore::default();
        assert!(store.update_status("early", MessageStatus::Delivered));
        assert!(!store.update_status("early", MessageStatus::Imported));
        assert_eq!(store.get_status("EARLY"), MessageStatus::Delivered);
    }

    #[test]
    fn retention_has_a_floor() {
        assert_eq!(MessageStore::new(0).retention, Duration::hours(124));
        assert_eq!(MessageStore::new(1).retention, Duration::hours(124));
        assert_eq!(MessageStore::new(7).retention, Duration::hours(168));
    }
}
