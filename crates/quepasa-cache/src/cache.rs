// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent expiring key/value store.
//!
//! Entries carry an absolute expiration. Reads lazily delete expired
//! entries; [`Cache::cleanup`] bounds the entry count by evicting the
//! earliest-expiring entries first.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expiration: DateTime<Utc>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration
    }
}

/// A snapshot row returned by [`Cache::ordered_by_expiration`].
#[derive(Debug, Clone)]
pub struct CacheItem<V> {
    pub key: String,
    pub value: V,
    pub expiration: DateTime<Utc>,
}

/// Thread-safe expiring map with an atomic entry counter.
#[derive(Debug)]
pub struct Cache<V> {
    entries: DashMap<String, Entry<V>>,
    count: AtomicU64,
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            count: AtomicU64::new(0),
        }
    }
}

impl<V: Clone> Cache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`. Returns the previous value when one was
    /// replaced; the counter only grows on fresh inserts.
    pub fn set(&self, key: String, value: V, expiration: DateTime<Utc>) -> Option<V> {
        let previous = self.entries.insert(key, Entry { value, expiration });
        if previous.is_none() {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        previous.map(|e| e.value)
    }

    /// Returns the value while it has not expired. Expired entries are
    /// removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|(value, _)| value)
    }

    /// Like [`Cache::get`] but also returns the expiration.
    pub fn get_entry(&self, key: &str) -> Option<(V, DateTime<Utc>)> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(e) if e.is_live(now) => return Some((e.value.clone(), e.expiration)),
            Some(_) => {}
            None => return None,
        }
        if self
            .entries
            .remove_if(key, |_, e| !e.is_live(now))
            .is_some()
        {
            self.count.fetch_sub(1, Ordering::SeqCst);
        }
        None
    }

    /// Atomically updates or creates `key`.
    ///
    /// `update` receives the live current value (or `None`) and returns the
    /// replacement, or `None` to leave the entry untouched. Existing entries
    /// keep their expiration; new ones use `expiration`. Returns whether a
    /// value was written.
    pub fn upsert_with<F>(&self, key: String, expiration: DateTime<Utc>, update: F) -> bool
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let now = Utc::now();
        match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let live = occupied.get().is_live(now);
                let current = live.then(|| &occupied.get().value);
                match update(current) {
                    Some(value) => {
                        let entry = occupied.get_mut();
                        entry.value = value;
                        if !live {
                            entry.expiration = expiration;
                        }
                        true
                    }
                    None => false,
                }
            }
            MapEntry::Vacant(vacant) => match update(None) {
                Some(value) => {
                    vacant.insert(Entry { value, expiration });
                    self.count.fetch_add(1, Ordering::SeqCst);
                    true
                }
                None => false,
            },
        }
    }

    pub fn delete(&self, key: &str) -> Option<V> {
        let removed = self.entries.remove(key).map(|(_, e)| e.value);
        if removed.is_some() {
            self.count.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Stable copy of the live entries, earliest expiration first.
    pub fn ordered_by_expiration(&self) -> Vec<CacheItem<V>> {
        let now = Utc::now();
        let mut items: Vec<CacheItem<V>> = self
            .entries
            .iter()
            .filter(|e| e.value().is_live(now))
            .map(|e| CacheItem {
                key: e.key().clone(),
                value: e.value().value.clone(),
                expiration: e.value().expiration,
            })
            .collect();
        items.sort_by(|a, b| a.expiration.cmp(&b.expiration).then_with(|| a.key.cmp(&b.key)));
        items
    }

    /// Snapshot of the live values in no particular order.
    pub fn values(&self) -> Vec<V> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|e| e.value().is_live(now))
            .map(|e| e.value().value.clone())
            .collect()
    }

    /// Evicts the earliest-expiring entries until at most `max` remain.
    ///
    /// `max == 0` means unbounded. Under concurrent inserts this may leave
    /// slightly more than `max` entries. Returns the number evicted.
    pub fn cleanup(&self, max: u64) -> usize {
        if max == 0 {
            return 0;
        }
        let count = self.count();
        if count <= max {
            return 0;
        }
        let excess = (count - max) as usize;

        let mut by_expiration: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().expiration))
            .collect();
        by_expiration.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut evicted = 0;
        for (key, _) in by_expiration.into_iter().take(excess) {
            if self.delete(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn later(secs: i64) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(secs)
    }

    #[test]
    fn set_reports_replacement_and_counts_new_keys() {
        let cache = Cache::new();
        assert!(cache.set("a".into(), 1, later(60)).is_none());
        assert_eq!(cache.set("a".into(), 2, later(60)), Some(1));
        assert!(cache.set("b".into(), 3, later(60)).is_none());
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn expired_entries_are_lazily_deleted() {
        let cache = Cache::new();
        cache.set("gone".into(), "x", Utc::now() - Duration::seconds(1));
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get("gone"), None);
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn ordered_by_expiration_is_ascending() {
        let cache = Cache::new();
        cache.set("late".into(), 3, later(300));
        cache.set("early".into(), 1, later(100));
        cache.set("mid".into(), 2, later(200));
        let keys: Vec<_> = cache
            .ordered_by_expiration()
            .into_iter()
            .map(|i| i.key)
            .collect();
        assert_eq!(keys, ["early", "mid", "late"]);
    }

    #[test]
    fn cleanup_evicts_earliest_expiring() {
        let cache = Cache::new();
        for i in 0..10 {
            cache.set(format!("k{i}"), i, later(100 + i));
        }
        assert_eq!(cache.cleanup(4), 6);
        assert_eq!(cache.count(), 4);
        assert!(cache.get("k0").is_none());
        assert!(cache.get("k9").is_some());
    }

    #[test]
    fn cleanup_zero_is_unbounded() {
        let cache = Cache::new();
        for i in 0..5 {
            cache.set(format!("k{i}"), i, later(60));
        }
        assert_eq!(cache.cleanup(0), 0);
        assert_eq!(cache.count(), 5);
    }

    #[test]
    fn upsert_with_can_decline() {
        let cache: Cache<u8> = Cache::new();
        assert!(!cache.upsert_with("k".into(), later(60), |_| None));
        assert_eq!(cache.count(), 0);
        assert!(cache.upsert_with("k".into(), later(60), |cur| Some(cur.copied().unwrap_or(0) + 1)));
        assert!(cache.upsert_with("k".into(), later(60), |cur| Some(cur.copied().unwrap_or(0) + 1)));
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_writers_keep_count_consistent() {
        let cache = Arc::new(Cache::new());
        let mut tasks = Vec::new();
        for t in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..200 {
                    cache.set(format!("{}", (t * 37 + i) % 300), i, later(60));
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(cache.count() as usize, cache.values().len());
        cache.cleanup(50);
        assert_eq!(cache.count(), 50);
    }

    proptest::proptest! {
        #[test]
        fn cleanup_leaves_at_most_max(n in 0usize..60, max in 1u64..40) {
            let cache = Cache::new();
            for i in 0..n {
                cache.set(format!("k{i}"), i, later(10 + i as i64));
            }
            cache.cleanup(max);
            proptest::prop_assert!(cache.count() <= max);
        }
    }
}
