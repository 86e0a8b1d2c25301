// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::time::SimpleTime;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// When an entry stops being served.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Expiry {
    /// Fixed lifetime counted from the last write. Reads do not extend it.
    AfterWrite(Duration),
    /// Sliding lifetime counted from the last read or write.
    AfterAccess(Duration),
}

impl Expiry {
    pub fn ttl(&self) -> Duration {
        match self {
            Expiry::AfterWrite(ttl) | Expiry::AfterAccess(ttl) => *ttl,
        }
    }
}

struct Entry<V> {
    value: V,
    written_at: SimpleTime,
    /// unix millis of the last read or write
    touched_at: AtomicU64,
}

impl<V> Entry<V> {
    fn new(value: V, now: SimpleTime) -> Self {
        Self {
            value,
            written_at: now,
            touched_at: AtomicU64::new(now.as_epoch_millis()),
        }
    }

    fn is_expired(&self, expiry: Expiry, now: SimpleTime) -> bool {
        let since = match expiry {
            Expiry::AfterWrite(_) => self.written_at,
            Expiry::AfterAccess(_) => SimpleTime::from_unix_millis(self.touched_at.load(Ordering::Relaxed)),
        };
        now.duration_since(since) >= expiry.ttl()
    }

    fn touch(&self, now: SimpleTime) {
        self.touched_at.fetch_max(now.as_epoch_millis(), Ordering::Relaxed);
    }
}

/// Concurrent key→value map whose entries expire. Every read re-checks expiry, so [`TtlCache::sweep`] only reclaims
/// memory and is never needed for correct answers.
pub struct TtlCache<K, V> {
    map: papaya::HashMap<K, Entry<V>, ahash::RandomState>,
    expiry: Expiry,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(expiry: Expiry) -> Self {
        Self {
            map: papaya::HashMap::with_hasher(ahash::RandomState::new()),
            expiry,
        }
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Get a live value. Sliding entries have their lifetime extended by this read.
    pub fn get(&self, key: &K, now: SimpleTime) -> Option<V> {
        let map = self.map.pin();
        let entry = map.get(key)?;
        if entry.is_expired(self.expiry, now) {
            None
        } else {
            entry.touch(now);
            Some(entry.value.clone())
        }
    }

    /// Insert or replace. The last write wins.
    pub fn insert(&self, key: K, value: V, now: SimpleTime) {
        self.map.pin().insert(key, Entry::new(value, now));
    }

    /// Returns `true` if something was removed, expired or not.
    pub fn remove(&self, key: &K) -> bool {
        self.map.pin().remove(key).is_some()
    }

    /// Drop every expired entry, returning how many were dropped.
    ///
    /// An entry rewritten between the expiry check and the removal may be dropped too. That only costs a cache miss.
    pub fn sweep(&self, now: SimpleTime) -> usize {
        let map = self.map.pin();
        let expired: Vec<K> = map
            .iter()
            .filter(|(_key, entry)| entry.is_expired(self.expiry, now))
            .map(|(key, _entry)| key.clone())
            .collect();
        expired.iter().filter(|key| map.remove(*key).is_some()).count()
    }

    /// Count of stored entries, including expired ones the sweep hasn't reached yet.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.pin().clear();
    }
}
