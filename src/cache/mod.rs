// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! In-process cache tier

mod ttl;

use crate::fetch::{EntityKey, EntityKind};
use crate::time::SimpleTime;
use std::any::Any;
use std::sync::Arc;
pub use ttl::{Expiry, TtlCache};

/// Exact upstream JSON for an entity
pub type Payload = Arc<str>;

/// One cached entity. Holds the decoded value next to the payload, so a memory hit never re-parses.
#[derive(Clone)]
pub struct CacheRecord {
    pub key: EntityKey,
    pub payload: Payload,
    pub fetched_at: SimpleTime,
    decoded: Arc<dyn Any + Send + Sync>,
}

impl CacheRecord {
    pub fn new<T: Any + Send + Sync>(key: EntityKey, payload: Payload, fetched_at: SimpleTime, decoded: Arc<T>) -> Self {
        Self {
            key,
            payload,
            fetched_at,
            decoded,
        }
    }

    /// The decoded entity, or `None` if it was stored as some other type
    pub fn decoded<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.decoded.clone().downcast::<T>().ok()
    }
}

impl std::fmt::Debug for CacheRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRecord")
            .field("key", &self.key)
            .field("payload_len", &self.payload.len())
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}

/// One [`TtlCache`] per entity kind, each with that kind's expiry
pub struct MemoryTier {
    caches: Vec<TtlCache<String, CacheRecord>>,
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTier {
    pub fn new() -> Self {
        let caches = EntityKind::ALL
            .into_iter()
            .map(|kind| TtlCache::new(kind.memory_expiry()))
            .collect();
        Self { caches }
    }

    fn cache(&self, kind: EntityKind) -> &TtlCache<String, CacheRecord> {
        // caches has exactly one slot per EntityKind::ALL entry
        &self.caches[kind.index()]
    }

    pub fn get(&self, key: &EntityKey, now: SimpleTime) -> Option<CacheRecord> {
        self.cache(key.kind()).get(&key.id().to_string(), now)
    }

    /// Store a record, stamped with `now` for expiry purposes
    pub fn put(&self, record: CacheRecord, now: SimpleTime) {
        let key = record.key.clone();
        self.cache(key.kind()).insert(key.id().to_string(), record, now);
    }

    pub fn remove(&self, key: &EntityKey) -> bool {
        self.cache(key.kind()).remove(&key.id().to_string())
    }

    /// Compact every per-kind cache, returning the total number of dropped entries
    pub fn sweep(&self, now: SimpleTime) -> usize {
        self.caches.iter().map(|cache| cache.sweep(now)).sum()
    }

    /// Entry count per kind, including expired entries not yet swept
    pub fn lens(&self) -> Vec<(EntityKind, usize)> {
        EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, self.cache(kind).len()))
            .collect()
    }

    pub fn clear(&self) {
        self.caches.iter().for_each(TtlCache::clear);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn record(key: EntityKey, payload: &str, now: SimpleTime) -> CacheRecord {
        CacheRecord::new(key, Arc::from(payload), now, Arc::new(payload.len()))
    }

    #[test]
    fn test_kinds_are_isolated() {
        let tier = MemoryTier::new();
        let now = SimpleTime::from_unix_millis(1_000);
        let uuid = Uuid::from_u128(42);
        tier.put(record(EntityKey::player(uuid), "player", now), now);
        assert!(tier.get(&EntityKey::player(uuid), now).is_some());
        assert!(tier.get(&EntityKey::profile(uuid), now).is_none());
    }

    #[test]
    fn test_per_kind_ttl() {
        let tier = MemoryTier::new();
        let now = SimpleTime::from_unix_millis(0);
        let uuid = Uuid::from_u128(42);
        tier.put(record(EntityKey::auctions(uuid), "auctions", now), now);
        tier.put(record(EntityKey::player(uuid), "player", now), now);

        let later = now.saturating_add(Duration::from_secs(75));
        assert!(tier.get(&EntityKey::auctions(uuid), later).is_none());
        assert!(tier.get(&EntityKey::player(uuid), later).is_some());
    }

    #[test]
    fn test_decoded_downcast() {
        let now = SimpleTime::from_unix_millis(0);
        let record = record(EntityKey::market(), "abc", now);
        assert_eq!(record.decoded::<usize>().as_deref(), Some(&3));
        assert!(record.decoded::<String>().is_none());
    }

    #[test]
    fn test_sweep_totals_across_kinds() {
        let tier = MemoryTier::new();
        let now = SimpleTime::from_unix_millis(0);
        tier.put(record(EntityKey::market(), "m", now), now);
        tier.put(record(EntityKey::leaderboard_guilds(), "l", now), now);
        let later = now.saturating_add(Duration::from_secs(120));
        assert_eq!(tier.sweep(later), 1);
        assert!(tier.get(&EntityKey::leaderboard_guilds(), later).is_some());
    }
}
