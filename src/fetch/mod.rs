// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! The read path every consumer goes through: memory, then the persistent store, then upstream.

mod classify;
mod identity;
mod kind;
mod profile;
#[cfg(test)]
pub(crate) mod test_support;

use crate::cache::{CacheRecord, MemoryTier, Payload};
use crate::credential::CredentialPool;
use crate::db::AssistDb;
use crate::http::hypixel::{
    AuctionsReply, Envelope, GuildLeaderboard, GuildReply, MarketReply, PlayerLeaderboard, PlayerReply, ProfileReply,
};
use crate::http::{GameApi, IdentityApi, UpstreamError};
use crate::time::{Clock, SimpleTime};
pub use classify::FetchError;
use identity::IdentityCaches;
pub use kind::{Entity, EntityKey, EntityKind, Persistence};
pub use profile::{SelectedProfile, last_save};
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

pub type FetchResult<T> = Result<Fetched<T>, FetchError>;

/// Which tier answered
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Source {
    Memory,
    Persistent,
    Upstream,
}

/// Whether cached copies may answer
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CachePolicy {
    /// memory, then persistent, then upstream
    #[default]
    Normal,
    /// Skip both cache reads and go straight upstream. The result is still written through.
    Refresh,
}

/// A successfully fetched entity
pub struct Fetched<T> {
    pub entity: Arc<T>,
    /// Exact upstream JSON the entity was parsed from
    pub payload: Payload,
    pub source: Source,
    /// When upstream produced this payload
    pub fetched_at: SimpleTime,
}

impl<T> Clone for Fetched<T> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            payload: self.payload.clone(),
            source: self.source,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T: Debug> Debug for Fetched<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetched")
            .field("entity", &self.entity)
            .field("source", &self.source)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}

/// Shared fetch façade. Cloning is by-reference: every clone sees the same caches, pool and store.
pub struct Orchestrator<A, M> {
    inner: Arc<Inner<A, M>>,
}

struct Inner<A, M> {
    game_api: A,
    identity_api: M,
    credentials: CredentialPool,
    db: AssistDb,
    memory: MemoryTier,
    identities: IdentityCaches,
    clock: Arc<dyn Clock>,
    sweeping: AtomicBool,
}

impl<A, M> Clone for Orchestrator<A, M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: GameApi, M: IdentityApi> Orchestrator<A, M> {
    pub fn new(game_api: A, identity_api: M, credentials: CredentialPool, db: AssistDb, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                game_api,
                identity_api,
                credentials,
                db,
                memory: MemoryTier::new(),
                identities: IdentityCaches::new(),
                clock,
                sweeping: AtomicBool::new(false),
            }),
        }
    }

    pub fn db(&self) -> &AssistDb {
        &self.inner.db
    }

    fn now(&self) -> SimpleTime {
        self.inner.clock.now()
    }

    /// Fetch any entity by key. `T` must be the reply type for the key's kind.
    pub async fn fetch<T: Entity>(&self, key: &EntityKey, policy: CachePolicy) -> FetchResult<T> {
        if policy == CachePolicy::Normal {
            let now = self.now();
            if let Some(fetched) = self.load_memory(key, now) {
                return Ok(fetched);
            }
            if let Some(fetched) = self.load_persistent(key, now).await {
                return Ok(fetched);
            }
        }
        self.fetch_upstream(key).await
    }

    /// Start a fetch on the runtime and hand back its handle without waiting for it
    pub fn spawn_fetch<T: Entity>(&self, key: EntityKey, policy: CachePolicy) -> JoinHandle<FetchResult<T>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.fetch::<T>(&key, policy).await })
    }

    fn load_memory<T: Entity>(&self, key: &EntityKey, now: SimpleTime) -> Option<Fetched<T>> {
        let record = self.inner.memory.get(key, now)?;
        match record.decoded::<T>() {
            Some(entity) => {
                debug!("found {} in the memory cache", key);
                Some(Fetched {
                    entity,
                    payload: record.payload,
                    source: Source::Memory,
                    fetched_at: record.fetched_at,
                })
            }
            None => {
                debug!("memory cache holds {} as a different type", key);
                None
            }
        }
    }

    async fn load_persistent<T: Entity>(&self, key: &EntityKey, now: SimpleTime) -> Option<Fetched<T>> {
        let persistence = key.kind().persistence()?;
        let record = match self.inner.db.load_record(persistence.table, key.id()).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("{} is not in the persistent cache", key);
                return None;
            }
            Err(e) => {
                error!("failed to read {} from the persistent cache: {:?}", key, e);
                return None;
            }
        };

        let age = now.duration_since(record.last_updated_at);
        if age >= persistence.window {
            debug!("{} in the persistent cache is stale at {}s old", key, age.as_secs());
            return None;
        }

        let entity = match serde_json::from_str::<T>(&record.payload) {
            Ok(entity) if entity.is_present() => Arc::new(entity),
            Ok(_) => {
                debug!("persistent record for {} holds an absent entity", key);
                return None;
            }
            Err(e) => {
                debug!("persistent record for {} failed to decode: {}", key, e);
                return None;
            }
        };
        let payload: Payload = Arc::from(record.payload);
        self.inner.memory.put(
            CacheRecord::new(key.clone(), payload.clone(), record.last_updated_at, entity.clone()),
            now,
        );
        debug!("found {} in the persistent cache", key);
        Some(Fetched {
            entity,
            payload,
            source: Source::Persistent,
            fetched_at: record.last_updated_at,
        })
    }

    async fn fetch_upstream<T: Entity>(&self, key: &EntityKey) -> FetchResult<T> {
        let credential = key.kind().needs_credential().then(|| self.inner.credentials.next());
        debug!("requesting {} from upstream with {:?}", key, credential);
        let payload = self
            .inner
            .game_api
            .fetch(credential, key)
            .await
            .map_err(|e| FetchError::classify(key, &e))?;
        let entity = Arc::new(Self::decode::<T>(key, &payload)?);
        let now = self.now();
        let payload: Payload = Arc::from(payload);
        self.write_through(key, &payload, &entity, now).await;
        self.after_upstream(&entity).await;
        Ok(Fetched {
            entity,
            payload,
            source: Source::Upstream,
            fetched_at: now,
        })
    }

    fn decode<T: Entity>(key: &EntityKey, payload: &str) -> Result<T, FetchError> {
        Envelope::check(key.kind().name(), payload).map_err(|e| FetchError::classify(key, &e))?;
        let entity: T = serde_json::from_str(payload)
            .map_err(|e| FetchError::classify(key, &UpstreamError::from_json(e)))?;
        if entity.is_present() {
            Ok(entity)
        } else {
            debug!("{} does not exist upstream", key);
            Err(FetchError::NotFound)
        }
    }

    /// Populate both tiers. A persistent write failure is logged and otherwise ignored: the caller still gets the
    /// entity.
    async fn write_through<T: Entity>(&self, key: &EntityKey, payload: &Payload, entity: &Arc<T>, now: SimpleTime) {
        self.inner
            .memory
            .put(CacheRecord::new(key.clone(), payload.clone(), now, entity.clone()), now);
        if let Some(persistence) = key.kind().persistence() {
            match self.inner.db.upsert_record(persistence.table, key.id(), payload, now).await {
                Ok(true) => debug!("created persistent record for {}", key),
                Ok(false) => debug!("updated persistent record for {}", key),
                Err(e) => error!("failed to write {} to the persistent cache: {:?}", key, e),
            }
        }
    }

    /// Side effects of fresh upstream data. Currently: correcting the stored name of a player.
    async fn after_upstream<T: Entity>(&self, entity: &Arc<T>) {
        let entity: &(dyn Any + Send + Sync) = &**entity;
        if let Some(player) = entity.downcast_ref::<PlayerReply>().and_then(|reply| reply.player.as_ref())
            && let Some(display_name) = player.display_name.as_deref()
        {
            self.observe_name(player.uuid, display_name).await;
        }
    }

    /// Drop expired memory entries. Returns `None` without doing anything if another sweep is running.
    pub fn sweep(&self) -> Option<usize> {
        if self.inner.sweeping.swap(true, Ordering::AcqRel) {
            debug!("skipping memory sweep: another sweep is running");
            return None;
        }
        let now = self.now();
        let swept = self.inner.memory.sweep(now) + self.inner.identities.sweep(now);
        self.inner.sweeping.store(false, Ordering::Release);
        debug!("memory sweep dropped {} expired entries", swept);
        Some(swept)
    }

    /// Entry count per kind in the memory tier
    pub fn memory_usage(&self) -> Vec<(EntityKind, usize)> {
        self.inner.memory.lens()
    }

    pub async fn player(&self, unique_id: Uuid) -> FetchResult<PlayerReply> {
        self.fetch(&EntityKey::player(unique_id), CachePolicy::Normal).await
    }

    pub async fn player_by_name(&self, name: &str) -> FetchResult<PlayerReply> {
        let unique_id = self.resolve_id(name).await?;
        self.player(unique_id).await
    }

    pub async fn profile(&self, profile_id: Uuid) -> FetchResult<ProfileReply> {
        self.fetch(&EntityKey::profile(profile_id), CachePolicy::Normal).await
    }

    pub async fn guild_by_name(&self, name: &str) -> FetchResult<GuildReply> {
        self.fetch(&EntityKey::guild(name), CachePolicy::Normal).await
    }

    pub async fn guild_of_player(&self, unique_id: Uuid) -> FetchResult<GuildReply> {
        self.fetch(&EntityKey::guild_of_player(unique_id), CachePolicy::Normal)
            .await
    }

    /// Bazaar snapshot
    pub async fn market(&self) -> FetchResult<MarketReply> {
        self.fetch(&EntityKey::market(), CachePolicy::Normal).await
    }

    pub async fn auctions(&self, profile_id: Uuid) -> FetchResult<AuctionsReply> {
        self.fetch(&EntityKey::auctions(profile_id), CachePolicy::Normal).await
    }

    /// The global player leaderboard, or the players of one guild
    pub async fn player_leaderboard(&self, guild_id: Option<&str>) -> FetchResult<PlayerLeaderboard> {
        self.fetch(&EntityKey::leaderboard_players(guild_id), CachePolicy::Normal)
            .await
    }

    pub async fn guild_leaderboard(&self) -> FetchResult<GuildLeaderboard> {
        self.fetch(&EntityKey::leaderboard_guilds(), CachePolicy::Normal).await
    }
}
