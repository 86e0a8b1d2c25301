// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Name ↔ unique id ↔ linked account resolution

use super::{CachePolicy, EntityKey, FetchError, Orchestrator};
use crate::cache::{Expiry, TtlCache};
use crate::error::AssistResult;
use crate::http::hypixel::PlayerReply;
use crate::http::{GameApi, IdentityApi};
use crate::time::SimpleTime;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

const IDENTITY_TTL: Duration = Duration::from_secs(30 * 60);

static GLOBAL_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,16}$").expect("Failed to compile player name Regex"));

thread_local! {
    // trick to avoid a subtle performance edge case: https://docs.rs/regex/latest/regex/index.html#sharing-a-regex-across-threads-can-result-in-contention
    static NAME_REGEX: Regex = GLOBAL_NAME_REGEX.clone();
}

fn is_valid_name(name: &str) -> bool {
    NAME_REGEX.with(|regex| regex.is_match(name))
}

/// Memoised identity mappings. All of them slide: they live as long as they keep being read.
pub(super) struct IdentityCaches {
    /// lower-cased name → unique id
    ids: TtlCache<String, Uuid>,
    /// unique id → name as upstream capitalises it
    names: TtlCache<Uuid, String>,
    accounts: TtlCache<Uuid, Option<u64>>,
    /// ids whose name must be re-read from upstream on the next resolution
    invalidated: papaya::HashMap<Uuid, (), ahash::RandomState>,
}

impl IdentityCaches {
    pub(super) fn new() -> Self {
        Self {
            ids: TtlCache::new(Expiry::AfterAccess(IDENTITY_TTL)),
            names: TtlCache::new(Expiry::AfterAccess(IDENTITY_TTL)),
            accounts: TtlCache::new(Expiry::AfterAccess(IDENTITY_TTL)),
            invalidated: papaya::HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    fn memoize(&self, unique_id: Uuid, name: &str, now: SimpleTime) {
        self.ids.insert(name.to_lowercase(), unique_id, now);
        self.names.insert(unique_id, name.to_string(), now);
    }

    fn is_invalidated(&self, unique_id: &Uuid) -> bool {
        self.invalidated.pin().contains_key(unique_id)
    }

    pub(super) fn sweep(&self, now: SimpleTime) -> usize {
        self.ids.sweep(now) + self.names.sweep(now) + self.accounts.sweep(now)
    }
}

impl<A: GameApi, M: IdentityApi> Orchestrator<A, M> {
    /// Turn a player name into a unique id. Memory, then the identity table, then the name service.
    pub async fn resolve_id(&self, name: &str) -> Result<Uuid, FetchError> {
        let name = name.trim();
        if !is_valid_name(name) {
            return Err(FetchError::user_facing(format!("`{name}` is not a valid username")));
        }
        let caches = &self.inner.identities;
        let now = self.now();

        if let Some(unique_id) = caches.ids.get(&name.to_lowercase(), now) {
            debug!("found uuid of {} in the memory cache", name);
            return Ok(unique_id);
        }

        match self.inner.db.identity_by_name(name).await {
            Ok(Some(row)) => {
                debug!("found uuid of {} in the identity table", name);
                caches.memoize(row.unique_id, row.display_name.as_deref().unwrap_or(name), now);
                return Ok(row.unique_id);
            }
            Ok(None) => {}
            Err(e) => error!("failed to read the identity of {} from the db: {:?}", name, e),
        }

        let subject = format!("uuid of {name}");
        let profile = self
            .inner
            .identity_api
            .lookup(name)
            .await
            .map_err(|e| FetchError::classify(&subject, &e))?;
        match profile {
            Some(profile) => {
                debug!("name service resolved {} to {}", profile.name, profile.id);
                self.observe_name(profile.id, &profile.name).await;
                Ok(profile.id)
            }
            None => Err(FetchError::user_facing(format!(
                "Found no player with the username `{name}`"
            ))),
        }
    }

    /// Turn a unique id into the player's current name. Memory, then the identity table, then a player fetch.
    pub async fn resolve_name(&self, unique_id: Uuid) -> Result<String, FetchError> {
        let caches = &self.inner.identities;
        let invalidated = caches.is_invalidated(&unique_id);

        if !invalidated {
            let now = self.now();
            if let Some(name) = caches.names.get(&unique_id, now) {
                debug!("found name of {} in the memory cache", unique_id);
                return Ok(name);
            }
            match self.inner.db.identity_by_id(unique_id).await {
                Ok(Some(row)) => {
                    if let Some(name) = row.display_name {
                        debug!("found name of {} in the identity table", unique_id);
                        caches.memoize(unique_id, &name, now);
                        return Ok(name);
                    }
                }
                Ok(None) => {}
                Err(e) => error!("failed to read the identity of {} from the db: {:?}", unique_id, e),
            }
        }

        let policy = if invalidated {
            // an invalidation arriving while this refresh is in flight must survive it
            caches.invalidated.pin().remove(&unique_id);
            CachePolicy::Refresh
        } else {
            CachePolicy::Normal
        };
        let name = self
            .fetch::<PlayerReply>(&EntityKey::player(unique_id), policy)
            .await
            .and_then(|fetched| {
                fetched
                    .entity
                    .player
                    .as_ref()
                    .and_then(|player| player.display_name.clone())
                    .ok_or(FetchError::NotFound)
            });
        match name {
            Ok(name) => {
                self.observe_name(unique_id, &name).await;
                Ok(name)
            }
            Err(e) => {
                if invalidated {
                    caches.invalidated.pin().insert(unique_id, ());
                }
                Err(e)
            }
        }
    }

    /// Forget the memoised name of `unique_id`. The next [`Orchestrator::resolve_name`] asks upstream.
    pub fn invalidate_name(&self, unique_id: Uuid) {
        let caches = &self.inner.identities;
        if let Some(name) = caches.names.get(&unique_id, self.now()) {
            caches.ids.remove(&name.to_lowercase());
        }
        caches.names.remove(&unique_id);
        caches.invalidated.pin().insert(unique_id, ());
        debug!("invalidated name of {}", unique_id);
    }

    /// Record a name seen in fresh upstream data, correcting the stored name if the player was renamed
    pub(super) async fn observe_name(&self, unique_id: Uuid, name: &str) {
        let caches = &self.inner.identities;
        let now = self.now();
        if caches.names.get(&unique_id, now).as_deref() == Some(name) {
            return;
        }
        match self.inner.db.upsert_identity_name(unique_id, name, now).await {
            Ok(Some(previous)) if previous != name => {
                info!("player {} is now known as {} (was {})", unique_id, name, previous);
                caches.ids.remove(&previous.to_lowercase());
            }
            Ok(_) => {}
            Err(e) => error!("failed to store name {} for {}: {:?}", name, unique_id, e),
        }
        // the name may have belonged to someone else, who no longer holds it
        if let Some(previous_holder) = caches.ids.get(&name.to_lowercase(), now) {
            if previous_holder != unique_id {
                debug!("name {} moved from {} to {}", name, previous_holder, unique_id);
                caches.names.remove(&previous_holder);
            }
        }
        caches.memoize(unique_id, name, now);
    }

    /// Link a chat account to a player, taking the account away from any player it was linked to before
    pub async fn link_account(&self, unique_id: Uuid, account_id: u64) -> AssistResult<()> {
        let caches = &self.inner.identities;
        let now = self.now();
        if let Some(previous) = self.inner.db.link_account(unique_id, account_id, now).await? {
            info!("account {} moved from {} to {}", account_id, previous, unique_id);
            caches.accounts.remove(&previous);
        }
        caches.accounts.insert(unique_id, Some(account_id), now);
        Ok(())
    }

    /// Returns the account that was linked, if any
    pub async fn unlink_account(&self, unique_id: Uuid) -> AssistResult<Option<u64>> {
        let now = self.now();
        let previous = self.inner.db.unlink_account(unique_id, now).await?;
        self.inner.identities.accounts.insert(unique_id, None, now);
        Ok(previous)
    }

    pub async fn linked_account(&self, unique_id: Uuid) -> AssistResult<Option<u64>> {
        let caches = &self.inner.identities;
        let now = self.now();
        if let Some(account_id) = caches.accounts.get(&unique_id, now) {
            return Ok(account_id);
        }
        let account_id = self
            .inner
            .db
            .identity_by_id(unique_id)
            .await?
            .and_then(|row| row.linked_account_id);
        caches.accounts.insert(unique_id, account_id, now);
        Ok(account_id)
    }

    pub async fn unique_id_for_account(&self, account_id: u64) -> AssistResult<Option<Uuid>> {
        Ok(self
            .inner
            .db
            .identity_by_account(account_id)
            .await?
            .map(|row| row.unique_id))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::Clock;
    use crate::fetch::test_support::*;
    use tracing_test::traced_test;

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("Notch"));
        assert!(is_valid_name("a_b"));
        assert!(is_valid_name("sixteen_chars_ok"));
        assert!(!is_valid_name("ab"));
        assert!(!is_valid_name("seventeen_chars_x"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("semi;colon"));
        assert!(!is_valid_name("ÄÖÜß"));
        assert!(!is_valid_name("Jürgen"));
    }

    #[tokio::test]
    async fn test_non_ascii_name_is_not_looked_up() {
        let harness = Harness::new().await;
        assert_eq!(
            harness.orchestrator.resolve_id("ÄÖÜß").await,
            Err(FetchError::user_facing("`ÄÖÜß` is not a valid username"))
        );
        assert_eq!(harness.identity.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_name_is_user_facing_and_not_looked_up() {
        let harness = Harness::new().await;
        let error = harness.orchestrator.resolve_id("no way").await.expect_err("should fail");
        assert!(matches!(error, FetchError::UserFacing(_)));
        assert_eq!(harness.identity.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_id_falls_through_to_name_service_once() {
        let harness = Harness::new().await;
        harness.identity.respond("Alice", Some(ALICE));

        assert_eq!(harness.orchestrator.resolve_id("Alice").await, Ok(ALICE));
        assert_eq!(harness.orchestrator.resolve_id("ALICE").await, Ok(ALICE));
        assert_eq!(harness.identity.call_count(), 1);

        let row = harness
            .orchestrator
            .db()
            .identity_by_id(ALICE)
            .await
            .expect("select")
            .expect("identity should be persisted");
        assert_eq!(row.display_name.as_deref(), Some("Alice"));
        // the reverse direction was memoised too
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alice"));
        assert_eq!(harness.game.call_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_id_uses_identity_table() {
        let harness = Harness::new().await;
        harness
            .orchestrator
            .db()
            .upsert_identity_name(ALICE, "Alice", harness.clock.now())
            .await
            .expect("seed");
        assert_eq!(harness.orchestrator.resolve_id("alice").await, Ok(ALICE));
        assert_eq!(harness.identity.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_is_user_facing() {
        let harness = Harness::new().await;
        assert_eq!(
            harness.orchestrator.resolve_id("Nobody").await,
            Err(FetchError::user_facing("Found no player with the username `Nobody`"))
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_name_service_outage_is_unavailable() {
        let harness = Harness::new().await;
        harness.identity.fail();
        assert_eq!(
            harness.orchestrator.resolve_id("Alice").await,
            Err(FetchError::UpstreamUnavailable)
        );
        assert!(logs_contain("uuid of Alice"));
    }

    #[tokio::test]
    async fn test_resolve_name_from_player_fetch() {
        let harness = Harness::new().await;
        harness.game.respond(&EntityKey::player(ALICE), Scripted::body(player_json(ALICE, "Alice")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alice"));
        assert_eq!(harness.orchestrator.resolve_id("alice").await, Ok(ALICE));
        assert_eq!(harness.identity.call_count(), 0);
    }

    #[tokio::test]
    async fn test_player_without_display_name_is_not_found() {
        let harness = Harness::new().await;
        harness.game.respond(
            &EntityKey::player(ALICE),
            Scripted::body(format!(r#"{{"success":true,"player":{{"uuid":"{}"}}}}"#, ALICE.simple())),
        );
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await, Err(FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_invalidate_name_forces_fresh_resolution() {
        let harness = Harness::new().await;
        let key = EntityKey::player(ALICE);
        harness.game.respond(&key, Scripted::body(player_json(ALICE, "Alice")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alice"));

        // upstream renamed, but the memoised name keeps being served
        harness.game.respond(&key, Scripted::body(player_json(ALICE, "Alicia")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alice"));
        assert_eq!(harness.game.call_count(), 1);

        harness.orchestrator.invalidate_name(ALICE);
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alicia"));
        assert_eq!(harness.game.call_count(), 2);

        // the mark cleared with that resolution
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alicia"));
        assert_eq!(harness.game.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidation_during_refresh_is_kept() {
        let harness = Harness::new().await;
        let key = EntityKey::player(ALICE);
        harness.game.respond(&key, Scripted::body(player_json(ALICE, "Alice")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alice"));

        harness.orchestrator.invalidate_name(ALICE);
        harness.game.hold();
        let orchestrator = harness.orchestrator.clone();
        let refresh = tokio::spawn(async move { orchestrator.resolve_name(ALICE).await });
        harness.game.wait_for_calls(2).await;
        // upstream renamed after the in-flight refresh read it
        harness.orchestrator.invalidate_name(ALICE);
        harness.game.release();
        assert_eq!(refresh.await.expect("task should not panic").as_deref(), Ok("Alice"));

        harness.game.respond(&key, Scripted::body(player_json(ALICE, "Alicia")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alicia"));
        assert_eq!(harness.game.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_invalidation() {
        let harness = Harness::new().await;
        let key = EntityKey::player(ALICE);
        harness.game.respond(&key, Scripted::body(player_json(ALICE, "Alice")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alice"));

        harness.orchestrator.invalidate_name(ALICE);
        harness.game.respond(&key, Scripted::Transport);
        assert_eq!(
            harness.orchestrator.resolve_name(ALICE).await,
            Err(FetchError::UpstreamUnavailable)
        );

        harness.game.respond(&key, Scripted::body(player_json(ALICE, "Alicia")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alicia"));
        assert_eq!(harness.game.call_count(), 3);
    }

    #[tokio::test]
    async fn test_moved_name_is_forgotten_for_its_previous_holder() {
        let harness = Harness::new().await;
        harness.game.respond(&EntityKey::player(ALICE), Scripted::body(player_json(ALICE, "Sky")));
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Sky"));

        // Bob took the name over
        harness.game.respond(&EntityKey::player(BOB), Scripted::body(player_json(BOB, "Sky")));
        harness.orchestrator.player(BOB).await.expect("fetch should succeed");
        assert_eq!(harness.orchestrator.resolve_id("sky").await, Ok(BOB));

        // Alice no longer holds the name, neither in memory nor in the identity table
        let caches = &harness.orchestrator.inner.identities;
        assert_eq!(caches.names.get(&ALICE, harness.clock.now()), None);
        assert_eq!(caches.names.get(&BOB, harness.clock.now()).as_deref(), Some("Sky"));
        let row = harness
            .orchestrator
            .db()
            .identity_by_id(ALICE)
            .await
            .expect("select")
            .expect("the identity row should remain");
        assert_eq!(row.display_name, None);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_upstream_player_fetch_corrects_stored_name() {
        let harness = Harness::new().await;
        harness.identity.respond("Alice", Some(ALICE));
        assert_eq!(harness.orchestrator.resolve_id("Alice").await, Ok(ALICE));

        harness.game.respond(&EntityKey::player(ALICE), Scripted::body(player_json(ALICE, "Alicia")));
        harness.orchestrator.player(ALICE).await.expect("fetch should succeed");
        assert!(logs_contain("is now known as Alicia"));

        let db = harness.orchestrator.db();
        assert_eq!(db.identity_by_name("Alice").await.expect("select"), None);
        let row = db.identity_by_name("alicia").await.expect("select").expect("renamed row");
        assert_eq!(row.unique_id, ALICE);
        assert_eq!(harness.orchestrator.resolve_name(ALICE).await.as_deref(), Ok("Alicia"));

        // the old name is no longer memoised, so it goes back to the name service
        harness.identity.respond("Alice", None);
        assert!(harness.orchestrator.resolve_id("Alice").await.is_err());
        assert_eq!(harness.identity.call_count(), 2);
    }

    #[tokio::test]
    async fn test_account_links() {
        let harness = Harness::new().await;
        let account = 80_351_110_224_678_912;
        assert_eq!(harness.orchestrator.linked_account(ALICE).await.expect("select"), None);

        harness.orchestrator.link_account(ALICE, account).await.expect("link");
        assert_eq!(harness.orchestrator.linked_account(ALICE).await.expect("select"), Some(account));
        assert_eq!(
            harness.orchestrator.unique_id_for_account(account).await.expect("select"),
            Some(ALICE)
        );

        harness.orchestrator.link_account(BOB, account).await.expect("link");
        assert_eq!(harness.orchestrator.linked_account(ALICE).await.expect("select"), None);
        assert_eq!(harness.orchestrator.linked_account(BOB).await.expect("select"), Some(account));

        assert_eq!(harness.orchestrator.unlink_account(BOB).await.expect("unlink"), Some(account));
        assert_eq!(harness.orchestrator.linked_account(BOB).await.expect("select"), None);
        assert_eq!(harness.orchestrator.unique_id_for_account(account).await.expect("select"), None);
    }

    #[tokio::test]
    async fn test_identity_memo_slides() {
        let harness = Harness::new().await;
        harness.identity.respond("Alice", Some(ALICE));
        harness.orchestrator.resolve_id("Alice").await.expect("resolve");
        for _ in 0..3 {
            harness.clock.advance(Duration::from_secs(20 * 60));
            harness.orchestrator.resolve_id("Alice").await.expect("resolve");
        }
        // an hour later only the name → id memo is alive: it kept being read, the reverse one did not
        assert_eq!(harness.orchestrator.sweep(), Some(1));
        assert_eq!(harness.identity.call_count(), 1);
    }
}
