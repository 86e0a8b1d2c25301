// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use super::{FetchError, Fetched, Orchestrator};
use crate::http::hypixel::{Profile, ProfileReply};
use crate::http::{GameApi, IdentityApi};
use crate::util::generate_nonce;
use tokio::task::JoinSet;
use tracing::{debug, error};
use uuid::Uuid;

/// The profile a player's queries should be answered from
#[derive(Clone, Debug)]
pub struct SelectedProfile {
    pub profile_id: Uuid,
    /// The fruit name the player sees in game
    pub cute_name: Option<String>,
    pub profile: Fetched<ProfileReply>,
}

impl SelectedProfile {
    pub fn data(&self) -> Option<&Profile> {
        self.profile.entity.profile.as_ref()
    }
}

/// Scorer picking the most recently saved profile. A member with no save time scores lowest.
pub fn last_save(profile: &Profile, member: Uuid) -> i64 {
    profile
        .member(member)
        .and_then(|member| member.last_save)
        .unwrap_or(i64::MIN)
}

impl<A: GameApi, M: IdentityApi> Orchestrator<A, M> {
    /// Fetch every profile of a player in parallel and pick the one `score` rates highest. Equal scores go to the
    /// smallest profile id.
    ///
    /// Profiles that no longer exist are skipped. `Ok(None)` means the player has no usable profile; if nothing
    /// could be fetched because of some other failure, that failure is returned instead.
    pub async fn select_profile<K, F>(&self, unique_id: Uuid, score: F) -> Result<Option<SelectedProfile>, FetchError>
    where
        K: Ord,
        F: Fn(&Profile, Uuid) -> K,
    {
        // a fetched player is always present, absent players are NotFound
        let player = self.player(unique_id).await?;

        let mut tasks = JoinSet::new();
        for profile_ref in player.entity.profiles().cloned() {
            let orchestrator = self.clone();
            tasks.spawn(async move {
                let result = orchestrator.profile(profile_ref.profile_id).await;
                (profile_ref, result)
            });
        }

        let mut best: Option<(K, SelectedProfile)> = None;
        let mut failure: Option<FetchError> = None;
        while let Some(joined) = tasks.join_next().await {
            let (profile_ref, result) = match joined {
                Ok(output) => output,
                Err(e) => {
                    let nonce = generate_nonce();
                    error!("NONCE[{:016X}] profile fetch task for {} failed: {:?}", nonce, unique_id, e);
                    failure.get_or_insert(FetchError::Unknown { nonce });
                    continue;
                }
            };
            let fetched = match result {
                Ok(fetched) => fetched,
                Err(FetchError::NotFound) => {
                    debug!("skipping missing profile {} of {}", profile_ref.profile_id, unique_id);
                    continue;
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    continue;
                }
            };
            let Some(profile) = fetched.entity.profile.as_ref() else {
                continue;
            };
            let candidate_score = score(profile, unique_id);
            let better = match &best {
                None => true,
                Some((best_score, best_profile)) => {
                    candidate_score > *best_score
                        || (candidate_score == *best_score && profile_ref.profile_id < best_profile.profile_id)
                }
            };
            if better {
                best = Some((
                    candidate_score,
                    SelectedProfile {
                        profile_id: profile_ref.profile_id,
                        cute_name: profile_ref.cute_name,
                        profile: fetched,
                    },
                ));
            }
        }

        match (best, failure) {
            (Some((_, selected)), _) => Ok(Some(selected)),
            (None, Some(failure)) => Err(failure),
            (None, None) => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fetch::EntityKey;
    use crate::fetch::test_support::*;

    fn script_player(harness: &Harness, profiles: &[(Uuid, &str)]) {
        harness.game.respond(
            &EntityKey::player(ALICE),
            Scripted::body(player_with_profiles_json(ALICE, "Alice", profiles)),
        );
    }

    #[tokio::test]
    async fn test_selects_most_recent_save() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_A, "Apple"), (PROFILE_B, "Banana")]);
        harness.game.respond(
            &EntityKey::profile(PROFILE_A),
            Scripted::body(profile_json(PROFILE_A, &[(ALICE, 100), (BOB, 900)])),
        );
        harness.game.respond(
            &EntityKey::profile(PROFILE_B),
            Scripted::body(profile_json(PROFILE_B, &[(ALICE, 500)])),
        );

        let selected = harness
            .orchestrator
            .select_profile(ALICE, last_save)
            .await
            .expect("selection should succeed")
            .expect("a profile should be selected");
        assert_eq!(selected.profile_id, PROFILE_B);
        assert_eq!(selected.cute_name.as_deref(), Some("Banana"));
        assert!(selected.data().is_some());
        // one player call plus one call per profile
        assert_eq!(harness.game.call_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_profiles_are_skipped() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_A, "Apple"), (PROFILE_B, "Banana")]);
        harness.game.respond(
            &EntityKey::profile(PROFILE_A),
            Scripted::body(r#"{"success":true,"profile":null}"#),
        );
        harness.game.respond(
            &EntityKey::profile(PROFILE_B),
            Scripted::body(profile_json(PROFILE_B, &[(ALICE, 500)])),
        );
        let selected = harness
            .orchestrator
            .select_profile(ALICE, last_save)
            .await
            .expect("selection should succeed")
            .expect("a profile should be selected");
        assert_eq!(selected.profile_id, PROFILE_B);
    }

    #[tokio::test]
    async fn test_no_profiles_is_empty() {
        let harness = Harness::new().await;
        script_player(&harness, &[]);
        assert!(
            harness
                .orchestrator
                .select_profile(ALICE, last_save)
                .await
                .expect("selection should succeed")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_absent_player_is_not_found() {
        let harness = Harness::new().await;
        harness
            .game
            .respond(&EntityKey::player(ALICE), Scripted::body(r#"{"success":true,"player":null}"#));
        let result = harness.orchestrator.select_profile(ALICE, last_save).await;
        assert!(matches!(result, Err(FetchError::NotFound)));
        assert_eq!(harness.game.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_profiles_missing_is_empty() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_A, "Apple")]);
        harness.game.respond(&EntityKey::profile(PROFILE_A), Scripted::Status(404, ""));
        assert!(
            harness
                .orchestrator
                .select_profile(ALICE, last_save)
                .await
                .expect("selection should succeed")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_outage_surfaces_when_nothing_succeeded() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_A, "Apple"), (PROFILE_B, "Banana")]);
        harness.game.respond(&EntityKey::profile(PROFILE_A), Scripted::Transport);
        harness.game.respond(&EntityKey::profile(PROFILE_B), Scripted::Status(503, ""));
        assert_eq!(
            harness.orchestrator.select_profile(ALICE, last_save).await.expect_err("should fail"),
            FetchError::UpstreamUnavailable
        );
    }

    #[tokio::test]
    async fn test_outage_is_ignored_when_another_profile_succeeded() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_A, "Apple"), (PROFILE_B, "Banana")]);
        harness.game.respond(&EntityKey::profile(PROFILE_A), Scripted::Transport);
        harness.game.respond(
            &EntityKey::profile(PROFILE_B),
            Scripted::body(profile_json(PROFILE_B, &[(ALICE, 1)])),
        );
        let selected = harness
            .orchestrator
            .select_profile(ALICE, last_save)
            .await
            .expect("selection should succeed")
            .expect("a profile should be selected");
        assert_eq!(selected.profile_id, PROFILE_B);
    }

    #[tokio::test]
    async fn test_ties_go_to_smallest_profile_id() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_B, "Banana"), (PROFILE_A, "Apple")]);
        harness.game.respond(
            &EntityKey::profile(PROFILE_A),
            Scripted::body(profile_json(PROFILE_A, &[(ALICE, 7)])),
        );
        harness.game.respond(
            &EntityKey::profile(PROFILE_B),
            Scripted::body(profile_json(PROFILE_B, &[(ALICE, 7)])),
        );
        let selected = harness
            .orchestrator
            .select_profile(ALICE, last_save)
            .await
            .expect("selection should succeed")
            .expect("a profile should be selected");
        assert_eq!(selected.profile_id, PROFILE_A);
    }

    #[tokio::test]
    async fn test_caller_supplied_scorer() {
        let harness = Harness::new().await;
        script_player(&harness, &[(PROFILE_A, "Apple"), (PROFILE_B, "Banana")]);
        harness.game.respond(
            &EntityKey::profile(PROFILE_A),
            Scripted::body(profile_json(PROFILE_A, &[(ALICE, 900), (BOB, 1)])),
        );
        harness.game.respond(
            &EntityKey::profile(PROFILE_B),
            Scripted::body(profile_json(PROFILE_B, &[(ALICE, 100)])),
        );
        // fewest co-op members wins
        let selected = harness
            .orchestrator
            .select_profile(ALICE, |profile, _member| std::cmp::Reverse(profile.members.len()))
            .await
            .expect("selection should succeed")
            .expect("a profile should be selected");
        assert_eq!(selected.profile_id, PROFILE_B);
    }

    #[test]
    fn test_last_save_of_absent_member() {
        let profile: ProfileReply = serde_json::from_str(&profile_json(PROFILE_A, &[(ALICE, 42)])).expect("valid json");
        let profile = profile.profile.expect("profile present");
        assert_eq!(last_save(&profile, ALICE), 42);
        assert_eq!(last_save(&profile, BOB), i64::MIN);
    }
}
