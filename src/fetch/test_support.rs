// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Scripted upstreams and a ready-made orchestrator for unit tests

use super::{EntityKey, Fetched, Orchestrator};
use crate::credential::{Credential, CredentialPool};
use crate::db::AssistDb;
use crate::http::hypixel::PlayerReply;
use crate::http::mojang::MojangProfile;
use crate::http::{GameApi, IdentityApi, UpstreamError, UpstreamResult};
use crate::time::{ManualClock, SimpleTime};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

pub const ALICE: Uuid = Uuid::from_u128(0x0a11ce00_0000_4000_8000_000000000001);
pub const BOB: Uuid = Uuid::from_u128(0x0b0b0000_0000_4000_8000_000000000002);
pub const PROFILE_A: Uuid = Uuid::from_u128(0x0aaaaaaa_0000_4000_8000_00000000000a);
pub const PROFILE_B: Uuid = Uuid::from_u128(0x0bbbbbbb_0000_4000_8000_00000000000b);

const KEY_ONE: &str = "11111111-1111-4111-8111-111111111111";
const KEY_TWO: &str = "22222222-2222-4222-8222-222222222222";

/// A connection failure, produced without touching the network
pub async fn transport_error() -> UpstreamError {
    match reqwest::Client::new().get("not a url").send().await {
        Ok(response) => panic!("request to an invalid URL should fail, got {response:?}"),
        Err(e) => UpstreamError::from_request("/test", e),
    }
}

/// What the fake upstream answers for a key
#[derive(Clone, Debug)]
pub enum Scripted {
    /// HTTP 200 with this body
    Body(String),
    /// Connection failure
    Transport,
    /// Non-2xx with this body
    Status(u16, &'static str),
    Error(fn() -> UpstreamError),
}

impl Scripted {
    pub fn body(body: impl Into<String>) -> Self {
        Self::Body(body.into())
    }

    async fn play(self) -> UpstreamResult<String> {
        match self {
            Scripted::Body(body) => Ok(body),
            Scripted::Transport => Err(transport_error().await),
            Scripted::Status(code, body) => {
                let code = StatusCode::from_u16(code).expect("valid status code");
                Err(UpstreamError::from_status("/test", code, body))
            }
            Scripted::Error(make) => Err(make()),
        }
    }
}

type Call = (Option<Credential>, EntityKey);

/// Game API double. Clones share their script and call log.
#[derive(Clone)]
pub struct FakeGameApi {
    responses: Arc<Mutex<HashMap<EntityKey, Scripted>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    /// `true` while calls may complete
    gate: Arc<watch::Sender<bool>>,
}

impl Default for FakeGameApi {
    fn default() -> Self {
        Self {
            responses: Default::default(),
            calls: Default::default(),
            gate: Arc::new(watch::Sender::new(true)),
        }
    }
}

impl FakeGameApi {
    pub fn respond(&self, key: &EntityKey, scripted: Scripted) {
        self.responses
            .lock()
            .expect("lock poisoned")
            .insert(key.clone(), scripted);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock poisoned").len()
    }

    /// Make calls wait after they are recorded, until [`FakeGameApi::release`]
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.call_count() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("calls should arrive");
    }
}

impl GameApi for FakeGameApi {
    async fn fetch(&self, credential: Option<Credential>, key: &EntityKey) -> UpstreamResult<String> {
        self.calls
            .lock()
            .expect("lock poisoned")
            .push((credential, key.clone()));
        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open).await.expect("gate sender lives in self");
        let scripted = self
            .responses
            .lock()
            .expect("lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_else(|| Scripted::Status(404, r#"{"success":false,"cause":"not scripted"}"#));
        scripted.play().await
    }
}

/// Name service double. Unscripted names belong to nobody.
#[derive(Clone, Default)]
pub struct FakeIdentityApi {
    /// lower-cased name → owner
    responses: Arc<Mutex<HashMap<String, Option<Uuid>>>>,
    failing: Arc<Mutex<bool>>,
    calls: Arc<Mutex<usize>>,
}

impl FakeIdentityApi {
    pub fn respond(&self, name: &str, unique_id: Option<Uuid>) {
        self.responses
            .lock()
            .expect("lock poisoned")
            .insert(name.to_lowercase(), unique_id);
    }

    /// Every later lookup fails to connect
    pub fn fail(&self) {
        *self.failing.lock().expect("lock poisoned") = true;
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().expect("lock poisoned")
    }
}

impl IdentityApi for FakeIdentityApi {
    async fn lookup(&self, name: &str) -> UpstreamResult<Option<MojangProfile>> {
        *self.calls.lock().expect("lock poisoned") += 1;
        let failing = *self.failing.lock().expect("lock poisoned");
        if failing {
            return Err(transport_error().await);
        }
        let owner = self
            .responses
            .lock()
            .expect("lock poisoned")
            .get(&name.to_lowercase())
            .copied()
            .flatten();
        Ok(owner.map(|id| MojangProfile {
            id,
            name: name.to_string(),
        }))
    }
}

/// An orchestrator over fakes, an in-memory db, a two-key pool and a hand-driven clock
pub struct Harness {
    pub orchestrator: Orchestrator<FakeGameApi, FakeIdentityApi>,
    pub game: FakeGameApi,
    pub identity: FakeIdentityApi,
    pub clock: ManualClock,
}

impl Harness {
    pub async fn new() -> Self {
        let game = FakeGameApi::default();
        let identity = FakeIdentityApi::default();
        let clock = ManualClock::starting_at(SimpleTime::from_unix_millis(1_700_000_000_000));
        let db = AssistDb::open_in_memory().await.expect("db should open");
        let credentials = CredentialPool::new([KEY_ONE, KEY_TWO]).expect("pool should build");
        let orchestrator = Orchestrator::new(
            game.clone(),
            identity.clone(),
            credentials,
            db,
            Arc::new(clock.clone()),
        );
        Self {
            orchestrator,
            game,
            identity,
            clock,
        }
    }
}

pub fn player_json(unique_id: Uuid, name: &str) -> String {
    player_with_profiles_json(unique_id, name, &[])
}

pub fn player_with_profiles_json(unique_id: Uuid, name: &str, profiles: &[(Uuid, &str)]) -> String {
    let profiles: serde_json::Map<String, serde_json::Value> = profiles
        .iter()
        .map(|(profile_id, cute_name)| {
            (
                profile_id.simple().to_string(),
                serde_json::json!({"profile_id": profile_id.simple().to_string(), "cute_name": cute_name}),
            )
        })
        .collect();
    serde_json::json!({
        "success": true,
        "player": {
            "uuid": unique_id.simple().to_string(),
            "displayname": name,
            "stats": {"SkyBlock": {"profiles": profiles}},
        },
    })
    .to_string()
}

/// A profile whose members last saved at the given unix millis
pub fn profile_json(profile_id: Uuid, members: &[(Uuid, i64)]) -> String {
    let members: serde_json::Map<String, serde_json::Value> = members
        .iter()
        .map(|(member, last_save)| (member.simple().to_string(), serde_json::json!({"last_save": last_save})))
        .collect();
    serde_json::json!({
        "success": true,
        "profile": {"profile_id": profile_id.simple().to_string(), "members": members},
    })
    .to_string()
}

pub fn display_name(fetched: &Fetched<PlayerReply>) -> Option<&str> {
    fetched.entity.player.as_ref()?.display_name.as_deref()
}
