// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Hypixel API and leaderboard service calls

mod dto;

use super::{GameApi, UpstreamError, UpstreamResult};
use crate::credential::Credential;
use crate::fetch::{EntityKey, EntityKind};
pub use dto::{
    Auction, AuctionsReply, BazaarProduct, Envelope, Guild, GuildLeaderboard, GuildMember, GuildReply,
    LeaderboardGuild, LeaderboardPlayer, MarketReply, Member, Player, PlayerLeaderboard, PlayerReply, Profile,
    ProfileRef, ProfileReply, QuickStatus,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{RequestBuilder, header};
use tracing::debug;

const HYPIXEL_BASE_URL: &str = "https://api.hypixel.net";
pub const LEADERBOARD_SERVICE: &str = "leaderboard service";

/// Talks to Hypixel, plus the leaderboard service if one is configured
#[derive(Clone)]
pub struct HypixelClient {
    client: reqwest::Client,
    leaderboard_uri: Option<String>,
}

impl HypixelClient {
    pub fn new(leaderboard_uri: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            client: super::build_client()?,
            leaderboard_uri,
        })
    }

    /// Base URI of the leaderboard service, without trailing slash
    fn leaderboard_uri(&self) -> UpstreamResult<&str> {
        self.leaderboard_uri
            .as_deref()
            .map(|uri| uri.trim_end_matches('/'))
            .ok_or(UpstreamError::NotConfigured(LEADERBOARD_SERVICE))
    }

    /// Build the request for a key, returning the endpoint name used in errors alongside it
    fn request(&self, key: &EntityKey) -> UpstreamResult<(&'static str, RequestBuilder)> {
        let id = key.id();
        let request = match key.kind() {
            EntityKind::Player => {
                let endpoint = "/player";
                (endpoint, self.hypixel_get(endpoint).query(&[("uuid", id)]))
            }
            EntityKind::Profile => {
                let endpoint = "/skyblock/profile";
                (endpoint, self.hypixel_get(endpoint).query(&[("profile", id)]))
            }
            EntityKind::Guild => {
                let endpoint = "/guild";
                (endpoint, self.hypixel_get(endpoint).query(&[("name", id)]))
            }
            EntityKind::GuildOfPlayer => {
                let endpoint = "/guild";
                (endpoint, self.hypixel_get(endpoint).query(&[("player", id)]))
            }
            EntityKind::Market => {
                let endpoint = "/skyblock/bazaar";
                (endpoint, self.hypixel_get(endpoint))
            }
            EntityKind::Auctions => {
                let endpoint = "/skyblock/auction";
                (endpoint, self.hypixel_get(endpoint).query(&[("profile", id)]))
            }
            EntityKind::LeaderboardPlayers => {
                let endpoint = "/leaderboard/players";
                let base = self.leaderboard_uri()?;
                let url = if id.is_empty() {
                    format!("{base}/players")
                } else {
                    format!("{base}/players/{}", utf8_percent_encode(id, NON_ALPHANUMERIC))
                };
                (endpoint, self.client.get(url))
            }
            EntityKind::LeaderboardGuilds => {
                let endpoint = "/leaderboard/guilds";
                let base = self.leaderboard_uri()?;
                (endpoint, self.client.get(base))
            }
        };
        Ok(request)
    }

    fn hypixel_get(&self, endpoint: &str) -> RequestBuilder {
        self.client.get(format!("{HYPIXEL_BASE_URL}{endpoint}"))
    }
}

/// Get extra headers needed for Hypixel API calls
fn get_headers(credential: &Credential) -> header::HeaderMap {
    let mut header_map = header::HeaderMap::new();
    // a hyphenated uuid is always a valid header value
    if let Ok(mut api_key) = header::HeaderValue::try_from(credential.header_value()) {
        api_key.set_sensitive(true);
        header_map.insert("API-Key", api_key);
    }
    header_map
}

impl GameApi for HypixelClient {
    async fn fetch(&self, credential: Option<Credential>, key: &EntityKey) -> UpstreamResult<String> {
        let (endpoint, mut request) = self.request(key)?;
        if let Some(credential) = credential.as_ref() {
            request = request.headers(get_headers(credential));
        }
        debug!("GET {endpoint} for {key}");
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::from_request(endpoint, e))?;
        if response.status().is_success() {
            response.text().await.map_err(|e| UpstreamError::from_read(endpoint, e))
        } else {
            Err(UpstreamError::from_response(endpoint, response).await)
        }
    }
}
