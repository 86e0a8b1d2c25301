// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Response shapes for the Hypixel API and the leaderboard service. Only the fields this crate reads are typed;
//! consumers that need more parse the raw payload carried next to the entity.

use crate::fetch::Entity;
use crate::http::UpstreamError;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// The fields every reply shares. Hypixel sets `success` and `cause`; the leaderboard service sets `status`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    status: Option<u16>,
}

impl Envelope {
    /// Check a 2xx body for a logical failure
    pub fn check(endpoint: &'static str, payload: &str) -> Result<(), UpstreamError> {
        let envelope: Envelope = serde_json::from_str(payload).map_err(UpstreamError::from_json)?;
        let failed = envelope.success == Some(false) || envelope.status.is_some_and(|status| status != 200);
        if failed {
            let cause = envelope.cause.unwrap_or_else(|| match envelope.status {
                Some(status) => format!("status {status}"),
                None => "no cause given".to_string(),
            });
            Err(UpstreamError::Logical { endpoint, cause })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayerReply {
    #[serde(default)]
    pub player: Option<Player>,
}

impl PlayerReply {
    /// SkyBlock profiles of the player, empty if the player is absent
    pub fn profiles(&self) -> impl Iterator<Item = &ProfileRef> {
        self.player.iter().flat_map(Player::profiles)
    }
}

impl Entity for PlayerReply {
    fn is_present(&self) -> bool {
        self.player.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct Player {
    pub uuid: Uuid,
    #[serde(rename = "displayname", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    stats: PlayerStats,
}

impl Player {
    /// The player's SkyBlock profiles
    pub fn profiles(&self) -> impl Iterator<Item = &ProfileRef> {
        self.stats
            .skyblock
            .iter()
            .flat_map(|skyblock| skyblock.profiles.values())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlayerStats {
    #[serde(rename = "SkyBlock", default)]
    skyblock: Option<SkyBlockStats>,
}

#[derive(Debug, Deserialize)]
struct SkyBlockStats {
    #[serde(default)]
    profiles: HashMap<String, ProfileRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileRef {
    pub profile_id: Uuid,
    /// The fruit name shown in game
    #[serde(default)]
    pub cute_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileReply {
    #[serde(default)]
    pub profile: Option<Profile>,
}

impl Entity for ProfileReply {
    fn is_present(&self) -> bool {
        self.profile.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub profile_id: Uuid,
    /// Keyed by member uuid in simple form
    #[serde(default)]
    pub members: HashMap<String, Member>,
}

impl Profile {
    pub fn member(&self, unique_id: Uuid) -> Option<&Member> {
        self.members.get(unique_id.simple().to_string().as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct Member {
    /// unix millis of the member's last save on this profile
    #[serde(default)]
    pub last_save: Option<i64>,
    /// Everything else, for the progress scorers
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct GuildReply {
    #[serde(default)]
    pub guild: Option<Guild>,
}

impl Entity for GuildReply {
    fn is_present(&self) -> bool {
        self.guild.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct Guild {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<GuildMember>,
}

#[derive(Debug, Deserialize)]
pub struct GuildMember {
    pub uuid: Uuid,
    #[serde(default)]
    pub rank: Option<String>,
    /// unix millis
    #[serde(default)]
    pub joined: Option<i64>,
}

/// Bazaar snapshot
#[derive(Debug, Deserialize)]
pub struct MarketReply {
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub products: HashMap<String, BazaarProduct>,
}

impl Entity for MarketReply {}

#[derive(Debug, Deserialize)]
pub struct BazaarProduct {
    pub product_id: String,
    #[serde(default)]
    pub quick_status: Option<QuickStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuickStatus {
    pub sell_price: f64,
    pub sell_volume: f64,
    pub sell_moving_week: f64,
    pub sell_orders: f64,
    pub buy_price: f64,
    pub buy_volume: f64,
    pub buy_moving_week: f64,
    pub buy_orders: f64,
}

#[derive(Debug, Deserialize)]
pub struct AuctionsReply {
    #[serde(default)]
    pub auctions: Vec<Auction>,
}

impl Entity for AuctionsReply {}

#[derive(Debug, Deserialize)]
pub struct Auction {
    pub uuid: String,
    pub item_name: String,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub starting_bid: i64,
    #[serde(default)]
    pub highest_bid_amount: i64,
    /// unix millis
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub claimed: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlayerLeaderboard {
    #[serde(default)]
    pub data: Vec<LeaderboardPlayer>,
}

impl Entity for PlayerLeaderboard {}

#[derive(Debug, Deserialize)]
pub struct LeaderboardPlayer {
    pub uuid: Uuid,
    pub username: String,
    #[serde(default)]
    pub average_skill: f64,
    #[serde(default)]
    pub total_slayer: f64,
}

#[derive(Debug, Deserialize)]
pub struct GuildLeaderboard {
    #[serde(default)]
    pub data: Vec<LeaderboardGuild>,
}

impl Entity for GuildLeaderboard {}

#[derive(Debug, Deserialize)]
pub struct LeaderboardGuild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: u32,
    #[serde(default)]
    pub average_skill: f64,
    #[serde(default)]
    pub average_slayer: f64,
    #[serde(default)]
    pub average_catacomb: f64,
}
