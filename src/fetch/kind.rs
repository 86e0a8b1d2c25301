// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! The fixed set of fetchable entity kinds and the cache policy for each.

use crate::cache::Expiry;
use crate::db::RecordTable;
use serde::de::DeserializeOwned;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use uuid::Uuid;

const MINUTE: u64 = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    Player,
    Profile,
    Guild,
    /// A guild looked up by one of its members
    GuildOfPlayer,
    Market,
    /// A profile's active auctions
    Auctions,
    LeaderboardPlayers,
    LeaderboardGuilds,
}

/// Where a kind is persisted, and how long a persisted record stays fresh
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Persistence {
    pub table: RecordTable,
    pub window: Duration,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Player,
        EntityKind::Profile,
        EntityKind::Guild,
        EntityKind::GuildOfPlayer,
        EntityKind::Market,
        EntityKind::Auctions,
        EntityKind::LeaderboardPlayers,
        EntityKind::LeaderboardGuilds,
    ];

    /// Position in [`EntityKind::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Profile => "profile",
            EntityKind::Guild => "guild",
            EntityKind::GuildOfPlayer => "guild-of-player",
            EntityKind::Market => "market",
            EntityKind::Auctions => "auctions",
            EntityKind::LeaderboardPlayers => "leaderboard-players",
            EntityKind::LeaderboardGuilds => "leaderboard-guilds",
        }
    }

    /// How long a memory-tier record is served after it was written
    pub const fn memory_ttl(self) -> Duration {
        match self {
            EntityKind::Player
            | EntityKind::Profile
            | EntityKind::Guild
            | EntityKind::GuildOfPlayer
            | EntityKind::Market => Duration::from_secs(90),
            EntityKind::Auctions => Duration::from_secs(MINUTE),
            EntityKind::LeaderboardPlayers | EntityKind::LeaderboardGuilds => Duration::from_secs(30 * MINUTE),
        }
    }

    /// Game-state snapshots always re-validate after a fixed age, no matter how often they're read.
    pub const fn memory_expiry(self) -> Expiry {
        Expiry::AfterWrite(self.memory_ttl())
    }

    /// `None` for memory-only kinds
    pub const fn persistence(self) -> Option<Persistence> {
        match self {
            EntityKind::Player => Some(Persistence {
                table: RecordTable::Player,
                window: Duration::from_secs(30 * MINUTE),
            }),
            EntityKind::Profile => Some(Persistence {
                table: RecordTable::Profile,
                window: Duration::from_secs(5 * MINUTE),
            }),
            EntityKind::Guild => Some(Persistence {
                table: RecordTable::Guild,
                window: Duration::from_secs(30 * MINUTE),
            }),
            EntityKind::GuildOfPlayer
            | EntityKind::Market
            | EntityKind::Auctions
            | EntityKind::LeaderboardPlayers
            | EntityKind::LeaderboardGuilds => None,
        }
    }

    /// Leaderboards come from a separate service that doesn't take Hypixel keys
    pub const fn needs_credential(self) -> bool {
        !matches!(self, EntityKind::LeaderboardPlayers | EntityKind::LeaderboardGuilds)
    }

    /// Kinds whose id is a user-typed name rather than a uuid
    const fn is_name_keyed(self) -> bool {
        matches!(self, EntityKind::Guild)
    }

    /// Kinds whose id is a player or profile uuid
    const fn is_uuid_keyed(self) -> bool {
        matches!(
            self,
            EntityKind::Player | EntityKind::Profile | EntityKind::GuildOfPlayer | EntityKind::Auctions
        )
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What is being fetched. Ids are normalized on construction, so two keys naming the same entity compare equal.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntityKey {
    kind: EntityKind,
    id: String,
}

impl EntityKey {
    /// Build a key from a raw id. Ids are trimmed, names are lower-cased, and anything that parses as a uuid is
    /// rendered in simple form.
    pub fn new(kind: EntityKind, id: &str) -> Self {
        let id = id.trim();
        let id = if kind.is_uuid_keyed() {
            match Uuid::try_parse(id) {
                Ok(uuid) => uuid.simple().to_string(),
                Err(_) => id.to_lowercase(),
            }
        } else if kind.is_name_keyed() {
            id.to_lowercase()
        } else {
            id.to_string()
        };
        Self { kind, id }
    }

    fn from_uuid(kind: EntityKind, uuid: Uuid) -> Self {
        Self {
            kind,
            id: uuid.simple().to_string(),
        }
    }

    pub fn player(uuid: Uuid) -> Self {
        Self::from_uuid(EntityKind::Player, uuid)
    }

    pub fn profile(profile_id: Uuid) -> Self {
        Self::from_uuid(EntityKind::Profile, profile_id)
    }

    pub fn guild(name: &str) -> Self {
        Self::new(EntityKind::Guild, name)
    }

    pub fn guild_of_player(uuid: Uuid) -> Self {
        Self::from_uuid(EntityKind::GuildOfPlayer, uuid)
    }

    pub fn market() -> Self {
        Self::new(EntityKind::Market, "")
    }

    pub fn auctions(profile_id: Uuid) -> Self {
        Self::from_uuid(EntityKind::Auctions, profile_id)
    }

    /// The global player leaderboard, or one guild's players
    pub fn leaderboard_players(guild_id: Option<&str>) -> Self {
        Self::new(EntityKind::LeaderboardPlayers, guild_id.unwrap_or_default())
    }

    pub fn leaderboard_guilds() -> Self {
        Self::new(EntityKind::LeaderboardGuilds, "")
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.id)
        }
    }
}

/// A parsed upstream payload
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    /// `false` if upstream answered but the entity doesn't exist, like `"player": null`
    fn is_present(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_persistent_window_covers_memory_ttl() {
        for kind in EntityKind::ALL {
            if let Some(persistence) = kind.persistence() {
                assert!(
                    persistence.window >= kind.memory_ttl(),
                    "{kind} persists for {:?} but lives in memory for {:?}",
                    persistence.window,
                    kind.memory_ttl()
                );
            }
        }
    }

    #[test]
    fn test_index_matches_all() {
        for (index, kind) in EntityKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), index);
        }
    }

    #[test]
    fn test_only_leaderboards_skip_credentials() {
        let without: Vec<_> = EntityKind::ALL
            .into_iter()
            .filter(|kind| !kind.needs_credential())
            .collect();
        assert_eq!(without, [EntityKind::LeaderboardPlayers, EntityKind::LeaderboardGuilds]);
    }

    #[test]
    fn test_guild_name_is_case_normalized() {
        assert_eq!(EntityKey::guild("  Sky Legends "), EntityKey::guild("sky legends"));
        assert_eq!(EntityKey::guild("Sky Legends").id(), "sky legends");
    }

    #[test]
    fn test_uuid_forms_normalize() {
        let dashed = EntityKey::new(EntityKind::Player, "069A79F4-44E9-4726-A5BE-FCA90E38AAF5");
        let simple = EntityKey::new(EntityKind::Player, "069a79f444e94726a5befca90e38aaf5");
        assert_eq!(dashed, simple);
        assert_eq!(simple.id(), "069a79f444e94726a5befca90e38aaf5");
    }

    #[test]
    fn test_same_id_different_kind_differs() {
        let uuid = Uuid::from_u128(7);
        assert_ne!(EntityKey::player(uuid), EntityKey::profile(uuid));
    }

    #[test]
    fn test_display() {
        assert_eq!(EntityKey::market().to_string(), "market");
        assert_eq!(EntityKey::guild("Foo").to_string(), "guild:foo");
    }
}
