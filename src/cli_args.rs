// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use clap::{Args, Parser, Subcommand};
use skyblock_assistant::constants::CLAP_VERSION;
use std::path::PathBuf;

/// Fetch and cache backend for a Hypixel SkyBlock assistant.
/// If ran with no subcommands the background jobs will start.
#[derive(Parser)]
#[command(version = CLAP_VERSION, long_about, author)]
pub struct AssistArgs {
    /// Path of the sqlite database
    #[arg(long, global = true, env = "SKYBLOCK_DB", default_value = "skyblock-assistant.sqlite")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Modify the stored Hypixel API keys
    Credential(CredentialArgs),
    /// Set the base URI of the leaderboard service and exit
    LeaderboardUri {
        /// e.g. `https://leaderboard.example/api`
        uri: String,
    },
    /// Print cache statistics
    Status,
    #[command(flatten)]
    Lookup(LookupCommand),
}

/// One-shot lookups through the cache tiers
#[derive(Subcommand)]
pub enum LookupCommand {
    /// Print the unique id of a player name
    Uuid { name: String },
    /// Print the current name of a unique id
    Username { unique_id: String },
    /// Print a player's raw Hypixel data
    Player { name: String },
    /// Print the raw data of a player's most recently played profile
    Profile { name: String },
    /// Print a guild's raw data
    Guild { name: String },
}

#[derive(Args)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub command: CredentialCommand,
}

#[derive(Subcommand)]
pub enum CredentialCommand {
    /// Add an API key
    Add {
        /// Hypixel API key. Depending on execution environment it may not be secure to pass secrets as a command-line
        /// argument. Instead, you may provide it with the `HYPIXEL_API_KEY` environment variable.
        #[arg(env = "HYPIXEL_API_KEY", hide_env_values = true)]
        token: String,
    },
    /// Remove an API key
    Rm { token: String },
    /// List API keys
    Ls,
}
