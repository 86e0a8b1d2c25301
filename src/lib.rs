// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Tiered fetch/cache core of a Hypixel SkyBlock assistant. Every read goes through [`fetch::Orchestrator`], which
//! answers from memory, then sqlite, then upstream.

pub mod cache;
pub mod credential;
pub mod db;
pub mod error;
pub mod fetch;
pub mod http;
pub mod time;
mod util;

/// constants generated in build.rs
pub mod constants {
    include!(env!("CONSTANTS_PATH"));
}
