// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! HTTP API calls

mod error;
pub mod hypixel;
pub mod mojang;

use crate::constants;
use crate::credential::Credential;
use crate::fetch::EntityKey;
pub use error::{HttpBody, HttpResponse, RedactedUpstreamError, ReqwestError, UpstreamError, UpstreamResult};
use std::time::Duration;

/// Shared client settings. There is no total timeout; callers apply their own.
fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(constants::USER_AGENT)
        .gzip(true)
        .connect_timeout(Duration::from_secs(6))
        // .connection_verbose(true) // useful for debugging
        .build()
}

/// The game API as the orchestrator sees it: one read per entity key, answering with the raw JSON body
pub trait GameApi: Send + Sync + 'static {
    /// `credential` is `None` for kinds that don't take one
    fn fetch(
        &self,
        credential: Option<Credential>,
        key: &EntityKey,
    ) -> impl Future<Output = UpstreamResult<String>> + Send;
}

/// The external name service. `Ok(None)` means the name belongs to nobody.
pub trait IdentityApi: Send + Sync + 'static {
    fn lookup(&self, name: &str) -> impl Future<Output = UpstreamResult<Option<mojang::MojangProfile>>> + Send;
}
