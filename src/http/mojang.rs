// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Mojang name lookup: the last resort for turning a player name into a unique id

use super::{IdentityApi, UpstreamError, UpstreamResult};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

const MOJANG_BASE_URL: &str = "https://api.mojang.com";
const ENDPOINT: &str = "/users/profiles/minecraft";

/// A resolved name, with the capitalization Mojang has on file
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct MojangProfile {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone)]
pub struct MojangClient {
    client: reqwest::Client,
}

impl MojangClient {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self {
            client: super::build_client()?,
        })
    }

    fn url(name: &str) -> String {
        format!("{MOJANG_BASE_URL}{ENDPOINT}/{}", utf8_percent_encode(name, NON_ALPHANUMERIC))
    }
}

impl IdentityApi for MojangClient {
    async fn lookup(&self, name: &str) -> UpstreamResult<Option<MojangProfile>> {
        let response = self
            .client
            .get(Self::url(name))
            .send()
            .await
            .map_err(|e| UpstreamError::from_request(ENDPOINT, e))?;
        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| UpstreamError::from_read(ENDPOINT, e))?;
                let profile = serde_json::from_slice(&bytes).map_err(UpstreamError::from_json)?;
                Ok(Some(profile))
            }
            _ => Err(UpstreamError::from_response(ENDPOINT, response).await),
        }
    }
}
