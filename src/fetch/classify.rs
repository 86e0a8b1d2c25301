// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Turns raw upstream failures into the small set of outcomes callers act on

use crate::http::UpstreamError;
use crate::util::generate_nonce;
use reqwest::StatusCode;
use std::fmt::{Display, Formatter};
use tracing::{debug, error, warn};

/// Causes Hypixel reports when a key or the name service is rate limited
const THROTTLE_CAUSES: [&str; 2] = ["Key throttle", "You have already looked up this name recently"];
/// Causes Hypixel reports for a well-formed request about nothing
const NOT_FOUND_CAUSES: [&str; 2] = ["Malformed UUID", "No player by that name"];

/// Why a fetch failed. `Display` is the text to show an end user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FetchError {
    /// Transient: connection or TLS trouble, rate limits, upstream 5xx. Worth retrying later.
    UpstreamUnavailable,
    /// The request was fine but there is no such entity
    NotFound,
    /// Show this message verbatim
    UserFacing(String),
    /// Logged in full under this nonce; end users get a generic message carrying it
    Unknown { nonce: u64 },
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::UpstreamUnavailable => {
                write!(f, "The Hypixel API is unavailable right now, please try again in a minute.")
            }
            FetchError::NotFound => write!(f, "Nothing was found."),
            FetchError::UserFacing(message) => f.write_str(message),
            FetchError::Unknown { nonce } => write!(
                f,
                "An unexpected error has occurred, please try again later. If this keeps happening report it with error code `{nonce:016X}`"
            ),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    pub fn user_facing(message: impl Into<String>) -> Self {
        Self::UserFacing(message.into())
    }

    /// Classify a failure that happened while fetching `subject`, logging it according to its class
    pub fn classify(subject: &dyn Display, error: &UpstreamError) -> Self {
        let classified = Self::class_of(error);
        match &classified {
            FetchError::UpstreamUnavailable => warn!("upstream unavailable while fetching {}: {}", subject, error),
            FetchError::Unknown { nonce } => {
                error!("NONCE[{:016X}] unexpected failure while fetching {}: {:?}", nonce, subject, error)
            }
            FetchError::NotFound | FetchError::UserFacing(_) => {
                debug!("fetching {} gave an expected failure: {}", subject, error)
            }
        }
        classified
    }

    fn class_of(error: &UpstreamError) -> Self {
        if let UpstreamError::NotConfigured(service) = error {
            return Self::UserFacing(format!("The {service} is not configured"));
        }
        if error.is_transport() {
            return Self::UpstreamUnavailable;
        }
        if let Some(cause) = error.cause() {
            if THROTTLE_CAUSES.contains(&cause) {
                return Self::UpstreamUnavailable;
            }
            if NOT_FOUND_CAUSES.contains(&cause) {
                return Self::NotFound;
            }
        }
        match error.status_code() {
            Some(StatusCode::TOO_MANY_REQUESTS) => Self::UpstreamUnavailable,
            Some(status) if status.is_server_error() => Self::UpstreamUnavailable,
            Some(StatusCode::NOT_FOUND) => Self::NotFound,
            _ => Self::Unknown {
                nonce: generate_nonce(),
            },
        }
    }
}
