// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Round-robin pool of Hypixel API keys

use crate::error::AssistError;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};
use uuid::Uuid;

/// A single Hypixel API key. Hypixel keys are UUIDs, which is the only shape check we can do offline.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Credential(Uuid);

impl Credential {
    /// Parse a key, or `None` if it isn't shaped like a Hypixel key.
    pub fn parse(token: &str) -> Option<Self> {
        Uuid::try_parse(token.trim()).ok().map(Self)
    }

    /// Value for the `API-Key` header
    pub fn header_value(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

/// Never print a full key: logs end up in bug reports.
impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let simple = self.0.simple().to_string();
        let suffix = simple.get(simple.len().saturating_sub(4)..).unwrap_or_default();
        write!(f, "Credential(…{suffix})")
    }
}

/// Hands out credentials in a fixed cycle. A rate-limited key is still handed out on its turn: upstream failures
/// are the classifier's problem, not the pool's.
pub struct CredentialPool {
    credentials: Vec<Credential>,
    index: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool from raw tokens. Malformed and duplicate tokens are dropped; if nothing survives that is a fatal
    /// configuration error.
    pub fn new<I, S>(tokens: I) -> Result<Self, AssistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut credentials: Vec<Credential> = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            match Credential::parse(token) {
                Some(credential) => {
                    if credentials.contains(&credential) {
                        warn!("API key {:?} was configured twice, the duplicate was skipped", credential);
                    } else {
                        credentials.push(credential);
                    }
                }
                None => {
                    warn!("an API key of length {} is not a valid UUID, the key was skipped", token.len());
                }
            }
        }

        if credentials.is_empty() {
            Err(AssistError::new(
                "no valid Hypixel API keys are configured. Add one with the `credential add` subcommand.",
            ))
        } else {
            info!("credential pool loaded with {} keys", credentials.len());
            Ok(Self {
                credentials,
                index: AtomicUsize::new(0),
            })
        }
    }

    /// Next credential in the cycle. Safe to call from any number of tasks at once.
    pub fn next(&self) -> Credential {
        let len = self.credentials.len();
        // fetch_update only errors if the closure returns None, which it never does
        let index = match self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |index| Some((index + 1) % len))
        {
            Ok(index) | Err(index) => index,
        };
        self.credentials[index]
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl Debug for CredentialPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
