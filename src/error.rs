// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use sqlx::error::Error as SqlxError;
use std::fmt::{Display, Formatter};

pub type AssistResult<T> = Result<T, AssistError>;

/// Failures of the local parts of the system: the database and startup configuration.
///
/// Upstream failures never become one of these; they are classified into
/// [`FetchError`](crate::fetch::FetchError) instead.
#[derive(Debug)]
#[allow(unused)] // these are debug printed frequently
pub enum AssistError {
    Message(String),
    Sqlx(SqlxError),
}

impl Display for AssistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistError::Message(message) => f.write_str(message.as_str()),
            AssistError::Sqlx(_) => write!(f, "DB error"),
        }
    }
}

/// mark the normal Display impl as being safe
impl<'a> SafeDisplay<'a, &'a Self> for AssistError {
    fn safe_display(&'a self) -> &'a Self {
        self
    }
}

impl From<SqlxError> for AssistError {
    fn from(e: SqlxError) -> Self {
        Self::Sqlx(e)
    }
}

impl std::error::Error for AssistError {}

impl AssistError {
    /// `message` is a message that is safe to display to a user
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self::Message(message.into())
    }
}

/// A type with an alternate Display implementation that is safe to display to untrusted users
pub trait SafeDisplay<'a, T>
where
    T: Display,
{
    fn safe_display(&'a self) -> T;
}
