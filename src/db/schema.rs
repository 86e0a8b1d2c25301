// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::db::helper;
use crate::error::AssistError;
use sqlx::{Executor, SqliteConnection};
use tokio::time::Instant;
use tracing::debug;

const SCHEMA_VERSION_KEY: &str = "schema_version";
/// Increment this if there is a schema change
const SCHEMA_VERSION_VALUE: i32 = 1;

/// Set up the database
pub(super) async fn init(connection: &mut SqliteConnection) -> Result<(), AssistError> {
    let start = Instant::now();

    // simple key-value settings
    connection
        .execute(
            r#"CREATE TABLE IF NOT EXISTS "settings" (
                   key    TEXT NOT NULL PRIMARY KEY,
                   value  ANY NOT NULL
               ) STRICT WITHOUT ROWID"#,
        )
        .await?;

    // Hypixel API keys
    connection
        .execute(
            r#"CREATE TABLE IF NOT EXISTS credential (
                   token               TEXT NOT NULL PRIMARY KEY,
                   created_at_unix_ms  INTEGER NOT NULL
               ) STRICT WITHOUT ROWID"#,
        )
        .await?;

    // one payload cache table per persisted entity kind
    for table in ["player", "profile", "guild"] {
        connection
            .execute(
                format!(
                    r#"CREATE TABLE IF NOT EXISTS {table} (
                           natural_id               TEXT NOT NULL PRIMARY KEY,
                           payload                  TEXT NOT NULL,
                           last_updated_at_unix_ms  INTEGER NOT NULL,
                           created_at_unix_ms       INTEGER NOT NULL
                       ) STRICT WITHOUT ROWID"#
                )
                .as_str(),
            )
            .await?;
    }

    // name <-> unique id <-> chat account
    connection
        .execute(
            r#"CREATE TABLE IF NOT EXISTS identity (
                   unique_id                TEXT NOT NULL PRIMARY KEY,
                   display_name             TEXT COLLATE NOCASE,
                   linked_account_id        INTEGER,
                   created_at_unix_ms       INTEGER NOT NULL,
                   last_updated_at_unix_ms  INTEGER NOT NULL
               ) STRICT WITHOUT ROWID"#,
        )
        .await?;
    // a name belongs to at most one player at a time
    connection
        .execute(r#"CREATE UNIQUE INDEX IF NOT EXISTS identity_by_name ON identity (display_name) WHERE display_name IS NOT NULL"#)
        .await?;
    connection
        .execute(r#"CREATE UNIQUE INDEX IF NOT EXISTS identity_by_account ON identity (linked_account_id) WHERE linked_account_id IS NOT NULL"#)
        .await?;

    let schema_version: i32 = helper::get_setting(connection, SCHEMA_VERSION_KEY)
        .await?
        .unwrap_or(SCHEMA_VERSION_VALUE);

    // handle schema downgrade (or rather, DON'T handle it and throw an error)
    if schema_version > SCHEMA_VERSION_VALUE {
        let message = format!(
            "db schema version is v{schema_version}, which is newer than v{SCHEMA_VERSION_VALUE} which is the latest schema this build supports."
        );
        return Err(AssistError::new(message));
    }

    // Applications that use long-lived database connections should run "PRAGMA optimize=0x10002;" when the connection is first opened.
    connection.execute(r#"PRAGMA optimize = 0x10002"#).await?;

    helper::set_setting(connection, SCHEMA_VERSION_KEY, SCHEMA_VERSION_VALUE).await?;

    let elapsed = start.elapsed();
    debug!("initialized v{} db in {}ms", SCHEMA_VERSION_VALUE, elapsed.as_millis());

    Ok(())
}
