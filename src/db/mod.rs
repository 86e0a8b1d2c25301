// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Persistent cache tier, identities, and the small amount of configuration we store

mod identity;
mod records;
mod schema;

use crate::error::{AssistError, AssistResult};
use crate::time::SimpleTime;
pub use identity::IdentityRow;
pub use records::{RecordTable, StoredRecord};
use sqlx::{
    Encode, Executor, FromRow, Pool, Sqlite, SqliteConnection,
    error::Error as SqlxError,
    pool::PoolConnection,
    sqlite::{
        SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePoolOptions, SqliteRow,
        SqliteSynchronous,
    },
};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const LEADERBOARD_URI_KEY: &str = "leaderboard_uri";

type SqliteResult<T> = Result<T, SqlxError>;

/// Cloning is by-reference.
#[derive(Clone)]
pub struct AssistDb {
    read_pool: Pool<Sqlite>,
    write_pool: Pool<Sqlite>,
}

impl AssistDb {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: &Path) -> AssistResult<Self> {
        let pool_options_write = SqlitePoolOptions::new()
            .min_connections(1) // always keep at least one connection open
            .max_connections(1) // allow only 1 write connection
            .max_lifetime(None) // don't close connections for no reason, as we assume sqlite doesn't leak resources
            .test_before_acquire(false) // we assume sqlite is extremely reliable, as it's in-process
            .acquire_slow_threshold(Duration::from_millis(100)) // we expect sqlite to be fast
            .idle_timeout(Some(Duration::from_secs(90))); // idle extra connections may be closed after a while
        let pool_options_read = pool_options_write.clone().max_connections(4); // allow up to 4 read connections
        let connect_options_write = SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .in_memory(false)
            .shared_cache(false) // superseded by WAL mode
            .journal_mode(SqliteJournalMode::Wal)
            .locking_mode(SqliteLockingMode::Normal) // must be Normal to have multiple connections
            .read_only(false)
            .create_if_missing(true)
            .statement_cache_capacity(100)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal) // a cache can afford to lose its last transaction on power-off
            .auto_vacuum(SqliteAutoVacuum::None)
            .page_size(4096)
            .pragma("trusted_schema", "OFF");
        let connect_options_read = connect_options_write.clone().read_only(true).create_if_missing(false);

        let write_pool = pool_options_write.connect_with(connect_options_write).await?;
        {
            let mut write_connection = write_pool.acquire().await?;
            schema::init(&mut write_connection).await?;
        }

        let read_pool = pool_options_read.connect_with(connect_options_read).await?;

        debug!("opened db at {}", path.display());
        Ok(AssistDb { read_pool, write_pool })
    }

    /// Open a private in-memory database. Everything shares one connection, as each new connection to `:memory:`
    /// would see its own empty database.
    pub async fn open_in_memory() -> AssistResult<Self> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .max_lifetime(None)
            .idle_timeout(None) // closing the last connection drops the whole database
            .test_before_acquire(false)
            .connect_with(
                SqliteConnectOptions::new()
                    .in_memory(true)
                    .foreign_keys(true)
                    .pragma("trusted_schema", "OFF"),
            )
            .await?;
        {
            let mut connection = pool.acquire().await?;
            schema::init(&mut connection).await?;
        }
        Ok(AssistDb {
            read_pool: pool.clone(),
            write_pool: pool,
        })
    }

    /// Gracefully close the database connections and wait for the close to complete
    pub async fn close(&self) {
        self.read_pool.close().await;
        self.write_pool.close().await;
    }

    /// Get something that we can DerefMut as SqliteConnection
    async fn write_connection(&self) -> SqliteResult<PoolConnection<Sqlite>> {
        self.write_pool.acquire().await
    }

    /// Attempt to optimize the database.
    ///
    /// Applications that use long-lived database connections should run "PRAGMA optimize;" periodically, perhaps once per day or once per hour.
    pub async fn optimize(&self) -> AssistResult<()> {
        let mut connection = self.write_connection().await?;
        connection.execute(r#"PRAGMA optimize"#).await?;
        Ok(())
    }

    async fn get_setting<'e, T>(&self, key: &str) -> SqliteResult<Option<T>>
    where
        T: sqlx::Type<Sqlite> + Send + Unpin + 'e,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        let mut connection = self.read_pool.acquire().await?;
        helper::get_setting(&mut connection, key).await
    }

    async fn set_setting<'q, T>(&self, key: &'q str, value: T) -> SqliteResult<bool>
    where
        T: Encode<'q, Sqlite> + sqlx::Type<Sqlite> + 'q,
    {
        let mut connection = self.write_connection().await?;
        helper::set_setting(&mut connection, key, value).await
    }

    /// Base URI of the leaderboard service, if one was configured
    pub async fn leaderboard_uri(&self) -> AssistResult<Option<String>> {
        Ok(self.get_setting(LEADERBOARD_URI_KEY).await?)
    }

    pub async fn set_leaderboard_uri(&self, uri: &str) -> AssistResult<()> {
        let uri = uri.trim().trim_end_matches('/');
        if uri.is_empty() {
            return Err(AssistError::new("leaderboard URI must not be empty"));
        }
        self.set_setting(LEADERBOARD_URI_KEY, uri).await?;
        Ok(())
    }

    /// Store an API key. Returns `false` if it was already stored.
    pub async fn add_credential(&self, token: &str, now: SimpleTime) -> AssistResult<bool> {
        let mut connection = self.write_connection().await?;
        let inserted = sqlx::query(r#"INSERT OR IGNORE INTO credential (token, created_at_unix_ms) VALUES (?, ?)"#)
            .bind(token)
            .bind(now.as_db())
            .execute(&mut *connection)
            .await?
            .rows_affected();
        Ok(inserted != 0)
    }

    /// Returns `false` if there was nothing to remove
    pub async fn remove_credential(&self, token: &str) -> AssistResult<bool> {
        let mut connection = self.write_connection().await?;
        let deleted = sqlx::query(r#"DELETE FROM credential WHERE token = ?"#)
            .bind(token)
            .execute(&mut *connection)
            .await?
            .rows_affected();
        Ok(deleted != 0)
    }

    /// All stored API keys, oldest first. This is the order the pool cycles through them.
    pub async fn credentials(&self) -> AssistResult<Vec<String>> {
        let result = sqlx::query_scalar(r#"SELECT token FROM credential ORDER BY created_at_unix_ms, token"#)
            .fetch_all(&self.read_pool)
            .await?;
        Ok(result)
    }

    /// Get DB size in bytes
    pub async fn size(&self) -> AssistResult<u64> {
        let size: i64 =
            sqlx::query_scalar(r#"SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()"#)
                .fetch_one(&self.read_pool)
                .await?;
        Ok(u64::try_from(size).unwrap_or_default())
    }
}

/// Helper functions that don't access a whole pool
mod helper {
    use super::*;

    /// Get a single setting from the `settings` table. Note that if your setting is nullable you MUST read it as an
    /// Option<T> instead of a T. This function returns None only if the entire row is absent.
    pub(super) async fn get_setting<'e, T>(connection: &'e mut SqliteConnection, key: &str) -> SqliteResult<Option<T>>
    where
        T: sqlx::Type<Sqlite> + Send + Unpin + 'e,
        (T,): for<'r> FromRow<'r, SqliteRow>,
    {
        let result: Option<T> = sqlx::query_scalar(r#"SELECT value FROM settings WHERE key = ?"#)
            .bind(key)
            .fetch_optional(connection)
            .await?;
        Ok(result)
    }

    pub(super) async fn set_setting<'q, T>(
        connection: &mut SqliteConnection,
        key: &'q str,
        value: T,
    ) -> SqliteResult<bool>
    where
        T: Encode<'q, Sqlite> + sqlx::Type<Sqlite> + 'q,
    {
        let update_count = sqlx::query(r#"INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)"#)
            .bind(key)
            .bind(value)
            .execute(connection)
            .await?
            .rows_affected();
        Ok(update_count != 0)
    }
}
