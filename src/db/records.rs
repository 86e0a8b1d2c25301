// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

//! Per-kind payload tables

use super::AssistDb;
use crate::error::AssistResult;
use crate::time::SimpleTime;
use sqlx::Connection as _;

/// A table of cached payloads keyed by natural id
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RecordTable {
    Player,
    Profile,
    Guild,
}

/// Statements for one table. Table names can't be bound as parameters, so each table gets its own static text.
struct RecordSql {
    select: &'static str,
    probe: &'static str,
    insert: &'static str,
    update: &'static str,
    count: &'static str,
}

macro_rules! record_sql {
    ($table:literal) => {
        RecordSql {
            select: concat!(
                "SELECT payload, last_updated_at_unix_ms, created_at_unix_ms FROM ",
                $table,
                " WHERE natural_id = ?"
            ),
            probe: concat!("SELECT 1 FROM ", $table, " WHERE natural_id = ?"),
            insert: concat!(
                "INSERT INTO ",
                $table,
                " (natural_id, payload, last_updated_at_unix_ms, created_at_unix_ms) VALUES (?, ?, ?, ?)"
            ),
            update: concat!(
                "UPDATE ",
                $table,
                " SET payload = ?, last_updated_at_unix_ms = ? WHERE natural_id = ?"
            ),
            count: concat!("SELECT count(*) FROM ", $table),
        }
    };
}

const PLAYER_SQL: RecordSql = record_sql!("player");
const PROFILE_SQL: RecordSql = record_sql!("profile");
const GUILD_SQL: RecordSql = record_sql!("guild");

impl RecordTable {
    pub const ALL: [RecordTable; 3] = [RecordTable::Player, RecordTable::Profile, RecordTable::Guild];

    pub const fn name(self) -> &'static str {
        match self {
            RecordTable::Player => "player",
            RecordTable::Profile => "profile",
            RecordTable::Guild => "guild",
        }
    }

    const fn sql(self) -> &'static RecordSql {
        match self {
            RecordTable::Player => &PLAYER_SQL,
            RecordTable::Profile => &PROFILE_SQL,
            RecordTable::Guild => &GUILD_SQL,
        }
    }
}

/// A row from one of the payload tables
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredRecord {
    pub payload: String,
    pub last_updated_at: SimpleTime,
    pub created_at: SimpleTime,
}

impl AssistDb {
    /// Load the stored payload for an id. Whether it is fresh enough is the caller's call.
    pub async fn load_record(&self, table: RecordTable, natural_id: &str) -> AssistResult<Option<StoredRecord>> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(table.sql().select)
            .bind(natural_id)
            .fetch_optional(&self.read_pool)
            .await?;
        Ok(row.map(|(payload, last_updated_at, created_at)| StoredRecord {
            payload,
            last_updated_at: SimpleTime::from_db(last_updated_at),
            created_at: SimpleTime::from_db(created_at),
        }))
    }

    /// Insert or replace the payload for an id. `created_at` is only ever set by the first insert.
    ///
    /// Returns `true` if the row was created, `false` if an existing row was updated.
    pub async fn upsert_record(
        &self,
        table: RecordTable,
        natural_id: &str,
        payload: &str,
        now: SimpleTime,
    ) -> AssistResult<bool> {
        let sql = table.sql();
        let now = now.as_db();
        let mut connection = self.write_connection().await?;
        let mut transaction = connection.begin().await?;
        let present: Option<i64> = sqlx::query_scalar(sql.probe)
            .bind(natural_id)
            .fetch_optional(&mut *transaction)
            .await?;
        if present.is_some() {
            sqlx::query(sql.update)
                .bind(payload)
                .bind(now)
                .bind(natural_id)
                .execute(&mut *transaction)
                .await?;
        } else {
            sqlx::query(sql.insert)
                .bind(natural_id)
                .bind(payload)
                .bind(now)
                .bind(now)
                .execute(&mut *transaction)
                .await?;
        }
        transaction.commit().await?;
        Ok(present.is_none())
    }

    /// Row count of one payload table
    pub async fn record_count(&self, table: RecordTable) -> AssistResult<u64> {
        let count: i64 = sqlx::query_scalar(table.sql().count)
            .fetch_one(&self.read_pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Row count of every payload table
    pub async fn record_counts(&self) -> AssistResult<Vec<(RecordTable, u64)>> {
        let mut counts = Vec::with_capacity(RecordTable::ALL.len());
        for table in RecordTable::ALL {
            counts.push((table, self.record_count(table).await?));
        }
        Ok(counts)
    }
}
