// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use super::AssistDb;
use crate::error::{AssistError, AssistResult};
use crate::time::SimpleTime;
use sqlx::Connection as _;
use uuid::Uuid;

/// One row of the identity table
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentityRow {
    pub unique_id: Uuid,
    pub display_name: Option<String>,
    pub linked_account_id: Option<u64>,
}

type RawIdentityRow = (String, Option<String>, Option<i64>);

impl TryFrom<RawIdentityRow> for IdentityRow {
    type Error = AssistError;

    fn try_from((unique_id, display_name, linked_account_id): RawIdentityRow) -> Result<Self, Self::Error> {
        let unique_id = Uuid::try_parse(&unique_id)
            .map_err(|_| AssistError::new(format!("identity table holds malformed unique id {unique_id:?}")))?;
        Ok(Self {
            unique_id,
            display_name,
            linked_account_id: linked_account_id.map(|id| id as u64),
        })
    }
}

fn db_id(unique_id: Uuid) -> String {
    unique_id.simple().to_string()
}

impl AssistDb {
    /// Find the identity currently holding a display name. Names compare case-insensitively.
    pub async fn identity_by_name(&self, display_name: &str) -> AssistResult<Option<IdentityRow>> {
        let row: Option<RawIdentityRow> = sqlx::query_as(
            r#"SELECT unique_id, display_name, linked_account_id FROM identity WHERE display_name = ?"#,
        )
        .bind(display_name)
        .fetch_optional(&self.read_pool)
        .await?;
        row.map(IdentityRow::try_from).transpose()
    }

    pub async fn identity_by_id(&self, unique_id: Uuid) -> AssistResult<Option<IdentityRow>> {
        let row: Option<RawIdentityRow> = sqlx::query_as(
            r#"SELECT unique_id, display_name, linked_account_id FROM identity WHERE unique_id = ?"#,
        )
        .bind(db_id(unique_id))
        .fetch_optional(&self.read_pool)
        .await?;
        row.map(IdentityRow::try_from).transpose()
    }

    pub async fn identity_by_account(&self, account_id: u64) -> AssistResult<Option<IdentityRow>> {
        let account_id = account_id as i64;
        let row: Option<RawIdentityRow> = sqlx::query_as(
            r#"SELECT unique_id, display_name, linked_account_id FROM identity WHERE linked_account_id = ?"#,
        )
        .bind(account_id)
        .fetch_optional(&self.read_pool)
        .await?;
        row.map(IdentityRow::try_from).transpose()
    }

    /// Record `display_name` as the current name of `unique_id`, taking the name away from whoever held it before.
    ///
    /// Returns the name previously stored for `unique_id`.
    pub async fn upsert_identity_name(
        &self,
        unique_id: Uuid,
        display_name: &str,
        now: SimpleTime,
    ) -> AssistResult<Option<String>> {
        let unique_id = db_id(unique_id);
        let now = now.as_db();
        let mut connection = self.write_connection().await?;
        let mut transaction = connection.begin().await?;
        let previous: Option<Option<String>> =
            sqlx::query_scalar(r#"SELECT display_name FROM identity WHERE unique_id = ?"#)
                .bind(&unique_id)
                .fetch_optional(&mut *transaction)
                .await?;
        sqlx::query(
            r#"UPDATE identity SET display_name = NULL, last_updated_at_unix_ms = ?
               WHERE display_name = ? AND unique_id != ?"#,
        )
        .bind(now)
        .bind(display_name)
        .bind(&unique_id)
        .execute(&mut *transaction)
        .await?;
        sqlx::query(
            r#"INSERT INTO identity (unique_id, display_name, created_at_unix_ms, last_updated_at_unix_ms) VALUES (?, ?, ?, ?)
               ON CONFLICT (unique_id) DO UPDATE SET display_name = excluded.display_name, last_updated_at_unix_ms = excluded.last_updated_at_unix_ms"#,
        )
        .bind(&unique_id)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;
        Ok(previous.flatten())
    }

    /// Link a chat account to a player. The account is unlinked from any other player first.
    ///
    /// Returns the player the account was previously linked to, if it was a different one.
    pub async fn link_account(&self, unique_id: Uuid, account_id: u64, now: SimpleTime) -> AssistResult<Option<Uuid>> {
        let account_id = account_id as i64;
        let db_unique_id = db_id(unique_id);
        let now = now.as_db();
        let mut connection = self.write_connection().await?;
        let mut transaction = connection.begin().await?;
        let previous: Option<String> = sqlx::query_scalar(
            r#"SELECT unique_id FROM identity WHERE linked_account_id = ? AND unique_id != ?"#,
        )
        .bind(account_id)
        .bind(&db_unique_id)
        .fetch_optional(&mut *transaction)
        .await?;
        sqlx::query(
            r#"UPDATE identity SET linked_account_id = NULL, last_updated_at_unix_ms = ?
               WHERE linked_account_id = ? AND unique_id != ?"#,
        )
        .bind(now)
        .bind(account_id)
        .bind(&db_unique_id)
        .execute(&mut *transaction)
        .await?;
        sqlx::query(
            r#"INSERT INTO identity (unique_id, linked_account_id, created_at_unix_ms, last_updated_at_unix_ms) VALUES (?, ?, ?, ?)
               ON CONFLICT (unique_id) DO UPDATE SET linked_account_id = excluded.linked_account_id, last_updated_at_unix_ms = excluded.last_updated_at_unix_ms"#,
        )
        .bind(&db_unique_id)
        .bind(account_id)
        .bind(now)
        .bind(now)
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;
        Ok(previous.and_then(|previous| Uuid::try_parse(&previous).ok()))
    }

    /// Returns the account that was linked, if any
    pub async fn unlink_account(&self, unique_id: Uuid, now: SimpleTime) -> AssistResult<Option<u64>> {
        let unique_id = db_id(unique_id);
        let mut connection = self.write_connection().await?;
        let mut transaction = connection.begin().await?;
        let previous: Option<Option<i64>> =
            sqlx::query_scalar(r#"SELECT linked_account_id FROM identity WHERE unique_id = ?"#)
                .bind(&unique_id)
                .fetch_optional(&mut *transaction)
                .await?;
        sqlx::query(
            r#"UPDATE identity SET linked_account_id = NULL, last_updated_at_unix_ms = ? WHERE unique_id = ?"#,
        )
        .bind(now.as_db())
        .bind(&unique_id)
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;
        Ok(previous.flatten().map(|id| id as u64))
    }

    /// Row count of the identity table
    pub async fn identity_count(&self) -> AssistResult<u64> {
        let count: i64 = sqlx::query_scalar(r#"SELECT count(*) FROM identity"#)
            .fetch_one(&self.read_pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
