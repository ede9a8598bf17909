//! Account repository: last-seen tracking for authenticated users.

use super::DbError;
use super::models::LastSeen;
use sqlx::SqlitePool;

/// Repository for account operations.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record where and when an account was last seen.
    pub async fn touch(&self, account: &str, host: &str, ts: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (name, last_seen_host, last_seen_ts)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                last_seen_host = excluded.last_seen_host,
                last_seen_ts = excluded.last_seen_ts
            "#,
        )
        .bind(account)
        .bind(host)
        .bind(ts)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn last_seen(&self, account: &str) -> Result<Option<LastSeen>, DbError> {
        let row = sqlx::query_as::<_, (String, Option<String>, Option<i64>)>(
            "SELECT name, last_seen_host, last_seen_ts FROM accounts WHERE name = ?",
        )
        .bind(account)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(account, host, ts)| LastSeen {
            account,
            host: host.unwrap_or_default(),
            ts: ts.unwrap_or_default(),
        }))
    }
}
