//! Channel repository: registry, access lists and ban lists.

use super::DbError;
use super::models::{AccessEntry, ChannelRecord};
use sqlx::SqlitePool;
use tracing::warn;

/// Repository for channel operations.
pub struct ChannelRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ChannelRepository<'a> {
    /// Create a new channel repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every registered channel.
    pub async fn load_all(&self) -> Result<Vec<ChannelRecord>, DbError> {
        let rows = sqlx::query_as::<_, (String, Option<String>, String, Option<String>)>(
            r#"
            SELECT name, registered_ts, modes, topic
            FROM channels
            ORDER BY name
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, registered_ts, modes, topic)| {
                let registered_ts = registered_ts.and_then(|raw| match raw.trim().parse::<i64>() {
                    Ok(ts) => Some(ts),
                    Err(e) => {
                        warn!(channel = %name, value = %raw, error = %e, "Unreadable registration timestamp");
                        None
                    }
                });
                ChannelRecord {
                    name,
                    registered_ts,
                    modes,
                    topic: topic.filter(|t| !t.is_empty()),
                }
            })
            .collect())
    }

    /// Register (or re-register) a channel.
    pub async fn register(&self, record: &ChannelRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO channels (name, registered_ts, modes, topic)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                registered_ts = excluded.registered_ts,
                modes = excluded.modes,
                topic = excluded.topic
            "#,
        )
        .bind(&record.name)
        .bind(record.registered_ts.map(|ts| ts.to_string()))
        .bind(&record.modes)
        .bind(&record.topic)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Every access entry on every channel.
    pub async fn access_entries(&self) -> Result<Vec<AccessEntry>, DbError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT channel, account, flags
            FROM channel_access
            ORDER BY channel, account
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(channel, account, flags)| AccessEntry {
                channel,
                account,
                flags,
            })
            .collect())
    }

    /// Set an account's flags on a channel.
    pub async fn set_access(&self, channel: &str, account: &str, flags: &str) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO channel_access (channel, account, flags)
            VALUES (?, ?, ?)
            ON CONFLICT(channel, account) DO UPDATE SET flags = excluded.flags
            "#,
        )
        .bind(channel)
        .bind(account)
        .bind(flags)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Ban masks for a channel, oldest first.
    pub async fn bans(&self, channel: &str) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT mask FROM channel_bans
            WHERE channel = ?
            ORDER BY id
            "#,
        )
        .bind(channel)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_ban(&self, channel: &str, mask: &str) -> Result<(), DbError> {
        sqlx::query("INSERT OR IGNORE INTO channel_bans (channel, mask) VALUES (?, ?)")
            .bind(channel)
            .bind(mask)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
