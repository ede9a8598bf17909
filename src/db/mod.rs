//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for:
//! - Channel registrations, access flags and ban lists
//! - Trust-check rules
//! - Account last-seen data
//!
//! The daemon only talks to storage through [`ServiceStore`], implemented by
//! [`Database`] and by the in-process [`MemoryStore`].

mod accounts;
mod channels;
mod memory;
mod models;
mod trust;

pub use accounts::AccountRepository;
pub use channels::ChannelRepository;
pub use memory::MemoryStore;
pub use models::{AccessEntry, ChannelRecord, LastSeen, TrustRuleRecord};
pub use trust::TrustRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("integrity check failed: {0}")]
    Integrity(String),
}

/// Persistent data the services core reads and writes.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Every registered channel.
    async fn registered_channels(&self) -> Result<Vec<ChannelRecord>, DbError>;

    /// Every per-account channel access entry.
    async fn channel_access(&self) -> Result<Vec<AccessEntry>, DbError>;

    /// Ban masks stored for a channel.
    async fn channel_bans(&self, channel: &str) -> Result<Vec<String>, DbError>;

    /// Trust rules in evaluation order.
    async fn trust_rules(&self) -> Result<Vec<TrustRuleRecord>, DbError>;

    /// Remember where and when an authenticated account was last seen.
    async fn record_last_seen(&self, account: &str, host: &str, ts: i64) -> Result<(), DbError>;

    async fn register_channel(&self, record: &ChannelRecord) -> Result<(), DbError>;

    async fn set_access(&self, channel: &str, account: &str, flags: &str) -> Result<(), DbError>;

    async fn add_ban(&self, channel: &str, mask: &str) -> Result<(), DbError>;

    async fn add_trust_rule(&self, rule: &TrustRuleRecord) -> Result<(), DbError>;
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // A uniquely named shared-cache memory database per call, so
            // parallel tests never see each other's data.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:slservices-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets the burst read while last-seen updates write.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Integrity(integrity_result));
        }

        info!("Database integrity check passed");

        Ok(Self { pool })
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get account repository.
    pub fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(&self.pool)
    }

    /// Get channel repository.
    pub fn channels(&self) -> ChannelRepository<'_> {
        ChannelRepository::new(&self.pool)
    }

    /// Get trust rule repository.
    pub fn trust(&self) -> TrustRepository<'_> {
        TrustRepository::new(&self.pool)
    }
}

#[async_trait]
impl ServiceStore for Database {
    async fn registered_channels(&self) -> Result<Vec<ChannelRecord>, DbError> {
        self.channels().load_all().await
    }

    async fn channel_access(&self) -> Result<Vec<AccessEntry>, DbError> {
        self.channels().access_entries().await
    }

    async fn channel_bans(&self, channel: &str) -> Result<Vec<String>, DbError> {
        self.channels().bans(channel).await
    }

    async fn trust_rules(&self) -> Result<Vec<TrustRuleRecord>, DbError> {
        self.trust().load_all().await
    }

    async fn record_last_seen(&self, account: &str, host: &str, ts: i64) -> Result<(), DbError> {
        self.accounts().touch(account, host, ts).await
    }

    async fn register_channel(&self, record: &ChannelRecord) -> Result<(), DbError> {
        self.channels().register(record).await
    }

    async fn set_access(&self, channel: &str, account: &str, flags: &str) -> Result<(), DbError> {
        self.channels().set_access(channel, account, flags).await
    }

    async fn add_ban(&self, channel: &str, mask: &str) -> Result<(), DbError> {
        self.channels().add_ban(channel, mask).await
    }

    async fn add_trust_rule(&self, rule: &TrustRuleRecord) -> Result<(), DbError> {
        self.trust().add(rule).await
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str, ts: Option<i64>) -> ChannelRecord {
        ChannelRecord {
            name: name.into(),
            registered_ts: ts,
            modes: "nt".into(),
            topic: Some("Welcome".into()),
        }
    }

    async fn exercise(store: &dyn ServiceStore) {
        store.register_channel(&channel("#rust", Some(1_600_000_000))).await.unwrap();
        store.register_channel(&channel("#help", None)).await.unwrap();
        store.set_access("#rust", "alice", "2").await.unwrap();
        store.set_access("#rust", "alice", "4").await.unwrap();
        store.set_access("#help", "bob", "1").await.unwrap();
        store.add_ban("#rust", "*!*@bad.host").await.unwrap();
        store.add_ban("#rust", "*!*@bad.host").await.unwrap();
        store.add_ban("#rust", "spam*!*@*").await.unwrap();

        let channels = store.registered_channels().await.unwrap();
        assert_eq!(channels.len(), 2);
        let rust = channels.iter().find(|c| c.name == "#rust").unwrap();
        assert_eq!(rust.registered_ts, Some(1_600_000_000));
        assert_eq!(rust.topic.as_deref(), Some("Welcome"));

        let access = store.channel_access().await.unwrap();
        assert_eq!(access.len(), 2);
        let alice = access.iter().find(|a| a.account == "alice").unwrap();
        assert_eq!(alice.flags, "4");

        assert_eq!(
            store.channel_bans("#RUST").await.unwrap(),
            vec!["*!*@bad.host".to_string(), "spam*!*@*".to_string()]
        );
        assert!(store.channel_bans("#none").await.unwrap().is_empty());

        for mask in ["*@10.*", "*@*"] {
            store
                .add_trust_rule(&TrustRuleRecord {
                    mask: mask.into(),
                    max_connections: "2".into(),
                    require_ident: "0".into(),
                    max_idents_per_host: "0".into(),
                })
                .await
                .unwrap();
        }
        let rules = store.trust_rules().await.unwrap();
        assert_eq!(rules.iter().map(|r| r.mask.as_str()).collect::<Vec<_>>(), vec!["*@10.*", "*@*"]);

        store.record_last_seen("alice", "host.example", 10).await.unwrap();
        store.record_last_seen("alice", "other.example", 20).await.unwrap();
    }

    #[tokio::test]
    async fn sqlite_store_round_trip() {
        let db = Database::new(":memory:").await.unwrap();
        exercise(&db).await;
        let seen = db.accounts().last_seen("ALICE").await.unwrap().unwrap();
        assert_eq!(seen.host, "other.example");
        assert_eq!(seen.ts, 20);
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        exercise(&store).await;
        let seen = store.last_seen("alice").unwrap();
        assert_eq!(seen.host, "other.example");
    }

    #[tokio::test]
    async fn unreadable_timestamp_is_unset() {
        let db = Database::new(":memory:").await.unwrap();
        sqlx::query("INSERT INTO channels (name, registered_ts, modes) VALUES ('#odd', 'yesterday', '')")
            .execute(&db.pool)
            .await
            .unwrap();
        let channels = db.registered_channels().await.unwrap();
        assert_eq!(channels[0].registered_ts, None);
    }

    #[tokio::test]
    async fn file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("services.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        assert!(db.registered_channels().await.unwrap().is_empty());
        assert!(path.exists());
    }
}
