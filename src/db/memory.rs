//! In-process store, used when no database is wanted and by tests.

use super::models::{AccessEntry, ChannelRecord, LastSeen, TrustRuleRecord};
use super::{DbError, ServiceStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    channels: Vec<ChannelRecord>,
    access: Vec<AccessEntry>,
    bans: HashMap<String, Vec<String>>,
    trust_rules: Vec<TrustRuleRecord>,
    last_seen: HashMap<String, LastSeen>,
}

/// A [`ServiceStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self, account: &str) -> Option<LastSeen> {
        self.inner
            .read()
            .last_seen
            .get(&account.to_ascii_lowercase())
            .cloned()
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn registered_channels(&self) -> Result<Vec<ChannelRecord>, DbError> {
        Ok(self.inner.read().channels.clone())
    }

    async fn channel_access(&self) -> Result<Vec<AccessEntry>, DbError> {
        Ok(self.inner.read().access.clone())
    }

    async fn channel_bans(&self, channel: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .inner
            .read()
            .bans
            .get(&channel.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn trust_rules(&self) -> Result<Vec<TrustRuleRecord>, DbError> {
        Ok(self.inner.read().trust_rules.clone())
    }

    async fn record_last_seen(&self, account: &str, host: &str, ts: i64) -> Result<(), DbError> {
        self.inner.write().last_seen.insert(
            account.to_ascii_lowercase(),
            LastSeen {
                account: account.to_string(),
                host: host.to_string(),
                ts,
            },
        );
        Ok(())
    }

    async fn register_channel(&self, record: &ChannelRecord) -> Result<(), DbError> {
        let mut inner = self.inner.write();
        inner
            .channels
            .retain(|c| !c.name.eq_ignore_ascii_case(&record.name));
        inner.channels.push(record.clone());
        Ok(())
    }

    async fn set_access(&self, channel: &str, account: &str, flags: &str) -> Result<(), DbError> {
        let mut inner = self.inner.write();
        inner.access.retain(|e| {
            !(e.channel.eq_ignore_ascii_case(channel) && e.account.eq_ignore_ascii_case(account))
        });
        inner.access.push(AccessEntry {
            channel: channel.to_string(),
            account: account.to_string(),
            flags: flags.to_string(),
        });
        Ok(())
    }

    async fn add_ban(&self, channel: &str, mask: &str) -> Result<(), DbError> {
        let mut inner = self.inner.write();
        let bans = inner.bans.entry(channel.to_ascii_lowercase()).or_default();
        if !bans.iter().any(|b| b == mask) {
            bans.push(mask.to_string());
        }
        Ok(())
    }

    async fn add_trust_rule(&self, rule: &TrustRuleRecord) -> Result<(), DbError> {
        self.inner.write().trust_rules.push(rule.clone());
        Ok(())
    }
}
