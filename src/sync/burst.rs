//! Channel burst at link-up.
//!
//! Modules register the channels they want to hold in a [`BurstMap`] before
//! we send `EB`. When the hub's `EB` arrives the synchronizer runs once:
//!
//! 1. Persisted access flags tag connected users (ban over op over voice)
//! 2. Members already seen on the channel are added untouched
//! 3. `EA` is sent, then one `B` line per channel
//! 4. The burst is merged into the mirror
//! 5. Stored bans kick matching members, autoop/autovoice apply to the rest
//! 6. Stored topics fill channels that have none

use crate::db::{AccessEntry, ChannelRecord};
use crate::error::LinkError;
use crate::metrics;
use crate::security::WildcardMask;
use crate::state::normalize_modes;
use crate::sync::context::LinkContext;
use slirc_p10::{BurstMember, MemberFlags, format_members, irc_to_lower};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// How a member is tagged for the burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberTag {
    Plain,
    /// Banned by access flags. Never sent, never opped or voiced.
    Ban,
    Op,
    Voice,
}

/// One channel we are about to burst.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstDescriptor {
    /// Channel name as it will appear on the wire.
    pub channel: String,
    pub timestamp: i64,
    /// Mode letters without sign.
    pub modes: String,
    members: Vec<(String, MemberTag)>,
}

impl BurstDescriptor {
    pub fn new(channel: &str, timestamp: i64, modes: &str) -> Self {
        Self {
            channel: channel.to_string(),
            timestamp,
            modes: normalize_modes(modes),
            members: Vec::new(),
        }
    }

    /// Add a member. A member already present keeps its first tag.
    pub fn add(&mut self, numeric: &str, tag: MemberTag) -> bool {
        if self.tag_of(numeric).is_some() {
            return false;
        }
        self.members.push((numeric.to_string(), tag));
        true
    }

    pub fn tag_of(&self, numeric: &str) -> Option<MemberTag> {
        self.members
            .iter()
            .find(|(n, _)| n == numeric)
            .map(|(_, tag)| *tag)
    }

    pub fn members(&self) -> &[(String, MemberTag)] {
        &self.members
    }
}

/// Pending bursts keyed by lowercase channel name.
#[derive(Debug, Default)]
pub struct BurstMap {
    inner: BTreeMap<String, BurstDescriptor>,
}

impl BurstMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The descriptor for `channel`, created with `timestamp` and `modes`
    /// if it does not exist yet.
    pub fn entry(&mut self, channel: &str, timestamp: i64, modes: &str) -> &mut BurstDescriptor {
        self.inner
            .entry(irc_to_lower(channel))
            .or_insert_with(|| BurstDescriptor::new(channel, timestamp, modes))
    }

    pub fn get(&self, channel: &str) -> Option<&BurstDescriptor> {
        self.inner.get(&irc_to_lower(channel))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Per-account channel access flags, stored as a decimal bitmask.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AclFlags(u32);

impl AclFlags {
    pub const BAN: u32 = 1;
    pub const AUTOOP: u32 = 2;
    pub const AUTOVOICE: u32 = 4;

    /// Parse stored flags. Unreadable values are logged and mean "no flags".
    pub fn parse(entry: &AccessEntry) -> Self {
        match entry.flags.trim().parse::<u32>() {
            Ok(bits) => Self(bits),
            Err(e) => {
                warn!(
                    channel = %entry.channel,
                    account = %entry.account,
                    flags = %entry.flags,
                    error = %e,
                    "Unreadable access flags, treating as none"
                );
                Self(0)
            }
        }
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    /// Burst tag for these flags. Ban wins over op, op over voice.
    pub fn burst_tag(&self) -> Option<MemberTag> {
        if self.contains(Self::BAN) {
            Some(MemberTag::Ban)
        } else if self.contains(Self::AUTOOP) {
            Some(MemberTag::Op)
        } else if self.contains(Self::AUTOVOICE) {
            Some(MemberTag::Voice)
        } else {
            None
        }
    }
}

/// What a burst run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BurstReport {
    pub channels: usize,
    pub kicks: usize,
    pub ops: usize,
    pub voices: usize,
    pub topics: usize,
}

type AclIndex = HashMap<String, Vec<(String, AclFlags)>>;

/// Run the burst. Called once, on the hub's first `EB`.
pub async fn run_burst(ctx: &LinkContext, bursts: &mut BurstMap) -> Result<BurstReport, LinkError> {
    let registered: HashMap<String, ChannelRecord> = match ctx.store.registered_channels().await {
        Ok(records) => records
            .into_iter()
            .map(|r| (irc_to_lower(&r.name), r))
            .collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load channel registry for burst");
            HashMap::new()
        }
    };
    let acl = match ctx.store.channel_access().await {
        Ok(entries) => index_access(&entries),
        Err(e) => {
            warn!(error = %e, "Failed to load channel access for burst");
            AclIndex::new()
        }
    };

    for (key, desc) in bursts.inner.iter_mut() {
        if registered.contains_key(key) {
            for (account, flags) in acl.get(key).map(Vec::as_slice).unwrap_or_default() {
                let Some(tag) = flags.burst_tag() else {
                    continue;
                };
                for user in ctx.state.find_by_account(account) {
                    desc.add(&user.numeric, tag);
                }
            }
        }

        if let Some(chan) = ctx.state.get_channel(key) {
            let mut known: Vec<&String> = chan.users.iter().collect();
            known.sort();
            for numeric in known {
                let tag = if chan.ops.contains(numeric) {
                    MemberTag::Op
                } else if chan.voices.contains(numeric) {
                    MemberTag::Voice
                } else {
                    MemberTag::Plain
                };
                desc.add(numeric, tag);
            }
        }
    }

    ctx.send(format!("{} EA", ctx.numeric)).await?;

    let mut report = BurstReport::default();
    for (key, desc) in bursts.inner.iter() {
        let members: Vec<BurstMember> = desc
            .members()
            .iter()
            .filter(|(_, tag)| *tag != MemberTag::Ban)
            .map(|(numeric, tag)| BurstMember {
                numeric: numeric.clone(),
                flags: if ctx.is_local(numeric) {
                    MemberFlags::OP
                } else {
                    match tag {
                        MemberTag::Op => MemberFlags::OP,
                        MemberTag::Voice => MemberFlags::VOICE,
                        MemberTag::Plain | MemberTag::Ban => MemberFlags::NONE,
                    }
                },
            })
            .collect();
        if members.is_empty() {
            debug!(channel = %desc.channel, "Nothing to burst");
            continue;
        }

        let ts = match ctx.state.get_channel(key) {
            Some(chan) if chan.created_at > 0 && chan.created_at < desc.timestamp => chan.created_at,
            _ => desc.timestamp,
        };
        let line = if desc.modes.is_empty() {
            format!("{} B {} {} {}", ctx.numeric, desc.channel, ts, format_members(&members))
        } else {
            format!(
                "{} B {} {} +{} {}",
                ctx.numeric,
                desc.channel,
                ts,
                desc.modes,
                format_members(&members)
            )
        };
        ctx.send(line).await?;
        ctx.state.merge_burst(&desc.channel, ts, &desc.modes, &members);
        report.channels += 1;
    }

    for (key, desc) in &bursts.inner {
        let entries = acl.get(key).map(Vec::as_slice).unwrap_or_default();
        enforce_channel(ctx, key, &desc.channel, entries, &mut report).await?;
    }

    for (key, record) in &registered {
        let Some(topic) = record.topic.as_deref() else {
            continue;
        };
        if !bursts.inner.contains_key(key) {
            continue;
        }
        let Some(chan) = ctx.state.get_channel(key) else {
            continue;
        };
        if chan.topic.is_some() {
            continue;
        }
        let source = enforcer(ctx, &chan.users).unwrap_or_else(|| ctx.numeric.clone());
        ctx.send(format!("{} T {} :{}", source, record.name, topic))
            .await?;
        ctx.state.set_topic(key, Some(topic.to_string()));
        report.topics += 1;
    }

    metrics::record_burst(report.channels);
    info!(
        channels = report.channels,
        kicks = report.kicks,
        ops = report.ops,
        voices = report.voices,
        topics = report.topics,
        "Burst complete"
    );
    Ok(report)
}

fn index_access(entries: &[AccessEntry]) -> AclIndex {
    let mut index = AclIndex::new();
    for entry in entries {
        index
            .entry(irc_to_lower(&entry.channel))
            .or_default()
            .push((entry.account.clone(), AclFlags::parse(entry)));
    }
    index
}

/// The first of our own clients in the channel, by numeric order.
fn enforcer(ctx: &LinkContext, members: &std::collections::HashSet<String>) -> Option<String> {
    let mut local: Vec<&String> = members.iter().filter(|n| ctx.is_local(n)).collect();
    local.sort();
    local.first().map(|n| (*n).clone())
}

/// Kick banned members and apply autoop/autovoice in one channel.
///
/// `key` is the folded state key; `name` is the channel as registered, which
/// the store matches without RFC 1459 folding.
async fn enforce_channel(
    ctx: &LinkContext,
    key: &str,
    name: &str,
    acl: &[(String, AclFlags)],
    report: &mut BurstReport,
) -> Result<(), LinkError> {
    let Some(chan) = ctx.state.get_channel(key) else {
        return Ok(());
    };
    let Some(source) = enforcer(ctx, &chan.users) else {
        return Ok(());
    };

    let bans: Vec<WildcardMask> = match ctx.store.channel_bans(name).await {
        Ok(masks) => masks.iter().map(|m| WildcardMask::new(m)).collect(),
        Err(e) => {
            warn!(channel = %key, error = %e, "Failed to load channel bans");
            Vec::new()
        }
    };

    let mut members: Vec<&String> = chan.users.iter().filter(|n| !ctx.is_local(n)).collect();
    members.sort();

    for numeric in members {
        let Some(user) = ctx.state.get_user(numeric) else {
            continue;
        };

        let hit = user
            .ban_masks()
            .iter()
            .find_map(|mask| bans.iter().find(|ban| ban.matches(mask)).cloned());
        if let Some(ban) = hit {
            ctx.send(format!("{} M {} +b {}", source, key, ban.as_str()))
                .await?;
            ctx.send(format!(
                "{} K {} {} :You are banned from this channel",
                source, key, numeric
            ))
            .await?;
            ctx.state.remove_member(key, numeric);
            report.kicks += 1;
            continue;
        }

        let flags = user
            .account
            .as_deref()
            .and_then(|account| {
                acl.iter()
                    .find(|(a, _)| a.eq_ignore_ascii_case(account))
                    .map(|(_, f)| *f)
            })
            .unwrap_or_default();

        if flags.contains(AclFlags::BAN) {
            continue;
        }
        if flags.contains(AclFlags::AUTOOP) {
            if !chan.ops.contains(numeric) {
                ctx.send(format!("{} M {} +o {}", source, key, numeric))
                    .await?;
                ctx.state.set_op(key, numeric, true);
                report.ops += 1;
            }
        } else if flags.contains(AclFlags::AUTOVOICE) && !chan.voices.contains(numeric) {
            ctx.send(format!("{} M {} +v {}", source, key, numeric))
                .await?;
            ctx.state.set_voice(key, numeric, true);
            report.voices += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, ServiceStore};
    use crate::state::{User, UserModes};
    use crate::sync::context::testing::{TestLink, test_link_with};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn user(numeric: &str, nick: &str, account: Option<&str>, host: &str) -> User {
        User {
            numeric: numeric.into(),
            nick: nick.into(),
            ident: "ident".into(),
            host: host.into(),
            hidden_host: None,
            ip: None,
            account: account.map(str::to_string),
            modes: UserModes::default(),
            oper_name: None,
            nick_ts: 1,
            realname: "Real".into(),
            channels: HashSet::new(),
        }
    }

    async fn registered(topic: Option<&str>) -> TestLink {
        let store = Arc::new(MemoryStore::new());
        store
            .register_channel(&ChannelRecord {
                name: "#Rust".into(),
                registered_ts: Some(1_000),
                modes: "nt".into(),
                topic: topic.map(str::to_string),
            })
            .await
            .unwrap();
        let link = test_link_with(store);
        let chanserv = link
            .ctx
            .introduce_client("ChanServ", "services", "services.int", "Channel Services")
            .await
            .unwrap();
        assert_eq!(chanserv, "ASAAA");
        link.writer.take();
        link
    }

    fn bursts() -> BurstMap {
        let mut map = BurstMap::new();
        map.entry("#Rust", 1_000, "+nt").add("ASAAA", MemberTag::Op);
        map
    }

    #[test]
    fn descriptor_never_retags() {
        let mut desc = BurstDescriptor::new("#rust", 1, "+nt");
        assert!(desc.add("ABAAA", MemberTag::Ban));
        assert!(!desc.add("ABAAA", MemberTag::Op));
        assert_eq!(desc.tag_of("ABAAA"), Some(MemberTag::Ban));
        assert_eq!(desc.modes, "nt");
    }

    #[test]
    fn flag_precedence() {
        let entry = |flags: &str| AccessEntry {
            channel: "#rust".into(),
            account: "a".into(),
            flags: flags.into(),
        };
        assert_eq!(AclFlags::parse(&entry("7")).burst_tag(), Some(MemberTag::Ban));
        assert_eq!(AclFlags::parse(&entry("6")).burst_tag(), Some(MemberTag::Op));
        assert_eq!(AclFlags::parse(&entry("4")).burst_tag(), Some(MemberTag::Voice));
        assert_eq!(AclFlags::parse(&entry("0")).burst_tag(), None);
        assert_eq!(AclFlags::parse(&entry("lots")), AclFlags::default());
    }

    #[tokio::test]
    async fn autoop_user_is_bursted_with_op() {
        let link = registered(None).await;
        link.store.set_access("#rust", "Account", "2").await.unwrap();
        link.ctx.state.insert_user(user("ABAAA", "Nick", Some("Account"), "host"));

        let report = run_burst(&link.ctx, &mut bursts()).await.unwrap();

        let lines = link.writer.lines();
        assert_eq!(lines[0], "AS EA");
        let b = lines.iter().find(|l| l.starts_with("AS B ")).unwrap();
        assert!(b.starts_with("AS B #Rust 1000 +nt "));
        assert!(b.contains("ABAAA:o"));
        assert!(b.contains("ASAAA:o"));
        let chan = link.ctx.state.get_channel("#rust").unwrap();
        assert!(chan.ops.contains("ABAAA"));
        assert!(link.ctx.state.get_user("ABAAA").unwrap().channels.contains("#rust"));
        assert_eq!(report.channels, 1);
    }

    #[tokio::test]
    async fn ban_flag_beats_autoop() {
        let link = registered(None).await;
        link.store.set_access("#rust", "Account", "3").await.unwrap();
        link.ctx.state.insert_user(user("ABAAA", "Nick", Some("Account"), "host"));

        let report = run_burst(&link.ctx, &mut bursts()).await.unwrap();

        let b = link
            .writer
            .lines()
            .into_iter()
            .find(|l| l.starts_with("AS B "))
            .unwrap();
        assert!(!b.contains("ABAAA"));
        assert_eq!(report.ops, 0);
        assert!(!link.ctx.state.get_channel("#rust").unwrap().ops.contains("ABAAA"));
    }

    #[tokio::test]
    async fn autovoice_and_plain_members() {
        let link = registered(None).await;
        link.store.set_access("#rust", "Voiced", "4").await.unwrap();
        link.ctx.state.insert_user(user("ABAAA", "Voiced", Some("Voiced"), "host"));
        link.ctx.state.insert_user(user("ABAAB", "Early", None, "host"));
        link.ctx.state.add_member("#rust", "ABAAB", 900);

        run_burst(&link.ctx, &mut bursts()).await.unwrap();

        let b = link
            .writer
            .lines()
            .into_iter()
            .find(|l| l.starts_with("AS B "))
            .unwrap();
        assert!(b.ends_with(" ABAAB,ABAAA:v,ASAAA:o"), "{b}");
        // The channel already existed with an older timestamp.
        assert!(b.starts_with("AS B #Rust 900 "));
        let chan = link.ctx.state.get_channel("#rust").unwrap();
        assert!(chan.voices.contains("ABAAA"));
        assert_eq!(chan.users.len(), 3);
    }

    #[tokio::test]
    async fn stored_ban_kicks_member() {
        let link = registered(None).await;
        link.store.add_ban("#rust", "*!*@bad.example").await.unwrap();
        link.ctx.state.insert_user(user("ABAAB", "Bad", None, "bad.example"));
        link.ctx.state.add_member("#rust", "ABAAB", 1_500);

        let report = run_burst(&link.ctx, &mut bursts()).await.unwrap();

        let lines = link.writer.lines();
        assert!(lines.contains(&"ASAAA M #rust +b *!*@bad.example".to_string()));
        assert!(lines.contains(&"ASAAA K #rust ABAAB :You are banned from this channel".to_string()));
        assert_eq!(report.kicks, 1);
        let chan = link.ctx.state.get_channel("#rust").unwrap();
        assert!(!chan.users.contains("ABAAB"));
        assert!(link.ctx.state.get_user("ABAAB").unwrap().channels.is_empty());
    }

    #[tokio::test]
    async fn bans_are_found_for_names_that_fold() {
        let store = Arc::new(MemoryStore::new());
        store
            .register_channel(&ChannelRecord {
                name: "#Foo[1]".into(),
                registered_ts: Some(1_000),
                modes: "nt".into(),
                topic: None,
            })
            .await
            .unwrap();
        store.add_ban("#Foo[1]", "*!*@bad.example").await.unwrap();
        let link = test_link_with(store);
        link.ctx
            .introduce_client("ChanServ", "services", "services.int", "Channel Services")
            .await
            .unwrap();
        link.ctx.state.insert_user(user("ABAAB", "Bad", None, "bad.example"));
        link.ctx.state.add_member("#Foo[1]", "ABAAB", 1_500);
        link.writer.take();

        let mut map = BurstMap::new();
        map.entry("#Foo[1]", 1_000, "+nt").add("ASAAA", MemberTag::Op);
        let report = run_burst(&link.ctx, &mut map).await.unwrap();

        assert_eq!(report.kicks, 1);
        assert!(
            link.writer
                .lines()
                .iter()
                .any(|l| l.starts_with("ASAAA K ") && l.contains(" ABAAB "))
        );
        let chan = link.ctx.state.get_channel("#foo{1}").unwrap();
        assert!(!chan.users.contains("ABAAB"));
    }

    #[tokio::test]
    async fn garbage_flags_grant_nothing() {
        let link = registered(None).await;
        link.store.set_access("#rust", "Account", "lots").await.unwrap();
        link.ctx.state.insert_user(user("ABAAA", "Nick", Some("Account"), "host"));
        link.ctx.state.add_member("#rust", "ABAAA", 1_000);

        let report = run_burst(&link.ctx, &mut bursts()).await.unwrap();

        assert_eq!(report.ops, 0);
        assert_eq!(report.voices, 0);
        let chan = link.ctx.state.get_channel("#rust").unwrap();
        assert!(chan.users.contains("ABAAA"));
        assert!(!chan.ops.contains("ABAAA"));
    }

    #[tokio::test]
    async fn enforcement_ops_members_missing_status() {
        let link = registered(None).await;
        link.ctx.state.insert_user(user("ABAAA", "Nick", Some("Account"), "host"));
        link.ctx.state.add_member("#rust", "ASAAA", 1_000);
        link.ctx.state.add_member("#rust", "ABAAA", 1_000);

        let mut report = BurstReport::default();
        let acl = [("account".to_string(), AclFlags(AclFlags::AUTOOP))];
        enforce_channel(&link.ctx, "#rust", "#Rust", &acl, &mut report).await.unwrap();
        // A second pass finds nothing left to do.
        enforce_channel(&link.ctx, "#rust", "#Rust", &acl, &mut report).await.unwrap();

        assert_eq!(link.writer.lines(), vec!["ASAAA M #rust +o ABAAA".to_string()]);
        assert_eq!(report.ops, 1);
        assert!(link.ctx.state.get_channel("#rust").unwrap().ops.contains("ABAAA"));
    }

    #[tokio::test]
    async fn no_local_member_means_no_enforcement() {
        let link = registered(None).await;
        link.ctx.state.insert_user(user("ABAAA", "Nick", Some("Account"), "host"));
        link.ctx.state.add_member("#rust", "ABAAA", 1_000);

        let acl = [("Account".to_string(), AclFlags(AclFlags::AUTOOP))];
        enforce_channel(&link.ctx, "#rust", "#Rust", &acl, &mut BurstReport::default())
            .await
            .unwrap();

        assert!(link.writer.lines().is_empty());
    }

    #[tokio::test]
    async fn stored_topic_fills_empty_topic_only() {
        let link = registered(Some("Welcome to Rust")).await;
        run_burst(&link.ctx, &mut bursts()).await.unwrap();
        assert!(link
            .writer
            .lines()
            .contains(&"ASAAA T #Rust :Welcome to Rust".to_string()));

        let link = registered(Some("Stored")).await;
        link.ctx.state.add_member("#rust", "ABAAA", 1);
        link.ctx.state.set_topic("#rust", Some("Live".into()));
        let report = run_burst(&link.ctx, &mut bursts()).await.unwrap();
        assert_eq!(report.topics, 0);
        assert_eq!(
            link.ctx.state.get_channel("#rust").unwrap().topic.as_deref(),
            Some("Live")
        );
    }

    #[tokio::test]
    async fn unregistered_channels_skip_acl_tagging() {
        let link = registered(None).await;
        link.store.set_access("#other", "Account", "2").await.unwrap();
        link.ctx.state.insert_user(user("ABAAA", "Nick", Some("Account"), "host"));
        let mut map = BurstMap::new();
        map.entry("#other", 5, "").add("ASAAA", MemberTag::Plain);

        run_burst(&link.ctx, &mut map).await.unwrap();

        assert!(link.writer.lines().contains(&"AS B #other 5 ASAAA:o".to_string()));
    }
}
