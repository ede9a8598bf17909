//! The canonical mirror of network state.
//!
//! [`StateStore`] owns every [`User`], [`Channel`] and [`Server`] the link has
//! seen. Callers get clones back; nothing outside this module holds a guard
//! into the maps, so no shard lock ever lives across an `.await`.

use super::channel::{Channel, normalize_modes};
use super::user::User;
use dashmap::DashMap;
use slirc_p10::numeric::server_of;
use slirc_p10::{BurstMember, irc_eq, irc_to_lower};
use std::collections::HashSet;
use std::net::IpAddr;

/// A server behind the uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub numeric: String,
    pub name: String,
    /// Numeric of the server this one is linked behind. `None` for our uplink.
    pub uplink: Option<String>,
    pub hops: u32,
}

/// Users by numeric, channels by lowercase name, servers by numeric.
#[derive(Default)]
pub struct StateStore {
    users: DashMap<String, User>,
    channels: DashMap<String, Channel>,
    servers: DashMap<String, Server>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Insert or replace a user. Returns the previous record, if any.
    pub fn insert_user(&self, user: User) -> Option<User> {
        self.users.insert(user.numeric.clone(), user)
    }

    pub fn get_user(&self, numeric: &str) -> Option<User> {
        self.users.get(numeric).map(|u| u.value().clone())
    }

    pub fn has_user(&self, numeric: &str) -> bool {
        self.users.contains_key(numeric)
    }

    /// Mutate a user in place. Returns false if the numeric is unknown.
    pub fn update_user<F: FnOnce(&mut User)>(&self, numeric: &str, f: F) -> bool {
        match self.users.get_mut(numeric) {
            Some(mut user) => {
                f(user.value_mut());
                true
            }
            None => false,
        }
    }

    /// Remove a user and strip it from every channel, deleting channels
    /// left without members.
    pub fn remove_user(&self, numeric: &str) -> Option<User> {
        let removed = self.users.remove(numeric).map(|(_, u)| u);
        self.channels.retain(|_, chan| {
            chan.remove_member(numeric);
            !chan.is_empty()
        });
        removed
    }

    pub fn rename_user(&self, numeric: &str, nick: &str, ts: i64) -> bool {
        self.update_user(numeric, |u| {
            u.nick = nick.to_string();
            u.nick_ts = ts;
        })
    }

    pub fn set_account(&self, numeric: &str, account: Option<String>) -> bool {
        self.update_user(numeric, |u| {
            u.modes.registered = account.is_some();
            u.account = account;
        })
    }

    pub fn find_by_nick(&self, nick: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| irc_eq(&u.nick, nick))
            .map(|u| u.value().clone())
    }

    /// Every connected user authenticated as `account`.
    pub fn find_by_account(&self, account: &str) -> Vec<User> {
        self.users
            .iter()
            .filter(|u| {
                u.account
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case(account))
            })
            .map(|u| u.value().clone())
            .collect()
    }

    /// Live connections from `ip`.
    pub fn connections_from(&self, ip: IpAddr) -> usize {
        self.users.iter().filter(|u| u.ip == Some(ip)).count()
    }

    /// Live connections from `ip` using `ident`.
    pub fn connections_from_ident(&self, ip: IpAddr, ident: &str) -> usize {
        self.users
            .iter()
            .filter(|u| u.ip == Some(ip) && u.ident.trim_start_matches('~') == ident.trim_start_matches('~'))
            .count()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // ========================================================================
    // Channels
    // ========================================================================

    pub fn get_channel(&self, name: &str) -> Option<Channel> {
        self.channels
            .get(&irc_to_lower(name))
            .map(|c| c.value().clone())
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.key().clone()).collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Join `numeric` to `channel`, creating the channel with `ts` as its
    /// creation time if needed. Returns true if the user was not already a member.
    pub fn add_member(&self, channel: &str, numeric: &str, ts: i64) -> bool {
        let key = irc_to_lower(channel);
        let added = {
            let mut chan = self
                .channels
                .entry(key.clone())
                .or_insert_with(|| Channel::new(&key, ts));
            let added = !chan.users.contains(numeric);
            chan.add_member(numeric, ts);
            added
        };
        self.update_user(numeric, |u| {
            u.channels.insert(key);
        });
        added
    }

    /// Part `numeric` from `channel`, deleting the channel if it empties.
    pub fn remove_member(&self, channel: &str, numeric: &str) -> bool {
        let key = irc_to_lower(channel);
        let (removed, empty) = match self.channels.get_mut(&key) {
            Some(mut chan) => (chan.remove_member(numeric), chan.is_empty()),
            None => (false, false),
        };
        if empty {
            self.channels.remove_if(&key, |_, chan| chan.is_empty());
        }
        self.update_user(numeric, |u| {
            u.channels.remove(&key);
        });
        removed
    }

    /// Part `numeric` from every channel (`J 0`). Returns the number parted.
    pub fn part_all(&self, numeric: &str) -> usize {
        let channels: Vec<String> = self
            .get_user(numeric)
            .map(|u| u.channels.into_iter().collect())
            .unwrap_or_default();
        channels
            .iter()
            .filter(|chan| self.remove_member(chan, numeric))
            .count()
    }

    pub fn set_op(&self, channel: &str, numeric: &str, value: bool) -> bool {
        self.channels
            .get_mut(&irc_to_lower(channel))
            .is_some_and(|mut c| c.set_op(numeric, value))
    }

    pub fn set_voice(&self, channel: &str, numeric: &str, value: bool) -> bool {
        self.channels
            .get_mut(&irc_to_lower(channel))
            .is_some_and(|mut c| c.set_voice(numeric, value))
    }

    /// Set or clear a channel mode letter. Adding a present mode or removing
    /// an absent one changes nothing.
    pub fn set_channel_mode(&self, channel: &str, mode: char, add: bool) -> bool {
        self.channels
            .get_mut(&irc_to_lower(channel))
            .is_some_and(|mut c| c.set_mode(mode, add))
    }

    pub fn set_topic(&self, channel: &str, topic: Option<String>) -> bool {
        match self.channels.get_mut(&irc_to_lower(channel)) {
            Some(mut chan) => {
                chan.topic = topic.filter(|t| !t.is_empty());
                true
            }
            None => false,
        }
    }

    /// Merge a burst entry into the channel.
    ///
    /// The earlier creation time wins, modes are added, members are added
    /// with their flags. Existing members, ops and voices are never removed,
    /// so replaying the same burst changes nothing.
    pub fn merge_burst(&self, channel: &str, ts: i64, modes: &str, members: &[BurstMember]) {
        let key = irc_to_lower(channel);
        let empty = {
            let mut chan = self
                .channels
                .entry(key.clone())
                .or_insert_with(|| Channel::new(&key, ts));
            if ts > 0 && (chan.created_at <= 0 || ts < chan.created_at) {
                chan.created_at = ts;
            }
            for mode in normalize_modes(modes).chars() {
                chan.set_mode(mode, true);
            }
            for member in members {
                if !chan.users.contains(&member.numeric) {
                    chan.add_member(&member.numeric, ts);
                }
                if member.flags.op {
                    chan.set_op(&member.numeric, true);
                }
                if member.flags.voice {
                    chan.set_voice(&member.numeric, true);
                }
            }
            chan.is_empty()
        };
        if empty {
            self.channels.remove_if(&key, |_, chan| chan.is_empty());
            return;
        }
        for member in members {
            self.update_user(&member.numeric, |u| {
                u.channels.insert(key.clone());
            });
        }
    }

    // ========================================================================
    // Servers
    // ========================================================================

    pub fn add_server(&self, server: Server) {
        self.servers.insert(server.numeric.clone(), server);
    }

    pub fn get_server(&self, numeric: &str) -> Option<Server> {
        self.servers.get(numeric).map(|s| s.value().clone())
    }

    pub fn find_server_by_name(&self, name: &str) -> Option<Server> {
        self.servers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.value().clone())
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Remove a server, every server linked behind it, and all of their
    /// users. Returns the removed users.
    pub fn remove_server(&self, numeric: &str) -> Vec<User> {
        let mut gone: HashSet<String> = HashSet::new();
        let mut pending = vec![numeric.to_string()];
        while let Some(next) = pending.pop() {
            if !gone.insert(next.clone()) {
                continue;
            }
            pending.extend(
                self.servers
                    .iter()
                    .filter(|s| s.uplink.as_deref() == Some(next.as_str()))
                    .map(|s| s.numeric.clone()),
            );
        }
        for server in &gone {
            self.servers.remove(server);
        }
        let doomed: Vec<String> = self
            .users
            .iter()
            .filter(|u| gone.contains(server_of(u.key())))
            .map(|u| u.key().clone())
            .collect();
        doomed
            .iter()
            .filter_map(|numeric| self.remove_user(numeric))
            .collect()
    }
}
