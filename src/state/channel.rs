//! Channel records.

use std::collections::{HashMap, HashSet};

/// A channel, keyed by its lowercase name.
///
/// `ops` and `voices` are always subsets of `users`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub name: String,
    /// Mode letters without sign, each at most once, in first-set order.
    pub modes: String,
    pub users: HashSet<String>,
    pub ops: HashSet<String>,
    pub voices: HashSet<String>,
    pub created_at: i64,
    /// Per-member last join time.
    pub last_join: HashMap<String, i64>,
    pub topic: Option<String>,
}

impl Channel {
    pub fn new(name: &str, created_at: i64) -> Self {
        Self {
            name: name.to_string(),
            created_at,
            ..Self::default()
        }
    }

    /// Set or clear a mode letter. Returns true if the mode string changed.
    pub fn set_mode(&mut self, mode: char, add: bool) -> bool {
        if mode == '+' || mode == '-' {
            return false;
        }
        let present = self.modes.contains(mode);
        match (add, present) {
            (true, false) => {
                self.modes.push(mode);
                true
            }
            (false, true) => {
                self.modes.retain(|c| c != mode);
                true
            }
            _ => false,
        }
    }

    /// Add a member. Existing status is kept.
    pub fn add_member(&mut self, numeric: &str, ts: i64) {
        self.users.insert(numeric.to_string());
        self.last_join.insert(numeric.to_string(), ts);
    }

    /// Remove a member and all of its status. Returns true if it was present.
    pub fn remove_member(&mut self, numeric: &str) -> bool {
        self.ops.remove(numeric);
        self.voices.remove(numeric);
        self.last_join.remove(numeric);
        self.users.remove(numeric)
    }

    /// Grant or revoke op. Only members can hold op.
    pub fn set_op(&mut self, numeric: &str, value: bool) -> bool {
        set_status(&self.users, &mut self.ops, numeric, value)
    }

    /// Grant or revoke voice. Only members can hold voice.
    pub fn set_voice(&mut self, numeric: &str, value: bool) -> bool {
        set_status(&self.users, &mut self.voices, numeric, value)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn set_status(users: &HashSet<String>, set: &mut HashSet<String>, numeric: &str, value: bool) -> bool {
    if value {
        users.contains(numeric) && set.insert(numeric.to_string())
    } else {
        set.remove(numeric)
    }
}

/// Normalize a mode string: drop signs, keep each letter once.
pub fn normalize_modes(modes: &str) -> String {
    let mut out = String::new();
    for c in modes.chars().filter(|c| *c != '+' && *c != '-') {
        if !out.contains(c) {
            out.push(c);
        }
    }
    out
}
