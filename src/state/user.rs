//! Network user records.

use std::collections::HashSet;
use std::net::IpAddr;

/// A user anywhere on the network, keyed by its five-character numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub numeric: String,
    pub nick: String,
    pub ident: String,
    pub host: String,
    /// Host shown when the user is marked (`+x`), from the `h` mode field.
    pub hidden_host: Option<String>,
    pub ip: Option<IpAddr>,
    pub account: Option<String>,
    pub modes: UserModes,
    /// Operator name from the `o` mode field, when the uplink sends one.
    pub oper_name: Option<String>,
    pub nick_ts: i64,
    pub realname: String,
    /// Lowercase names of joined channels.
    pub channels: HashSet<String>,
}

impl User {
    /// Services and operators. Collisions involving these are worth a warning.
    pub fn is_privileged(&self) -> bool {
        self.modes.service || self.modes.oper
    }

    /// Host other users see.
    pub fn visible_host(&self) -> &str {
        match (&self.hidden_host, self.modes.marked) {
            (Some(hidden), true) => hidden,
            _ => &self.host,
        }
    }

    /// `nick!ident@host` masks to test against bans: visible, real, hidden.
    /// Duplicates are skipped so each distinct mask is tested once.
    pub fn ban_masks(&self) -> Vec<String> {
        let mut masks = Vec::with_capacity(3);
        let mut hosts = vec![self.visible_host(), self.host.as_str()];
        if let Some(hidden) = &self.hidden_host {
            hosts.push(hidden);
        }
        for host in hosts {
            let mask = format!("{}!{}@{}", self.nick, self.ident, host);
            if !masks.contains(&mask) {
                masks.push(mask);
            }
        }
        masks
    }

    /// `nick!ident@host` with the real host.
    pub fn full_mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }
}

/// User modes tracked by services.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserModes {
    pub invisible: bool,  // +i
    pub wallops: bool,    // +w
    pub oper: bool,       // +o
    pub service: bool,    // +k (network service, cannot be kicked)
    pub marked: bool,     // +x (host hidden)
    pub registered: bool, // +r (account attached)
    pub deaf: bool,       // +d
}

impl UserModes {
    /// Parse a mode string such as `+iwx`.
    pub fn from_mode_string(modes: &str) -> Self {
        let mut parsed = Self::default();
        parsed.apply(modes);
        parsed
    }

    /// Apply a `+`/`-` mode change string. Unknown letters are ignored.
    pub fn apply(&mut self, change: &str) {
        let mut adding = true;
        for c in change.chars() {
            match c {
                '+' => adding = true,
                '-' => adding = false,
                _ => {
                    let _ = self.set(c, adding);
                }
            }
        }
    }

    /// Set a single mode. Returns false for letters not tracked here.
    pub fn set(&mut self, mode: char, value: bool) -> bool {
        let slot = match mode {
            'i' => &mut self.invisible,
            'w' => &mut self.wallops,
            'o' => &mut self.oper,
            'k' => &mut self.service,
            'x' => &mut self.marked,
            'r' => &mut self.registered,
            'd' => &mut self.deaf,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Convert modes to a string like "+iw".
    pub fn as_mode_string(&self) -> String {
        let mut s = String::from("+");
        for (set, c) in [
            (self.invisible, 'i'),
            (self.wallops, 'w'),
            (self.oper, 'o'),
            (self.service, 'k'),
            (self.marked, 'x'),
            (self.registered, 'r'),
            (self.deaf, 'd'),
        ] {
            if set {
                s.push(c);
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            numeric: "ABAAA".into(),
            nick: "Nick".into(),
            ident: "ident".into(),
            host: "host.example".into(),
            hidden_host: Some("Nick.users.example".into()),
            ip: None,
            account: Some("Nick".into()),
            modes: UserModes::from_mode_string("+ix"),
            oper_name: None,
            nick_ts: 1_700_000_000,
            realname: "Real".into(),
            channels: HashSet::new(),
        }
    }

    #[test]
    fn mode_string_round_trip() {
        let modes = UserModes::from_mode_string("+iwok");
        assert!(modes.invisible && modes.wallops && modes.oper && modes.service);
        assert_eq!(modes.as_mode_string(), "+iwok");
    }

    #[test]
    fn apply_handles_removal() {
        let mut modes = UserModes::from_mode_string("+iox");
        modes.apply("-o+w-x");
        assert!(!modes.oper && !modes.marked && modes.wallops && modes.invisible);
        assert_eq!(UserModes::default().as_mode_string(), "+");
    }

    #[test]
    fn marked_user_shows_hidden_host() {
        let mut u = user();
        assert_eq!(u.visible_host(), "Nick.users.example");
        u.modes.marked = false;
        assert_eq!(u.visible_host(), "host.example");
    }

    #[test]
    fn ban_masks_are_distinct() {
        let u = user();
        assert_eq!(
            u.ban_masks(),
            vec![
                "Nick!ident@Nick.users.example".to_string(),
                "Nick!ident@host.example".to_string(),
            ]
        );
        assert!(!u.is_privileged());
    }
}
