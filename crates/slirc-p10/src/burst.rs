//! Burst (`B`) member lists.
//!
//! Members are comma separated. A `:` suffix sets the membership flags for
//! that member and every following member until the next suffix, so
//! `ABAAA,ABAAB:o,ABAAC` makes both `ABAAB` and `ABAAC` operators.

use crate::line::Line;

/// Channel modes whose parameter follows the mode string in a `B` line.
pub const PARAM_MODES: &[char] = &['k', 'l', 'A', 'U'];

/// Positional fields of `<src> B <chan> <ts> [+modes [args...]] [members] [:%bans]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstFields<'a> {
    pub channel: &'a str,
    pub timestamp: &'a str,
    /// Mode string including the leading `+`, empty when absent.
    pub modes: &'a str,
    pub members: Option<&'a str>,
}

impl<'a> BurstFields<'a> {
    /// Walk a `B` line past the mode parameters to its member list.
    /// Returns `None` when the channel or timestamp is missing.
    pub fn parse(line: &Line<'a>) -> Option<Self> {
        let channel = line.get(2)?;
        let timestamp = line.get(3)?;
        let mut idx = 4;
        let mut modes = "";
        if let Some(m) = line.get(idx).filter(|m| m.starts_with('+')) {
            modes = m;
            idx += 1 + m.chars().filter(|c| PARAM_MODES.contains(c)).count();
        }
        let members = line.get(idx).filter(|t| !t.starts_with(':'));
        Some(Self {
            channel,
            timestamp,
            modes,
            members,
        })
    }

    /// Parsed member list, empty when the burst carries none.
    pub fn member_list(&self) -> Vec<BurstMember> {
        self.members.map(parse_members).unwrap_or_default()
    }
}

/// Membership flags carried in a burst member list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberFlags {
    pub op: bool,
    pub voice: bool,
}

impl MemberFlags {
    pub const NONE: MemberFlags = MemberFlags { op: false, voice: false };
    pub const OP: MemberFlags = MemberFlags { op: true, voice: false };
    pub const VOICE: MemberFlags = MemberFlags { op: false, voice: true };

    /// Parse a suffix such as `o`, `v` or `ov`. Unknown letters are ignored.
    pub fn from_suffix(suffix: &str) -> Self {
        let mut flags = MemberFlags::NONE;
        for c in suffix.chars() {
            match c {
                'o' => flags.op = true,
                'v' => flags.voice = true,
                _ => {}
            }
        }
        flags
    }

    /// Suffix text for these flags (empty when none are set).
    pub fn suffix(&self) -> &'static str {
        match (self.op, self.voice) {
            (true, true) => "ov",
            (true, false) => "o",
            (false, true) => "v",
            (false, false) => "",
        }
    }
}

/// One entry from a burst member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstMember {
    pub numeric: String,
    pub flags: MemberFlags,
}

/// Parse a comma-separated member list with sticky suffixes.
pub fn parse_members(list: &str) -> Vec<BurstMember> {
    let mut current = MemberFlags::NONE;
    list.split(',')
        .filter(|item| !item.is_empty())
        .map(|item| {
            let numeric = match item.split_once(':') {
                Some((numeric, suffix)) => {
                    current = MemberFlags::from_suffix(suffix);
                    numeric
                }
                None => item,
            };
            BurstMember {
                numeric: numeric.to_string(),
                flags: current,
            }
        })
        .collect()
}

/// Format a member list.
///
/// Members are grouped plain, then voiced, then opped, then opped and voiced,
/// and every flagged member carries its suffix explicitly so the result reads
/// the same under sticky-suffix rules.
pub fn format_members(members: &[BurstMember]) -> String {
    let order = [
        MemberFlags::NONE,
        MemberFlags::VOICE,
        MemberFlags::OP,
        MemberFlags { op: true, voice: true },
    ];
    let mut parts = Vec::with_capacity(members.len());
    for group in order {
        for member in members.iter().filter(|m| m.flags == group) {
            if group == MemberFlags::NONE {
                parts.push(member.numeric.clone());
            } else {
                parts.push(format!("{}:{}", member.numeric, group.suffix()));
            }
        }
    }
    parts.join(",")
}
