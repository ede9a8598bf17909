//! RFC 1459 case mapping, as used by ircu for nicks and channel names.

/// Lowercase a single character under RFC 1459 rules.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Lowercase a string under RFC 1459 rules.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive comparison under RFC 1459 rules.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.chars()
            .zip(b.chars())
            .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_characters_fold() {
        assert_eq!(irc_to_lower("#Foo[Bar]"), "#foo{bar}");
        assert!(irc_eq("Nick\\Away", "nick|away"));
        assert!(!irc_eq("abc", "abcd"));
    }
}
