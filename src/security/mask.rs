//! Wildcard masks.
//!
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//!
//! Everything else is literal. Matching is case-insensitive.

use regex::Regex;

/// A wildcard mask compiled once and matched many times.
#[derive(Debug, Clone)]
pub struct WildcardMask {
    source: String,
    regex: Option<Regex>,
}

impl WildcardMask {
    pub fn new(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            regex: Regex::new(&to_regex(pattern)).ok(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(text))
    }
}

/// Convert a wildcard pattern to an anchored, case-insensitive regex.
fn to_regex(pattern: &str) -> String {
    let mut regex_pattern = String::from("(?i)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                regex_pattern.push_str(&regex::escape(&literal));
                literal.clear();
                regex_pattern.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    regex_pattern.push_str(&regex::escape(&literal));
    regex_pattern.push('$');
    regex_pattern
}

/// One-off wildcard match.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    WildcardMask::new(pattern).matches(text)
}
