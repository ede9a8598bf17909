//! Whitespace tokenizer for P10 lines.
//!
//! P10 lines are `<source> <command> <args...> [:<trailing>]`, except for the
//! handful of unprefixed link-registration commands (`PASS`, `SERVER`,
//! `ERROR`) that an uplink sends before it has a numeric of its own.

/// Commands that arrive without a source numeric.
pub const UNPREFIXED: &[&str] = &["PASS", "SERVER", "ERROR"];

/// A borrowed, tokenized P10 line.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    raw: &'a str,
    tokens: Vec<(usize, &'a str)>,
}

impl<'a> Line<'a> {
    /// Tokenize a raw line. Trailing CR/LF are ignored.
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let mut tokens = Vec::new();
        let mut start = None;
        for (i, c) in raw.char_indices() {
            if c.is_whitespace() {
                if let Some(s) = start.take() {
                    tokens.push((s, &raw[s..i]));
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            tokens.push((s, &raw[s..]));
        }
        Self { raw, tokens }
    }

    /// The line without its line terminator.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// Number of whitespace-separated tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if the line held no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at `index`.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index).map(|(_, t)| *t)
    }

    /// All tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.tokens.iter().map(|(_, t)| *t)
    }

    /// Tokens from `index` onward.
    pub fn tokens_from(&self, index: usize) -> Vec<&'a str> {
        self.tokens.iter().skip(index).map(|(_, t)| *t).collect()
    }

    /// True if the first token is an unprefixed registration command.
    pub fn is_unprefixed(&self) -> bool {
        self.get(0).is_some_and(|t| UNPREFIXED.contains(&t))
    }

    /// Source numeric, absent for unprefixed commands.
    pub fn source(&self) -> Option<&'a str> {
        if self.is_unprefixed() {
            None
        } else {
            self.get(0)
        }
    }

    /// Command token.
    pub fn command(&self) -> Option<&'a str> {
        if self.is_unprefixed() {
            self.get(0)
        } else {
            self.get(1)
        }
    }

    /// Index of the first token at or after `from` that starts with `:`.
    pub fn trailing_index(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| self.tokens[i].1.starts_with(':'))
    }

    /// Trailing text starting at the first `:`-token at or after `from`,
    /// with original spacing preserved and the colon stripped.
    pub fn trailing(&self, from: usize) -> Option<&'a str> {
        let idx = self.trailing_index(from)?;
        let (offset, _) = self.tokens[idx];
        Some(&self.raw[offset + 1..])
    }

    /// Everything from token `index` to the end of the line, spacing preserved.
    pub fn rest_from(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index).map(|(offset, _)| &self.raw[*offset..])
    }
}
