//! Name matching against the token typed at the cursor.

use crate::config::{MatchMode, MatchModes};

/// How well a name matched. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchQuality {
    Subword,
    Substring,
    Prefix,
    CamelCase,
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    token: String,
    modes: MatchModes,
    case_sensitive: bool,
}

impl MatchPattern {
    pub fn new(token: impl Into<String>, modes: MatchModes, case_sensitive: bool) -> Self {
        Self {
            token: token.into(),
            modes,
            case_sensitive,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn matches(&self, name: &str) -> bool {
        self.quality(name).is_some()
    }

    /// Best quality among the enabled modes, `None` when no mode matches.
    /// An empty token matches every name as a prefix.
    pub fn quality(&self, name: &str) -> Option<MatchQuality> {
        if self.token.is_empty() {
            return Some(MatchQuality::Prefix);
        }
        self.modes
            .iter()
            .filter(|&mode| self.matches_mode(mode, name))
            .map(|mode| match mode {
                MatchMode::Exact => MatchQuality::Exact,
                MatchMode::CamelCase => MatchQuality::CamelCase,
                MatchMode::Prefix => MatchQuality::Prefix,
                MatchMode::Substring => MatchQuality::Substring,
                MatchMode::Subword => MatchQuality::Subword,
            })
            .max()
            .map(|q| {
                // An exact spelling always reads as exact, whatever mode caught it.
                if self.eq(&self.token, name) {
                    MatchQuality::Exact
                } else {
                    q
                }
            })
    }

    fn matches_mode(&self, mode: MatchMode, name: &str) -> bool {
        match mode {
            MatchMode::Exact => self.eq(&self.token, name),
            MatchMode::Prefix => self.starts_with(name, &self.token),
            MatchMode::CamelCase => camel_case_match(&self.token, name, self.case_sensitive),
            MatchMode::Substring => {
                if self.case_sensitive {
                    name.contains(self.token.as_str())
                } else {
                    name.to_lowercase().contains(&self.token.to_lowercase())
                }
            }
            MatchMode::Subword => subword_match(&self.token, name, self.case_sensitive),
        }
    }

    fn eq(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
        }
    }

    fn starts_with(&self, name: &str, prefix: &str) -> bool {
        starts_with(name, prefix, self.case_sensitive)
    }
}

fn starts_with(name: &str, prefix: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        return name.starts_with(prefix);
    }
    let mut n = name.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|pc| n.next() == Some(pc))
}

/// Split an identifier into words at uppercase letters and underscores:
/// "getValueName" → ["get", "Value", "Name"], "MAX_VALUE" → ["M", "A", "X", "V", ...].
fn split_words(name: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in name.char_indices() {
        if ch == '_' || ch == '$' {
            if let Some(s) = start.take() {
                words.push(&name[s..i]);
            }
            continue;
        }
        if ch.is_uppercase()
            && let Some(s) = start
        {
            words.push(&name[s..i]);
            start = Some(i);
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(&name[s..]);
    }
    words
}

/// Camel-case match: the pattern's uppercase-delimited segments must each be a
/// prefix of the corresponding word of the candidate, in order, starting at
/// the first word ("NPE" matches "NullPointerException", "gV" matches
/// "getValue"). Patterns without any uppercase letter are not camel-case
/// patterns.
fn camel_case_match(pattern: &str, name: &str, case_sensitive: bool) -> bool {
    if !pattern.chars().any(char::is_uppercase) {
        return false;
    }
    let pattern_segments = split_words(pattern);
    let name_words = split_words(name);
    if pattern_segments.is_empty() || pattern_segments.len() > name_words.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(&name_words)
        .all(|(seg, word)| starts_with(word, seg, case_sensitive))
}

/// Subword match: the pattern can be cut into chunks that are, in order,
/// prefixes of words of the candidate; words may be skipped ("linkmap"
/// matches "LinkedHashMap" when case-insensitive).
fn subword_match(pattern: &str, name: &str, case_sensitive: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if case_sensitive {
            s.chars().collect()
        } else {
            s.chars().flat_map(char::to_lowercase).collect()
        }
    };
    let pattern = fold(pattern);
    // reached[i]: pattern[..i] is covered by chunks of the words seen so far
    let mut reached = vec![false; pattern.len() + 1];
    reached[0] = true;
    for word in split_words(name).into_iter().map(fold) {
        let mut next = reached.clone();
        for from in (0..pattern.len()).filter(|&i| reached[i]) {
            let common = word
                .iter()
                .zip(&pattern[from..])
                .take_while(|(a, b)| a == b)
                .count();
            for covered in &mut next[from + 1..=from + common] {
                *covered = true;
            }
        }
        reached = next;
        if reached[pattern.len()] {
            return true;
        }
    }
    reached[pattern.len()]
}
