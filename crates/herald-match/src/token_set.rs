//! Normalized token presence set consumed by all rule matching.

use std::collections::BTreeSet;

/// Deduplicated, lower-cased set of message tokens.
///
/// Built once per candidate evaluation; membership checks drive both the
/// match-tree literals and the `containsAny`/`containsAll` expression calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: BTreeSet<String>,
}

impl TokenSet {
    /// Normalizes `tokens` into a presence set: each token is trimmed and
    /// lower-cased, duplicates collapse. Order is irrelevant downstream.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let tokens = tokens
            .iter()
            .map(|token| token.as_ref().trim().to_lowercase())
            .collect();
        Self { tokens }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// True when at least one needle is present.
    pub fn contains_any<S: AsRef<str>>(&self, needles: &[S]) -> bool {
        needles
            .iter()
            .any(|needle| self.tokens.contains(needle.as_ref()))
    }

    /// True when every needle is present and the needle list is non-empty.
    pub fn contains_all<S: AsRef<str>>(&self, needles: &[S]) -> bool {
        !needles.is_empty()
            && needles
                .iter()
                .all(|needle| self.tokens.contains(needle.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}
