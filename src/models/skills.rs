use serde::Serialize;
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Ordered set of display-cased skill tokens.
///
/// Tokens are trimmed, non-empty and title-cased; duplicates (compared
/// case-insensitively) are dropped keeping the first occurrence. The
/// comma-joined string form only exists at the storage boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SkillSet(Vec<String>);

/// Parses a raw comma-separated skill list into its canonical set.
pub fn normalize(raw: &str) -> SkillSet {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let display = title_case(token);
        if seen.insert(fold(&display)) {
            tokens.push(display);
        }
    }

    SkillSet(tokens)
}

/// Comparison key for a token.
pub fn fold(token: &str) -> String {
    token.trim().to_lowercase()
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
/// Letters whose case mapping expands to several characters are left as-is.
pub fn title_case(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut in_word = false;

    for ch in token.chars() {
        if ch.is_alphabetic() {
            let mapped = if in_word { single(ch.to_lowercase()) } else { single(ch.to_uppercase()) };
            out.push(mapped.unwrap_or(ch));
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }

    out
}

fn single(mut mapping: impl Iterator<Item = char>) -> Option<char> {
    let first = mapping.next()?;
    mapping.next().is_none().then_some(first)
}

impl SkillSet {
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, token: &str) -> bool {
        let key = fold(token);
        self.0.iter().any(|t| fold(t) == key)
    }

    /// Comparison keys in set order.
    pub fn folded(&self) -> impl Iterator<Item = String> + '_ {
        self.0.iter().map(|t| fold(t))
    }

    /// Set union keeping `self`'s order, then the unseen tokens of `other`.
    pub fn union(&self, other: &SkillSet) -> SkillSet {
        let mut merged = self.clone();
        for token in other.iter() {
            if !merged.contains(token) {
                merged.0.push(token.clone());
            }
        }
        merged
    }
}

impl fmt::Display for SkillSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl FromStr for SkillSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize(s))
    }
}

impl<'a> IntoIterator for &'a SkillSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
