//! Name similarity scoring.
//!
//! A token heuristic rather than an edit distance: exact equality, whole-word
//! containment in any order, then weighted word overlap. The numbers used at each stage come
//! from a [`MatchProfile`], so the stricter sanctions scoring and the general
//! scoring used for PEP and adverse media share one implementation.

use serde::{Deserialize, Serialize};

/// Tunables for one flavour of name matching
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MatchProfile {
    /// Score when every word of one name appears in the other
    pub containment_score: u8,
    /// Ceiling for scores produced by word overlap
    pub partial_token_max: u8,
    /// Credit for a word that only matches as a substring of another word
    pub partial_token_credit: f64,
    /// Both words must be at least this long for substring credit
    pub min_partial_token_len: usize,
}

impl MatchProfile {
    /// Profile used for PEP and adverse-media corpora
    pub const GENERAL: MatchProfile = MatchProfile {
        containment_score: 85,
        partial_token_max: 75,
        partial_token_credit: 0.7,
        min_partial_token_len: 4,
    };

    /// Profile used for sanctions lists
    pub const SANCTIONS: MatchProfile = MatchProfile {
        containment_score: 90,
        partial_token_max: 85,
        partial_token_credit: 0.7,
        min_partial_token_len: 4,
    };
}

impl Default for MatchProfile {
    fn default() -> Self {
        Self::GENERAL
    }
}

/// Lowercase, drop punctuation and collapse whitespace.
///
/// `"PUTIN, Vladimir"` and `"putin vladimir"` normalize to the same string.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A name normalized and tokenized once, reused across many comparisons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedName {
    normalized: String,
    tokens: Vec<String>,
}

impl PreparedName {
    pub fn new(raw: &str) -> Self {
        let normalized = normalize_name(raw);
        let tokens = normalized.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect();
        Self { normalized, tokens }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// True when every word of `other` is also a word of this name, in any order
    fn contains_words_of(&self, other: &PreparedName) -> bool {
        other.tokens.len() <= self.tokens.len() && other.tokens.iter().all(|word| self.tokens.contains(word))
    }
}

/// Name matcher bound to one profile
#[derive(Debug, Clone, Copy, Default)]
pub struct NameMatcher {
    profile: MatchProfile,
}

impl NameMatcher {
    pub fn new(profile: MatchProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &MatchProfile {
        &self.profile
    }

    /// Similarity between two raw names, 0 to 100
    pub fn similarity(&self, query: &str, candidate: &str) -> u8 {
        self.similarity_prepared(&PreparedName::new(query), &PreparedName::new(candidate))
    }

    /// Similarity between two already prepared names, 0 to 100
    pub fn similarity_prepared(&self, query: &PreparedName, candidate: &PreparedName) -> u8 {
        if query.is_empty() || candidate.is_empty() {
            return 0;
        }

        if query.normalized == candidate.normalized {
            return 100;
        }

        if query.contains_words_of(candidate) || candidate.contains_words_of(query) {
            return self.profile.containment_score.min(100);
        }

        let matched: f64 = query
            .tokens
            .iter()
            .map(|word| self.token_credit(word, &candidate.tokens))
            .sum();
        let denominator = query.tokens.len().max(candidate.tokens.len()) as f64;
        let overlap = (matched / denominator).clamp(0.0, 1.0);

        (overlap * f64::from(self.profile.partial_token_max)).round().clamp(0.0, 100.0) as u8
    }

    /// Highest similarity of `query` against any of `names`, with the name that produced it
    pub fn best_of<'a, I>(&self, query: &PreparedName, names: I) -> Option<(u8, &'a str)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| (self.similarity_prepared(query, &PreparedName::new(name)), name))
            .fold(None, |best, (score, name)| match best {
                Some((top, _)) if top >= score => best,
                _ => Some((score, name)),
            })
    }

    fn token_credit(&self, word: &str, candidates: &[String]) -> f64 {
        if candidates.iter().any(|c| c == word) {
            return 1.0;
        }

        let min_len = self.profile.min_partial_token_len;
        let word_len = word.chars().count();
        let partial = candidates.iter().any(|c| {
            word_len >= min_len
                && c.chars().count() >= min_len
                && (c.contains(word) || word.contains(c.as_str()))
        });

        if partial {
            self.profile.partial_token_credit
        } else {
            0.0
        }
    }
}
