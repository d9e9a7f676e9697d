//! Screening output: typed matches and the aggregated result

use crate::risk::RiskLevel;
use crate::watchlist::ListKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Kind of list that produced a match
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Sanctions,
    Pep,
    AdverseMedia,
    /// Internal or custom watchlists
    Watchlist,
}

impl MatchType {
    pub fn for_list(list: ListKind) -> Self {
        match list {
            ListKind::Sanctions => MatchType::Sanctions,
            ListKind::Pep => MatchType::Pep,
            ListKind::AdverseMedia => MatchType::AdverseMedia,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Sanctions => write!(f, "SANCTIONS"),
            MatchType::Pep => write!(f, "PEP"),
            MatchType::AdverseMedia => write!(f, "ADVERSE_MEDIA"),
            MatchType::Watchlist => write!(f, "WATCHLIST"),
        }
    }
}

/// Manual review state of a match
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    #[default]
    Pending,
    ConfirmedMatch,
    FalsePositive,
    Escalated,
}

impl ReviewStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "PENDING"),
            ReviewStatus::ConfirmedMatch => write!(f, "CONFIRMED_MATCH"),
            ReviewStatus::FalsePositive => write!(f, "FALSE_POSITIVE"),
            ReviewStatus::Escalated => write!(f, "ESCALATED"),
        }
    }
}

/// One watchlist record matched against the screened subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningMatch {
    pub id: Uuid,
    pub match_type: MatchType,
    pub entity_id: String,
    pub matched_name: String,
    /// Final score after attribute boosts, 0-100
    pub match_score: u8,
    /// Name similarity before boosts
    pub name_score: u8,
    /// Aliases of the matched record
    pub aliases: Vec<String>,
    pub source_list: String,
    pub list_type: String,
    pub source_url: Option<String>,
    pub matched_date_of_birth: Option<NaiveDate>,
    pub nationalities: Vec<String>,
    /// Offices held, PEP matches only
    pub positions_held: Vec<String>,
    pub review_status: ReviewStatus,
    /// The raw watchlist record
    pub metadata: serde_json::Value,
}

/// Whether every required corpus was searched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningStatus {
    Complete,
    /// At least one required corpus could not be searched
    Incomplete,
}

/// What a caller may present to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Conclusive(RiskLevel),
    /// Screening incomplete, retry once the missing lists load
    Incomplete { partial_level: RiskLevel },
}

/// Provenance of a screening result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningMetadata {
    pub screened_at: DateTime<Utc>,
    pub engine: String,
    pub version: String,
    pub vendor: String,
    pub lists_searched: Vec<ListKind>,
    /// Required corpora that could not be searched, with the reason
    pub lists_unavailable: BTreeMap<ListKind, String>,
    pub list_generation: u64,
    pub lists_refreshed_at: Option<DateTime<Utc>>,
    /// Searched corpora past the staleness threshold, with their load time
    #[serde(default)]
    pub lists_stale: BTreeMap<ListKind, DateTime<Utc>>,
    pub duration_ms: u64,
}

/// Complete outcome of screening one subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningResult {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub matches: Vec<ScreeningMatch>,
    pub sanctions_match: bool,
    pub pep_match: bool,
    pub adverse_media: bool,
    pub status: ScreeningStatus,
    /// SHA-256 over the ordered match set, stable across identical runs
    pub fingerprint: String,
    pub metadata: ScreeningMetadata,
}

impl ScreeningResult {
    pub fn is_complete(&self) -> bool {
        self.status == ScreeningStatus::Complete
    }

    /// The risk level, unless missing lists make it unsafe to rely on
    pub fn verdict(&self) -> Verdict {
        match self.status {
            ScreeningStatus::Complete => Verdict::Conclusive(self.risk_level),
            ScreeningStatus::Incomplete => Verdict::Incomplete {
                partial_level: self.risk_level,
            },
        }
    }

    /// Check if any match still awaits review
    pub fn requires_review(&self) -> bool {
        self.matches.iter().any(|m| m.review_status == ReviewStatus::Pending)
    }

    /// Get highest scoring match
    pub fn highest_match(&self) -> Option<&ScreeningMatch> {
        self.matches.iter().max_by_key(|m| m.match_score)
    }

    pub fn matches_of(&self, match_type: MatchType) -> impl Iterator<Item = &ScreeningMatch> {
        self.matches.iter().filter(move |m| m.match_type == match_type)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Digest of `(type, entity id, score)` for each match, in order
pub fn match_fingerprint(matches: &[ScreeningMatch]) -> String {
    let mut hasher = Sha256::new();
    for m in matches {
        hasher.update(m.match_type.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(m.entity_id.as_bytes());
        hasher.update(b":");
        hasher.update([m.match_score]);
        hasher.update(b"|");
    }
    format!("{:x}", hasher.finalize())
}
