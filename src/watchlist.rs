//! Watchlist records and the corpora they are grouped into.
//!
//! A corpus is one family of lists (sanctions, politically exposed persons,
//! adverse media). Each corpus may aggregate several published source lists
//! such as the OFAC SDN list and the UN consolidated list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of watchlists searched as one unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Sanctions,
    Pep,
    AdverseMedia,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Sanctions, ListKind::Pep, ListKind::AdverseMedia];

    /// Identifier used by list providers and in match provenance
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Sanctions => "sanctions",
            ListKind::Pep => "pep",
            ListKind::AdverseMedia => "adverse_media",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a watchlist record describes a person or an organisation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Individual,
    Entity,
}

/// A single record from a published watchlist.
///
/// Records are never edited in place. A list refresh replaces the whole
/// corpus they belong to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub kind: EntityKind,
    /// Published lists carrying this record, e.g. "OFAC SDN List"
    pub sources: Vec<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
    #[serde(default)]
    pub nationalities: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Public offices held, only populated for PEP records
    #[serde(default)]
    pub positions: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl WatchlistEntity {
    /// Every name the record is known by, canonical name first
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Primary source list, used as the match's list name
    pub fn primary_source(&self) -> &str {
        self.sources.first().map(String::as_str).unwrap_or("Unknown List")
    }

    pub fn has_nationality(&self, nationality: &str) -> bool {
        let wanted = nationality.trim();
        !wanted.is_empty()
            && self
                .nationalities
                .iter()
                .any(|n| n.trim().eq_ignore_ascii_case(wanted))
    }
}
