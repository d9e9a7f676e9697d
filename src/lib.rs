//! # AML Screening Engine
//!
//! Anti-money-laundering screening of individuals and companies against
//! sanctions, politically exposed person (PEP) and adverse-media watchlists.
//!
//! ## Features
//!
//! - **Fuzzy Name Matching**: Token-based similarity with per-list profiles
//! - **Watchlist Store**: Copy-on-write list snapshots with a staleness policy
//! - **Weighted Risk Scoring**: Max-biased blend with a hard sanctions override
//! - **Degraded Screening**: Missing lists are flagged, never reported as low risk
//! - **Review Workflow**: Per-match review states and ongoing monitoring toggles
//! - **Pluggable Sources**: Mock, file and HTTP watchlist providers
//! - **Company Verification**: Registry red flags reported beside the score
//!
//! ## Flow
//!
//! A [`ScreeningRequest`] goes to the [`ScreeningEngine`], which searches each
//! required corpus of the current [`ListStore`] snapshot, aggregates the hits
//! with the [`RiskAggregator`] and returns a [`ScreeningResult`]. Persisting the
//! result and reviewing its matches happen through [`ReviewWorkflow`].

pub mod config;
pub mod engine;
pub mod list_store;
pub mod matcher;
pub mod providers;
pub mod repository;
pub mod review;
pub mod risk;
pub mod screening;
pub mod search;
pub mod telemetry;
pub mod verification;
pub mod watchlist;

pub use config::{ConfigError, EngineConfig, TelemetryConfig};
pub use engine::{ScreeningEngine, SimulatedVendor, VendorGateway};
pub use list_store::{ListSnapshot, ListStore, RefreshReport};
pub use matcher::{MatchProfile, NameMatcher};
pub use providers::{FileListProvider, ListProvider, MockListProvider, ProviderError};
pub use repository::{InMemoryScreeningRepository, RepositoryError, ScreeningId, ScreeningRepository};
pub use review::{RescreenOutcome, ReviewError, ReviewSummary, ReviewWorkflow};
pub use risk::{RiskAggregator, RiskAssessment, RiskLevel};
pub use screening::{MatchType, ReviewStatus, ScreeningMatch, ScreeningResult, ScreeningStatus, Verdict};
pub use search::{ListSearch, SearchConfig, SearchQuery};
pub use verification::{CompanyProfile, CompanyRegistry, CompanyVerifier, RedFlag, VerificationReport};
pub use watchlist::{EntityKind, ListKind, WatchlistEntity};

#[cfg(feature = "http-provider")]
pub use providers::{HttpListProvider, HttpProviderConfig};

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Screening errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ScreeningError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Watchlists unavailable: {}", format_lists(.lists))]
    ListUnavailable { lists: Vec<ListKind> },

    #[error("Screening timed out after {timeout_ms} ms")]
    ScreeningTimeout { timeout_ms: u64 },

    #[error("Matching failed on watchlist record {entity_id}: {reason}")]
    InternalMatching { entity_id: String, reason: String },

    #[error("Screening vendor unavailable: {0}")]
    VendorUnavailable(String),
}

impl ScreeningError {
    fn validation(field: &str, message: impl Into<String>) -> Self {
        ScreeningError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// True for failures worth retrying unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScreeningError::ListUnavailable { .. }
                | ScreeningError::ScreeningTimeout { .. }
                | ScreeningError::VendorUnavailable(_)
        )
    }
}

fn format_lists(lists: &[ListKind]) -> String {
    lists.iter().map(ListKind::as_str).collect::<Vec<_>>().join(", ")
}

/// Kind of subject being screened
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectType {
    Individual,
    Company,
}

impl SubjectType {
    /// Watchlist record kind corresponding to this subject
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            SubjectType::Individual => EntityKind::Individual,
            SubjectType::Company => EntityKind::Entity,
        }
    }

    /// Corpora that must be searched, in result order
    pub fn required_lists(&self) -> &'static [ListKind] {
        match self {
            SubjectType::Individual => &[ListKind::Sanctions, ListKind::Pep, ListKind::AdverseMedia],
            SubjectType::Company => &[ListKind::Sanctions, ListKind::AdverseMedia],
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectType::Individual => write!(f, "individual"),
            SubjectType::Company => write!(f, "company"),
        }
    }
}

/// Subject to screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningRequest {
    pub subject_type: SubjectType,
    pub subject_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub company_number: Option<String>,
    pub registration_country: Option<String>,
}

impl ScreeningRequest {
    pub fn individual(name: impl Into<String>) -> Self {
        Self {
            subject_type: SubjectType::Individual,
            subject_name: name.into(),
            email: None,
            phone: None,
            date_of_birth: None,
            nationality: None,
            company_number: None,
            registration_country: None,
        }
    }

    pub fn company(name: impl Into<String>, company_number: impl Into<String>) -> Self {
        Self {
            subject_type: SubjectType::Company,
            company_number: Some(company_number.into()),
            ..Self::individual(name)
        }
    }

    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = Some(date_of_birth);
        self
    }

    pub fn with_nationality(mut self, nationality: impl Into<String>) -> Self {
        self.nationality = Some(nationality.into());
        self
    }

    pub fn with_registration_country(mut self, country: impl Into<String>) -> Self {
        self.registration_country = Some(country.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Validate required fields for the subject type
    pub fn validate(&self) -> Result<(), ScreeningError> {
        self.validate_on(Utc::now().date_naive())
    }

    /// Validate as of a given date
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), ScreeningError> {
        let name = self.subject_name.trim();
        if name.is_empty() {
            return Err(ScreeningError::validation("subject_name", "must not be empty"));
        }
        if !name.chars().any(char::is_alphanumeric) {
            return Err(ScreeningError::validation(
                "subject_name",
                "must contain at least one letter or digit",
            ));
        }

        if let Some(email) = &self.email {
            if !email_pattern().is_match(email.trim()) {
                return Err(ScreeningError::validation(
                    "email",
                    format!("'{}' is not a valid email address", email),
                ));
            }
        }

        if let Some(phone) = &self.phone {
            if !phone_pattern().is_match(phone.trim()) {
                return Err(ScreeningError::validation(
                    "phone",
                    format!("'{}' is not a valid phone number", phone),
                ));
            }
        }

        match self.subject_type {
            SubjectType::Individual => {
                if let Some(dob) = self.date_of_birth {
                    if dob > today {
                        return Err(ScreeningError::validation(
                            "date_of_birth",
                            "must not be in the future",
                        ));
                    }
                }
            }
            SubjectType::Company => {
                let number = self.company_number.as_deref().map(str::trim).unwrap_or("");
                if number.is_empty() {
                    return Err(ScreeningError::validation(
                        "company_number",
                        "is required for company screenings",
                    ));
                }
                if !company_number_pattern().is_match(number) {
                    return Err(ScreeningError::validation(
                        "company_number",
                        format!("'{}' is not a valid company number", number),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Attributes used when searching watchlists
    pub fn search_query(&self) -> SearchQuery {
        let (date_of_birth, nationality) = match self.subject_type {
            SubjectType::Individual => (self.date_of_birth, self.nationality.clone()),
            SubjectType::Company => (None, self.registration_country.clone()),
        };

        SearchQuery {
            name: self.subject_name.trim().to_string(),
            date_of_birth,
            nationality,
            subject_kind: Some(self.subject_type.entity_kind()),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("valid phone pattern"))
}

fn company_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-]{1,19}$").expect("valid company number pattern"))
}
