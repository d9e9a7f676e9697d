//! Company registry verification.
//!
//! Registry signals are raised as red flags for the reviewing analyst. They
//! are reported next to a screening and never change its risk score.

use crate::matcher::normalize_name;
use crate::{ScreeningRequest, SubjectType};
use async_trait::async_trait;
use chrono::{Months, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Registered status of a company
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    Active,
    Dormant,
    Liquidation,
    Dissolved,
}

/// Registry entry for a company
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    pub company_number: String,
    pub name: String,
    pub status: CompanyStatus,
    pub incorporated_on: NaiveDate,
    #[serde(default)]
    pub insolvency_history: bool,
    /// ISO 3166 alpha-2 code or country name
    pub registration_country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedFlagType {
    NotRegistered,
    NameMismatch,
    InactiveStatus,
    RecentlyIncorporated,
    InsolvencyHistory,
    HighRiskJurisdiction,
    ProhibitedJurisdiction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedFlag {
    pub flag_type: RedFlagType,
    pub description: String,
    pub severity: AlertSeverity,
}

impl RedFlag {
    fn new(flag_type: RedFlagType, severity: AlertSeverity, description: impl Into<String>) -> Self {
        Self {
            flag_type,
            description: description.into(),
            severity,
        }
    }
}

/// Comprehensively sanctioned jurisdictions
const PROHIBITED_JURISDICTIONS: &[(&str, &str)] = &[
    ("IR", "iran"),
    ("KP", "north korea"),
    ("SY", "syria"),
    ("CU", "cuba"),
];

/// FATF grey list and targeted-sanctions jurisdictions (subset)
const HIGH_RISK_JURISDICTIONS: &[(&str, &str)] = &[
    ("MM", "myanmar"),
    ("YE", "yemen"),
    ("AF", "afghanistan"),
    ("SS", "south sudan"),
    ("HT", "haiti"),
    ("ML", "mali"),
    ("NG", "nigeria"),
    ("VE", "venezuela"),
];

fn listed_in(table: &[(&str, &str)], country: &str) -> bool {
    let country = country.trim();
    table
        .iter()
        .any(|(code, name)| country.eq_ignore_ascii_case(code) || country.eq_ignore_ascii_case(name))
}

/// Severity of registering a company in `country`, if it is a risk at all
pub fn jurisdiction_severity(country: &str) -> Option<AlertSeverity> {
    if listed_in(PROHIBITED_JURISDICTIONS, country) {
        Some(AlertSeverity::Critical)
    } else if listed_in(HIGH_RISK_JURISDICTIONS, country) {
        Some(AlertSeverity::High)
    } else {
        None
    }
}

/// Red flags raised by a registry profile as of `today`
pub fn red_flags(profile: &CompanyProfile, today: NaiveDate) -> Vec<RedFlag> {
    let mut flags = Vec::new();

    match profile.status {
        CompanyStatus::Active => {}
        CompanyStatus::Dormant => flags.push(RedFlag::new(
            RedFlagType::InactiveStatus,
            AlertSeverity::Medium,
            "Company is registered as dormant",
        )),
        CompanyStatus::Liquidation | CompanyStatus::Dissolved => flags.push(RedFlag::new(
            RedFlagType::InactiveStatus,
            AlertSeverity::High,
            format!("Company status is {:?}", profile.status),
        )),
    }

    let first_anniversary = profile.incorporated_on.checked_add_months(Months::new(12));
    if first_anniversary.map_or(true, |date| today < date) {
        flags.push(RedFlag::new(
            RedFlagType::RecentlyIncorporated,
            AlertSeverity::Medium,
            format!("Incorporated on {}, less than 12 months ago", profile.incorporated_on),
        ));
    }

    if profile.insolvency_history {
        flags.push(RedFlag::new(
            RedFlagType::InsolvencyHistory,
            AlertSeverity::High,
            "Company has insolvency history",
        ));
    }

    match jurisdiction_severity(&profile.registration_country) {
        Some(AlertSeverity::Critical) => flags.push(RedFlag::new(
            RedFlagType::ProhibitedJurisdiction,
            AlertSeverity::Critical,
            format!("Registered in prohibited jurisdiction {}", profile.registration_country),
        )),
        Some(severity) => flags.push(RedFlag::new(
            RedFlagType::HighRiskJurisdiction,
            severity,
            format!("Registered in high-risk jurisdiction {}", profile.registration_country),
        )),
        None => {}
    }

    flags
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("registry lookup failed: {0}")]
    Registry(String),

    #[error("{0} subjects have no company registry entry")]
    NotACompany(SubjectType),
}

/// Company registry lookup
#[async_trait]
pub trait CompanyRegistry: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, company_number: &str) -> Result<Option<CompanyProfile>, VerificationError>;
}

/// Registry held in memory, keyed by company number
#[derive(Default)]
pub struct InMemoryCompanyRegistry {
    companies: RwLock<HashMap<String, CompanyProfile>>,
}

impl InMemoryCompanyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_company(self, profile: CompanyProfile) -> Self {
        self.insert(profile);
        self
    }

    pub fn insert(&self, profile: CompanyProfile) {
        self.companies
            .write()
            .insert(profile.company_number.to_uppercase(), profile);
    }
}

#[async_trait]
impl CompanyRegistry for InMemoryCompanyRegistry {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn lookup(&self, company_number: &str) -> Result<Option<CompanyProfile>, VerificationError> {
        Ok(self
            .companies
            .read()
            .get(&company_number.trim().to_uppercase())
            .cloned())
    }
}

/// Registry findings for one company
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationReport {
    pub company_number: String,
    pub registry: String,
    pub profile: Option<CompanyProfile>,
    pub red_flags: Vec<RedFlag>,
}

impl VerificationReport {
    pub fn highest_severity(&self) -> Option<AlertSeverity> {
        self.red_flags.iter().map(|flag| flag.severity).max()
    }

    pub fn is_clean(&self) -> bool {
        self.red_flags.is_empty()
    }
}

pub struct CompanyVerifier<C: CompanyRegistry> {
    registry: C,
}

impl<C: CompanyRegistry> CompanyVerifier<C> {
    pub fn new(registry: C) -> Self {
        Self { registry }
    }

    pub async fn verify(&self, request: &ScreeningRequest) -> Result<VerificationReport, VerificationError> {
        self.verify_on(request, Utc::now().date_naive()).await
    }

    /// Look up a company subject and derive red flags as of `today`
    pub async fn verify_on(
        &self,
        request: &ScreeningRequest,
        today: NaiveDate,
    ) -> Result<VerificationReport, VerificationError> {
        let company_number = match (&request.subject_type, &request.company_number) {
            (SubjectType::Company, Some(number)) => number.trim().to_string(),
            (subject_type, _) => return Err(VerificationError::NotACompany(*subject_type)),
        };

        let profile = self.registry.lookup(&company_number).await?;
        let red_flags = match &profile {
            None => {
                warn!(company_number = %company_number, registry = self.registry.name(), "company not found in registry");
                vec![RedFlag::new(
                    RedFlagType::NotRegistered,
                    AlertSeverity::High,
                    format!("No registry entry for company number {company_number}"),
                )]
            }
            Some(profile) => {
                let mut flags = Vec::new();
                if normalize_name(&profile.name) != normalize_name(&request.subject_name) {
                    flags.push(RedFlag::new(
                        RedFlagType::NameMismatch,
                        AlertSeverity::Medium,
                        format!("Registered name is {}", profile.name),
                    ));
                }
                flags.extend(red_flags(profile, today));
                flags
            }
        };

        debug!(company_number = %company_number, red_flags = red_flags.len(), "company verified");
        Ok(VerificationReport {
            company_number,
            registry: self.registry.name().to_string(),
            profile,
            red_flags,
        })
    }
}
