//! Engine configuration

use crate::matcher::MatchProfile;
use crate::risk::RiskConfig;
use crate::search::SearchConfig;
use crate::watchlist::ListKind;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Tracing controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Screening engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Identity recorded in screening metadata
    pub engine_name: String,
    pub search: SearchConfig,
    pub sanctions_profile: MatchProfile,
    /// Profile for PEP and adverse-media lists
    pub general_profile: MatchProfile,
    pub risk: RiskConfig,
    pub list_staleness_hours: i64,
    /// Simulated vendor round trip
    pub vendor_latency_ms: u64,
    /// Deadline applied when the caller gives none
    pub screening_timeout_ms: u64,
    pub telemetry: TelemetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_name: "aml-screening-engine".to_string(),
            search: SearchConfig::default(),
            sanctions_profile: MatchProfile::SANCTIONS,
            general_profile: MatchProfile::GENERAL,
            risk: RiskConfig::default(),
            list_staleness_hours: 24,
            vendor_latency_ms: 1_500,
            screening_timeout_ms: 10_000,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `SCREENING_*` environment variables, reading `.env` if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(floor) = parse_var::<u8, _>(&lookup, "SCREENING_MATCH_FLOOR")? {
            if floor > 100 {
                return Err(ConfigError::Invalid {
                    key: "SCREENING_MATCH_FLOOR".to_string(),
                    value: floor.to_string(),
                    reason: "must be between 0 and 100".to_string(),
                });
            }
            config.search.match_floor = floor;
        }

        if let Some(hours) = parse_var::<i64, _>(&lookup, "SCREENING_LIST_STALENESS_HOURS")? {
            if hours <= 0 {
                return Err(ConfigError::Invalid {
                    key: "SCREENING_LIST_STALENESS_HOURS".to_string(),
                    value: hours.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            config.list_staleness_hours = hours;
        }

        if let Some(latency) = parse_var(&lookup, "SCREENING_VENDOR_LATENCY_MS")? {
            config.vendor_latency_ms = latency;
        }

        if let Some(timeout) = parse_var::<u64, _>(&lookup, "SCREENING_TIMEOUT_MS")? {
            if timeout == 0 {
                return Err(ConfigError::Invalid {
                    key: "SCREENING_TIMEOUT_MS".to_string(),
                    value: timeout.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            config.screening_timeout_ms = timeout;
        }

        if let Some(level) = lookup("SCREENING_LOG_LEVEL") {
            config.telemetry.log_level = level;
        }

        Ok(config)
    }

    /// Matcher profile for a corpus
    pub fn profile_for(&self, list: ListKind) -> MatchProfile {
        match list {
            ListKind::Sanctions => self.sanctions_profile,
            ListKind::Pep | ListKind::AdverseMedia => self.general_profile,
        }
    }

    pub fn list_staleness(&self) -> chrono::Duration {
        chrono::Duration::hours(self.list_staleness_hours)
    }

    pub fn vendor_latency(&self) -> Duration {
        Duration::from_millis(self.vendor_latency_ms)
    }

    pub fn screening_timeout(&self) -> Duration {
        Duration::from_millis(self.screening_timeout_ms)
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value} is invalid: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
