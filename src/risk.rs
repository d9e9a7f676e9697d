//! Aggregate risk scoring across screening matches

use crate::screening::{MatchType, ScreeningMatch};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall risk classification of a screening
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Per match type multipliers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskWeights {
    pub sanctions: f64,
    pub pep: f64,
    pub adverse_media: f64,
    pub watchlist: f64,
}

impl RiskWeights {
    pub fn weight(&self, match_type: MatchType) -> f64 {
        match match_type {
            MatchType::Sanctions => self.sanctions,
            MatchType::Pep => self.pep,
            MatchType::AdverseMedia => self.adverse_media,
            MatchType::Watchlist => self.watchlist,
        }
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            sanctions: 1.5,
            pep: 1.2,
            adverse_media: 1.0,
            watchlist: 1.1,
        }
    }
}

/// Risk level cut-offs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskThresholds {
    /// A sanctions match scoring at least this is always critical
    pub critical_sanctions_match: u8,
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical_sanctions_match: 85,
            critical: 90,
            high: 70,
            medium: 40,
        }
    }
}

/// Aggregator configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
    /// Share of the mean weighted score in the blend
    pub mean_share: f64,
    /// Share of the maximum weighted score in the blend
    pub max_share: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            mean_share: 0.4,
            max_share: 0.6,
        }
    }
}

/// Score and level for one set of matches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskAssessment {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
}

impl RiskAssessment {
    pub const NONE: RiskAssessment = RiskAssessment {
        risk_score: 0,
        risk_level: RiskLevel::Low,
    };
}

/// Turns typed matches into one risk verdict.
///
/// The blend leans on the strongest match so a single strong hit outweighs
/// several weak ones, and any sanctions match overrides the numeric bands.
#[derive(Debug, Clone, Default)]
pub struct RiskAggregator {
    config: RiskConfig,
}

impl RiskAggregator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn aggregate(&self, matches: &[ScreeningMatch]) -> RiskAssessment {
        self.aggregate_scores(matches.iter().map(|m| (m.match_type, m.match_score)))
    }

    /// Aggregate raw `(type, score)` pairs
    pub fn aggregate_scores<I>(&self, scores: I) -> RiskAssessment
    where
        I: IntoIterator<Item = (MatchType, u8)>,
    {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut max = 0.0f64;
        let mut sanctions_present = false;
        let mut strong_sanctions = false;

        for (match_type, score) in scores {
            let weighted = f64::from(score) * self.config.weights.weight(match_type);
            count += 1;
            sum += weighted;
            max = max.max(weighted);

            if match_type == MatchType::Sanctions {
                sanctions_present = true;
                if score >= self.config.thresholds.critical_sanctions_match {
                    strong_sanctions = true;
                }
            }
        }

        if count == 0 {
            return RiskAssessment::NONE;
        }

        let average = sum / count as f64;
        let blended = average * self.config.mean_share + max * self.config.max_share;
        let risk_score = blended.round().clamp(0.0, 100.0) as u8;

        let thresholds = &self.config.thresholds;
        let risk_level = if strong_sanctions || risk_score >= thresholds.critical {
            RiskLevel::Critical
        } else if sanctions_present || risk_score >= thresholds.high {
            RiskLevel::High
        } else if risk_score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        RiskAssessment {
            risk_score,
            risk_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(scores: &[(MatchType, u8)]) -> RiskAssessment {
        RiskAggregator::default().aggregate_scores(scores.iter().copied())
    }

    #[test]
    fn test_no_matches_is_low() {
        let assessment = aggregate(&[]);
        assert_eq!(assessment.risk_score, 0);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(RiskAggregator::default().aggregate(&[]), RiskAssessment::NONE);
    }

    #[test]
    fn test_single_adverse_media_match() {
        // weighted 72, mean 72, max 72
        let assessment = aggregate(&[(MatchType::AdverseMedia, 72)]);
        assert_eq!(assessment.risk_score, 72);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_blend_of_mean_and_max() {
        // PEP 80 -> 96, adverse 70 -> 70; mean 83, max 96
        // 83 * 0.4 + 96 * 0.6 = 33.2 + 57.6 = 90.8 -> 91
        let assessment = aggregate(&[(MatchType::Pep, 80), (MatchType::AdverseMedia, 70)]);
        assert_eq!(assessment.risk_score, 91);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_score_capped_at_100() {
        let assessment = aggregate(&[(MatchType::Sanctions, 100), (MatchType::Pep, 100)]);
        assert_eq!(assessment.risk_score, 100);
    }

    #[test]
    fn test_strong_sanctions_match_is_critical() {
        let mut scores = vec![(MatchType::Sanctions, 85)];
        for _ in 0..20 {
            scores.push((MatchType::AdverseMedia, 70));
        }
        assert_eq!(aggregate(&scores).risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_weak_sanctions_match_is_never_below_high() {
        let assessment = RiskAggregator::default().aggregate_scores([(MatchType::Sanctions, 10)]);
        // 15 weighted, far below every numeric band
        assert_eq!(assessment.risk_score, 15);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_medium_band() {
        let assessment = aggregate(&[(MatchType::AdverseMedia, 45)]);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        let assessment = aggregate(&[(MatchType::AdverseMedia, 39)]);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_watchlist_weight() {
        // 50 * 1.1 = 55
        assert_eq!(aggregate(&[(MatchType::Watchlist, 50)]).risk_score, 55);
    }

    #[test]
    fn test_score_in_range_and_monotonic_in_max() {
        let others = [(MatchType::AdverseMedia, 70), (MatchType::Pep, 72)];
        for match_type in [MatchType::Sanctions, MatchType::Pep, MatchType::AdverseMedia, MatchType::Watchlist] {
            let mut previous = 0u8;
            for top in 0..=100u8 {
                let mut scores = others.to_vec();
                scores.push((match_type, top));
                let assessment = aggregate(&scores);
                assert!(assessment.risk_score <= 100);
                assert!(
                    assessment.risk_score >= previous,
                    "{:?} top={} dropped from {} to {}",
                    match_type,
                    top,
                    previous,
                    assessment.risk_score
                );
                previous = assessment.risk_score;
            }
        }
    }

    #[test]
    fn test_level_ordering() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert_eq!(RiskLevel::Critical.to_string(), "CRITICAL");
    }
}
