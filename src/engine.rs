//! Screening orchestration.
//!
//! [`ScreeningEngine`] validates a request, passes it through the vendor
//! boundary, searches every required corpus of the current list snapshot and
//! aggregates the hits. It holds no per-subject state, so independent
//! screenings may run concurrently.

use crate::config::EngineConfig;
use crate::list_store::{ListSnapshot, ListStore};
use crate::matcher::NameMatcher;
use crate::risk::RiskAggregator;
use crate::screening::{match_fingerprint, MatchType, ScreeningMetadata, ScreeningResult, ScreeningStatus};
use crate::search::ListSearch;
use crate::watchlist::ListKind;
use crate::{ScreeningError, ScreeningRequest, SubjectType};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Boundary to an external screening vendor.
///
/// Every screening passes through `submit` before lists are searched. The
/// simulated implementation only waits; a vendor integration performs its
/// HTTP call here without callers changing.
#[async_trait]
pub trait VendorGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, request: &ScreeningRequest) -> Result<(), ScreeningError>;
}

/// Vendor stand-in that waits a fixed latency
#[derive(Debug, Clone)]
pub struct SimulatedVendor {
    latency: Duration,
}

impl SimulatedVendor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl VendorGateway for SimulatedVendor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn submit(&self, _request: &ScreeningRequest) -> Result<(), ScreeningError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(())
    }
}

/// AML screening engine
pub struct ScreeningEngine {
    store: Arc<ListStore>,
    vendor: Arc<dyn VendorGateway>,
    aggregator: RiskAggregator,
    config: EngineConfig,
}

impl ScreeningEngine {
    /// Engine with a simulated vendor using the configured latency
    pub fn new(store: Arc<ListStore>, config: EngineConfig) -> Self {
        let vendor = Arc::new(SimulatedVendor::new(config.vendor_latency()));
        Self::with_vendor(store, vendor, config)
    }

    pub fn with_vendor(store: Arc<ListStore>, vendor: Arc<dyn VendorGateway>, config: EngineConfig) -> Self {
        Self {
            store,
            vendor,
            aggregator: RiskAggregator::new(config.risk),
            config,
        }
    }

    pub fn store(&self) -> &Arc<ListStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Screen with the configured default deadline
    pub async fn screen(&self, request: &ScreeningRequest) -> Result<ScreeningResult, ScreeningError> {
        self.screen_with_timeout(request, self.config.screening_timeout()).await
    }

    /// Screen, failing with [`ScreeningError::ScreeningTimeout`] if `timeout` elapses first
    pub async fn screen_with_timeout(
        &self,
        request: &ScreeningRequest,
        timeout: Duration,
    ) -> Result<ScreeningResult, ScreeningError> {
        request.validate()?;
        let started = Instant::now();

        let run = async {
            self.vendor.submit(request).await?;
            let snapshot = self.store.snapshot();
            self.evaluate(request, &snapshot, started)
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    subject_type = %request.subject_type,
                    vendor = self.vendor.name(),
                    timeout_ms,
                    "screening timed out"
                );
                Err(ScreeningError::ScreeningTimeout { timeout_ms })
            }
        }
    }

    /// Screen several subjects concurrently, results in request order
    pub async fn screen_batch(&self, requests: &[ScreeningRequest]) -> Vec<Result<ScreeningResult, ScreeningError>> {
        futures::future::join_all(requests.iter().map(|request| self.screen(request))).await
    }

    /// Screen against a given snapshot without the vendor step
    pub fn screen_snapshot(
        &self,
        request: &ScreeningRequest,
        snapshot: &ListSnapshot,
    ) -> Result<ScreeningResult, ScreeningError> {
        request.validate()?;
        self.evaluate(request, snapshot, Instant::now())
    }

    fn evaluate(
        &self,
        request: &ScreeningRequest,
        snapshot: &ListSnapshot,
        started: Instant,
    ) -> Result<ScreeningResult, ScreeningError> {
        let query = request.search_query();
        if request.subject_type == SubjectType::Individual && query.date_of_birth.is_none() {
            warn!("individual screened without date of birth, no date of birth boost possible");
        }

        let mut matches = Vec::new();
        let mut searched = Vec::new();
        let mut unavailable = BTreeMap::new();
        let mut stale = BTreeMap::new();
        let now = Utc::now();

        for &list in request.subject_type.required_lists() {
            let Some(corpus) = snapshot.corpus(list) else {
                let reason = snapshot
                    .unavailable_reason(list)
                    .unwrap_or("list not loaded")
                    .to_string();
                warn!(list = %list, reason = %reason, "required watchlist unavailable, screening degraded");
                unavailable.insert(list, reason);
                continue;
            };

            if let Some(loaded) = snapshot.loaded(list) {
                if snapshot.is_stale(list, now, self.store.staleness()) {
                    warn!(list = %list, refreshed_at = %loaded.refreshed_at, "searching stale watchlist");
                    stale.insert(list, loaded.refreshed_at);
                }
            }

            let search = ListSearch::new(NameMatcher::new(self.config.profile_for(list)), self.config.search);
            let found = search.search(&query, corpus, list)?;
            debug!(list = %list, candidates = corpus.len(), matches = found.len(), "searched watchlist");
            matches.extend(found);
            searched.push(list);
        }

        if searched.is_empty() {
            return Err(ScreeningError::ListUnavailable {
                lists: unavailable.into_keys().collect(),
            });
        }

        let assessment = self.aggregator.aggregate(&matches);
        let has = |match_type: MatchType| matches.iter().any(|m| m.match_type == match_type);
        let sanctions_match = has(MatchType::Sanctions);
        let pep_match = has(MatchType::Pep);
        let adverse_media = has(MatchType::AdverseMedia);

        let status = if unavailable.is_empty() {
            ScreeningStatus::Complete
        } else {
            ScreeningStatus::Incomplete
        };

        let result = ScreeningResult {
            risk_score: assessment.risk_score,
            risk_level: assessment.risk_level,
            fingerprint: match_fingerprint(&matches),
            matches,
            sanctions_match,
            pep_match,
            adverse_media,
            status,
            metadata: ScreeningMetadata {
                screened_at: now,
                engine: self.config.engine_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                vendor: self.vendor.name().to_string(),
                lists_searched: searched,
                lists_unavailable: unavailable,
                list_generation: snapshot.generation(),
                lists_refreshed_at: snapshot.refreshed_at(),
                lists_stale: stale,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
        };

        info!(
            subject_type = %request.subject_type,
            matches = result.matches.len(),
            risk_score = result.risk_score,
            risk_level = %result.risk_level,
            status = ?result.status,
            "screening complete"
        );
        Ok(result)
    }
}

/// Lists a subject type requires that are missing from `snapshot`
pub fn missing_lists(request: &ScreeningRequest, snapshot: &ListSnapshot) -> Vec<ListKind> {
    request
        .subject_type
        .required_lists()
        .iter()
        .copied()
        .filter(|list| !snapshot.is_available(*list))
        .collect()
}
