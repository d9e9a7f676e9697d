//! Analyst review of matches and ongoing monitoring.
//!
//! A match starts `Pending` and moves to one of the terminal decisions. A
//! decision can only be replaced after the match is reopened, which keeps
//! the audit trail linear.

use crate::engine::ScreeningEngine;
use crate::repository::{RepositoryError, ScreeningId, ScreeningRepository};
use crate::risk::RiskLevel;
use crate::screening::{MatchType, ReviewStatus, ScreeningMatch, ScreeningResult};
use crate::watchlist::ListKind;
use crate::{ScreeningError, ScreeningRequest};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("match {match_id} cannot move from {from} to {to}")]
    InvalidTransition {
        match_id: Uuid,
        from: ReviewStatus,
        to: ReviewStatus,
    },

    #[error(transparent)]
    Screening(#[from] ScreeningError),
}

/// Review counts for one screening
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub pending: usize,
    pub confirmed: usize,
    pub false_positives: usize,
    pub escalated: usize,
}

impl ReviewSummary {
    fn count(matches: &[ScreeningMatch]) -> Self {
        let mut summary = Self::default();
        for m in matches {
            match m.review_status {
                ReviewStatus::Pending => summary.pending += 1,
                ReviewStatus::ConfirmedMatch => summary.confirmed += 1,
                ReviewStatus::FalsePositive => summary.false_positives += 1,
                ReviewStatus::Escalated => summary.escalated += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.pending + self.confirmed + self.false_positives + self.escalated
    }

    /// Every match reviewed and dismissed
    pub fn is_cleared(&self) -> bool {
        self.pending == 0 && self.confirmed == 0 && self.escalated == 0
    }
}

/// Result of re-running one monitored screening
#[derive(Debug, Clone, PartialEq)]
pub enum RescreenOutcome {
    Unchanged {
        screening_id: ScreeningId,
        risk_level: RiskLevel,
    },
    Changed {
        screening_id: ScreeningId,
        previous_level: RiskLevel,
        risk_level: RiskLevel,
    },
    /// Required lists were missing; the stored screening was kept
    Incomplete {
        screening_id: ScreeningId,
        partial_level: RiskLevel,
        lists_unavailable: Vec<ListKind>,
    },
    /// Screening or persisting failed; the stored screening was kept
    Failed {
        screening_id: ScreeningId,
        error: ReviewError,
    },
}

impl RescreenOutcome {
    pub fn screening_id(&self) -> ScreeningId {
        match self {
            Self::Unchanged { screening_id, .. }
            | Self::Changed { screening_id, .. }
            | Self::Incomplete { screening_id, .. }
            | Self::Failed { screening_id, .. } => *screening_id,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

pub struct ReviewWorkflow<R: ScreeningRepository> {
    repository: R,
}

impl<R: ScreeningRepository> ReviewWorkflow<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Persist a screening and its matches
    pub fn record(&self, request: &ScreeningRequest, result: &ScreeningResult) -> Result<ScreeningId, ReviewError> {
        let id = self.repository.save_screening(result, request)?;
        self.repository.save_matches(id, &result.matches)?;
        info!(
            screening_id = %id,
            matches = result.matches.len(),
            risk_level = %result.risk_level,
            "screening recorded"
        );
        Ok(id)
    }

    /// Screen a subject and persist the outcome
    pub async fn screen_and_record(
        &self,
        engine: &ScreeningEngine,
        request: &ScreeningRequest,
    ) -> Result<(ScreeningId, ScreeningResult), ReviewError> {
        let result = engine.screen(request).await?;
        let id = self.record(request, &result)?;
        Ok((id, result))
    }

    /// Record an analyst decision.
    ///
    /// Setting the current status again is a no-op. Replacing a decision
    /// requires [`ReviewWorkflow::reopen`] first.
    pub fn set_review_status(&self, match_id: Uuid, status: ReviewStatus) -> Result<ScreeningMatch, ReviewError> {
        let current = self.find_match(match_id)?;
        let from = current.review_status;

        if from == status {
            return Ok(current);
        }
        if from.is_terminal() || !status.is_terminal() {
            warn!(%match_id, %from, to = %status, "rejected review transition");
            return Err(ReviewError::InvalidTransition {
                match_id,
                from,
                to: status,
            });
        }

        let updated = self.repository.update_match_review_status(match_id, status)?;
        info!(%match_id, entity_id = %updated.entity_id, %from, to = %status, "match reviewed");
        Ok(updated)
    }

    /// Return a decided match to `Pending`
    pub fn reopen(&self, match_id: Uuid) -> Result<ScreeningMatch, ReviewError> {
        let current = self.find_match(match_id)?;
        if current.review_status == ReviewStatus::Pending {
            return Ok(current);
        }

        let updated = self
            .repository
            .update_match_review_status(match_id, ReviewStatus::Pending)?;
        info!(%match_id, from = %current.review_status, "match reopened");
        Ok(updated)
    }

    pub fn enable_monitoring(&self, id: ScreeningId) -> Result<(), ReviewError> {
        self.repository.set_monitoring(id, true)?;
        info!(screening_id = %id, "monitoring enabled");
        Ok(())
    }

    pub fn disable_monitoring(&self, id: ScreeningId) -> Result<(), ReviewError> {
        self.repository.set_monitoring(id, false)?;
        info!(screening_id = %id, "monitoring disabled");
        Ok(())
    }

    pub fn review_summary(&self, id: ScreeningId) -> Result<ReviewSummary, ReviewError> {
        let record = self
            .repository
            .get_screening(id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("screening {id}")))?;
        Ok(ReviewSummary::count(&record.matches))
    }

    pub fn is_cleared(&self, id: ScreeningId) -> Result<bool, ReviewError> {
        Ok(self.review_summary(id)?.is_cleared())
    }

    /// Re-screen every monitored subject against the current lists.
    ///
    /// Decisions made on an entity carry over to its new match. A subject
    /// that fails to screen or to persist, or that screens incomplete, is
    /// reported and left as it was; the sweep carries on with the rest.
    pub async fn rescreen_monitored(&self, engine: &ScreeningEngine) -> Result<Vec<RescreenOutcome>, ReviewError> {
        let records = self.repository.monitored()?;
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            let mut result = match engine.screen(&record.request).await {
                Ok(result) => result,
                Err(error) => {
                    warn!(screening_id = %record.id, error = %error, "monitored rescreen failed");
                    outcomes.push(RescreenOutcome::Failed {
                        screening_id: record.id,
                        error: error.into(),
                    });
                    continue;
                }
            };

            if !result.is_complete() {
                let lists_unavailable: Vec<ListKind> = result.metadata.lists_unavailable.keys().copied().collect();
                warn!(
                    screening_id = %record.id,
                    unavailable = ?lists_unavailable,
                    "monitored rescreen incomplete, keeping stored screening"
                );
                outcomes.push(RescreenOutcome::Incomplete {
                    screening_id: record.id,
                    partial_level: result.risk_level,
                    lists_unavailable,
                });
                continue;
            }

            let decided: HashMap<(MatchType, &str), ReviewStatus> = record
                .matches
                .iter()
                .filter(|m| m.review_status.is_terminal())
                .map(|m| ((m.match_type, m.entity_id.as_str()), m.review_status))
                .collect();
            for m in &mut result.matches {
                if let Some(status) = decided.get(&(m.match_type, m.entity_id.as_str())) {
                    m.review_status = *status;
                }
            }

            if let Err(error) = self.repository.replace_result(record.id, &result) {
                warn!(screening_id = %record.id, error = %error, "failed to persist monitored rescreen");
                outcomes.push(RescreenOutcome::Failed {
                    screening_id: record.id,
                    error: error.into(),
                });
                continue;
            }

            let outcome = if result.fingerprint == record.result.fingerprint {
                RescreenOutcome::Unchanged {
                    screening_id: record.id,
                    risk_level: result.risk_level,
                }
            } else {
                info!(
                    screening_id = %record.id,
                    previous_level = %record.result.risk_level,
                    risk_level = %result.risk_level,
                    "monitored screening changed"
                );
                RescreenOutcome::Changed {
                    screening_id: record.id,
                    previous_level: record.result.risk_level,
                    risk_level: result.risk_level,
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    fn find_match(&self, match_id: Uuid) -> Result<ScreeningMatch, ReviewError> {
        self.repository
            .get_match(match_id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("match {match_id}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::list_store::ListStore;
    use crate::providers::MockListProvider;
    use crate::repository::{InMemoryScreeningRepository, ScreeningRecord};
    use crate::watchlist::ListKind;
    use std::sync::Arc;

    async fn engine() -> ScreeningEngine {
        let store = Arc::new(ListStore::default());
        store.refresh(&MockListProvider::new()).await;
        ScreeningEngine::new(
            store,
            EngineConfig {
                vendor_latency_ms: 0,
                ..EngineConfig::default()
            },
        )
    }

    async fn recorded(
        workflow: &ReviewWorkflow<InMemoryScreeningRepository>,
        engine: &ScreeningEngine,
        name: &str,
    ) -> (ScreeningId, ScreeningResult) {
        workflow
            .screen_and_record(engine, &ScreeningRequest::individual(name))
            .await
            .unwrap()
    }

    struct UnavailableRepository;

    impl ScreeningRepository for UnavailableRepository {
        fn save_screening(&self, _: &ScreeningResult, _: &ScreeningRequest) -> Result<ScreeningId, RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn save_matches(&self, _: ScreeningId, _: &[ScreeningMatch]) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn update_match_review_status(&self, _: Uuid, _: ReviewStatus) -> Result<ScreeningMatch, RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn get_screening(&self, _: ScreeningId) -> Result<Option<ScreeningRecord>, RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn get_match(&self, _: Uuid) -> Result<Option<ScreeningMatch>, RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn replace_result(&self, _: ScreeningId, _: &ScreeningResult) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn set_monitoring(&self, _: ScreeningId, _: bool) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }

        fn monitored(&self) -> Result<Vec<ScreeningRecord>, RepositoryError> {
            Err(RepositoryError::Unavailable("database offline".into()))
        }
    }

    /// Delegates to an in-memory store but refuses to persist one screening's rescreen
    struct RejectingReplace {
        inner: InMemoryScreeningRepository,
        rejected: ScreeningId,
    }

    impl ScreeningRepository for RejectingReplace {
        fn save_screening(&self, result: &ScreeningResult, request: &ScreeningRequest) -> Result<ScreeningId, RepositoryError> {
            self.inner.save_screening(result, request)
        }

        fn save_matches(&self, id: ScreeningId, matches: &[ScreeningMatch]) -> Result<(), RepositoryError> {
            self.inner.save_matches(id, matches)
        }

        fn update_match_review_status(&self, match_id: Uuid, status: ReviewStatus) -> Result<ScreeningMatch, RepositoryError> {
            self.inner.update_match_review_status(match_id, status)
        }

        fn get_screening(&self, id: ScreeningId) -> Result<Option<ScreeningRecord>, RepositoryError> {
            self.inner.get_screening(id)
        }

        fn get_match(&self, match_id: Uuid) -> Result<Option<ScreeningMatch>, RepositoryError> {
            self.inner.get_match(match_id)
        }

        fn replace_result(&self, id: ScreeningId, result: &ScreeningResult) -> Result<(), RepositoryError> {
            if id == self.rejected {
                return Err(RepositoryError::Unavailable("write timed out".into()));
            }
            self.inner.replace_result(id, result)
        }

        fn set_monitoring(&self, id: ScreeningId, enabled: bool) -> Result<(), RepositoryError> {
            self.inner.set_monitoring(id, enabled)
        }

        fn monitored(&self) -> Result<Vec<ScreeningRecord>, RepositoryError> {
            self.inner.monitored()
        }
    }

    #[tokio::test]
    async fn test_review_decision_and_idempotence() {
        let engine = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (_, result) = recorded(&workflow, &engine, "Derek Hallworth").await;
        let match_id = result.matches[0].id;

        let updated = workflow.set_review_status(match_id, ReviewStatus::FalsePositive).unwrap();
        assert_eq!(updated.review_status, ReviewStatus::FalsePositive);

        let again = workflow.set_review_status(match_id, ReviewStatus::FalsePositive).unwrap();
        assert_eq!(again.review_status, ReviewStatus::FalsePositive);
    }

    #[tokio::test]
    async fn test_decision_change_requires_reopen() {
        let engine = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (_, result) = recorded(&workflow, &engine, "Derek Hallworth").await;
        let match_id = result.matches[0].id;

        workflow.set_review_status(match_id, ReviewStatus::FalsePositive).unwrap();
        let err = workflow
            .set_review_status(match_id, ReviewStatus::ConfirmedMatch)
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::InvalidTransition {
                from: ReviewStatus::FalsePositive,
                to: ReviewStatus::ConfirmedMatch,
                ..
            }
        ));
        assert!(matches!(
            workflow.set_review_status(match_id, ReviewStatus::Pending),
            Err(ReviewError::InvalidTransition { .. })
        ));

        let reopened = workflow.reopen(match_id).unwrap();
        assert_eq!(reopened.review_status, ReviewStatus::Pending);
        let confirmed = workflow
            .set_review_status(match_id, ReviewStatus::ConfirmedMatch)
            .unwrap();
        assert_eq!(confirmed.review_status, ReviewStatus::ConfirmedMatch);
    }

    #[tokio::test]
    async fn test_unknown_match() {
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let err = workflow
            .set_review_status(Uuid::new_v4(), ReviewStatus::Escalated)
            .unwrap_err();
        assert!(matches!(err, ReviewError::Repository(RepositoryError::NotFound(_))));
    }

    #[test]
    fn test_repository_failure_propagates() {
        let workflow = ReviewWorkflow::new(UnavailableRepository);
        let err = workflow
            .set_review_status(Uuid::new_v4(), ReviewStatus::Escalated)
            .unwrap_err();
        assert!(matches!(err, ReviewError::Repository(RepositoryError::Unavailable(_))));
        assert!(workflow.enable_monitoring(ScreeningId::new()).is_err());
    }

    #[tokio::test]
    async fn test_summary_and_clearance() {
        let engine = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (id, result) = recorded(&workflow, &engine, "Derek Hallworth").await;
        let match_id = result.matches[0].id;

        let summary = workflow.review_summary(id).unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.total(), 1);
        assert!(!workflow.is_cleared(id).unwrap());

        workflow.set_review_status(match_id, ReviewStatus::Escalated).unwrap();
        assert!(!workflow.is_cleared(id).unwrap());

        workflow.reopen(match_id).unwrap();
        workflow.set_review_status(match_id, ReviewStatus::FalsePositive).unwrap();
        assert!(workflow.is_cleared(id).unwrap());
    }

    #[tokio::test]
    async fn test_clean_screening_is_cleared() {
        let engine = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (id, _) = recorded(&workflow, &engine, "Jane Doe").await;
        assert!(workflow.is_cleared(id).unwrap());
    }

    #[tokio::test]
    async fn test_monitoring_toggles_are_idempotent() {
        let engine = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (id, _) = recorded(&workflow, &engine, "Jane Doe").await;

        workflow.enable_monitoring(id).unwrap();
        workflow.enable_monitoring(id).unwrap();
        assert_eq!(workflow.repository().monitored().unwrap().len(), 1);

        workflow.disable_monitoring(id).unwrap();
        workflow.disable_monitoring(id).unwrap();
        assert!(workflow.repository().monitored().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rescreen_carries_decisions_and_detects_changes() {
        let engine = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (id, result) = recorded(&workflow, &engine, "Derek Hallworth").await;
        let (_, _) = recorded(&workflow, &engine, "Jane Doe").await;
        workflow
            .set_review_status(result.matches[0].id, ReviewStatus::FalsePositive)
            .unwrap();
        workflow.enable_monitoring(id).unwrap();

        let outcomes = workflow.rescreen_monitored(&engine).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].screening_id(), id);
        assert!(!outcomes[0].is_changed());
        let record = workflow.repository().get_screening(id).unwrap().unwrap();
        assert_eq!(record.matches[0].review_status, ReviewStatus::FalsePositive);

        engine.store().replace_corpus(ListKind::AdverseMedia, vec![], "manual").await;
        let outcomes = workflow.rescreen_monitored(&engine).await.unwrap();
        assert_eq!(
            outcomes,
            vec![RescreenOutcome::Changed {
                screening_id: id,
                previous_level: result.risk_level,
                risk_level: RiskLevel::Low,
            }]
        );
        assert_eq!(workflow.review_summary(id).unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_rescreen_failure_is_reported() {
        let loaded = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (id, result) = recorded(&workflow, &loaded, "Derek Hallworth").await;
        workflow.enable_monitoring(id).unwrap();

        let unloaded = ScreeningEngine::new(Arc::new(ListStore::default()), loaded.config().clone());
        let outcomes = workflow.rescreen_monitored(&unloaded).await.unwrap();

        assert!(matches!(
            outcomes[0],
            RescreenOutcome::Failed {
                error: ReviewError::Screening(ScreeningError::ListUnavailable { .. }),
                ..
            }
        ));
        let record = workflow.repository().get_screening(id).unwrap().unwrap();
        assert_eq!(record.result.fingerprint, result.fingerprint);
    }

    #[tokio::test]
    async fn test_rescreen_with_missing_list_keeps_stored_screening() {
        let loaded = engine().await;
        let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
        let (id, _) = recorded(&workflow, &loaded, "Jane Doe").await;
        workflow.enable_monitoring(id).unwrap();
        let before = workflow.repository().get_screening(id).unwrap().unwrap();

        let store = Arc::new(ListStore::default());
        store.refresh(&MockListProvider::new().with_failure(ListKind::Pep)).await;
        let degraded = ScreeningEngine::new(store, loaded.config().clone());
        let outcomes = workflow.rescreen_monitored(&degraded).await.unwrap();

        assert_eq!(
            outcomes,
            vec![RescreenOutcome::Incomplete {
                screening_id: id,
                partial_level: RiskLevel::Low,
                lists_unavailable: vec![ListKind::Pep],
            }]
        );
        assert!(!outcomes[0].is_changed());
        assert_eq!(workflow.repository().get_screening(id).unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_rescreen_persist_failure_does_not_stop_sweep() {
        let engine = engine().await;
        let repository = InMemoryScreeningRepository::new();
        let workflow = ReviewWorkflow::new(repository.clone());
        let (flagged, result) = recorded(&workflow, &engine, "Derek Hallworth").await;
        let (clean, _) = recorded(&workflow, &engine, "Jane Doe").await;
        workflow
            .set_review_status(result.matches[0].id, ReviewStatus::FalsePositive)
            .unwrap();
        workflow.enable_monitoring(flagged).unwrap();
        workflow.enable_monitoring(clean).unwrap();

        let rejecting = ReviewWorkflow::new(RejectingReplace {
            inner: repository.clone(),
            rejected: flagged,
        });
        engine.store().replace_corpus(ListKind::AdverseMedia, vec![], "manual").await;
        let outcomes = rejecting.rescreen_monitored(&engine).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        let outcome_of = |id: ScreeningId| outcomes.iter().find(|o| o.screening_id() == id).unwrap();
        assert!(matches!(
            outcome_of(flagged),
            RescreenOutcome::Failed {
                error: ReviewError::Repository(RepositoryError::Unavailable(_)),
                ..
            }
        ));
        assert_eq!(
            outcome_of(clean),
            &RescreenOutcome::Unchanged {
                screening_id: clean,
                risk_level: RiskLevel::Low,
            }
        );

        let kept = repository.get_screening(flagged).unwrap().unwrap();
        assert_eq!(kept.matches.len(), 1);
        assert_eq!(kept.matches[0].review_status, ReviewStatus::FalsePositive);
        assert_eq!(kept.result.fingerprint, result.fingerprint);
        assert_eq!(repository.get_match(result.matches[0].id).unwrap().unwrap().id, result.matches[0].id);
    }
}
