//! Persistence boundary for screenings and their matches

use crate::screening::{ReviewStatus, ScreeningMatch, ScreeningResult};
use crate::ScreeningRequest;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a persisted screening
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreeningId(Uuid);

impl ScreeningId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ScreeningId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ScreeningId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ScreeningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored screening with the request that produced it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningRecord {
    pub id: ScreeningId,
    pub request: ScreeningRequest,
    /// Stored without its matches; see [`ScreeningRecord::current_result`]
    pub result: ScreeningResult,
    /// Persisted matches, carrying their review status
    pub matches: Vec<ScreeningMatch>,
    pub monitoring_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScreeningRecord {
    /// The stored result with the persisted matches and their review status
    pub fn current_result(&self) -> ScreeningResult {
        ScreeningResult {
            matches: self.matches.clone(),
            ..self.result.clone()
        }
    }
}

fn without_matches(result: &ScreeningResult) -> ScreeningResult {
    let mut stored = result.clone();
    stored.matches.clear();
    stored
}

/// Storage for screenings, matches and the monitoring flag
pub trait ScreeningRepository: Send + Sync {
    fn save_screening(
        &self,
        result: &ScreeningResult,
        request: &ScreeningRequest,
    ) -> Result<ScreeningId, RepositoryError>;

    /// Attach matches to a stored screening
    fn save_matches(&self, id: ScreeningId, matches: &[ScreeningMatch]) -> Result<(), RepositoryError>;

    fn update_match_review_status(
        &self,
        match_id: Uuid,
        status: ReviewStatus,
    ) -> Result<ScreeningMatch, RepositoryError>;

    fn get_screening(&self, id: ScreeningId) -> Result<Option<ScreeningRecord>, RepositoryError>;

    fn get_match(&self, match_id: Uuid) -> Result<Option<ScreeningMatch>, RepositoryError>;

    /// Replace the result and matches of a re-run screening in one step.
    ///
    /// The old matches are dropped. On error the stored screening is unchanged.
    fn replace_result(&self, id: ScreeningId, result: &ScreeningResult) -> Result<(), RepositoryError>;

    fn set_monitoring(&self, id: ScreeningId, enabled: bool) -> Result<(), RepositoryError>;

    /// Screenings with monitoring enabled, oldest first
    fn monitored(&self) -> Result<Vec<ScreeningRecord>, RepositoryError>;
}

/// Repository failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default)]
struct Tables {
    screenings: HashMap<ScreeningId, ScreeningRecord>,
    match_owner: HashMap<Uuid, ScreeningId>,
}

/// Process-local repository
#[derive(Default, Clone)]
pub struct InMemoryScreeningRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryScreeningRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().screenings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScreeningRepository for InMemoryScreeningRepository {
    fn save_screening(
        &self,
        result: &ScreeningResult,
        request: &ScreeningRequest,
    ) -> Result<ScreeningId, RepositoryError> {
        let id = ScreeningId::new();
        let now = Utc::now();
        let record = ScreeningRecord {
            id,
            request: request.clone(),
            result: without_matches(result),
            matches: Vec::new(),
            monitoring_enabled: false,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().screenings.insert(id, record);
        Ok(id)
    }

    fn save_matches(&self, id: ScreeningId, matches: &[ScreeningMatch]) -> Result<(), RepositoryError> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        if !tables.screenings.contains_key(&id) {
            return Err(RepositoryError::NotFound(format!("screening {id}")));
        }
        if let Some(existing) = matches.iter().find(|m| tables.match_owner.contains_key(&m.id)) {
            return Err(RepositoryError::Conflict(format!("match {}", existing.id)));
        }

        for m in matches {
            tables.match_owner.insert(m.id, id);
        }
        if let Some(record) = tables.screenings.get_mut(&id) {
            record.matches.extend_from_slice(matches);
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    fn update_match_review_status(
        &self,
        match_id: Uuid,
        status: ReviewStatus,
    ) -> Result<ScreeningMatch, RepositoryError> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        let owner = tables
            .match_owner
            .get(&match_id)
            .copied()
            .ok_or_else(|| RepositoryError::NotFound(format!("match {match_id}")))?;
        let record = tables
            .screenings
            .get_mut(&owner)
            .ok_or_else(|| RepositoryError::NotFound(format!("screening {owner}")))?;
        let stored = record
            .matches
            .iter_mut()
            .find(|m| m.id == match_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("match {match_id}")))?;

        stored.review_status = status;
        let updated = stored.clone();
        record.updated_at = Utc::now();
        Ok(updated)
    }

    fn get_screening(&self, id: ScreeningId) -> Result<Option<ScreeningRecord>, RepositoryError> {
        Ok(self.tables.read().screenings.get(&id).cloned())
    }

    fn get_match(&self, match_id: Uuid) -> Result<Option<ScreeningMatch>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .match_owner
            .get(&match_id)
            .and_then(|owner| tables.screenings.get(owner))
            .and_then(|record| record.matches.iter().find(|m| m.id == match_id))
            .cloned())
    }

    fn replace_result(&self, id: ScreeningId, result: &ScreeningResult) -> Result<(), RepositoryError> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        if !tables.screenings.contains_key(&id) {
            return Err(RepositoryError::NotFound(format!("screening {id}")));
        }
        if let Some(existing) = result
            .matches
            .iter()
            .find(|m| tables.match_owner.get(&m.id).is_some_and(|owner| *owner != id))
        {
            return Err(RepositoryError::Conflict(format!("match {}", existing.id)));
        }

        let record = tables
            .screenings
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("screening {id}")))?;
        for old in record.matches.drain(..) {
            tables.match_owner.remove(&old.id);
        }
        for m in &result.matches {
            tables.match_owner.insert(m.id, id);
        }
        record.matches = result.matches.clone();
        record.result = without_matches(result);
        record.updated_at = Utc::now();
        Ok(())
    }

    fn set_monitoring(&self, id: ScreeningId, enabled: bool) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let record = tables
            .screenings
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("screening {id}")))?;
        if record.monitoring_enabled != enabled {
            record.monitoring_enabled = enabled;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    fn monitored(&self) -> Result<Vec<ScreeningRecord>, RepositoryError> {
        let tables = self.tables.read();
        let mut records: Vec<ScreeningRecord> = tables
            .screenings
            .values()
            .filter(|record| record.monitoring_enabled)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}
