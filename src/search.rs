//! Watchlist search: name matching plus attribute boosts over one corpus

use crate::matcher::{NameMatcher, PreparedName};
use crate::screening::{MatchType, ReviewStatus, ScreeningMatch};
use crate::watchlist::{EntityKind, ListKind, WatchlistEntity};
use crate::ScreeningError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Score floor and boost amounts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchConfig {
    /// Candidates whose name score is below this are dropped before boosting
    pub match_floor: u8,
    pub date_of_birth_boost: u8,
    pub nationality_boost: u8,
    pub subject_kind_boost: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            match_floor: 70,
            date_of_birth_boost: 15,
            nationality_boost: 10,
            subject_kind_boost: 5,
        }
    }
}

/// Subject attributes searched for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub subject_kind: Option<EntityKind>,
}

impl SearchQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Searches one corpus with one matcher profile
#[derive(Debug, Clone, Copy)]
pub struct ListSearch {
    matcher: NameMatcher,
    config: SearchConfig,
}

impl ListSearch {
    pub fn new(matcher: NameMatcher, config: SearchConfig) -> Self {
        Self { matcher, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Ranked matches from `corpus` at or above the floor.
    ///
    /// Results are ordered by score, highest first, then by entity id.
    pub fn search(
        &self,
        query: &SearchQuery,
        corpus: &[WatchlistEntity],
        list: ListKind,
    ) -> Result<Vec<ScreeningMatch>, ScreeningError> {
        let prepared = PreparedName::new(&query.name);
        if prepared.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entity in corpus {
            if PreparedName::new(&entity.name).is_empty() {
                return Err(ScreeningError::InternalMatching {
                    entity_id: entity.id.clone(),
                    reason: "watchlist record has no usable name".to_string(),
                });
            }

            let name_score = self
                .matcher
                .best_of(&prepared, entity.names())
                .map(|(score, _)| score)
                .unwrap_or(0);

            if name_score < self.config.match_floor {
                continue;
            }

            let match_score = name_score
                .saturating_add(self.boost(query, entity))
                .min(100);

            debug!(
                list = %list,
                entity_id = %entity.id,
                name_score,
                match_score,
                "watchlist candidate above floor"
            );
            matches.push(self.build_match(entity, list, name_score, match_score)?);
        }

        matches.sort_by(|a, b| {
            b.match_score
                .cmp(&a.match_score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        Ok(matches)
    }

    fn boost(&self, query: &SearchQuery, entity: &WatchlistEntity) -> u8 {
        let mut boost = 0u8;

        if let (Some(wanted), Some(listed)) = (query.date_of_birth, entity.date_of_birth) {
            if wanted == listed {
                boost = boost.saturating_add(self.config.date_of_birth_boost);
            }
        }

        if let Some(nationality) = &query.nationality {
            if entity.has_nationality(nationality) {
                boost = boost.saturating_add(self.config.nationality_boost);
            }
        }

        if query.subject_kind == Some(entity.kind) {
            boost = boost.saturating_add(self.config.subject_kind_boost);
        }

        boost
    }

    fn build_match(
        &self,
        entity: &WatchlistEntity,
        list: ListKind,
        name_score: u8,
        match_score: u8,
    ) -> Result<ScreeningMatch, ScreeningError> {
        let metadata = serde_json::to_value(entity).map_err(|e| ScreeningError::InternalMatching {
            entity_id: entity.id.clone(),
            reason: format!("unable to record provenance: {}", e),
        })?;

        let match_type = MatchType::for_list(list);
        let positions_held = if match_type == MatchType::Pep {
            entity.positions.clone()
        } else {
            Vec::new()
        };

        Ok(ScreeningMatch {
            id: Uuid::new_v4(),
            match_type,
            entity_id: entity.id.clone(),
            matched_name: entity.name.clone(),
            match_score,
            name_score,
            aliases: entity.aliases.clone(),
            source_list: entity.primary_source().to_string(),
            list_type: list.as_str().to_string(),
            source_url: entity.source_url.clone(),
            matched_date_of_birth: entity.date_of_birth,
            nationalities: entity.nationalities.clone(),
            positions_held,
            review_status: ReviewStatus::Pending,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchProfile;
    use chrono::Utc;

    fn entity(id: &str, name: &str, aliases: &[&str], kind: EntityKind) -> WatchlistEntity {
        WatchlistEntity {
            id: id.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            kind,
            sources: vec!["OFAC SDN List".to_string()],
            date_of_birth: None,
            place_of_birth: None,
            nationalities: vec![],
            addresses: vec![],
            remarks: None,
            source_url: None,
            positions: vec!["Governor".to_string()],
            last_updated: Utc::now(),
        }
    }

    fn sanctions_search() -> ListSearch {
        ListSearch::new(NameMatcher::new(MatchProfile::SANCTIONS), SearchConfig::default())
    }

    fn general_search() -> ListSearch {
        ListSearch::new(NameMatcher::new(MatchProfile::GENERAL), SearchConfig::default())
    }

    #[test]
    fn test_exact_match() {
        let corpus = vec![entity("E1", "Bank Melli Iran", &[], EntityKind::Entity)];
        let matches = sanctions_search()
            .search(&SearchQuery::by_name("BANK MELLI IRAN"), &corpus, ListKind::Sanctions)
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_score, 100);
        assert_eq!(matches[0].match_type, MatchType::Sanctions);
        assert_eq!(matches[0].review_status, ReviewStatus::Pending);
        assert_eq!(matches[0].source_list, "OFAC SDN List");
        assert_eq!(matches[0].list_type, "sanctions");
        assert_eq!(matches[0].metadata["id"], "E1");
    }

    #[test]
    fn test_alias_match_uses_best_name() {
        let corpus = vec![entity("E1", "Bank Melli Iran", &["Melli Bank"], EntityKind::Entity)];
        let matches = sanctions_search()
            .search(&SearchQuery::by_name("Melli Bank"), &corpus, ListKind::Sanctions)
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name_score, 100);
        assert_eq!(matches[0].aliases, vec!["Melli Bank".to_string()]);
    }

    #[test]
    fn test_no_match_below_floor() {
        let corpus = vec![entity("P1", "John Smithson", &[], EntityKind::Individual)];
        let matches = general_search()
            .search(&SearchQuery::by_name("John Smith"), &corpus, ListKind::Pep)
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_boosts_never_lift_sub_floor_candidates() {
        let mut listed = entity("P1", "John Smithson", &[], EntityKind::Individual);
        listed.date_of_birth = NaiveDate::from_ymd_opt(1970, 1, 1);
        listed.nationalities = vec!["United Kingdom".to_string()];

        // 64 + 15 + 10 + 5 would clear the floor if boosts applied first
        let query = SearchQuery {
            name: "John Smith".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1970, 1, 1),
            nationality: Some("United Kingdom".to_string()),
            subject_kind: Some(EntityKind::Individual),
        };
        let matches = general_search().search(&query, &[listed], ListKind::Pep).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_boosts_are_additive_and_capped() {
        let mut listed = entity("S1", "PUTIN, Vladimir", &[], EntityKind::Individual);
        listed.date_of_birth = NaiveDate::from_ymd_opt(1952, 10, 7);
        listed.nationalities = vec!["Russia".to_string()];

        let search = sanctions_search();
        let mut query = SearchQuery::by_name("Vladimir Putin");
        let base = search.search(&query, &[listed.clone()], ListKind::Sanctions).unwrap();
        assert_eq!(base[0].match_score, 90);

        query.subject_kind = Some(EntityKind::Individual);
        let typed = search.search(&query, &[listed.clone()], ListKind::Sanctions).unwrap();
        assert_eq!(typed[0].match_score, 95);

        query.nationality = Some("russia".to_string());
        let with_nationality = search.search(&query, &[listed.clone()], ListKind::Sanctions).unwrap();
        assert_eq!(with_nationality[0].match_score, 100);

        query.date_of_birth = NaiveDate::from_ymd_opt(1952, 10, 7);
        let capped = search.search(&query, &[listed], ListKind::Sanctions).unwrap();
        assert_eq!(capped[0].match_score, 100);
        assert_eq!(capped[0].name_score, 90);
    }

    #[test]
    fn test_date_of_birth_must_match_exactly() {
        let mut listed = entity("S1", "PETROV, Ivan", &[], EntityKind::Individual);
        listed.date_of_birth = NaiveDate::from_ymd_opt(1970, 5, 20);
        let query = SearchQuery {
            name: "Ivan Petrov".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1970, 5, 21),
            ..SearchQuery::default()
        };

        let matches = sanctions_search().search(&query, &[listed], ListKind::Sanctions).unwrap();
        assert_eq!(matches[0].name_score, 90);
        assert_eq!(matches[0].match_score, 90);
    }

    #[test]
    fn test_results_sorted_by_score_then_id() {
        let corpus = vec![
            entity("C", "Apex Global Holdings Ltd", &[], EntityKind::Entity),
            entity("B", "Apex Global Holdings", &[], EntityKind::Entity),
            entity("A", "Global Holdings Apex", &[], EntityKind::Entity),
            entity("D", "Apex Global Holdings", &[], EntityKind::Entity),
            entity("E", "Apex Holdings Group", &[], EntityKind::Entity),
        ];
        let matches = sanctions_search()
            .search(&SearchQuery::by_name("Apex Global Holdings"), &corpus, ListKind::Sanctions)
            .unwrap();

        let order: Vec<(&str, u8)> = matches.iter().map(|m| (m.entity_id.as_str(), m.match_score)).collect();
        assert_eq!(order, vec![("B", 100), ("D", 100), ("A", 90), ("C", 90)]);
    }

    #[test]
    fn test_positions_only_on_pep_matches() {
        let corpus = vec![entity("X1", "Maria Gonzalez", &[], EntityKind::Individual)];
        let query = SearchQuery::by_name("Maria Gonzalez");

        let pep = general_search().search(&query, &corpus, ListKind::Pep).unwrap();
        assert_eq!(pep[0].positions_held, vec!["Governor".to_string()]);

        let media = general_search().search(&query, &corpus, ListKind::AdverseMedia).unwrap();
        assert!(media[0].positions_held.is_empty());
        assert_eq!(media[0].match_type, MatchType::AdverseMedia);
    }

    #[test]
    fn test_unusable_record_is_reported() {
        let corpus = vec![entity("BROKEN-1", " ,. ", &[], EntityKind::Entity)];
        let err = sanctions_search()
            .search(&SearchQuery::by_name("Anyone"), &corpus, ListKind::Sanctions)
            .unwrap_err();
        assert!(matches!(
            err,
            ScreeningError::InternalMatching { ref entity_id, .. } if entity_id == "BROKEN-1"
        ));
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let corpus = vec![entity("E1", "Bank Melli Iran", &[], EntityKind::Entity)];
        let matches = sanctions_search()
            .search(&SearchQuery::by_name("   "), &corpus, ListKind::Sanctions)
            .unwrap();
        assert!(matches.is_empty());
    }
}
