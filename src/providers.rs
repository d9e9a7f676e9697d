//! Watchlist sources.
//!
//! [`ListProvider`] is the seam between the list store and wherever list data
//! comes from: the built-in fixture data, JSON exports on disk, or a vendor
//! HTTP API.

use crate::watchlist::{EntityKind, ListKind, WatchlistEntity};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failure to fetch one source list
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{list} list unavailable: {reason}")]
    Unavailable { list: ListKind, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {list} list: {source}")]
    Parse {
        list: ListKind,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(feature = "http-provider")]
    #[error("list request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source of watchlist records, one corpus at a time
#[async_trait]
pub trait ListProvider: Send + Sync {
    /// Short identity recorded in refresh logs and screening metadata
    fn name(&self) -> &str;

    /// Fetch the complete current contents of one corpus
    async fn fetch_source_list(&self, list: ListKind) -> Result<Vec<WatchlistEntity>, ProviderError>;
}

/// In-process provider backed by fixture records.
///
/// Stands in for a commercial data vendor. Lists can be overridden or made
/// to fail so callers can exercise degraded screenings.
pub struct MockListProvider {
    lists: HashMap<ListKind, Vec<WatchlistEntity>>,
    failing: HashSet<ListKind>,
    latency: Duration,
}

impl MockListProvider {
    /// Provider serving the built-in fixture corpora
    pub fn new() -> Self {
        let mut lists = HashMap::new();
        lists.insert(ListKind::Sanctions, fixture_sanctions());
        lists.insert(ListKind::Pep, fixture_peps());
        lists.insert(ListKind::AdverseMedia, fixture_adverse_media());
        Self {
            lists,
            failing: HashSet::new(),
            latency: Duration::ZERO,
        }
    }

    /// Provider with every corpus empty
    pub fn empty() -> Self {
        Self {
            lists: ListKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
            failing: HashSet::new(),
            latency: Duration::ZERO,
        }
    }

    /// Replace the records served for one corpus
    pub fn with_list(mut self, list: ListKind, entities: Vec<WatchlistEntity>) -> Self {
        self.lists.insert(list, entities);
        self
    }

    /// Make fetches of one corpus fail
    pub fn with_failure(mut self, list: ListKind) -> Self {
        self.failing.insert(list);
        self
    }

    /// Delay every fetch, mimicking a remote feed
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for MockListProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListProvider for MockListProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_source_list(&self, list: ListKind) -> Result<Vec<WatchlistEntity>, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.contains(&list) {
            return Err(ProviderError::Unavailable {
                list,
                reason: "feed returned no data".to_string(),
            });
        }

        Ok(self.lists.get(&list).cloned().unwrap_or_default())
    }
}

/// Provider reading `<dir>/<list>.json` exports, e.g. `sanctions.json`
pub struct FileListProvider {
    dir: PathBuf,
}

impl FileListProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, list: ListKind) -> PathBuf {
        self.dir.join(format!("{}.json", list.as_str()))
    }
}

#[async_trait]
impl ListProvider for FileListProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_source_list(&self, list: ListKind) -> Result<Vec<WatchlistEntity>, ProviderError> {
        let path = self.path_for(list);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ProviderError::Io { path, source })?;
        serde_json::from_str(&raw).map_err(|source| ProviderError::Parse { list, source })
    }
}

/// Configuration for [`HttpListProvider`]
#[cfg(feature = "http-provider")]
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL of the list API (e.g. "https://lists.example.com")
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

#[cfg(feature = "http-provider")]
impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            auth_token: None,
            timeout_ms: 30_000,
        }
    }
}

/// Provider fetching `GET {base_url}/lists/{list}` as a JSON array of records
#[cfg(feature = "http-provider")]
pub struct HttpListProvider {
    config: HttpProviderConfig,
    http: reqwest::Client,
}

#[cfg(feature = "http-provider")]
impl HttpListProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn url_for(&self, list: ListKind) -> String {
        format!("{}/lists/{}", self.config.base_url.trim_end_matches('/'), list.as_str())
    }
}

#[cfg(feature = "http-provider")]
#[async_trait]
impl ListProvider for HttpListProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_source_list(&self, list: ListKind) -> Result<Vec<WatchlistEntity>, ProviderError> {
        let mut request = self.http.get(self.url_for(list));
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<Vec<WatchlistEntity>>().await?)
    }
}

fn fixture_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn fixture_entity(id: &str, name: &str, kind: EntityKind, source: &str) -> WatchlistEntity {
    WatchlistEntity {
        id: id.to_string(),
        name: name.to_string(),
        aliases: Vec::new(),
        kind,
        sources: vec![source.to_string()],
        date_of_birth: None,
        place_of_birth: None,
        nationalities: Vec::new(),
        addresses: Vec::new(),
        remarks: None,
        source_url: None,
        positions: Vec::new(),
        last_updated: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap_or_else(Utc::now),
    }
}

fn fixture_sanctions() -> Vec<WatchlistEntity> {
    let mut putin = fixture_entity(
        "SDN-35096",
        "PUTIN, Vladimir Vladimirovich",
        EntityKind::Individual,
        "OFAC SDN List",
    );
    putin.aliases = vec![
        "PUTIN, Vladimir".to_string(),
        "Vladimir Vladimirovich PUTIN".to_string(),
    ];
    putin.sources.push("EU Consolidated List".to_string());
    putin.sources.push("UK Sanctions List".to_string());
    putin.date_of_birth = fixture_date(1952, 10, 7);
    putin.place_of_birth = Some("Leningrad, Russia".to_string());
    putin.nationalities = vec!["Russia".to_string()];
    putin.remarks = Some("President of the Russian Federation".to_string());
    putin.source_url = Some("https://sanctionssearch.ofac.treas.gov/".to_string());

    let mut melli = fixture_entity("SDN-9643", "Bank Melli Iran", EntityKind::Entity, "OFAC SDN List");
    melli.aliases = vec!["Melli Bank".to_string(), "BMI".to_string()];
    melli.nationalities = vec!["Iran".to_string()];
    melli.addresses = vec!["Ferdowsi Avenue, Tehran, Iran".to_string()];
    melli.remarks = Some("Facilitating Iranian government transactions".to_string());

    let mut kwangson = fixture_entity(
        "UN-KPe.025",
        "Korea Kwangson Banking Corp",
        EntityKind::Entity,
        "UN Consolidated List",
    );
    kwangson.aliases = vec!["KKBC".to_string()];
    kwangson.nationalities = vec!["North Korea".to_string()];

    vec![putin, melli, kwangson]
}

fn fixture_peps() -> Vec<WatchlistEntity> {
    let mut smithson = fixture_entity("PEP-GB-0142", "John Smithson", EntityKind::Individual, "UK PEP Register");
    smithson.date_of_birth = fixture_date(1965, 4, 12);
    smithson.nationalities = vec!["United Kingdom".to_string()];
    smithson.positions = vec!["Member of Parliament".to_string()];

    let mut gonzalez = fixture_entity(
        "PEP-ES-0077",
        "Maria Gonzalez Ferreira",
        EntityKind::Individual,
        "EU PEP Register",
    );
    gonzalez.date_of_birth = fixture_date(1971, 11, 3);
    gonzalez.nationalities = vec!["Spain".to_string()];
    gonzalez.positions = vec!["Minister of Finance".to_string()];

    vec![smithson, gonzalez]
}

fn fixture_adverse_media() -> Vec<WatchlistEntity> {
    let mut northbridge = fixture_entity(
        "AM-2023-118",
        "Northbridge Property Holdings",
        EntityKind::Entity,
        "Financial Times",
    );
    northbridge.remarks = Some("Named in a mortgage fraud investigation".to_string());
    northbridge.source_url = Some("https://www.ft.com/".to_string());

    let mut hallworth = fixture_entity("AM-2022-031", "Derek Hallworth", EntityKind::Individual, "The Guardian");
    hallworth.nationalities = vec!["United Kingdom".to_string()];
    hallworth.remarks = Some("Convicted of tenancy deposit fraud".to_string());

    vec![northbridge, hallworth]
}
