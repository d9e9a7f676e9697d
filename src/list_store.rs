//! In-memory watchlist corpora with copy-on-write refresh.
//!
//! Readers take an `Arc<ListSnapshot>` and search it without holding any
//! lock. A refresh fetches every corpus off to the side and then swaps the
//! new snapshot in under a brief write lock, so a search never observes a
//! partially loaded corpus. Only one refresh runs at a time.

use crate::providers::ListProvider;
use crate::watchlist::{ListKind, WatchlistEntity};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One loaded corpus
#[derive(Debug, Clone)]
pub struct LoadedCorpus {
    pub entities: Arc<Vec<WatchlistEntity>>,
    pub refreshed_at: DateTime<Utc>,
    pub provider: String,
}

/// Immutable view of every corpus at one point in time
#[derive(Debug, Clone, Default)]
pub struct ListSnapshot {
    corpora: BTreeMap<ListKind, LoadedCorpus>,
    unavailable: BTreeMap<ListKind, String>,
    refreshed_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl ListSnapshot {
    /// Records of one corpus, `None` when it has never loaded
    pub fn corpus(&self, list: ListKind) -> Option<&[WatchlistEntity]> {
        self.corpora.get(&list).map(|c| c.entities.as_slice())
    }

    pub fn loaded(&self, list: ListKind) -> Option<&LoadedCorpus> {
        self.corpora.get(&list)
    }

    pub fn is_available(&self, list: ListKind) -> bool {
        self.corpora.contains_key(&list)
    }

    /// Why a corpus could not be loaded, if it is missing
    pub fn unavailable_reason(&self, list: ListKind) -> Option<&str> {
        self.unavailable.get(&list).map(String::as_str)
    }

    pub fn entity_count(&self) -> usize {
        self.corpora.values().map(|c| c.entities.len()).sum()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Refresh time of the least recently loaded corpus
    pub fn oldest_refresh(&self) -> Option<DateTime<Utc>> {
        self.corpora.values().map(|c| c.refreshed_at).min()
    }

    /// True when a loaded corpus is older than `staleness` at `now`
    pub fn is_stale(&self, list: ListKind, now: DateTime<Utc>, staleness: Duration) -> bool {
        self.corpora
            .get(&list)
            .map(|c| now - c.refreshed_at >= staleness)
            .unwrap_or(false)
    }

    /// Loaded corpora older than `staleness` at `now`, with their load time
    pub fn stale_lists(&self, now: DateTime<Utc>, staleness: Duration) -> BTreeMap<ListKind, DateTime<Utc>> {
        self.corpora
            .iter()
            .filter(|(_, c)| now - c.refreshed_at >= staleness)
            .map(|(list, c)| (*list, c.refreshed_at))
            .collect()
    }

    /// Incremented on every swap; 0 means nothing was ever loaded
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub loaded: BTreeMap<ListKind, usize>,
    /// Corpora whose fetch failed, with the error
    pub failed: BTreeMap<ListKind, String>,
    /// Failed corpora still served from the previous refresh
    pub retained: Vec<ListKind>,
    pub generation: u64,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Holder of the current watchlist snapshot
pub struct ListStore {
    current: RwLock<Arc<ListSnapshot>>,
    refresh_guard: tokio::sync::Mutex<()>,
    staleness: Duration,
}

impl ListStore {
    /// Empty store; a refresh is due once the snapshot is older than `staleness`
    pub fn new(staleness: Duration) -> Self {
        Self {
            current: RwLock::new(Arc::new(ListSnapshot::default())),
            refresh_guard: tokio::sync::Mutex::new(()),
            staleness,
        }
    }

    /// Current snapshot. Cheap; holds the read lock only to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<ListSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    /// True when never loaded, missing a corpus, or any corpus is older than the threshold
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        let snapshot = self.snapshot();
        if ListKind::ALL.iter().any(|list| !snapshot.is_available(*list)) {
            return true;
        }
        match snapshot.oldest_refresh() {
            None => true,
            Some(oldest) => now - oldest >= self.staleness,
        }
    }

    /// First load. Does nothing if a snapshot has already been loaded.
    pub async fn init(&self, provider: &dyn ListProvider) -> RefreshReport {
        let snapshot = self.snapshot();
        if snapshot.generation > 0 {
            debug!(generation = snapshot.generation, "list store already initialised");
            return RefreshReport {
                loaded: snapshot.corpora.iter().map(|(k, c)| (*k, c.entities.len())).collect(),
                generation: snapshot.generation,
                ..RefreshReport::default()
            };
        }
        self.refresh(provider).await
    }

    /// Fetch every corpus from `provider` and swap in the new snapshot.
    ///
    /// A corpus whose fetch fails keeps its previous contents if it had any;
    /// otherwise it is recorded as unavailable.
    pub async fn refresh(&self, provider: &dyn ListProvider) -> RefreshReport {
        let _writer = self.refresh_guard.lock().await;
        let now = Utc::now();

        let mut fetched = BTreeMap::new();
        let mut failed = BTreeMap::new();
        for list in ListKind::ALL {
            match provider.fetch_source_list(list).await {
                Ok(entities) => {
                    debug!(list = %list, entities = entities.len(), "fetched watchlist");
                    fetched.insert(
                        list,
                        LoadedCorpus {
                            entities: Arc::new(entities),
                            refreshed_at: now,
                            provider: provider.name().to_string(),
                        },
                    );
                }
                Err(err) => {
                    warn!(list = %list, provider = provider.name(), error = %err, "watchlist fetch failed");
                    failed.insert(list, err.to_string());
                }
            }
        }

        let mut report = RefreshReport {
            loaded: fetched.iter().map(|(k, c)| (*k, c.entities.len())).collect(),
            failed: failed.clone(),
            ..RefreshReport::default()
        };

        {
            let mut current = self.current.write();
            let mut next = ListSnapshot {
                corpora: current.corpora.clone(),
                unavailable: BTreeMap::new(),
                refreshed_at: current.refreshed_at,
                generation: current.generation + 1,
            };

            for (list, reason) in failed {
                if next.corpora.contains_key(&list) {
                    report.retained.push(list);
                } else {
                    next.unavailable.insert(list, reason);
                }
            }
            if !fetched.is_empty() {
                next.refreshed_at = Some(now);
            }
            next.corpora.extend(fetched);

            report.generation = next.generation;
            *current = Arc::new(next);
        }

        info!(
            provider = provider.name(),
            generation = report.generation,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "watchlist refresh complete"
        );
        report
    }

    /// Replace one corpus with records loaded by the caller.
    ///
    /// Waits for a refresh in flight so the swap is not overwritten by it.
    pub async fn replace_corpus(&self, list: ListKind, entities: Vec<WatchlistEntity>, provider: &str) {
        let _guard = self.refresh_guard.lock().await;
        let now = Utc::now();
        let count = entities.len();
        let mut current = self.current.write();

        let mut next = (**current).clone();
        next.corpora.insert(
            list,
            LoadedCorpus {
                entities: Arc::new(entities),
                refreshed_at: now,
                provider: provider.to_string(),
            },
        );
        next.unavailable.remove(&list);
        next.refreshed_at = Some(now);
        next.generation += 1;
        *current = Arc::new(next);

        info!(list = %list, entities = count, provider, "watchlist replaced");
    }
}

impl Default for ListStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}
