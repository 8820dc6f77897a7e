// src/ingest/registry.rs
use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::error::StoreResult;
use crate::ingest::providers::static_api::builtin_body;
use crate::ingest::types::{FetchKind, SourceDescriptor, SourceFamily};
use crate::store::Store;

/// Persisted list of fetchable sources. Also the single write path for the
/// per-source fetch counters.
#[derive(Clone)]
pub struct SourceRegistry {
    store: Arc<dyn Store>,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert `seed` only when the registry holds no sources yet.
    pub fn seed_if_empty(&self, seed: &[SourceDescriptor]) -> StoreResult<usize> {
        if !self.store.list_sources()?.is_empty() {
            return Ok(0);
        }
        for s in seed {
            self.store.upsert_source(s)?;
        }
        tracing::info!(count = seed.len(), "seeded source registry");
        Ok(seed.len())
    }

    pub fn all(&self) -> StoreResult<Vec<SourceDescriptor>> {
        self.store.list_sources()
    }

    /// Enabled sources of one family, in registry order.
    pub fn sources_for(&self, family: SourceFamily) -> StoreResult<Vec<SourceDescriptor>> {
        Ok(self
            .store
            .list_sources()?
            .into_iter()
            .filter(|s| s.enabled && s.family == family)
            .collect())
    }

    pub fn upsert(&self, source: &SourceDescriptor) -> StoreResult<()> {
        self.store.upsert_source(source)
    }

    pub fn remove(&self, name: &str) -> StoreResult<bool> {
        self.store.delete_source(name)
    }

    pub fn record_outcome(&self, name: &str, ok: bool) -> StoreResult<()> {
        self.store.record_fetch_outcome(name, ok, Utc::now())
    }
}

/// Reject descriptors the fetcher could never use.
pub fn validate(source: &SourceDescriptor) -> Result<(), String> {
    if source.name.trim().is_empty() {
        return Err("name must not be empty".into());
    }
    if builtin_body(&source.endpoint).is_none() {
        let url = Url::parse(source.endpoint.trim())
            .map_err(|e| format!("endpoint is not a valid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("endpoint must be http(s)".into());
        }
    }
    if source.fetch_kind == FetchKind::Scrape && source.selectors.is_none() {
        return Err("scrape sources need selectors".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Category, Region};
    use crate::store::SqliteStore;

    fn src(name: &str, family: SourceFamily, enabled: bool) -> SourceDescriptor {
        SourceDescriptor {
            name: name.into(),
            endpoint: format!("https://{}.test/feed", name.to_lowercase()),
            region: Region::International,
            fetch_kind: FetchKind::Feed,
            family,
            category: Category::Tech,
            ai_filter: true,
            enabled,
            selectors: None,
            counters: Default::default(),
        }
    }

    #[test]
    fn seed_runs_once_and_counters_survive_edits() {
        let reg = SourceRegistry::new(Arc::new(SqliteStore::new_in_memory().unwrap()));
        let seed = vec![
            src("A", SourceFamily::News, true),
            src("B", SourceFamily::News, false),
            src("C", SourceFamily::ApiEvents, true),
        ];
        assert_eq!(reg.seed_if_empty(&seed).unwrap(), 3);
        assert_eq!(reg.seed_if_empty(&seed).unwrap(), 0);

        let news = reg.sources_for(SourceFamily::News).unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].name, "A");

        reg.record_outcome("A", true).unwrap();
        reg.record_outcome("A", false).unwrap();
        reg.upsert(&src("A", SourceFamily::News, true)).unwrap();
        let a = reg.sources_for(SourceFamily::News).unwrap().remove(0);
        assert_eq!(a.counters.success_count, 1);
        assert_eq!(a.counters.failure_count, 1);
        assert!(a.counters.last_fetched_at.is_some());
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&src("A", SourceFamily::News, true)).is_ok());
        let mut bad = src("A", SourceFamily::News, true);
        bad.endpoint = "ftp://x".into();
        assert!(validate(&bad).is_err());
        bad.endpoint = "builtin:known-events".into();
        assert!(validate(&bad).is_ok());
        bad.fetch_kind = FetchKind::Scrape;
        assert!(validate(&bad).is_err());
    }
}
