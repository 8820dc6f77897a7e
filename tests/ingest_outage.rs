// tests/ingest_outage.rs
mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ai_news_aggregator::error::{StoreError, StoreResult};
use ai_news_aggregator::ingest::extract::DisabledExtractor;
use ai_news_aggregator::ingest::providers::FixtureFetcher;
use ai_news_aggregator::ingest::types::{
    NormalizedEvent, NormalizedItem, Region, SourceDescriptor, SourceFamily,
};
use ai_news_aggregator::ingest::Pipeline;
use ai_news_aggregator::store::{
    EventQuery, EventRecord, NewsQuery, NewsRecord, Page, SqliteStore, Store, TranslatedFields,
    TranslationStatus,
};
use ai_news_aggregator::translate::{MockTranslator, TranslationOrchestrator};
use ai_news_aggregator::PipelineError;
use chrono::{DateTime, Utc};
use common::*;

/// Delegates to an in-memory store; writes fail while `down` is set.
struct FlakyStore {
    inner: SqliteStore,
    down: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::new_in_memory().unwrap(),
            down: AtomicBool::new(false),
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("disk detached".into()))
        } else {
            Ok(())
        }
    }
}

impl Store for FlakyStore {
    fn find_news_by_link(&self, link: &str) -> StoreResult<Option<i64>> {
        self.inner.find_news_by_link(link)
    }
    fn find_news_by_fingerprint(&self, fingerprint: &str) -> StoreResult<Option<i64>> {
        self.inner.find_news_by_fingerprint(fingerprint)
    }
    fn insert_news(
        &self,
        item: &NormalizedItem,
        status: TranslationStatus,
    ) -> StoreResult<Option<i64>> {
        self.check()?;
        self.inner.insert_news(item, status)
    }
    fn update_news_content(&self, id: i64, item: &NormalizedItem) -> StoreResult<bool> {
        self.check()?;
        self.inner.update_news_content(id, item)
    }
    fn get_news(&self, id: i64) -> StoreResult<Option<NewsRecord>> {
        self.inner.get_news(id)
    }
    fn list_news(&self, query: &NewsQuery) -> StoreResult<Page<NewsRecord>> {
        self.inner.list_news(query)
    }
    fn claim_pending(&self, limit: usize) -> StoreResult<Vec<NewsRecord>> {
        self.inner.claim_pending(limit)
    }
    fn mark_translated(&self, id: i64, fields: &TranslatedFields) -> StoreResult<()> {
        self.check()?;
        self.inner.mark_translated(id, fields)
    }
    fn mark_translation_failed(&self, id: i64, max_retries: u32) -> StoreResult<u32> {
        self.check()?;
        self.inner.mark_translation_failed(id, max_retries)
    }
    fn requeue_failed(&self, max_retries: u32) -> StoreResult<usize> {
        self.check()?;
        self.inner.requeue_failed(max_retries)
    }
    fn find_event_by_name(&self, name: &str) -> StoreResult<Option<i64>> {
        self.inner.find_event_by_name(name)
    }
    fn insert_event(&self, event: &NormalizedEvent) -> StoreResult<Option<i64>> {
        self.check()?;
        self.inner.insert_event(event)
    }
    fn update_event(&self, id: i64, event: &NormalizedEvent) -> StoreResult<bool> {
        self.check()?;
        self.inner.update_event(id, event)
    }
    fn list_events(&self, query: &EventQuery) -> StoreResult<Page<EventRecord>> {
        self.inner.list_events(query)
    }
    fn list_sources(&self) -> StoreResult<Vec<SourceDescriptor>> {
        self.inner.list_sources()
    }
    fn upsert_source(&self, source: &SourceDescriptor) -> StoreResult<()> {
        self.inner.upsert_source(source)
    }
    fn delete_source(&self, name: &str) -> StoreResult<bool> {
        self.inner.delete_source(name)
    }
    fn record_fetch_outcome(&self, name: &str, ok: bool, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.record_fetch_outcome(name, ok, at)
    }
}

#[tokio::test]
async fn store_outage_aborts_the_run_and_the_next_run_recovers() {
    let store = Arc::new(FlakyStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(FixtureFetcher::new(10).with_body(FEED_URL, AI_RSS)),
        Arc::new(DisabledExtractor),
        &test_config(),
    );
    pipeline
        .registry()
        .seed_if_empty(&[news_source("Example Tech Wire", FEED_URL, Region::International)])
        .unwrap();

    store.down.store(true, Ordering::SeqCst);
    let err = pipeline.run_family(SourceFamily::News).await.unwrap_err();
    assert!(matches!(err, PipelineError::PersistenceUnavailable(_)), "got {err:?}");
    assert!(!pipeline.is_running(SourceFamily::News), "guard released on error");

    store.down.store(false, Ordering::SeqCst);
    let report = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(report.saved, 2);
}

#[tokio::test]
async fn store_outage_aborts_the_sweep_without_losing_pending_work() {
    let store = Arc::new(FlakyStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(FixtureFetcher::new(10).with_body(FEED_URL, AI_RSS)),
        Arc::new(DisabledExtractor),
        &test_config(),
    );
    pipeline
        .registry()
        .seed_if_empty(&[news_source("Example Tech Wire", FEED_URL, Region::International)])
        .unwrap();
    pipeline.run_family(SourceFamily::News).await.unwrap();

    let orch = TranslationOrchestrator::new(
        store.clone(),
        Arc::new(MockTranslator::prefixing("zh:")),
        test_config().translation,
    );
    store.down.store(true, Ordering::SeqCst);
    let err = orch.run_sweep().await.unwrap_err();
    assert!(matches!(err, PipelineError::PersistenceUnavailable(_)));

    store.down.store(false, Ordering::SeqCst);
    assert_eq!(store.claim_pending(10).unwrap().len(), 2);
    assert_eq!(orch.run_sweep().await.unwrap().translated, 2);
}
