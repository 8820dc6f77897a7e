// src/ingest/pipeline.rs
//! One ingestion run for a source family: fetch → filter → dedup pre-check →
//! extract → normalize → persist.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::{ExtractError, FetchError, PipelineError};
use crate::ingest::dedup::{self, EventAction, NewsAction};
use crate::ingest::normalize::{normalize, normalize_event, KeywordFilter};
use crate::ingest::registry::SourceRegistry;
use crate::ingest::scheduler::RunGuard;
use crate::ingest::types::{
    ContentExtractor, NormalizedItem, RawCandidate, SourceDescriptor, SourceFamily, SourceFetcher,
};
use crate::store::{Store, TranslationStatus};

/// Outcome of a completed run. Per-item and per-source failures are counted
/// here; only persistence loss turns a run into an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub family: Option<SourceFamily>,
    pub sources: usize,
    pub sources_failed: usize,
    pub fetched: usize,
    pub saved: usize,
    pub updated: usize,
    pub skipped: usize,
    pub filtered: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl RunReport {
    fn absorb(&mut self, other: RunReport) {
        self.sources_failed += other.sources_failed;
        self.fetched += other.fetched;
        self.saved += other.saved;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.filtered += other.filtered;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

pub struct Pipeline {
    store: Arc<dyn Store>,
    registry: SourceRegistry,
    fetcher: Arc<dyn SourceFetcher>,
    extractor: Arc<dyn ContentExtractor>,
    filter: KeywordFilter,
    fetch_timeout: Duration,
    extract_timeout: Duration,
    max_concurrent_sources: usize,
    extract_concurrency: usize,
    guards: [RunGuard; 3],
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn SourceFetcher>,
        extractor: Arc<dyn ContentExtractor>,
        cfg: &AppConfig,
    ) -> Self {
        crate::ingest::ensure_metrics_described();
        Self {
            registry: SourceRegistry::new(store.clone()),
            store,
            fetcher,
            extractor,
            filter: KeywordFilter::new(&cfg.ai_keywords),
            fetch_timeout: Duration::from_secs(cfg.fetch.timeout_secs),
            extract_timeout: Duration::from_secs(cfg.extract.timeout_secs),
            max_concurrent_sources: cfg.fetch.max_concurrent_sources.max(1),
            extract_concurrency: cfg.fetch.extract_concurrency.max(1),
            guards: [RunGuard::new(), RunGuard::new(), RunGuard::new()],
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn guard(&self, family: SourceFamily) -> &RunGuard {
        match family {
            SourceFamily::News => &self.guards[0],
            SourceFamily::KnownEvents => &self.guards[1],
            SourceFamily::ApiEvents => &self.guards[2],
        }
    }

    pub fn is_running(&self, family: SourceFamily) -> bool {
        self.guard(family).is_running()
    }

    /// Run one family to completion. Rejected with `RunInProgress` while the
    /// previous run of the same family is still executing.
    pub async fn run_family(&self, family: SourceFamily) -> Result<RunReport, PipelineError> {
        let _permit = self
            .guard(family)
            .try_acquire()
            .ok_or(PipelineError::RunInProgress(family))?;

        let t0 = Instant::now();
        let result = self.run_inner(family).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_run_ms", "family" => family.as_str()).record(ms);

        match &result {
            Ok(r) => {
                gauge!("ingest_pipeline_last_run_ts", "family" => family.as_str())
                    .set(chrono::Utc::now().timestamp() as f64);
                info!(
                    target: "ingest",
                    %family,
                    sources = r.sources,
                    sources_failed = r.sources_failed,
                    fetched = r.fetched,
                    saved = r.saved,
                    updated = r.updated,
                    skipped = r.skipped,
                    filtered = r.filtered,
                    failed = r.failed,
                    elapsed_ms = ms as u64,
                    "ingest run finished"
                );
            }
            Err(e) => error!(target: "ingest", %family, error = %e, "ingest run aborted"),
        }
        result
    }

    async fn run_inner(&self, family: SourceFamily) -> Result<RunReport, PipelineError> {
        let sources = self.registry.sources_for(family)?;
        let mut report = RunReport {
            family: Some(family),
            sources: sources.len(),
            ..Default::default()
        };

        // Bounded fan-out of whole per-source runs; completion order is
        // irrelevant across sources. Persistence loss aborts the rest.
        let partials: Vec<RunReport> = stream::iter(sources)
            .map(|source| self.run_source(family, source))
            .buffer_unordered(self.max_concurrent_sources)
            .try_collect()
            .await?;
        for partial in partials {
            report.absorb(partial);
        }

        counter!("ingest_saved_total", "family" => family.as_str()).increment(report.saved as u64);
        counter!("ingest_updated_total", "family" => family.as_str())
            .increment(report.updated as u64);
        counter!("ingest_skipped_total", "family" => family.as_str())
            .increment(report.skipped as u64);
        counter!("ingest_filtered_total", "family" => family.as_str())
            .increment(report.filtered as u64);
        counter!("ingest_failed_items_total", "family" => family.as_str())
            .increment(report.failed as u64);
        Ok(report)
    }

    /// Fetch, gate, dedup, extract and persist one source.
    async fn run_source(
        &self,
        family: SourceFamily,
        source: SourceDescriptor,
    ) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        match self.fetch_one(&source).await {
            Ok(candidates) => {
                self.registry.record_outcome(&source.name, true)?;
                report.fetched += candidates.len();
                counter!("ingest_fetched_total", "source" => source.name.clone())
                    .increment(candidates.len() as u64);
                if family.produces_events() {
                    self.ingest_events(&source, candidates, &mut report)?;
                } else {
                    self.ingest_news(&source, candidates, &mut report).await?;
                }
            }
            Err(reason) => {
                self.registry.record_outcome(&source.name, false)?;
                counter!("ingest_source_errors_total", "source" => source.name.clone())
                    .increment(1);
                let err = PipelineError::SourceUnavailable {
                    source_name: source.name.clone(),
                    reason,
                };
                warn!(target: "ingest", source = %source.name, error = %err, "source skipped");
                report.sources_failed += 1;
                report.errors.push(err.to_string());
            }
        }
        Ok(report)
    }

    async fn fetch_one(&self, source: &SourceDescriptor) -> Result<Vec<RawCandidate>, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(source)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout {
                secs: self.fetch_timeout.as_secs(),
            }),
        }
    }

    async fn ingest_news(
        &self,
        source: &SourceDescriptor,
        candidates: Vec<RawCandidate>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        // Gate and dedup before extraction so known links cost no page fetch.
        let mut fresh: Vec<(NormalizedItem, TranslationStatus)> = Vec::new();
        for raw in &candidates {
            let item = normalize(raw, source);
            if item.title.is_empty() || item.link.is_empty() {
                report.failed += 1;
                continue;
            }
            if !self.filter.admits(source, &item.title, &item.summary) {
                report.filtered += 1;
                continue;
            }
            match dedup::resolve_news(self.store.as_ref(), &item)? {
                NewsAction::Skip(id) => {
                    debug!(source = %source.name, link = %item.link, existing = id, "duplicate news skipped");
                    report.skipped += 1;
                }
                NewsAction::Insert(status) => fresh.push((item, status)),
            }
        }

        // Ordered so persistence keeps feed order within the source.
        let enriched: Vec<(NormalizedItem, TranslationStatus)> = stream::iter(fresh)
            .map(|(item, status)| async move {
                let body = self.extract_body(&item.link).await;
                (item.with_body(body), status)
            })
            .buffered(self.extract_concurrency)
            .collect()
            .await;

        for (item, status) in enriched {
            match self.store.insert_news(&item, status)? {
                Some(id) => {
                    debug!(source = %source.name, id, ?status, "news saved");
                    report.saved += 1;
                }
                // Same link twice in one batch, or a concurrent writer won.
                None => report.skipped += 1,
            }
        }
        Ok(())
    }

    /// Extracted body text, or `None` so the caller keeps the summary.
    async fn extract_body(&self, url: &str) -> Option<String> {
        let res = match tokio::time::timeout(self.extract_timeout, self.extractor.extract(url)).await
        {
            Ok(r) => r,
            Err(_) => Err(ExtractError::Timeout {
                secs: self.extract_timeout.as_secs(),
            }),
        };
        match res {
            Ok(text) => Some(text),
            Err(ExtractError::Disabled) => None,
            Err(reason) => {
                counter!("ingest_extract_failures_total").increment(1);
                let err = PipelineError::ExtractionFailed {
                    url: url.to_string(),
                    reason,
                };
                debug!(target: "ingest", error = %err, "falling back to summary");
                None
            }
        }
    }

    fn ingest_events(
        &self,
        source: &SourceDescriptor,
        candidates: Vec<RawCandidate>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        for raw in &candidates {
            let Some(event) = normalize_event(raw, source) else {
                debug!(source = %source.name, title = %raw.title, "event without usable start date");
                report.failed += 1;
                continue;
            };
            if !self.filter.admits(source, &event.name, &event.summary) {
                report.filtered += 1;
                continue;
            }
            match dedup::resolve_event(self.store.as_ref(), &event)? {
                EventAction::Insert => match self.store.insert_event(&event)? {
                    Some(_) => report.saved += 1,
                    None => report.skipped += 1,
                },
                EventAction::Update(id) => {
                    if self.store.update_event(id, &event)? {
                        report.updated += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
            }
        }
        Ok(())
    }
}
