// tests/ingest_dedup.rs
mod common;

use std::sync::Arc;

use ai_news_aggregator::error::ExtractError;
use ai_news_aggregator::ingest::extract::DisabledExtractor;
use ai_news_aggregator::ingest::providers::FixtureFetcher;
use ai_news_aggregator::ingest::types::{ContentExtractor, Region, SourceFamily};
use ai_news_aggregator::ingest::Pipeline;
use ai_news_aggregator::store::{NewsQuery, Store, TranslationStatus};
use ai_news_aggregator::translate::{MockTranslator, TranslationOrchestrator};
use async_trait::async_trait;
use common::*;

fn pipeline_with(
    store: Arc<dyn Store>,
    fetcher: Arc<FixtureFetcher>,
    extractor: Arc<dyn ContentExtractor>,
    seed: &[ai_news_aggregator::ingest::types::SourceDescriptor],
) -> Pipeline {
    let pipeline = Pipeline::new(store, fetcher, extractor, &test_config());
    pipeline.registry().seed_if_empty(seed).unwrap();
    pipeline
}

fn record_for(store: &dyn Store, link: &str) -> ai_news_aggregator::store::NewsRecord {
    let id = store.find_news_by_link(link).unwrap().expect("record by link");
    store.get_news(id).unwrap().expect("record by id")
}

#[tokio::test]
async fn rerunning_the_same_feed_creates_no_duplicates() {
    let store = memory_store();
    let fetcher = Arc::new(FixtureFetcher::new(10).with_body(FEED_URL, AI_RSS));
    let pipeline = pipeline_with(
        store.clone(),
        fetcher.clone(),
        Arc::new(DisabledExtractor),
        &[news_source("Example Tech Wire", FEED_URL, Region::International)],
    );

    let first = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(first.fetched, 3);
    assert_eq!(first.saved, 2, "GPT and robotics items pass the gate");
    assert_eq!(first.filtered, 1, "earnings item has no AI keyword");

    let second = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(second.saved, 0);
    assert_eq!(second.skipped, 2);

    let page = store.list_news(&NewsQuery::default()).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn international_item_is_queued_then_translated() {
    let store = memory_store();
    let fetcher = Arc::new(FixtureFetcher::new(10).with_body(FEED_URL, AI_RSS));
    let pipeline = pipeline_with(
        store.clone(),
        fetcher,
        Arc::new(DisabledExtractor),
        &[news_source("Example Tech Wire", FEED_URL, Region::International)],
    );
    pipeline.run_family(SourceFamily::News).await.unwrap();

    let rec = record_for(store.as_ref(), "https://example.com/a");
    assert_eq!(rec.title, "New GPT Model Released");
    assert_eq!(rec.translation_status, TranslationStatus::Pending);
    assert_eq!(rec.body, rec.summary, "body falls back to the summary");
    assert_eq!(rec.title_zh, None);

    let orchestrator = TranslationOrchestrator::new(
        store.clone(),
        Arc::new(MockTranslator::fixed(["新GPT模型发布"])),
        test_config().translation,
    );
    let sweep = orchestrator.run_sweep().await.unwrap();
    assert_eq!(sweep.claimed, 2);
    assert_eq!(sweep.failed, 0);

    let rec = record_for(store.as_ref(), "https://example.com/a");
    assert_eq!(rec.translation_status, TranslationStatus::Translated);
    assert_eq!(rec.title_zh.as_deref(), Some("新GPT模型发布"));
    assert_eq!(rec.title, "New GPT Model Released", "original text is kept");
}

#[tokio::test]
async fn domestic_items_need_no_translation() {
    let store = memory_store();
    let fetcher = Arc::new(FixtureFetcher::new(10).with_body(
        "https://cn.example.com/rss",
        &rss(&[("国产大模型发布新版本", "https://cn.example.com/1")]),
    ));
    let pipeline = pipeline_with(
        store.clone(),
        fetcher,
        Arc::new(DisabledExtractor),
        &[news_source("国内科技", "https://cn.example.com/rss", Region::Domestic)],
    );
    let report = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(report.saved, 1);

    let rec = record_for(store.as_ref(), "https://cn.example.com/1");
    assert_eq!(rec.translation_status, TranslationStatus::NotNeeded);
    assert!(store.claim_pending(10).unwrap().is_empty());
}

#[tokio::test]
async fn tracking_variant_from_another_source_is_skipped() {
    let store = memory_store();
    let mirror = "https://mirror.test/feed";
    let fetcher = Arc::new(
        FixtureFetcher::new(10)
            .with_body(FEED_URL, AI_RSS)
            .with_body(
                mirror,
                &rss(&[("GPT model lands", "https://example.com/a/?utm_medium=social")]),
            ),
    );
    let pipeline = pipeline_with(
        store.clone(),
        fetcher,
        Arc::new(DisabledExtractor),
        &[news_source("Example Tech Wire", FEED_URL, Region::International)],
    );

    pipeline.run_family(SourceFamily::News).await.unwrap();
    pipeline
        .registry()
        .upsert(&news_source("Mirror", mirror, Region::International))
        .unwrap();
    let report = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(report.saved, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(store.list_news(&NewsQuery::default()).unwrap().total, 2);
}

#[tokio::test]
async fn unavailable_source_does_not_stop_the_others() {
    let store = memory_store();
    let fetcher = Arc::new(FixtureFetcher::new(10).with_body(FEED_URL, AI_RSS));
    let pipeline = pipeline_with(
        store.clone(),
        fetcher,
        Arc::new(DisabledExtractor),
        &[
            news_source("Broken Feed", "https://down.example.com/rss", Region::International),
            news_source("Example Tech Wire", FEED_URL, Region::International),
        ],
    );

    let report = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(report.sources, 2);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.saved, 2);
    assert!(report.errors[0].contains("Broken Feed"));

    let sources = pipeline.registry().all().unwrap();
    let broken = sources.iter().find(|s| s.name == "Broken Feed").unwrap();
    assert_eq!(broken.counters.failure_count, 1);
    let ok = sources.iter().find(|s| s.name == "Example Tech Wire").unwrap();
    assert_eq!(ok.counters.success_count, 1);
    assert!(ok.counters.last_fetched_at.is_some());
}

struct OnePageExtractor;

#[async_trait]
impl ContentExtractor for OnePageExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        if url == "https://example.com/a" {
            Ok("Full article text about the new GPT model.".into())
        } else {
            Err(ExtractError::Status(403))
        }
    }
}

#[tokio::test]
async fn extracted_body_replaces_summary_when_available() {
    let store = memory_store();
    let fetcher = Arc::new(FixtureFetcher::new(10).with_body(FEED_URL, AI_RSS));
    let pipeline = pipeline_with(
        store.clone(),
        fetcher,
        Arc::new(OnePageExtractor),
        &[news_source("Example Tech Wire", FEED_URL, Region::International)],
    );
    let report = pipeline.run_family(SourceFamily::News).await.unwrap();
    assert_eq!(report.saved, 2, "extraction failure never drops an item");

    let extracted = record_for(store.as_ref(), "https://example.com/a");
    assert_eq!(extracted.body, "Full article text about the new GPT model.");
    let fallback = record_for(store.as_ref(), "https://example.com/b?utm_source=rss");
    assert_eq!(fallback.body, fallback.summary);
}
