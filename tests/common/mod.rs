// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use ai_news_aggregator::ingest::types::{
    Category, FetchKind, Region, SourceDescriptor, SourceFamily,
};
use ai_news_aggregator::store::{SqliteStore, Store};
use ai_news_aggregator::AppConfig;

pub const AI_RSS: &str = include_str!("../fixtures/ai_rss.xml");
pub const FEED_URL: &str = "https://example.com/feed";
pub const ADMIN_TOKEN: &str = "test-admin-token";

pub fn news_source(name: &str, endpoint: &str, region: Region) -> SourceDescriptor {
    SourceDescriptor {
        name: name.into(),
        endpoint: endpoint.into(),
        region,
        fetch_kind: FetchKind::Feed,
        family: SourceFamily::News,
        category: Category::Tech,
        ai_filter: true,
        enabled: true,
        selectors: None,
        counters: Default::default(),
    }
}

pub fn events_source(name: &str, endpoint: &str) -> SourceDescriptor {
    SourceDescriptor {
        name: name.into(),
        endpoint: endpoint.into(),
        region: Region::International,
        fetch_kind: FetchKind::StaticApi,
        family: SourceFamily::ApiEvents,
        category: Category::Event,
        ai_filter: false,
        enabled: true,
        selectors: None,
        counters: Default::default(),
    }
}

/// Timers off, admin routes open with [`ADMIN_TOKEN`], extraction off.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.schedule.enabled = false;
    cfg.admin_token = Some(ADMIN_TOKEN.to_string());
    cfg.extract.enabled = false;
    cfg.fetch.timeout_secs = 5;
    cfg
}

pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(SqliteStore::new_in_memory().expect("in-memory store"))
}

/// Minimal RSS document with one item per `(title, link)` pair.
pub fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>{title}</description>\
                 <pubDate>Tue, 04 Mar 2025 08:00:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>T</title>{body}</channel></rss>"
    )
}
