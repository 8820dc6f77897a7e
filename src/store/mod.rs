//! Persistence gateway: the only component that touches the durable store.
//!
//! All writes are single-record upserts keyed on `news.link`, `events.name`
//! and `sources.name`; a duplicate insert is a no-op rather than an error.

pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::ingest::types::{
    Category, EventType, NormalizedEvent, NormalizedItem, Region, SourceDescriptor,
};

pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranslationStatus {
    NotNeeded = 0,
    Pending = 1,
    Translated = 2,
    Failed = 3,
}

impl TranslationStatus {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::NotNeeded),
            1 => Some(Self::Pending),
            2 => Some(Self::Translated),
            3 => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsRecord {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub region: Region,
    pub category: Category,
    pub content_fingerprint: String,
    pub translation_status: TranslationStatus,
    pub translation_retries: u32,
    pub title_zh: Option<String>,
    pub summary_zh: Option<String>,
    pub body_zh: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub name: String,
    pub summary: String,
    pub link: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub event_type: EventType,
    pub source: String,
    pub region: Region,
    pub category: Category,
    pub updated_at: DateTime<Utc>,
}

/// Translated fields written by the orchestrator in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedFields {
    pub title: String,
    pub summary: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsSort {
    #[default]
    PublishedDesc,
    PublishedAsc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSort {
    #[default]
    StartAsc,
    StartDesc,
    Location,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct NewsQuery {
    pub region: Option<Region>,
    pub category: Option<Category>,
    pub search: Option<String>,
    pub sort: NewsSort,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub region: Option<Region>,
    pub event_type: Option<EventType>,
    pub search: Option<String>,
    pub sort: EventSort,
    pub page: u32,
    pub page_size: u32,
}

/// Clamp a 1-based page request into (page, page_size, offset).
pub(crate) fn page_window(page: u32, page_size: u32) -> (u32, u32, u32) {
    let page = page.max(1);
    let size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size.min(MAX_PAGE_SIZE)
    };
    (page, size, (page - 1) * size)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Durable store seam. Implementations are synchronous; callers hold no lock
/// across awaits.
pub trait Store: Send + Sync {
    // --- news ---
    fn find_news_by_link(&self, link: &str) -> StoreResult<Option<i64>>;
    fn find_news_by_fingerprint(&self, fingerprint: &str) -> StoreResult<Option<i64>>;
    /// Insert a new record. `None` when the link already exists.
    fn insert_news(
        &self,
        item: &NormalizedItem,
        status: TranslationStatus,
    ) -> StoreResult<Option<i64>>;
    /// Re-fetch-and-correct path. Never touches translation fields.
    fn update_news_content(&self, id: i64, item: &NormalizedItem) -> StoreResult<bool>;
    fn get_news(&self, id: i64) -> StoreResult<Option<NewsRecord>>;
    fn list_news(&self, query: &NewsQuery) -> StoreResult<Page<NewsRecord>>;

    // --- translation state ---
    /// Oldest `Pending` records first.
    fn claim_pending(&self, limit: usize) -> StoreResult<Vec<NewsRecord>>;
    fn mark_translated(&self, id: i64, fields: &TranslatedFields) -> StoreResult<()>;
    /// Set `Failed` and bump the retry count, capped at `max_retries`.
    /// Returns the retry count after the update.
    fn mark_translation_failed(&self, id: i64, max_retries: u32) -> StoreResult<u32>;
    /// Move `Failed` records still under the cap back to `Pending`.
    fn requeue_failed(&self, max_retries: u32) -> StoreResult<usize>;

    // --- events ---
    fn find_event_by_name(&self, name: &str) -> StoreResult<Option<i64>>;
    fn insert_event(&self, event: &NormalizedEvent) -> StoreResult<Option<i64>>;
    fn update_event(&self, id: i64, event: &NormalizedEvent) -> StoreResult<bool>;
    fn list_events(&self, query: &EventQuery) -> StoreResult<Page<EventRecord>>;

    // --- sources ---
    fn list_sources(&self) -> StoreResult<Vec<SourceDescriptor>>;
    fn upsert_source(&self, source: &SourceDescriptor) -> StoreResult<()>;
    fn delete_source(&self, name: &str) -> StoreResult<bool>;
    fn record_fetch_outcome(&self, name: &str, ok: bool, at: DateTime<Utc>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for s in [
            TranslationStatus::NotNeeded,
            TranslationStatus::Pending,
            TranslationStatus::Translated,
            TranslationStatus::Failed,
        ] {
            assert_eq!(TranslationStatus::from_i64(s.as_i64()), Some(s));
        }
        assert_eq!(TranslationStatus::from_i64(9), None);
    }

    #[test]
    fn page_window_clamps() {
        assert_eq!(page_window(0, 0), (1, DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page_window(3, 500), (3, MAX_PAGE_SIZE, 200));
    }
}
