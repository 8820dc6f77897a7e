// src/ingest/dedup.rs
//! Insert/update/skip decisions against the store.

use crate::error::StoreResult;
use crate::ingest::types::{NormalizedEvent, NormalizedItem, Region};
use crate::store::{Store, TranslationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsAction {
    Insert(TranslationStatus),
    /// First source wins; the id is the record already holding the link or fingerprint.
    Skip(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Insert,
    Update(i64),
}

/// Initial translation state for a freshly inserted record.
pub fn initial_status(region: Region) -> TranslationStatus {
    match region {
        Region::International => TranslationStatus::Pending,
        Region::Domestic => TranslationStatus::NotNeeded,
    }
}

/// Exact link match, then the secondary fingerprint.
pub fn existing_news(store: &dyn Store, link: &str, fingerprint: &str) -> StoreResult<Option<i64>> {
    if let Some(id) = store.find_news_by_link(link)? {
        return Ok(Some(id));
    }
    store.find_news_by_fingerprint(fingerprint)
}

pub fn resolve_news(store: &dyn Store, item: &NormalizedItem) -> StoreResult<NewsAction> {
    Ok(match existing_news(store, &item.link, &item.content_fingerprint)? {
        Some(id) => NewsAction::Skip(id),
        None => NewsAction::Insert(initial_status(item.region)),
    })
}

pub fn resolve_event(store: &dyn Store, event: &NormalizedEvent) -> StoreResult<EventAction> {
    Ok(match store.find_event_by_name(&event.name)? {
        Some(id) => EventAction::Update(id),
        None => EventAction::Insert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::content_fingerprint;
    use crate::ingest::types::Category;
    use crate::store::SqliteStore;
    use chrono::Utc;

    fn item(link: &str, region: Region) -> NormalizedItem {
        NormalizedItem {
            title: "t".into(),
            summary: "s".into(),
            body: "s".into(),
            link: link.into(),
            published_at: Utc::now(),
            source: "S".into(),
            region,
            category: Category::Tech,
            content_fingerprint: content_fingerprint(link),
        }
    }

    #[test]
    fn new_items_get_status_by_region() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert_eq!(
            resolve_news(&store, &item("https://a.test/1", Region::International)).unwrap(),
            NewsAction::Insert(TranslationStatus::Pending)
        );
        assert_eq!(
            resolve_news(&store, &item("https://a.test/1", Region::Domestic)).unwrap(),
            NewsAction::Insert(TranslationStatus::NotNeeded)
        );
    }

    #[test]
    fn fingerprint_catches_tracking_variant_of_same_link() {
        let store = SqliteStore::new_in_memory().unwrap();
        let first = item("https://a.test/story", Region::International);
        let id = store
            .insert_news(&first, TranslationStatus::Pending)
            .unwrap()
            .unwrap();
        let variant = item("https://a.test/story?utm_source=feed", Region::International);
        assert_eq!(resolve_news(&store, &variant).unwrap(), NewsAction::Skip(id));
    }
}
