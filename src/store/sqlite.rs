//! SQLite-backed [`Store`].
//!
//! One connection behind a mutex. Timestamps are unix seconds, event dates
//! ISO `YYYY-MM-DD` text, enums their lowercase string form.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{
    page_window, EventQuery, EventRecord, EventSort, NewsQuery, NewsRecord, NewsSort, Page, Store,
    TranslatedFields, TranslationStatus,
};
use crate::error::{StoreError, StoreResult};
use crate::ingest::types::{NormalizedEvent, NormalizedItem, Region, SourceCounters, SourceDescriptor};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    body TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,
    published_at INTEGER NOT NULL,
    source TEXT NOT NULL,
    region TEXT NOT NULL,
    category TEXT NOT NULL,
    content_fingerprint TEXT NOT NULL,
    translation_status INTEGER NOT NULL DEFAULT 0,
    translation_retries INTEGER NOT NULL DEFAULT 0,
    title_zh TEXT,
    summary_zh TEXT,
    body_zh TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_news_fingerprint ON news(content_fingerprint);
CREATE INDEX IF NOT EXISTS idx_news_status ON news(translation_status, published_at);
CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_at DESC);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    summary TEXT NOT NULL,
    link TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    location TEXT NOT NULL,
    event_type TEXT NOT NULL,
    source TEXT NOT NULL,
    region TEXT NOT NULL,
    category TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_date);

CREATE TABLE IF NOT EXISTS sources (
    name TEXT PRIMARY KEY,
    endpoint TEXT NOT NULL,
    region TEXT NOT NULL,
    fetch_kind TEXT NOT NULL,
    family TEXT NOT NULL,
    category TEXT NOT NULL,
    ai_filter INTEGER NOT NULL DEFAULT 1,
    enabled INTEGER NOT NULL DEFAULT 1,
    selectors TEXT,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    last_fetched_at INTEGER
);
";

const NEWS_COLUMNS: &str = "id, title, summary, body, link, published_at, source, region, category, \
     content_fingerprint, translation_status, translation_retries, title_zh, summary_zh, body_zh, \
     created_at";

const EVENT_COLUMNS: &str = "id, name, summary, link, start_date, end_date, location, event_type, \
     source, region, category, updated_at";

const SOURCE_COLUMNS: &str = "name, endpoint, region, fetch_kind, family, category, ai_filter, \
     enabled, selectors, success_count, failure_count, last_fetched_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    pub fn new_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }
}

fn ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn iso_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn parse_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

fn news_from_row(row: &Row<'_>) -> rusqlite::Result<NewsRecord> {
    let status: i64 = row.get(10)?;
    let retries: i64 = row.get(11)?;
    Ok(NewsRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        body: row.get(3)?,
        link: row.get(4)?,
        published_at: from_ts(row.get(5)?),
        source: row.get(6)?,
        region: parse_col(row, 7)?,
        category: parse_col(row, 8)?,
        content_fingerprint: row.get(9)?,
        translation_status: TranslationStatus::from_i64(status)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(10, status))?,
        translation_retries: u32::try_from(retries)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(11, retries))?,
        title_zh: row.get(12)?,
        summary_zh: row.get(13)?,
        body_zh: row.get(14)?,
        created_at: from_ts(row.get(15)?),
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    let end: Option<String> = row.get(5)?;
    Ok(EventRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        summary: row.get(2)?,
        link: row.get(3)?,
        start_date: parse_date_col(row, 4)?,
        end_date: end.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        location: row.get(6)?,
        event_type: parse_col(row, 7)?,
        source: row.get(8)?,
        region: parse_col(row, 9)?,
        category: parse_col(row, 10)?,
        updated_at: from_ts(row.get(11)?),
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<SourceDescriptor> {
    let selectors: Option<String> = row.get(8)?;
    let selectors = match selectors {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| conversion_err(8, e))?),
        None => None,
    };
    let success: i64 = row.get(9)?;
    let failure: i64 = row.get(10)?;
    let last: Option<i64> = row.get(11)?;
    Ok(SourceDescriptor {
        name: row.get(0)?,
        endpoint: row.get(1)?,
        region: parse_col(row, 2)?,
        fetch_kind: parse_col(row, 3)?,
        family: parse_col(row, 4)?,
        category: parse_col(row, 5)?,
        ai_filter: row.get(6)?,
        enabled: row.get(7)?,
        selectors,
        counters: SourceCounters {
            success_count: success.max(0) as u64,
            failure_count: failure.max(0) as u64,
            last_fetched_at: last.map(from_ts),
        },
    })
}

/// `LIKE` pattern with `\` as the escape character.
fn like_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn where_clause(clauses: &[&str]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

impl Store for SqliteStore {
    fn find_news_by_link(&self, link: &str) -> StoreResult<Option<i64>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row("SELECT id FROM news WHERE link = ?1", params![link], |r| r.get(0))
            .optional()?)
    }

    fn find_news_by_fingerprint(&self, fingerprint: &str) -> StoreResult<Option<i64>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id FROM news WHERE content_fingerprint = ?1 ORDER BY id LIMIT 1",
                params![fingerprint],
                |r| r.get(0),
            )
            .optional()?)
    }

    fn insert_news(
        &self,
        item: &NormalizedItem,
        status: TranslationStatus,
    ) -> StoreResult<Option<i64>> {
        // Only international records carry translation state.
        let status = if item.region == Region::International {
            status
        } else {
            TranslationStatus::NotNeeded
        };
        let now = ts(Utc::now());
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO news (title, summary, body, link, published_at, source, region, category,
                 content_fingerprint, translation_status, translation_retries, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?11)
             ON CONFLICT(link) DO NOTHING",
            params![
                item.title,
                item.summary,
                item.body,
                item.link,
                ts(item.published_at),
                item.source,
                item.region.as_str(),
                item.category.as_str(),
                item.content_fingerprint,
                status.as_i64(),
                now,
            ],
        )?;
        if inserted == 0 {
            debug!(link = %item.link, "news insert was a no-op (link exists)");
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    fn update_news_content(&self, id: i64, item: &NormalizedItem) -> StoreResult<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE news SET title = ?2, summary = ?3, body = ?4, published_at = ?5,
                 category = ?6, content_fingerprint = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id,
                item.title,
                item.summary,
                item.body,
                ts(item.published_at),
                item.category.as_str(),
                item.content_fingerprint,
                ts(Utc::now()),
            ],
        )?;
        Ok(n > 0)
    }

    fn get_news(&self, id: i64) -> StoreResult<Option<NewsRecord>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = ?1"),
                params![id],
                news_from_row,
            )
            .optional()?)
    }

    fn list_news(&self, query: &NewsQuery) -> StoreResult<Page<NewsRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(region) = query.region {
            clauses.push("region = ?");
            values.push(Value::Text(region.as_str().to_string()));
        }
        if let Some(category) = query.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.as_str().to_string()));
        }
        if let Some(q) = query.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push(
                "(title LIKE ? ESCAPE '\\' OR summary LIKE ? ESCAPE '\\' \
                 OR IFNULL(title_zh, '') LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(q);
            for _ in 0..3 {
                values.push(Value::Text(pattern.clone()));
            }
        }
        let filter = where_clause(&clauses);
        let order = match query.sort {
            NewsSort::PublishedDesc => "published_at DESC, id DESC",
            NewsSort::PublishedAsc => "published_at ASC, id ASC",
        };
        let (page, page_size, offset) = page_window(query.page, query.page_size);

        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM news{filter}"),
            params_from_iter(values.iter()),
            |r| r.get(0),
        )?;

        values.push(Value::Integer(i64::from(page_size)));
        values.push(Value::Integer(i64::from(offset)));
        let mut stmt = conn.prepare(&format!(
            "SELECT {NEWS_COLUMNS} FROM news{filter} ORDER BY {order} LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), news_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
            page,
            page_size,
        })
    }

    fn claim_pending(&self, limit: usize) -> StoreResult<Vec<NewsRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NEWS_COLUMNS} FROM news WHERE translation_status = ?1
             ORDER BY published_at ASC, id ASC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    TranslationStatus::Pending.as_i64(),
                    i64::try_from(limit).unwrap_or(i64::MAX)
                ],
                news_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn mark_translated(&self, id: i64, fields: &TranslatedFields) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE news SET title_zh = ?2, summary_zh = ?3, body_zh = COALESCE(?4, body_zh),
                 translation_status = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                id,
                fields.title,
                fields.summary,
                fields.body,
                TranslationStatus::Translated.as_i64(),
                ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn mark_translation_failed(&self, id: i64, max_retries: u32) -> StoreResult<u32> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE news SET translation_status = ?2,
                 translation_retries = MIN(translation_retries + 1, ?3), updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                TranslationStatus::Failed.as_i64(),
                i64::from(max_retries),
                ts(Utc::now()),
            ],
        )?;
        let retries: i64 = conn.query_row(
            "SELECT translation_retries FROM news WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(u32::try_from(retries).unwrap_or(max_retries))
    }

    fn requeue_failed(&self, max_retries: u32) -> StoreResult<usize> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE news SET translation_status = ?1, updated_at = ?4
             WHERE translation_status = ?2 AND translation_retries < ?3",
            params![
                TranslationStatus::Pending.as_i64(),
                TranslationStatus::Failed.as_i64(),
                i64::from(max_retries),
                ts(Utc::now()),
            ],
        )?;
        Ok(n)
    }

    fn find_event_by_name(&self, name: &str) -> StoreResult<Option<i64>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row("SELECT id FROM events WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?)
    }

    fn insert_event(&self, event: &NormalizedEvent) -> StoreResult<Option<i64>> {
        let now = ts(Utc::now());
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO events (name, summary, link, start_date, end_date, location, event_type,
                 source, region, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(name) DO NOTHING",
            params![
                event.name,
                event.summary,
                event.link,
                iso_date(event.start_date),
                event.end_date.map(iso_date),
                event.location,
                event.event_type.as_str(),
                event.source,
                event.region.as_str(),
                event.category.as_str(),
                now,
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    fn update_event(&self, id: i64, event: &NormalizedEvent) -> StoreResult<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE events SET summary = ?2, link = ?3, start_date = ?4, end_date = ?5,
                 location = ?6, event_type = ?7, source = ?8, region = ?9, category = ?10,
                 updated_at = ?11
             WHERE id = ?1",
            params![
                id,
                event.summary,
                event.link,
                iso_date(event.start_date),
                event.end_date.map(iso_date),
                event.location,
                event.event_type.as_str(),
                event.source,
                event.region.as_str(),
                event.category.as_str(),
                ts(Utc::now()),
            ],
        )?;
        Ok(n > 0)
    }

    fn list_events(&self, query: &EventQuery) -> StoreResult<Page<EventRecord>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(region) = query.region {
            clauses.push("region = ?");
            values.push(Value::Text(region.as_str().to_string()));
        }
        if let Some(kind) = query.event_type {
            clauses.push("event_type = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(q) = query.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push("(name LIKE ? ESCAPE '\\' OR summary LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(q);
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        let filter = where_clause(&clauses);
        let order = match query.sort {
            EventSort::StartAsc => "start_date ASC, id ASC",
            EventSort::StartDesc => "start_date DESC, id DESC",
            EventSort::Location => "location ASC, start_date ASC",
        };
        let (page, page_size, offset) = page_window(query.page, query.page_size);

        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM events{filter}"),
            params_from_iter(values.iter()),
            |r| r.get(0),
        )?;

        values.push(Value::Integer(i64::from(page_size)));
        values.push(Value::Integer(i64::from(offset)));
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events{filter} ORDER BY {order} LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total.max(0) as u64,
            page,
            page_size,
        })
    }

    fn list_sources(&self) -> StoreResult<Vec<SourceDescriptor>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sources ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn upsert_source(&self, source: &SourceDescriptor) -> StoreResult<()> {
        let selectors = source
            .selectors
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn()?;
        // Counters are owned by record_fetch_outcome and survive edits.
        conn.execute(
            "INSERT INTO sources (name, endpoint, region, fetch_kind, family, category,
                 ai_filter, enabled, selectors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(name) DO UPDATE SET
                 endpoint = excluded.endpoint, region = excluded.region,
                 fetch_kind = excluded.fetch_kind, family = excluded.family,
                 category = excluded.category, ai_filter = excluded.ai_filter,
                 enabled = excluded.enabled, selectors = excluded.selectors",
            params![
                source.name,
                source.endpoint,
                source.region.as_str(),
                source.fetch_kind.as_str(),
                source.family.as_str(),
                source.category.as_str(),
                source.ai_filter,
                source.enabled,
                selectors,
            ],
        )?;
        Ok(())
    }

    fn delete_source(&self, name: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM sources WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }

    fn record_fetch_outcome(&self, name: &str, ok: bool, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        let sql = if ok {
            "UPDATE sources SET success_count = success_count + 1, last_fetched_at = ?2 WHERE name = ?1"
        } else {
            "UPDATE sources SET failure_count = failure_count + 1, last_fetched_at = ?2 WHERE name = ?1"
        };
        conn.execute(sql, params![name, ts(at)])?;
        Ok(())
    }
}
