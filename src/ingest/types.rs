// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, FetchError};

/// Parse failure for the closed string enums below (also used when reading
/// rows back from the store).
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Domestic,
    International,
}

string_enum!(Region, "region", {
    Domestic => "domestic",
    International => "international",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchKind {
    Feed,
    Scrape,
    StaticApi,
}

string_enum!(FetchKind, "fetch kind", {
    Feed => "feed",
    Scrape => "scrape",
    StaticApi => "static-api",
});

/// Sources sharing a scheduling cadence and record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFamily {
    News,
    KnownEvents,
    ApiEvents,
}

string_enum!(SourceFamily, "source family", {
    News => "news",
    KnownEvents => "known-events",
    ApiEvents => "api-events",
});

impl SourceFamily {
    pub const ALL: [SourceFamily; 3] = [
        SourceFamily::News,
        SourceFamily::KnownEvents,
        SourceFamily::ApiEvents,
    ];

    pub fn produces_events(&self) -> bool {
        !matches!(self, SourceFamily::News)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tech,
    Product,
    Industry,
    Event,
    Manufacturer,
}

string_enum!(Category, "category", {
    Tech => "tech",
    Product => "product",
    Industry => "industry",
    Event => "event",
    Manufacturer => "manufacturer",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Online,
    Offline,
}

string_enum!(EventType, "event type", {
    Online => "online",
    Offline => "offline",
});

impl EventType {
    /// Guess from a free-form location string.
    pub fn from_location(location: &str) -> Self {
        let l = location.to_lowercase();
        if ["online", "virtual", "webinar", "线上", "直播"]
            .iter()
            .any(|k| l.contains(k))
        {
            EventType::Online
        } else {
            EventType::Offline
        }
    }
}

/// CSS selectors for `scrape` sources. `item` scopes each listing entry; the
/// others are evaluated inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSelectors {
    pub item: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Display-only telemetry, written through `SourceRegistry::record_outcome`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounters {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub endpoint: String,
    pub region: Region,
    pub fetch_kind: FetchKind,
    pub family: SourceFamily,
    pub category: Category,
    /// Whether the AI-keyword gate applies (official AI-company feeds skip it).
    #[serde(default = "default_true")]
    pub ai_filter: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub selectors: Option<ScrapeSelectors>,
    #[serde(default)]
    pub counters: SourceCounters,
}

/// Schedule fields carried by event-bearing payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSchedule {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub event_type: Option<String>,
}

/// Transient candidate produced by a fetch adapter. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub source_name: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub schedule: Option<RawSchedule>,
    #[serde(default)]
    pub region: Option<Region>,
}

/// One RSS `<item>` or Atom `<entry>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
}

/// One entry located on a scraped listing page (link already absolute).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedListing {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub date_text: Option<String>,
    pub location: Option<String>,
}

/// One object from a structured JSON source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiRecord {
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "url")]
    pub link: Option<String>,
    #[serde(default, alias = "summary")]
    pub description: Option<String>,
    #[serde(default, alias = "publishedAt", alias = "published")]
    pub published_at: Option<String>,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub region: Option<Region>,
}

/// Heterogeneous source payloads, one variant per fetch kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePayload {
    Feed(FeedEntry),
    Scraped(ScrapedListing),
    Api(ApiRecord),
}

impl SourcePayload {
    /// Adapt into the single candidate shape. Entries without a title or link
    /// are dropped.
    pub fn into_candidate(
        self,
        source: &SourceDescriptor,
        fetched_at: DateTime<Utc>,
    ) -> Option<RawCandidate> {
        match self {
            SourcePayload::Feed(e) => feed_candidate(e, source, fetched_at),
            SourcePayload::Scraped(s) => scraped_candidate(s, source, fetched_at),
            SourcePayload::Api(r) => api_candidate(r, source, fetched_at),
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn feed_candidate(
    e: FeedEntry,
    source: &SourceDescriptor,
    fetched_at: DateTime<Utc>,
) -> Option<RawCandidate> {
    let title = non_empty(e.title)?;
    let link = non_empty(e.link)?;
    Some(RawCandidate {
        source_name: source.name.clone(),
        title,
        description: e.description.unwrap_or_default(),
        link,
        published_at: e
            .published
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fetched_at),
        schedule: None,
        region: None,
    })
}

fn scraped_candidate(
    s: ScrapedListing,
    source: &SourceDescriptor,
    fetched_at: DateTime<Utc>,
) -> Option<RawCandidate> {
    let title = non_empty(Some(s.title))?;
    let link = non_empty(Some(s.link))?;
    let schedule = if source.family.produces_events() {
        Some(RawSchedule {
            start_date: s.date_text.clone(),
            end_date: None,
            location: s.location,
            event_type: None,
        })
    } else {
        None
    };
    Some(RawCandidate {
        source_name: source.name.clone(),
        title,
        description: s.summary.unwrap_or_default(),
        link,
        published_at: s
            .date_text
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fetched_at),
        schedule,
        region: None,
    })
}

fn api_candidate(
    r: ApiRecord,
    source: &SourceDescriptor,
    fetched_at: DateTime<Utc>,
) -> Option<RawCandidate> {
    let title = non_empty(r.title)?;
    let link = non_empty(r.link)?;
    let schedule = if r.start_date.is_some() || source.family.produces_events() {
        Some(RawSchedule {
            start_date: r.start_date,
            end_date: r.end_date,
            location: r.location,
            event_type: r.event_type,
        })
    } else {
        None
    };
    Some(RawCandidate {
        source_name: source.name.clone(),
        title,
        description: r.description.unwrap_or_default(),
        link,
        published_at: r
            .published_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fetched_at),
        schedule,
        region: r.region,
    })
}

/// Best-effort timestamp parse: RFC 2822 (RSS), RFC 3339 (Atom/JSON), then a
/// bare `YYYY-MM-DD` at midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

/// Calendar date in the handful of layouts event listings use.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // RFC 3339 timestamps carry a date prefix.
    if s.len() >= 10 && s.is_char_boundary(10) {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}

/// Canonical news shape shared by extractor, normalizer and deduplicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub region: Region,
    pub category: Category,
    pub content_fingerprint: String,
}

impl NormalizedItem {
    /// Replace the body with extracted text, keeping the summary when
    /// extraction produced nothing.
    pub fn with_body(mut self, body: Option<String>) -> Self {
        if let Some(b) = body.filter(|b| !b.trim().is_empty()) {
            self.body = b;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
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
}

#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawCandidate>, FetchError>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractError>;
}
