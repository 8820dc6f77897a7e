// src/ingest/providers/mod.rs
pub mod feed;
pub mod scrape;
pub mod static_api;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::ingest::types::{
    FetchKind, RawCandidate, SourceDescriptor, SourceFetcher, SourcePayload,
};

/// Parse a fetched body according to the source's fetch kind and adapt every
/// entry into a [`RawCandidate`], keeping feed order and at most `max_items`.
pub fn candidates_from_body(
    source: &SourceDescriptor,
    body: &str,
    fetched_at: DateTime<Utc>,
    max_items: usize,
) -> Result<Vec<RawCandidate>, FetchError> {
    let payloads: Vec<SourcePayload> = match source.fetch_kind {
        FetchKind::Feed => feed::parse_feed(body)?
            .into_iter()
            .map(SourcePayload::Feed)
            .collect(),
        FetchKind::Scrape => {
            let selectors = source.selectors.as_ref().ok_or_else(|| {
                FetchError::Config(format!("scrape source {} has no selectors", source.name))
            })?;
            scrape::parse_listing(body, &source.endpoint, selectors)?
                .into_iter()
                .map(SourcePayload::Scraped)
                .collect()
        }
        FetchKind::StaticApi => static_api::parse_api_records(body)?
            .into_iter()
            .map(SourcePayload::Api)
            .collect(),
    };

    Ok(payloads
        .into_iter()
        .filter_map(|p| p.into_candidate(source, fetched_at))
        .take(max_items)
        .collect())
}

/// Live fetcher: one shared reqwest client for every source.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_items: usize,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: cfg.timeout_secs,
            max_items: cfg.max_items_per_source,
        })
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                FetchError::Request(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.text()
            .await
            .map_err(|e| FetchError::Request(format!("reading body: {e}")))
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawCandidate>, FetchError> {
        let fetched_at = Utc::now();
        let body = match static_api::builtin_body(&source.endpoint) {
            Some(b) => b.to_string(),
            None => self.get_body(&source.endpoint).await?,
        };
        candidates_from_body(source, &body, fetched_at, self.max_items)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Serves canned bodies keyed by endpoint. Used by tests and offline runs.
pub struct FixtureFetcher {
    bodies: RwLock<HashMap<String, Result<String, FetchError>>>,
    max_items: usize,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub fn new(max_items: usize) -> Self {
        Self {
            bodies: RwLock::new(HashMap::new()),
            max_items,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_body(self, endpoint: &str, body: &str) -> Self {
        self.set_body(endpoint, body);
        self
    }

    pub fn with_error(self, endpoint: &str, err: FetchError) -> Self {
        if let Ok(mut m) = self.bodies.write() {
            m.insert(endpoint.to_string(), Err(err));
        }
        self
    }

    /// Replace the body served for `endpoint` (e.g. between two runs).
    pub fn set_body(&self, endpoint: &str, body: &str) {
        if let Ok(mut m) = self.bodies.write() {
            m.insert(endpoint.to_string(), Ok(body.to_string()));
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FixtureFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawCandidate>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = match static_api::builtin_body(&source.endpoint) {
            Some(b) => b.to_string(),
            None => {
                let map = self
                    .bodies
                    .read()
                    .map_err(|_| FetchError::Request("fixture lock poisoned".into()))?;
                match map.get(&source.endpoint) {
                    Some(Ok(b)) => b.clone(),
                    Some(Err(e)) => return Err(e.clone()),
                    None => {
                        return Err(FetchError::Status {
                            status: 404,
                            url: source.endpoint.clone(),
                        })
                    }
                }
            }
        };
        candidates_from_body(source, &body, Utc::now(), self.max_items)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
