// src/ingest/extract.rs
//! Full-text extraction from article pages.
//!
//! The page is parsed synchronously in [`extract_article_text`], so no
//! `scraper::Html` value lives across an await point.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use scraper::{ElementRef, Html, Selector};

use crate::config::ExtractConfig;
use crate::error::ExtractError;
use crate::ingest::types::ContentExtractor;
use crate::ingest::{collapse_text, truncate_chars};

/// Article-like regions, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[itemprop='articleBody']",
    ".article-content",
    ".article-body",
    ".post-content",
    ".entry-content",
    ".content",
    "main",
];

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

fn content_selectors() -> &'static [Selector] {
    static SELECTORS: OnceCell<Vec<Selector>> = OnceCell::new();
    SELECTORS.get_or_init(|| {
        CONTENT_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect()
    })
}

fn body_selector() -> Option<&'static Selector> {
    static BODY: OnceCell<Option<Selector>> = OnceCell::new();
    BODY.get_or_init(|| Selector::parse("body").ok()).as_ref()
}

/// Text under `el`, skipping script-like subtrees.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let t = text.trim();
        if !t.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(t);
        }
    }
    collapse_text(&out)
}

/// Pick the first article-like region with at least `min_chars` of text,
/// falling back to the whole body. Output is capped at `max_chars`.
pub fn extract_article_text(
    html: &str,
    min_chars: usize,
    max_chars: usize,
) -> Result<String, ExtractError> {
    let document = Html::parse_document(html);

    for sel in content_selectors() {
        if let Some(el) = document.select(sel).next() {
            let text = visible_text(el);
            if text.chars().count() >= min_chars {
                return Ok(truncate_chars(&text, max_chars));
            }
        }
    }

    let body_text = body_selector()
        .and_then(|sel| document.select(sel).next())
        .map(visible_text)
        .unwrap_or_else(|| visible_text(document.root_element()));

    let len = body_text.chars().count();
    if len < min_chars {
        return Err(ExtractError::TooShort { len });
    }
    Ok(truncate_chars(&body_text, max_chars))
}

pub struct HttpExtractor {
    client: reqwest::Client,
    timeout_secs: u64,
    min_chars: usize,
    max_chars: usize,
}

impl HttpExtractor {
    pub fn new(cfg: &ExtractConfig, user_agent: &str) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| ExtractError::Request(format!("http client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: cfg.timeout_secs,
            min_chars: cfg.min_chars,
            max_chars: cfg.max_chars,
        })
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                ExtractError::Request(e.to_string())
            }
        })?;
        if !resp.status().is_success() {
            return Err(ExtractError::Status(resp.status().as_u16()));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| ExtractError::Request(format!("reading body: {e}")))?;
        extract_article_text(&html, self.min_chars, self.max_chars)
    }
}

/// Always fails, so callers keep the feed summary as the body.
pub struct DisabledExtractor;

#[async_trait]
impl ContentExtractor for DisabledExtractor {
    async fn extract(&self, _url: &str) -> Result<String, ExtractError> {
        Err(ExtractError::Disabled)
    }
}
