//! Item normalizer: maps raw candidates onto the canonical news/event shapes.
//!
//! Everything here is pure; no I/O.

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::ingest::types::{
    parse_date, Category, EventType, NormalizedEvent, NormalizedItem, RawCandidate,
    SourceDescriptor,
};
use crate::ingest::{normalize_text, truncate_chars};

pub const SUMMARY_MAX_CHARS: usize = 500;
pub const TITLE_MAX_CHARS: usize = 300;

/// Map a raw candidate into the canonical news shape. The body starts out as
/// the summary; callers replace it with extracted text via
/// [`NormalizedItem::with_body`].
pub fn normalize(raw: &RawCandidate, source: &SourceDescriptor) -> NormalizedItem {
    let title = truncate_chars(&normalize_text(&raw.title), TITLE_MAX_CHARS);
    let summary = summarize(&raw.description, &title);
    let link = raw.link.trim().to_string();
    NormalizedItem {
        content_fingerprint: content_fingerprint(&link),
        body: summary.clone(),
        title,
        summary,
        link,
        published_at: raw.published_at,
        source: source.name.clone(),
        region: raw.region.unwrap_or(source.region),
        category: source.category,
    }
}

/// Map a raw candidate into an event. `None` when no start date can be parsed.
pub fn normalize_event(raw: &RawCandidate, source: &SourceDescriptor) -> Option<NormalizedEvent> {
    let schedule = raw.schedule.as_ref()?;
    let start_date = schedule.start_date.as_deref().and_then(parse_date)?;
    let end_date = schedule
        .end_date
        .as_deref()
        .and_then(parse_date)
        .filter(|d| *d >= start_date);

    let name = truncate_chars(&normalize_text(&raw.title), TITLE_MAX_CHARS);
    if name.is_empty() {
        return None;
    }
    let location = schedule
        .location
        .as_deref()
        .map(normalize_text)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "TBD".to_string());
    let event_type = schedule
        .event_type
        .as_deref()
        .and_then(|t| t.parse::<EventType>().ok())
        .unwrap_or_else(|| EventType::from_location(&location));

    Some(NormalizedEvent {
        summary: summarize(&raw.description, &name),
        name,
        link: raw.link.trim().to_string(),
        start_date,
        end_date,
        location,
        event_type,
        source: source.name.clone(),
        region: raw.region.unwrap_or(source.region),
        category: match source.category {
            Category::Manufacturer => Category::Manufacturer,
            _ => Category::Event,
        },
    })
}

fn summarize(description: &str, fallback: &str) -> String {
    let text = normalize_text(description);
    if text.is_empty() {
        truncate_chars(fallback, SUMMARY_MAX_CHARS)
    } else {
        truncate_chars(&text, SUMMARY_MAX_CHARS)
    }
}

/// Canonical form of a link for fingerprinting: lower-cased host, no fragment,
/// no `utm_*` tracking parameters, no trailing slash.
pub fn canonicalize_link(link: &str) -> String {
    let trimmed = link.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.trim_end_matches('/').to_string();
    };
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }

    // Url already lower-cases scheme and host.
    url.to_string().trim_end_matches('/').to_string()
}

/// Deterministic secondary key derived from the canonical link.
pub fn content_fingerprint(link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize_link(link).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// AI-keyword gate applied at the filter stage for sources with `ai_filter`.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    ascii: Option<Regex>,
    other: Vec<String>,
}

impl KeywordFilter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let mut ascii_terms = Vec::new();
        let mut other = Vec::new();
        for k in keywords {
            let k = k.as_ref().trim();
            if k.is_empty() {
                continue;
            }
            if k.is_ascii() {
                ascii_terms.push(regex::escape(&k.to_ascii_lowercase()));
            } else {
                other.push(k.to_lowercase());
            }
        }
        let ascii = if ascii_terms.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b(?:{})\b", ascii_terms.join("|"))).ok()
        };
        Self { ascii, other }
    }

    pub fn matches(&self, text: &str) -> bool {
        if let Some(re) = &self.ascii {
            if re.is_match(text) {
                return true;
            }
        }
        let lower = text.to_lowercase();
        self.other.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Whether a candidate from `source` passes the gate.
    pub fn admits(&self, source: &SourceDescriptor, title: &str, summary: &str) -> bool {
        if !source.ai_filter {
            return true;
        }
        self.matches(title) || self.matches(summary)
    }
}

pub fn default_ai_keywords() -> Vec<String> {
    [
        "AI",
        "artificial intelligence",
        "machine learning",
        "deep learning",
        "LLM",
        "large language model",
        "GPT",
        "ChatGPT",
        "OpenAI",
        "Anthropic",
        "Claude",
        "Gemini",
        "DeepMind",
        "Llama",
        "Mistral",
        "DeepSeek",
        "generative",
        "neural network",
        "AIGC",
        "人工智能",
        "大模型",
        "机器学习",
        "深度学习",
        "生成式",
        "智能体",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{FetchKind, Region, SourceFamily};

    fn src(ai_filter: bool) -> SourceDescriptor {
        SourceDescriptor {
            name: "Test".into(),
            endpoint: "https://example.com/feed".into(),
            region: Region::International,
            fetch_kind: FetchKind::Feed,
            family: SourceFamily::News,
            category: Category::Tech,
            ai_filter,
            enabled: true,
            selectors: None,
            counters: Default::default(),
        }
    }

    #[test]
    fn fingerprint_ignores_tracking_and_fragment() {
        let a = content_fingerprint("https://Example.com/a?utm_source=rss#top");
        let b = content_fingerprint("https://example.com/a/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, content_fingerprint("https://example.com/b"));
    }

    #[test]
    fn canonical_link_keeps_meaningful_query() {
        assert_eq!(
            canonicalize_link("https://example.com/p?id=7&utm_medium=x"),
            "https://example.com/p?id=7"
        );
    }

    #[test]
    fn keyword_filter_uses_word_boundaries_for_ascii() {
        let f = KeywordFilter::new(&default_ai_keywords());
        assert!(f.matches("New GPT model released"));
        assert!(f.matches("Startup raises funds for AI chips"));
        assert!(!f.matches("Said the chairman"));
        assert!(f.matches("国产大模型发布"));
    }

    #[test]
    fn gate_is_bypassed_for_unfiltered_sources() {
        let f = KeywordFilter::new(&default_ai_keywords());
        assert!(f.admits(&src(false), "Quarterly results", ""));
        assert!(!f.admits(&src(true), "Quarterly results", ""));
    }
}
