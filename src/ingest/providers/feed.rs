// src/ingest/providers/feed.rs
//! RSS 2.0 / Atom parsing into [`FeedEntry`] values.

use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::FetchError;
use crate::ingest::types::FeedEntry;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// `rel="alternate"` (or no rel) wins over other link relations.
    fn primary_link(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.first())
            .and_then(|l| l.href.clone())
    }
}

fn looks_like_atom(s: &str) -> bool {
    let end = s.char_indices().nth(1024).map(|(i, _)| i).unwrap_or(s.len());
    let head = &s[..end];
    head.contains("<feed") && !head.contains("<rss")
}

/// Parse an RSS or Atom document, preserving feed order.
pub fn parse_feed(s: &str) -> Result<Vec<FeedEntry>, FetchError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(s);

    let out = if looks_like_atom(&xml_clean) {
        let feed: AtomFeed =
            from_str(&xml_clean).map_err(|e| FetchError::Parse(format!("atom: {e}")))?;
        feed.entry
            .into_iter()
            .map(|e| FeedEntry {
                link: e.primary_link(),
                title: e.title.and_then(|t| t.value),
                description: e
                    .summary
                    .and_then(|t| t.value)
                    .or_else(|| e.content.and_then(|t| t.value)),
                published: e.published.or(e.updated),
            })
            .collect()
    } else {
        let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::Parse(format!("rss: {e}")))?;
        rss.channel
            .item
            .into_iter()
            .map(|it| FeedEntry {
                title: it.title,
                link: it
                    .link
                    .filter(|l| !l.trim().is_empty())
                    .or_else(|| it.guid.filter(|g| g.starts_with("http"))),
                description: it.description,
                published: it.pub_date,
            })
            .collect::<Vec<_>>()
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    Ok(out)
}

/// HTML entities feeds routinely embed that XML does not define.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
        .replace("&middot;", "·")
        .replace("&copy;", "©")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_without_items_is_empty_not_error() {
        let xml = r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_feed("not xml at all <"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn scrub_handles_nbsp_and_dashes() {
        assert_eq!(scrub_html_entities_for_xml("a&nbsp;b&mdash;c"), "a b-c");
    }
}
