// src/ingest/providers/scrape.rs
//! HTML listing pages located by configured CSS selectors.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::FetchError;
use crate::ingest::collapse_text;
use crate::ingest::types::{ScrapeSelectors, ScrapedListing};

fn compile(sel: &str) -> Result<Selector, FetchError> {
    Selector::parse(sel).map_err(|e| FetchError::Config(format!("bad selector {sel:?}: {e:?}")))
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Extract listing entries from `html`. Relative links are resolved against
/// `base_url`; entries missing a title or a resolvable link are dropped.
pub fn parse_listing(
    html: &str,
    base_url: &str,
    selectors: &ScrapeSelectors,
) -> Result<Vec<ScrapedListing>, FetchError> {
    let base = Url::parse(base_url)
        .map_err(|e| FetchError::Config(format!("bad endpoint {base_url}: {e}")))?;
    let item_sel = compile(&selectors.item)?;
    let title_sel = compile(&selectors.title)?;
    let link_sel = compile(&selectors.link)?;
    let any_link = compile("a[href]")?;
    let summary_sel = selectors.summary.as_deref().map(compile).transpose()?;
    let date_sel = selectors.date.as_deref().map(compile).transpose()?;
    let location_sel = selectors.location.as_deref().map(compile).transpose()?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for item in document.select(&item_sel) {
        let Some(title) = item.select(&title_sel).next().map(text_of) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let href = item
            .select(&link_sel)
            .next()
            .and_then(|el| {
                el.value()
                    .attr("href")
                    .or_else(|| el.select(&any_link).next().and_then(|a| a.value().attr("href")))
            })
            .or_else(|| item.value().attr("href"));
        let Some(link) = href.and_then(|h| base.join(h.trim()).ok()) else {
            continue;
        };

        let pick = |sel: &Option<Selector>| {
            sel.as_ref()
                .and_then(|s| item.select(s).next())
                .map(|el| {
                    // <time datetime="..."> carries a machine-readable value.
                    el.value()
                        .attr("datetime")
                        .map(str::to_string)
                        .unwrap_or_else(|| text_of(el))
                })
                .filter(|s| !s.is_empty())
        };

        out.push(ScrapedListing {
            title,
            link: link.to_string(),
            summary: pick(&summary_sel),
            date_text: pick(&date_sel),
            location: pick(&location_sel),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selector_is_a_config_error() {
        let sel = ScrapeSelectors {
            item: "div[".into(),
            title: "h2".into(),
            link: "a".into(),
            summary: None,
            date: None,
            location: None,
        };
        assert!(matches!(
            parse_listing("<html></html>", "https://example.com", &sel),
            Err(FetchError::Config(_))
        ));
    }
}
