// src/ingest/mod.rs
pub mod config;
pub mod dedup;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use pipeline::{Pipeline, RunReport};
pub use registry::SourceRegistry;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_fetched_total", "Candidates returned by source fetches.");
        describe_counter!("ingest_saved_total", "Records inserted by ingestion runs.");
        describe_counter!("ingest_updated_total", "Event records updated in place.");
        describe_counter!(
            "ingest_skipped_total",
            "Candidates skipped because the record already exists."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Candidates dropped by the AI keyword gate."
        );
        describe_counter!(
            "ingest_failed_items_total",
            "Candidates that could not be normalized."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse errors and timeouts."
        );
        describe_counter!(
            "ingest_extract_failures_total",
            "Full-text extractions that fell back to the summary."
        );
        describe_histogram!("ingest_parse_ms", "Source payload parse time in milliseconds.");
        describe_histogram!("ingest_run_ms", "Ingestion run wall time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when an ingestion run last finished."
        );
        describe_counter!("scheduler_ticks_total", "Scheduled job triggers.");
        describe_counter!(
            "scheduler_skipped_total",
            "Scheduled triggers skipped because a run was still in flight."
        );
    });
}

/// Normalize text: strip tags, decode entities, fold typographic quotes,
/// collapse whitespace and trim.
pub fn normalize_text(s: &str) -> String {
    // 1) Drop script/style blocks, then remaining tags. Runs before entity
    // decoding so escaped angle brackets survive as text.
    static RE_BLOCKS: OnceCell<regex::Regex> = OnceCell::new();
    let re_blocks = RE_BLOCKS.get_or_init(|| {
        regex::Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap()
    });
    let mut out = re_blocks.replace_all(s, " ").to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 2) HTML entity decode
    out = html_escape::decode_html_entities(&out).to_string();

    collapse_text(&out)
}

/// Fold typographic quotes, collapse whitespace and trim. For text that is
/// already free of markup, e.g. DOM text nodes.
pub fn collapse_text(s: &str) -> String {
    // Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = s
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // Collapse whitespace (including NBSP left over from entity decoding)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}
