// src/ingest/config.rs
//! Source list loading for the registry seed.
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::{FetchKind, SourceDescriptor};

pub const ENV_PATH: &str = "SOURCES_CONFIG_PATH";

/// Shipped seed list, used when no sources file is present on disk.
const BUILTIN_SOURCES_TOML: &str = include_str!("../../config/sources.toml");

/// Load sources from an explicit path. Supports TOML (`[[sources]]`) or a JSON array.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in list
pub fn load_sources_default() -> Result<Vec<SourceDescriptor>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    default_sources()
}

pub fn default_sources() -> Result<Vec<SourceDescriptor>> {
    parse_toml(BUILTIN_SOURCES_TOML).context("parsing built-in source list")
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceDescriptor>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    // Surface the real parse error for the hinted format.
    match hint_ext {
        "json" => parse_json(s),
        _ => parse_toml(s),
    }
}

fn parse_toml(s: &str) -> Result<Vec<SourceDescriptor>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        #[serde(default)]
        sources: Vec<SourceDescriptor>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<SourceDescriptor>> {
    let v: Vec<SourceDescriptor> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim names, drop incomplete entries and keep the first entry per name.
fn clean_list(items: Vec<SourceDescriptor>) -> Vec<SourceDescriptor> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        it.endpoint = it.endpoint.trim().to_string();
        if it.name.is_empty() || it.endpoint.is_empty() {
            tracing::warn!(name = %it.name, "skipping source without name or endpoint");
            continue;
        }
        if it.fetch_kind == FetchKind::Scrape && it.selectors.is_none() {
            tracing::warn!(source = %it.name, "skipping scrape source without selectors");
            continue;
        }
        if seen.insert(it.name.clone()) {
            out.push(it);
        }
    }
    out
}
