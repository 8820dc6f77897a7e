//! Service configuration.
//!
//! Loaded from `config/pipeline.toml` (or `$PIPELINE_CONFIG_PATH`). Every field
//! has a serde default, so a missing file or section yields the defaults.
//! `DATABASE_PATH` and `ADMIN_TOKEN` override the file.

pub mod translation;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::normalize::default_ai_keywords;
use crate::ingest::types::SourceFamily;

pub use translation::TranslationConfig;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

fn default_database_path() -> String {
    "data/pipeline.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Operator token for /admin routes. Admin routes are closed when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default = "default_ai_keywords")]
    pub ai_keywords: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            admin_token: None,
            schedule: ScheduleConfig::default(),
            fetch: FetchConfig::default(),
            extract: ExtractConfig::default(),
            translation: TranslationConfig::default(),
            ai_keywords: default_ai_keywords(),
        }
    }
}

/// Intervals in seconds. Each family runs on its own timer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub news_secs: u64,
    pub known_events_secs: u64,
    pub api_events_secs: u64,
    pub translation_secs: u64,
    pub retry_sweep_secs: u64,
    /// Set to false to serve reads only (no background timers).
    pub enabled: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            news_secs: 600,
            known_events_secs: 24 * 3600,
            api_events_secs: 6 * 3600,
            translation_secs: 300,
            retry_sweep_secs: 3600,
            enabled: true,
        }
    }
}

impl ScheduleConfig {
    pub fn family_secs(&self, family: SourceFamily) -> u64 {
        match family {
            SourceFamily::News => self.news_secs,
            SourceFamily::KnownEvents => self.known_events_secs,
            SourceFamily::ApiEvents => self.api_events_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_items_per_source: usize,
    pub max_concurrent_sources: usize,
    pub extract_concurrency: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_items_per_source: 10,
            max_concurrent_sources: 4,
            extract_concurrency: 4,
            user_agent: concat!("ai-news-aggregator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub enabled: bool,
    pub min_chars: usize,
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_chars: 100,
            max_chars: 3000,
            timeout_secs: 15,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing pipeline config")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// `$PIPELINE_CONFIG_PATH`, then `config/pipeline.toml`, then defaults;
    /// environment overrides applied last.
    pub fn load_default() -> Result<Self> {
        let cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        Ok(cfg.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(p) = std::env::var("DATABASE_PATH") {
            if !p.trim().is_empty() {
                self.database_path = p;
            }
        }
        if let Ok(t) = std::env::var("ADMIN_TOKEN") {
            self.admin_token = Some(t);
        }
        self.translation = self.translation.resolve();
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        self.admin_token = self
            .admin_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let d = FetchConfig::default();
        if self.fetch.timeout_secs == 0 {
            self.fetch.timeout_secs = d.timeout_secs;
        }
        if self.fetch.max_items_per_source == 0 {
            self.fetch.max_items_per_source = d.max_items_per_source;
        }
        self.fetch.max_concurrent_sources = self.fetch.max_concurrent_sources.max(1);
        self.fetch.extract_concurrency = self.fetch.extract_concurrency.max(1);
        if self.extract.max_chars < self.extract.min_chars {
            std::mem::swap(&mut self.extract.min_chars, &mut self.extract.max_chars);
        }
        if self.extract.timeout_secs == 0 {
            self.extract.timeout_secs = ExtractConfig::default().timeout_secs;
        }
        self.translation = self.translation.sanitized();
        self
    }
}
