//! Translation capability: provider abstraction plus the sweep orchestrator.

pub mod openai;
pub mod orchestrator;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::TranslationConfig;
use crate::error::TranslateError;

pub use openai::OpenAiTranslator;
pub use orchestrator::{SweepReport, TranslationOrchestrator};

pub type TranslateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, TranslateError>> + Send + 'a>>;

/// List of strings + target language → same-length list. Implementations may
/// return a different length; the orchestrator treats that as a rejected batch.
pub trait Translator: Send + Sync {
    fn translate<'a>(&'a self, texts: &'a [String], target_lang: &'a str) -> TranslateFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynTranslator = Arc<dyn Translator>;

/// Always fails; records stay `Pending` → `Failed` until a provider is configured.
pub struct DisabledTranslator;

impl Translator for DisabledTranslator {
    fn translate<'a>(&'a self, _texts: &'a [String], _target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(async { Err(TranslateError::Disabled) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Debug, Clone)]
enum MockMode {
    /// Echo each input with a prefix.
    Prefix(String),
    /// Return the same list regardless of input.
    Fixed(Vec<String>),
    Fail(TranslateError),
}

/// Deterministic translator for tests and `TRANSLATE_TEST_MODE=mock`.
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    calls: AtomicUsize,
}

impl MockTranslator {
    pub fn prefixing(prefix: &str) -> Self {
        Self::with_mode(MockMode::Prefix(prefix.to_string()))
    }

    pub fn fixed<S: Into<String>>(out: impl IntoIterator<Item = S>) -> Self {
        Self::with_mode(MockMode::Fixed(out.into_iter().map(Into::into).collect()))
    }

    pub fn failing(err: TranslateError) -> Self {
        Self::with_mode(MockMode::Fail(err))
    }

    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `translate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Translator for MockTranslator {
    fn translate<'a>(&'a self, texts: &'a [String], _target_lang: &'a str) -> TranslateFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = match &self.mode {
            MockMode::Prefix(p) => Ok(texts.iter().map(|t| format!("{p}{t}")).collect()),
            MockMode::Fixed(v) => Ok(v.clone()),
            MockMode::Fail(e) => Err(e.clone()),
        };
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Factory: build a translator according to config and environment.
///
/// * `TRANSLATE_TEST_MODE=mock` → deterministic mock.
/// * `enabled == false` or provider `disabled` → disabled translator.
/// * provider `mock` → mock; `openai` → OpenAI-compatible chat completions.
pub fn build_translator(cfg: &TranslationConfig) -> DynTranslator {
    if std::env::var("TRANSLATE_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockTranslator::prefixing("[译] "));
    }
    if !cfg.enabled {
        return Arc::new(DisabledTranslator);
    }
    match cfg.provider.as_str() {
        "mock" => Arc::new(MockTranslator::prefixing("[译] ")),
        "openai" => {
            if !cfg.has_api_key() {
                tracing::warn!("translation enabled but no API key configured; translator disabled");
                return Arc::new(DisabledTranslator);
            }
            match OpenAiTranslator::new(cfg) {
                Ok(t) => Arc::new(t),
                Err(e) => {
                    tracing::error!(error = %e, "failed to build translation client");
                    Arc::new(DisabledTranslator)
                }
            }
        }
        other => {
            tracing::warn!(provider = other, "unknown translation provider; translator disabled");
            Arc::new(DisabledTranslator)
        }
    }
}

/// Share of letters that are Latin. Text without letters scores 0.
pub fn latin_ratio(text: &str) -> f64 {
    let mut letters = 0usize;
    let mut latin = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if c.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&c) {
            latin += 1;
        }
    }
    if letters == 0 {
        0.0
    } else {
        latin as f64 / letters as f64
    }
}

/// Foreign-language text needs a model call; anything at or below 50% Latin
/// letters is treated as already in the target language.
pub fn needs_translation(title: &str, summary: &str) -> bool {
    latin_ratio(&format!("{title} {summary}")) > 0.5
}
