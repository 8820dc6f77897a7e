//! Error types for every pipeline stage.
//!
//! Each component owns a narrow error enum; [`PipelineError`] is what a run or
//! sweep reports to its caller (scheduler or operator trigger).

use thiserror::Error;

use crate::ingest::types::SourceFamily;

/// Fetching a source failed. Always recoverable: the source is retried on the
/// next scheduled cycle and no record is created.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid source configuration: {0}")]
    Config(String),
}

/// The extractor could not produce usable body text. Callers fall back to the
/// feed summary.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("extracted text too short ({len} chars)")]
    TooShort { len: usize },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("extraction disabled")]
    Disabled,
}

/// A translation call failed or returned something unusable.
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed translation payload: {0}")]
    Malformed(String),

    #[error("expected {expected} translations, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("translation disabled")]
    Disabled,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Lock,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Top-level outcome of a run or sweep.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: FetchError },

    #[error("extraction failed for {url}: {reason}")]
    ExtractionFailed { url: String, reason: ExtractError },

    #[error("translation failed for record {id}: {reason}")]
    TranslationFailed { id: i64, reason: TranslateError },

    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] StoreError),

    #[error("a {0} run is already in progress")]
    RunInProgress(SourceFamily),

    #[error("a translation sweep is already in progress")]
    SweepInProgress,
}
