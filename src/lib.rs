// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod store;
pub mod translate;

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;

pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::PipelineError;

use crate::ingest::extract::{DisabledExtractor, HttpExtractor};
use crate::ingest::providers::HttpFetcher;
use crate::ingest::scheduler::Scheduler;
use crate::ingest::types::{ContentExtractor, SourceFetcher};
use crate::ingest::Pipeline;
use crate::store::{SqliteStore, Store};
use crate::translate::{build_translator, TranslationOrchestrator};

/// Fully wired service: shared state for the router plus the scheduler that
/// drives it.
pub struct Service {
    pub state: AppState,
    pub scheduler: Scheduler,
}

impl Service {
    /// Open the store, seed the source registry and wire live HTTP adapters.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&cfg.database_path)
                .with_context(|| format!("opening database at {}", cfg.database_path))?,
        );

        let fetcher: Arc<dyn SourceFetcher> =
            Arc::new(HttpFetcher::new(&cfg.fetch).context("building feed client")?);
        let extractor: Arc<dyn ContentExtractor> = if cfg.extract.enabled {
            Arc::new(
                HttpExtractor::new(&cfg.extract, &cfg.fetch.user_agent)
                    .context("building extractor client")?,
            )
        } else {
            Arc::new(DisabledExtractor)
        };

        let seed = ingest::config::load_sources_default().context("loading source seed")?;
        Self::assemble(store, fetcher, extractor, cfg, &seed)
    }

    /// Wire a service from explicit adapters (tests use fixtures and mocks here).
    pub fn assemble(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn SourceFetcher>,
        extractor: Arc<dyn ContentExtractor>,
        cfg: &AppConfig,
        seed: &[ingest::types::SourceDescriptor],
    ) -> anyhow::Result<Self> {
        let translator = build_translator(&cfg.translation);
        Self::assemble_with_translator(store, fetcher, extractor, translator, cfg, seed)
    }

    pub fn assemble_with_translator(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn SourceFetcher>,
        extractor: Arc<dyn ContentExtractor>,
        translator: translate::DynTranslator,
        cfg: &AppConfig,
        seed: &[ingest::types::SourceDescriptor],
    ) -> anyhow::Result<Self> {
        let pipeline = Arc::new(Pipeline::new(store.clone(), fetcher, extractor, cfg));
        pipeline
            .registry()
            .seed_if_empty(seed)
            .context("seeding source registry")?;

        tracing::info!(provider = translator.name(), "translator ready");
        let orchestrator = Arc::new(TranslationOrchestrator::new(
            store.clone(),
            translator,
            cfg.translation.clone(),
        ));

        let scheduler = Scheduler::new(pipeline.clone(), orchestrator.clone(), cfg.schedule);
        Ok(Self {
            state: AppState {
                store,
                pipeline,
                orchestrator,
                admin_token: cfg.admin_token.clone(),
            },
            scheduler,
        })
    }

    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    pub fn spawn_scheduler(&self) -> Vec<JoinHandle<()>> {
        self.scheduler.spawn_all()
    }
}
