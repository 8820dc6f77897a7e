//! AI news aggregator: binary entrypoint.
//! Loads config, opens the store, starts the background scheduler and serves
//! the Axum router.

use ai_news_aggregator::{metrics::Metrics, AppConfig, Service};
use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` filter (default `info`), JSON output when `LOG_FORMAT=json`.
/// Uses `try_init` so a subscriber installed by the host runtime wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

async fn build_app() -> anyhow::Result<axum::Router> {
    let cfg = AppConfig::load_default().context("loading pipeline config")?;
    let service = Service::from_config(&cfg)?;

    let mut router = service.router();
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    if cfg.schedule.enabled {
        // Handles are detached; timers live as long as the runtime.
        let _ = service.spawn_scheduler();
    } else {
        tracing::info!("background schedule disabled by config");
    }

    tracing::info!(
        database = %cfg.database_path,
        admin = cfg.admin_token.is_some(),
        "service ready"
    );
    Ok(router)
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let router = build_app().await?;
    Ok(router.into())
}
