// tests/ingest_config.rs
use std::env;
use std::fs;

use ai_news_aggregator::config::{AppConfig, ENV_CONFIG_PATH};
use ai_news_aggregator::ingest::config::{
    default_sources, load_sources_default, load_sources_from, ENV_PATH,
};
use ai_news_aggregator::ingest::types::{FetchKind, Region, SourceFamily};
use serial_test::serial;
use tempfile::tempdir;

fn clear_env() {
    for k in [ENV_CONFIG_PATH, ENV_PATH, "DATABASE_PATH", "ADMIN_TOKEN", "OPENAI_API_KEY"] {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn pipeline_config_from_env_path_with_overrides() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    fs::write(
        &path,
        r#"
        database_path = "from-file.db"
        ai_keywords = ["robotics"]
        [schedule]
        news_secs = 120
        enabled = false
        [translation]
        provider = " Mock "
        "#,
    )
    .unwrap();

    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var("DATABASE_PATH", "/tmp/override.db");
    env::set_var("ADMIN_TOKEN", " s3cret ");
    let cfg = AppConfig::load_default().unwrap();
    clear_env();

    assert_eq!(cfg.database_path, "/tmp/override.db");
    assert_eq!(cfg.admin_token.as_deref(), Some("s3cret"));
    assert_eq!(cfg.schedule.news_secs, 120);
    assert!(!cfg.schedule.enabled);
    assert_eq!(cfg.translation.provider, "mock");
    assert_eq!(cfg.ai_keywords, vec!["robotics".to_string()]);
}

#[test]
#[serial]
fn missing_env_config_path_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = AppConfig::load_default();
    clear_env();
    assert!(res.is_err());
}

#[test]
#[serial]
fn api_key_env_placeholder_reads_openai_key() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    fs::write(&path, "[translation]\napi_key = \"ENV\"\n").unwrap();

    env::set_var(ENV_CONFIG_PATH, &path);
    env::set_var("OPENAI_API_KEY", "sk-test");
    let cfg = AppConfig::load_default().unwrap();
    clear_env();

    assert_eq!(cfg.translation.api_key, "sk-test");
    assert!(cfg.translation.has_api_key());
}

#[test]
fn toml_sources_are_cleaned() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sources.toml");
    fs::write(
        &path,
        r#"
        [[sources]]
        name = "  Lab Blog "
        endpoint = "https://lab.test/rss"
        region = "international"
        fetch_kind = "feed"
        family = "news"
        category = "product"
        ai_filter = false

        [[sources]]
        name = "Lab Blog"
        endpoint = "https://lab.test/duplicate"
        region = "international"
        fetch_kind = "feed"
        family = "news"
        category = "product"

        [[sources]]
        name = "Listing without selectors"
        endpoint = "https://events.test"
        region = "domestic"
        fetch_kind = "scrape"
        family = "api-events"
        category = "event"
        "#,
    )
    .unwrap();

    let sources = load_sources_from(&path).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "Lab Blog");
    assert_eq!(sources[0].endpoint, "https://lab.test/rss");
    assert!(!sources[0].ai_filter);
    assert!(sources[0].enabled, "enabled defaults to true");
}

#[test]
fn json_sources_are_accepted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sources.json");
    fs::write(
        &path,
        r#"[{"name": "36Kr", "endpoint": "https://36kr.test/feed", "region": "domestic",
             "fetch_kind": "feed", "family": "news", "category": "industry"}]"#,
    )
    .unwrap();

    let sources = load_sources_from(&path).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].region, Region::Domestic);
    assert!(sources[0].ai_filter, "ai_filter defaults to true");
}

#[test]
#[serial]
fn sources_env_path_wins_over_repo_file() {
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.json");
    fs::write(
        &path,
        r#"[{"name": "Only", "endpoint": "https://only.test/rss", "region": "international",
             "fetch_kind": "feed", "family": "news", "category": "tech"}]"#,
    )
    .unwrap();

    env::set_var(ENV_PATH, &path);
    let sources = load_sources_default().unwrap();
    clear_env();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "Only");
}

#[test]
fn bundled_seed_covers_every_family() {
    let sources = default_sources().unwrap();
    for family in SourceFamily::ALL {
        assert!(
            sources.iter().any(|s| s.family == family),
            "no {family} source in the bundled seed"
        );
    }
    assert!(sources.iter().any(|s| s.region == Region::Domestic));
    let scrape = sources
        .iter()
        .find(|s| s.fetch_kind == FetchKind::Scrape)
        .expect("bundled scrape source");
    assert!(scrape.selectors.is_some());
}
