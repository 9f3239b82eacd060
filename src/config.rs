// src/config.rs
//! Runtime configuration: env-var tunables plus the topic seed list.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::tracker::{SourceKind, TrackerConfig};

const ENV_TOPICS_PATH: &str = "NEWS_TOPICS_PATH";
const DEFAULT_TOPICS_PATH: &str = "config/topics.toml";

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Application-level settings with env overrides.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub refresh_interval_secs: u64,
    pub classify_interval_secs: u64,
    pub digest_interval_secs: u64,
    pub digest_window_hours: i64,
    /// How many of a sweep's new items are handed to the store per topic.
    pub result_limit: usize,
    pub misfire_grace_secs: u64,
    pub tracker: TrackerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            db_path: "data/news_db.json".to_string(),
            refresh_interval_secs: 180,
            classify_interval_secs: 60,
            digest_interval_secs: 3600,
            digest_window_hours: crate::notify::DEFAULT_WINDOW_HOURS,
            result_limit: 10,
            misfire_grace_secs: 30,
            tracker: TrackerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bind_addr: std::env::var("NEWS_BIND_ADDR").unwrap_or(d.bind_addr),
            db_path: std::env::var("NEWS_DB_PATH").unwrap_or(d.db_path),
            refresh_interval_secs: env_parse("NEWS_REFRESH_INTERVAL_SECS", d.refresh_interval_secs),
            classify_interval_secs: env_parse(
                "NEWS_CLASSIFY_INTERVAL_SECS",
                d.classify_interval_secs,
            ),
            digest_interval_secs: env_parse("NEWS_DIGEST_INTERVAL_SECS", d.digest_interval_secs),
            digest_window_hours: env_parse("NEWS_DIGEST_WINDOW_HOURS", d.digest_window_hours),
            result_limit: env_parse("NEWS_RESULT_LIMIT", d.result_limit),
            misfire_grace_secs: env_parse("NEWS_MISFIRE_GRACE_SECS", d.misfire_grace_secs),
            tracker: TrackerConfig {
                max_items_per_topic: env_parse(
                    "NEWS_MAX_ITEMS_PER_TOPIC",
                    d.tracker.max_items_per_topic,
                ),
                fetch_concurrency: env_parse("NEWS_FETCH_CONCURRENCY", d.tracker.fetch_concurrency),
                topic_concurrency: env_parse("NEWS_TOPIC_CONCURRENCY", d.tracker.topic_concurrency),
            },
        }
    }
}

/// One seeded topic registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicSeed {
    pub topic: String,
    pub region: String,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceKind>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_sources() -> Vec<SourceKind> {
    vec![SourceKind::Google]
}

fn default_max_items() -> usize {
    20
}

#[derive(Debug, Deserialize)]
struct TopicsFile {
    topics: Vec<TopicSeed>,
}

fn seed(topic: &str, region: &str) -> TopicSeed {
    TopicSeed {
        topic: topic.to_string(),
        region: region.to_string(),
        sources: default_sources(),
        max_items: default_max_items(),
    }
}

/// Built-in seed set used when no topics file is present.
pub fn default_topic_seeds() -> Vec<TopicSeed> {
    [
        ("Stocks", "GLOBAL"),
        ("FX", "GLOBAL"),
        ("Oil Markets", "GLOBAL"),
        ("Gold Price", "GLOBAL"),
        ("Fixed Income", "US"),
        ("Trade Deals and Tariffs", "GLOBAL"),
        ("Federal Reserve", "US"),
        ("Central Banks", "US"),
    ]
    .into_iter()
    .map(|(t, r)| seed(t, r))
    .collect()
}

/// Load topic seeds from an explicit TOML file.
pub fn load_topic_seeds_from(path: &Path) -> Result<Vec<TopicSeed>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading topics from {}", path.display()))?;
    let parsed: TopicsFile = toml::from_str(&content)
        .with_context(|| format!("parsing topics from {}", path.display()))?;
    Ok(parsed.topics)
}

/// Load topic seeds using env var + fallbacks:
/// 1) $NEWS_TOPICS_PATH
/// 2) config/topics.toml
/// 3) built-in defaults
pub fn load_topic_seeds() -> Result<Vec<TopicSeed>> {
    if let Ok(p) = std::env::var(ENV_TOPICS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_topic_seeds_from(&pb);
        }
        return Err(anyhow!("NEWS_TOPICS_PATH points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_TOPICS_PATH);
    if default.exists() {
        return load_topic_seeds_from(&default);
    }
    Ok(default_topic_seeds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn seeds_parse_from_toml_with_defaults() {
        let toml = r#"
            [[topics]]
            topic = "Oil Markets"
            region = "GLOBAL"

            [[topics]]
            topic = "Tariffs"
            region = "CN"
            sources = ["google", "gdelt"]
            max_items = 30
        "#;
        let parsed: TopicsFile = toml::from_str(toml).unwrap();
        assert_eq!(parsed.topics.len(), 2);
        assert_eq!(parsed.topics[0].sources, vec![SourceKind::Google]);
        assert_eq!(parsed.topics[0].max_items, 20);
        assert_eq!(
            parsed.topics[1].sources,
            vec![SourceKind::Google, SourceKind::Gdelt]
        );
        assert_eq!(parsed.topics[1].max_items, 30);
    }

    #[serial_test::serial]
    #[test]
    fn seed_loading_prefers_env_path_then_defaults() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_TOPICS_PATH);

        // No files anywhere: the built-in set.
        let seeds = load_topic_seeds().unwrap();
        assert_eq!(seeds, default_topic_seeds());

        // Env path wins.
        let p = tmp.path().join("topics.toml");
        fs::write(&p, "[[topics]]\ntopic = \"X\"\nregion = \"US\"\n").unwrap();
        env::set_var(ENV_TOPICS_PATH, p.display().to_string());
        let seeds = load_topic_seeds().unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].topic, "X");
        env::remove_var(ENV_TOPICS_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_parse_into_app_config() {
        env::set_var("NEWS_RESULT_LIMIT", "25");
        env::set_var("NEWS_FETCH_CONCURRENCY", "3");
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.result_limit, 25);
        assert_eq!(cfg.tracker.fetch_concurrency, 3);
        env::remove_var("NEWS_RESULT_LIMIT");
        env::remove_var("NEWS_FETCH_CONCURRENCY");

        let cfg = AppConfig::from_env();
        assert_eq!(cfg.result_limit, 10);
    }
}
