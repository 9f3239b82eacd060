//! News Tracker — Binary Entrypoint
//! Boots the Axum HTTP server and the three background jobs (fetch sweep,
//! sentiment classification, digest notification).
//!
//! See `README.md` for quickstart.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_tracker::api::{self, AppState};
use news_tracker::config::{self, AppConfig};
use news_tracker::jobs;
use news_tracker::metrics::Metrics;
use news_tracker::notify::NotifierMux;
use news_tracker::sentiment::SentimentClassifier;
use news_tracker::store::NewsStore;
use news_tracker::tracker::{NewsTracker, TopicOptions};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_tracker=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let metrics = Metrics::init();

    let tracker = Arc::new(NewsTracker::new(cfg.tracker));
    for seed in config::load_topic_seeds()? {
        tracker.register_topic(
            &seed.topic,
            &seed.region,
            TopicOptions {
                max_items_per_fetch: seed.max_items,
                sources: seed.sources,
            },
        );
    }
    tracker.touch_last_updated();
    tracing::info!(topics = tracker.topic_names().len(), "topics registered");

    let store = Arc::new(NewsStore::new(&cfg.db_path));
    let classifier = Arc::new(SentimentClassifier::new());
    let notifiers = Arc::new(NotifierMux::from_env());

    let grace = Duration::from_secs(cfg.misfire_grace_secs);

    // Fetch sweep; the first tick fires immediately and warms the corpus.
    let _fetch_job = {
        let tracker = Arc::clone(&tracker);
        let store = Arc::clone(&store);
        let result_limit = cfg.result_limit;
        jobs::spawn_periodic(
            "fetch_news",
            Duration::from_secs(cfg.refresh_interval_secs),
            grace,
            move || {
                let tracker = Arc::clone(&tracker);
                let store = Arc::clone(&store);
                async move { jobs::fetch_and_store(&tracker, &store, result_limit).await }
            },
        )
    };

    // Sentiment classification sweep.
    let _classify_job = {
        let store = Arc::clone(&store);
        let classifier = Arc::clone(&classifier);
        jobs::spawn_periodic(
            "classify_sentiment",
            Duration::from_secs(cfg.classify_interval_secs),
            grace,
            move || {
                let store = Arc::clone(&store);
                let classifier = Arc::clone(&classifier);
                async move { jobs::classify_pending(&store, &classifier).await }
            },
        )
    };

    // Digest notification sweep.
    let _digest_job = {
        let store = Arc::clone(&store);
        let notifiers = Arc::clone(&notifiers);
        let window_hours = cfg.digest_window_hours;
        jobs::spawn_periodic(
            "notify_digest",
            Duration::from_secs(cfg.digest_interval_secs),
            grace,
            move || {
                let store = Arc::clone(&store);
                let notifiers = Arc::clone(&notifiers);
                async move { jobs::send_digest(&store, &notifiers, window_hours).await }
            },
        )
    };

    let state = AppState {
        tracker,
        store,
        result_limit: cfg.result_limit,
    };
    let app = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "news tracker listening");
    axum::serve(listener, app).await?;
    Ok(())
}
