// src/tracker/mod.rs
pub mod dedup;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::feeds::{FeedSource, GdeltFeed, GoogleNewsFeed, RawArticle};
use dedup::{MinHash, NearDupIndex};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tracker_articles_kept_total", "Articles surviving both dedup layers.");
        describe_counter!(
            "tracker_dedup_link_total",
            "Articles dropped by exact link dedup."
        );
        describe_counter!(
            "tracker_dedup_near_total",
            "Articles dropped by near-duplicate suppression."
        );
        describe_counter!("tracker_fetch_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("tracker_sweep_ms", "Per-topic sweep duration in milliseconds.");
        describe_gauge!("tracker_last_sweep_ts", "Unix ts when the last full sweep finished.");
    });
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("topic not tracked: {0}")]
    TopicNotFound(String),
}

/// Closed set of feed backends a topic can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Google,
    Gdelt,
}

/// Per-topic registration options.
#[derive(Debug, Clone)]
pub struct TopicOptions {
    /// Per-source fetch cap passed to each feed backend.
    pub max_items_per_fetch: usize,
    pub sources: Vec<SourceKind>,
}

impl Default for TopicOptions {
    fn default() -> Self {
        Self {
            max_items_per_fetch: 20,
            sources: vec![SourceKind::Google],
        }
    }
}

/// Tracker-wide tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Memory cap per topic; oldest items are evicted past this.
    pub max_items_per_topic: usize,
    /// Concurrent source fetches within one topic sweep.
    pub fetch_concurrency: usize,
    /// Concurrent topic sweeps within `refresh_all`.
    pub topic_concurrency: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_items_per_topic: 500,
            fetch_concurrency: 8,
            topic_concurrency: 4,
        }
    }
}

/// An article that survived both dedup layers of its topic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Article {
    /// Topic-local id, assigned in arrival order.
    pub id: u64,
    pub title: String,
    pub source: String,
    pub link: String,
    pub region: Option<String>,
    pub published: Option<String>,
    pub summary: Option<String>,
}

/// All mutable per-topic state, guarded by one mutex: multiple fetch workers
/// of the same sweep incorporate results concurrently, and the id counter,
/// index, seen-set and list must move together.
#[derive(Debug, Default)]
struct TopicState {
    articles: Vec<Article>,
    seen_links: HashSet<String>,
    last_fetched: Vec<Article>,
    index: NearDupIndex,
    next_id: u64,
}

/// A tracked topic: immutable bindings plus its guarded state. Registered as
/// one aggregate so removal is a single map deletion — readers never observe
/// a partially torn-down topic.
pub struct Topic {
    name: String,
    region: String,
    feeds: Vec<Arc<dyn FeedSource>>,
    state: Mutex<TopicState>,
}

impl Topic {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn build_feed(kind: SourceKind, topic: &str, max_items: usize, region: &str) -> Arc<dyn FeedSource> {
    match kind {
        SourceKind::Google => Arc::new(GoogleNewsFeed::new(topic, max_items, region)),
        SourceKind::Gdelt => Arc::new(GdeltFeed::new(topic, max_items, region)),
    }
}

/// Registry and orchestrator for all tracked topics.
pub struct NewsTracker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    topic_limiter: Arc<Semaphore>,
    cfg: TrackerConfig,
    /// Unix seconds of the last completed full sweep; 0 = never.
    last_updated: AtomicU64,
}

impl NewsTracker {
    pub fn new(cfg: TrackerConfig) -> Self {
        ensure_metrics_described();
        Self {
            topics: RwLock::new(HashMap::new()),
            topic_limiter: Arc::new(Semaphore::new(cfg.topic_concurrency.max(1))),
            cfg,
            last_updated: AtomicU64::new(0),
        }
    }

    /// Register a topic. A second registration under the same name is a
    /// no-op, not an error: existing feed bindings and state are kept.
    pub fn register_topic(&self, name: &str, region: &str, opts: TopicOptions) {
        let mut topics = self.topics.write().expect("topic registry poisoned");
        if topics.contains_key(name) {
            return;
        }
        let region = region.to_uppercase();
        let feeds = opts
            .sources
            .iter()
            .map(|&kind| build_feed(kind, name, opts.max_items_per_fetch, &region))
            .collect();
        topics.insert(
            name.to_string(),
            Arc::new(Topic {
                name: name.to_string(),
                region,
                feeds,
                state: Mutex::new(TopicState::default()),
            }),
        );
    }

    /// Register with an already-built feed set. Test seam and extension
    /// point for fixture-backed sources.
    pub fn register_topic_with_feeds(
        &self,
        name: &str,
        region: &str,
        feeds: Vec<Arc<dyn FeedSource>>,
    ) {
        let mut topics = self.topics.write().expect("topic registry poisoned");
        if topics.contains_key(name) {
            return;
        }
        topics.insert(
            name.to_string(),
            Arc::new(Topic {
                name: name.to_string(),
                region: region.to_uppercase(),
                feeds,
                state: Mutex::new(TopicState::default()),
            }),
        );
    }

    /// Drop a topic and all its subordinate state in one map removal.
    pub fn remove_topic(&self, name: &str) -> Result<(), TrackerError> {
        let mut topics = self.topics.write().expect("topic registry poisoned");
        topics
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TrackerError::TopicNotFound(name.to_string()))
    }

    pub fn contains_topic(&self, name: &str) -> bool {
        self.topics
            .read()
            .expect("topic registry poisoned")
            .contains_key(name)
    }

    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .topics
            .read()
            .expect("topic registry poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics
            .read()
            .expect("topic registry poisoned")
            .get(name)
            .cloned()
    }

    /// Sweep one topic: fetch all its sources concurrently, filter through
    /// both dedup layers, then sort, prune and record the fresh batch.
    /// Returns this sweep's new items (at most `result_limit`).
    pub async fn refresh_topic(&self, name: &str, result_limit: usize) -> Vec<Article> {
        match self.get(name) {
            Some(topic) => Self::sweep(topic, result_limit, self.cfg).await,
            None => Vec::new(),
        }
    }

    async fn sweep(topic: Arc<Topic>, result_limit: usize, cfg: TrackerConfig) -> Vec<Article> {
        if topic.feeds.is_empty() {
            return Vec::new();
        }
        let t0 = std::time::Instant::now();

        // Fetch I/O overlaps up to the cap; incorporation is serialized per
        // topic by the state mutex at the fan-in loop below.
        let permits = topic.feeds.len().min(cfg.fetch_concurrency.max(1));
        let limiter = Arc::new(Semaphore::new(permits));
        let mut workers = JoinSet::new();
        for feed in topic.feeds.iter().cloned() {
            let limiter = Arc::clone(&limiter);
            workers.spawn(async move {
                let _permit = limiter.acquire_owned().await.expect("fetch limiter closed");
                (feed.name(), feed.fetch().await)
            });
        }

        let mut fresh: Vec<Article> = Vec::new();
        while let Some(joined) = workers.join_next().await {
            let (source_name, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = ?e, topic = %topic.name, "fetch worker panicked");
                    counter!("tracker_fetch_errors_total").increment(1);
                    continue;
                }
            };
            let fetched = match result {
                Ok(items) => items,
                Err(e) => {
                    // A failing source contributes zero items this cycle.
                    tracing::warn!(error = ?e, source = source_name, topic = %topic.name, "feed fetch failed");
                    counter!("tracker_fetch_errors_total").increment(1);
                    continue;
                }
            };

            let mut state = topic.state.lock().expect("topic state poisoned");
            for item in fetched {
                if let Some(article) = incorporate(&mut state, item) {
                    fresh.push(article);
                }
            }
        }

        let batch;
        {
            let mut state = topic.state.lock().expect("topic state poisoned");
            sort_published_desc(&mut state.articles);
            if state.articles.len() > cfg.max_items_per_topic {
                state.articles.truncate(cfg.max_items_per_topic);
            }
            sort_published_desc(&mut fresh);
            fresh.truncate(result_limit);
            state.last_fetched = fresh.clone();
            batch = fresh;
        }

        counter!("tracker_articles_kept_total").increment(batch.len() as u64);
        histogram!("tracker_sweep_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        batch
    }

    /// Sweep every registered topic, bounded by the topic-level limiter.
    /// One topic failing never blocks the others.
    pub async fn refresh_all(&self, result_limit: usize) {
        let topics: Vec<Arc<Topic>> = {
            let guard = self.topics.read().expect("topic registry poisoned");
            guard.values().cloned().collect()
        };

        let cfg = self.cfg;
        let mut sweeps = JoinSet::new();
        for topic in topics {
            let limiter = Arc::clone(&self.topic_limiter);
            sweeps.spawn(async move {
                let _permit = limiter.acquire_owned().await.expect("topic limiter closed");
                let name = topic.name.clone();
                (name, Self::sweep(topic, result_limit, cfg).await)
            });
        }
        while let Some(joined) = sweeps.join_next().await {
            match joined {
                Ok((name, batch)) => {
                    tracing::debug!(topic = %name, fresh = batch.len(), "topic sweep done");
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "topic sweep panicked");
                }
            }
        }

        self.touch_last_updated();
        gauge!("tracker_last_sweep_ts").set(self.last_updated() as f64);
    }

    /// The most recent sweep's new items; empty for unknown topics.
    pub fn last_fetched(&self, name: &str) -> Vec<Article> {
        self.get(name)
            .map(|t| t.state.lock().expect("topic state poisoned").last_fetched.clone())
            .unwrap_or_default()
    }

    /// Everything currently held for the topic; empty for unknown topics.
    pub fn all_known(&self, name: &str) -> Vec<Article> {
        self.get(name)
            .map(|t| t.state.lock().expect("topic state poisoned").articles.clone())
            .unwrap_or_default()
    }

    pub fn last_updated(&self) -> u64 {
        self.last_updated.load(Ordering::Relaxed)
    }

    pub fn touch_last_updated(&self) {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.last_updated.store(now, Ordering::Relaxed);
    }
}

/// Run one raw item through both dedup layers. Returns the accepted article,
/// or `None` when the item is unusable or a duplicate.
fn incorporate(state: &mut TopicState, item: RawArticle) -> Option<Article> {
    let link = item.link.filter(|l| !l.is_empty())?;
    if state.seen_links.contains(&link) {
        counter!("tracker_dedup_link_total").increment(1);
        return None;
    }

    let text = match item.summary.as_deref() {
        Some(summary) => format!("{} {}", item.title, summary),
        None => item.title.clone(),
    };
    let sig = MinHash::of_text(text.trim());
    if state.index.query(&sig) {
        counter!("tracker_dedup_near_total").increment(1);
        return None;
    }

    let id = state.next_id;
    state.next_id += 1;
    state.index.insert(id, sig);
    state.seen_links.insert(link.clone());

    let article = Article {
        id,
        title: item.title,
        source: item.source,
        link,
        region: item.region,
        published: item.published,
        summary: item.summary,
    };
    state.articles.push(article.clone());
    Some(article)
}

/// Descending by publish time; undated items sort last. RFC 3339 UTC strings
/// order lexicographically, which keeps this a plain string comparison.
fn sort_published_desc(items: &mut [Article]) {
    items.sort_by(|a, b| match (&a.published, &b.published) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
