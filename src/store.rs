// src/store.rs
//! JSON-file-backed article corpus.
//!
//! Records are keyed by *normalized title*, not link: two distinct links
//! whose titles normalize identically collide and the first write wins.
//! See DESIGN.md for why this keying is kept.
//!
//! Every operation takes the store's single coarse lock and is independently
//! atomic; no transaction spans two operations. `query_by_topic` is a
//! side-effecting read: it reconciles stale freshness statuses and persists
//! them before filtering, so status filters always reflect the current
//! instant.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::freshness::{classify, Status};
use crate::tracker::Article;

/// The persisted record shape, as served to every downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub link: String,
    pub title: String,
    pub source: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub fetched_at: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub probabilities: Option<HashMap<String, f64>>,
}

/// Storage key: lowercase, alphanumeric+whitespace only, trimmed.
pub fn normalize_title(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

type Corpus = BTreeMap<String, StoredArticle>;

pub struct NewsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl NewsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the corpus from disk. A missing file is an empty corpus; an
    /// unreadable or corrupt file resets to empty with a warning —
    /// durability here is best-effort, never fatal.
    fn load(&self) -> Corpus {
        if !self.path.exists() {
            return Corpus::new();
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "store unreadable, starting empty");
                return Corpus::new();
            }
        };
        match serde_json::from_str::<Vec<StoredArticle>>(&raw) {
            Ok(items) => items
                .into_iter()
                .map(|item| (normalize_title(&item.title), item))
                .collect(),
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.path.display(), "store corrupt, resetting to empty");
                Corpus::new()
            }
        }
    }

    fn save(&self, corpus: &Corpus) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("creating store directory")?;
            }
        }
        let items: Vec<&StoredArticle> = corpus.values().collect();
        let body = serde_json::to_string_pretty(&items).context("serializing store")?;
        std::fs::write(&self.path, body).context("writing store")?;
        Ok(())
    }

    /// Insert the record unless its normalized title is already present.
    /// Existing keys win — even across different links or topics.
    pub fn upsert_if_absent(&self, record: StoredArticle) -> Result<bool> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut corpus = self.load();
        let inserted = insert_absent(&mut corpus, record);
        if inserted {
            self.save(&corpus)?;
        }
        Ok(inserted)
    }

    /// Hand-off point for a sweep's fresh batch: stamp status and fetch
    /// time, then upsert-if-absent each usable item. Returns how many were
    /// actually inserted.
    pub fn add_batch(&self, items: &[Article], topic: &str) -> Result<usize> {
        self.add_batch_at(items, topic, Utc::now())
    }

    pub fn add_batch_at(&self, items: &[Article], topic: &str, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut corpus = self.load();
        let now_iso = now.to_rfc3339();

        let mut inserted = 0usize;
        for item in items {
            if item.title.trim().is_empty() || item.link.is_empty() {
                continue;
            }
            let status = classify(item.published.as_deref(), now);
            let record = StoredArticle {
                link: item.link.clone(),
                title: item.title.clone(),
                source: item.source.clone(),
                published: item.published.clone(),
                region: Some(
                    item.region
                        .clone()
                        .unwrap_or_else(|| "GLOBAL".to_string()),
                ),
                summary: item.summary.clone(),
                topic: topic.to_string(),
                status: Some(status),
                fetched_at: Some(now_iso.clone()),
                sentiment: None,
                probabilities: None,
            };
            if insert_absent(&mut corpus, record) {
                inserted += 1;
            }
        }
        if inserted > 0 {
            self.save(&corpus)?;
        }
        Ok(inserted)
    }

    /// Reconcile-then-filter read: recompute every matching record's status
    /// for `now`, persist any changes, then filter and sort published-desc.
    pub fn query_by_topic(&self, topic: &str, status_filter: Option<Status>) -> Vec<StoredArticle> {
        self.query_by_topic_at(topic, status_filter, Utc::now())
    }

    pub fn query_by_topic_at(
        &self,
        topic: &str,
        status_filter: Option<Status>,
        now: DateTime<Utc>,
    ) -> Vec<StoredArticle> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut corpus = self.load();

        let mut changed = false;
        for record in corpus.values_mut().filter(|r| r.topic == topic) {
            let next = classify(record.published.as_deref(), now);
            if record.status != Some(next) {
                record.status = Some(next);
                changed = true;
            }
        }
        if changed {
            // Reads stay resilient: a failed persist degrades to stale
            // statuses on disk, not an error to the caller.
            if let Err(e) = self.save(&corpus) {
                tracing::warn!(error = ?e, "persisting reconciled statuses failed");
            }
        }

        let mut out: Vec<StoredArticle> = corpus
            .into_values()
            .filter(|r| r.topic == topic)
            .filter(|r| status_filter.is_none_or(|want| r.status == Some(want)))
            .collect();
        sort_published_desc(&mut out);
        out
    }

    /// Acknowledge a link exists. No read-state is kept on the record.
    pub fn mark_read(&self, link: &str) -> bool {
        let _guard = self.lock.lock().expect("store lock poisoned");
        self.load().values().any(|r| r.link == link)
    }

    pub fn delete_by_link(&self, link: &str) -> Result<bool> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut corpus = self.load();
        let key = corpus
            .iter()
            .find(|(_, r)| r.link == link)
            .map(|(k, _)| k.clone());
        match key {
            Some(k) => {
                corpus.remove(&k);
                self.save(&corpus)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn all_records(&self) -> Vec<StoredArticle> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        self.load().into_values().collect()
    }

    /// Attach a sentiment label and distribution to a record, addressed by
    /// normalized title first, then by link. Explicit reclassification is
    /// the only path that overwrites an existing sentiment.
    pub fn update_sentiment(
        &self,
        link_or_title: &str,
        sentiment: &str,
        probabilities: HashMap<String, f64>,
    ) -> Result<bool> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        let mut corpus = self.load();

        let key = {
            let norm = normalize_title(link_or_title);
            if corpus.contains_key(&norm) {
                Some(norm)
            } else {
                corpus
                    .iter()
                    .find(|(_, r)| r.link == link_or_title)
                    .map(|(k, _)| k.clone())
            }
        };
        let Some(key) = key else {
            return Ok(false);
        };

        let record = corpus.get_mut(&key).expect("key just found");
        record.sentiment = Some(sentiment.to_string());
        record.probabilities = Some(probabilities);
        self.save(&corpus)?;
        Ok(true)
    }
}

fn insert_absent(corpus: &mut Corpus, record: StoredArticle) -> bool {
    let key = normalize_title(&record.title);
    if key.is_empty() || corpus.contains_key(&key) {
        return false;
    }
    corpus.insert(key, record);
    true
}

fn sort_published_desc(items: &mut [StoredArticle]) {
    items.sort_by(|a, b| match (&a.published, &b.published) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
