// src/jobs.rs
//! Periodic job plumbing and the three job bodies (fetch, classify, notify).
//!
//! The contract each job honors:
//! - overlapping runs of the same job are suppressed (`try_lock` guard);
//! - a delayed run never stacks catch-up executions (`MissedTickBehavior::Skip`);
//! - a tick arriving past the misfire grace window is skipped entirely.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use metrics::counter;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::freshness::Status;
use crate::notify::{collect_fresh, Digest, NotifierMux};
use crate::sentiment::SentimentClassifier;
use crate::store::NewsStore;
use crate::tracker::NewsTracker;

/// Spawn a periodic job. The first tick fires immediately, which doubles as
/// the startup warm-up run. Task errors are logged, never propagated.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    misfire_grace: Duration,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let running = Arc::new(Mutex::new(()));
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let scheduled = ticker.tick().await;
            let late = Instant::now().saturating_duration_since(scheduled);
            if late > misfire_grace {
                tracing::warn!(job = name, late_ms = late.as_millis() as u64, "misfired tick skipped");
                counter!("jobs_misfired_total", "job" => name).increment(1);
                continue;
            }

            // At most one instance of a job runs at a time; a tick landing
            // while the previous run is still going is dropped, not queued.
            let Ok(guard) = Arc::clone(&running).try_lock_owned() else {
                tracing::debug!(job = name, "previous run still active, tick skipped");
                counter!("jobs_overlap_skipped_total", "job" => name).increment(1);
                continue;
            };

            let fut = task();
            let _run = tokio::spawn(async move {
                let _guard = guard;
                if let Err(e) = fut.await {
                    tracing::warn!(job = name, error = ?e, "job run failed");
                }
            });
        }
    })
}

/// Fetch sweep body: refresh every topic, then hand each topic's fresh batch
/// to the store. One topic's storage failure does not stop the others.
pub async fn fetch_and_store(
    tracker: &NewsTracker,
    store: &NewsStore,
    result_limit: usize,
) -> Result<()> {
    tracker.refresh_all(result_limit).await;

    for topic in tracker.topic_names() {
        let fresh = tracker.last_fetched(&topic);
        if fresh.is_empty() {
            continue;
        }
        match store.add_batch(&fresh, &topic) {
            Ok(inserted) => {
                tracing::info!(topic = %topic, fetched = fresh.len(), inserted, "stored sweep batch");
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = ?e, "storing sweep batch failed");
            }
        }
    }
    Ok(())
}

/// Classification sweep body: find records with no sentiment yet and fill
/// label + distribution via the classifier.
pub async fn classify_pending(store: &NewsStore, classifier: &SentimentClassifier) -> Result<()> {
    let records = store.all_records();
    let pending: Vec<(String, String)> = records
        .into_iter()
        .filter(|r| r.sentiment.is_none())
        .map(|r| {
            let key = if r.link.is_empty() { r.title.clone() } else { r.link.clone() };
            (key, r.title)
        })
        .collect();

    if pending.is_empty() {
        tracing::debug!("no pending items for classification");
        return Ok(());
    }

    let texts: Vec<&str> = pending.iter().map(|(_, text)| text.as_str()).collect();
    let results = classifier.classify_texts(&texts);

    let mut updated = 0usize;
    for ((key, _), res) in pending.iter().zip(results) {
        match store.update_sentiment(key, &res.label, res.probabilities) {
            Ok(true) => updated += 1,
            Ok(false) => {
                tracing::debug!(key = %key, "record vanished before sentiment update");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = ?e, "sentiment update failed");
            }
        }
    }
    tracing::info!(updated, "sentiment classification pass finished");
    Ok(())
}

/// Notification sweep body: reconcile + collect fresh items per topic within
/// the window, then fan the digest out to every configured channel.
pub async fn send_digest(
    store: &NewsStore,
    notifiers: &NotifierMux,
    window_hours: i64,
) -> Result<()> {
    if notifiers.is_empty() {
        tracing::debug!("no notification channels configured");
        return Ok(());
    }

    let now = Utc::now();
    let topics: BTreeSet<String> = store
        .all_records()
        .into_iter()
        .map(|r| r.topic)
        .collect();

    // query_by_topic reconciles stale statuses before filtering, so the
    // digest never reports an item that has already aged out of `fresh`.
    let mut items = Vec::new();
    for topic in &topics {
        items.extend(store.query_by_topic(topic, Some(Status::Fresh)));
    }

    let digest = Digest {
        window_hours,
        generated_at: now,
        items: collect_fresh(items, window_hours, now),
    };
    if digest.items.is_empty() {
        tracing::debug!("digest window empty, nothing to send");
        return Ok(());
    }

    notifiers.notify(&digest).await;
    tracing::info!(items = digest.items.len(), "digest dispatched");
    Ok(())
}
