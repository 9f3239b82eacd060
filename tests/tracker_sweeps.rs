// tests/tracker_sweeps.rs
//
// Orchestrator behavior over stubbed feeds: both dedup layers, memory cap,
// sweep bookkeeping, and registry lifecycle.

mod common;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use common::{raw, StubFeed};
use news_tracker::feeds::FeedSource;
use news_tracker::tracker::{NewsTracker, TopicOptions, TrackerConfig, TrackerError};

fn tracker() -> NewsTracker {
    NewsTracker::new(TrackerConfig::default())
}

#[tokio::test]
async fn near_duplicate_titles_collapse_to_one_item() {
    // Two wire stories about the same OPEC cut, one with an extra word,
    // plus one unrelated headline: exactly two survive.
    let items = vec![
        raw("Oil prices rise on OPEC cut", "https://n/1", None),
        raw("Oil prices rise on OPEC supply cut", "https://n/2", None),
        raw("Gold steadies as dollar firms", "https://n/3", None),
    ];
    let t = tracker();
    t.register_topic_with_feeds("Oil Markets", "GLOBAL", vec![StubFeed::once(items)]);

    let fresh = t.refresh_topic("Oil Markets", 10).await;
    assert_eq!(fresh.len(), 2);

    let known = t.all_known("Oil Markets");
    assert_eq!(known.len(), 2);
    let titles: Vec<&str> = known.iter().map(|a| a.title.as_str()).collect();
    assert!(titles.contains(&"Oil prices rise on OPEC cut"));
    assert!(titles.contains(&"Gold steadies as dollar firms"));
}

#[tokio::test]
async fn same_link_is_suppressed_across_sweeps() {
    let item = raw("Fed holds rates steady", "https://n/fed", None);
    let t = tracker();
    t.register_topic_with_feeds(
        "Federal Reserve",
        "US",
        vec![StubFeed::with_batches(vec![
            vec![item.clone()],
            vec![item.clone()],
        ])],
    );

    let first = t.refresh_topic("Federal Reserve", 10).await;
    assert_eq!(first.len(), 1);

    let second = t.refresh_topic("Federal Reserve", 10).await;
    assert!(second.is_empty(), "second occurrence must be suppressed");
    assert_eq!(t.all_known("Federal Reserve").len(), 1);
}

#[tokio::test]
async fn items_without_links_are_skipped() {
    let mut linkless = raw("No link here", "ignored", None);
    linkless.link = None;
    let t = tracker();
    t.register_topic_with_feeds(
        "Stocks",
        "GLOBAL",
        vec![StubFeed::once(vec![
            linkless,
            raw("Stocks advance", "https://n/ok", None),
        ])],
    );

    let fresh = t.refresh_topic("Stocks", 10).await;
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].link, "https://n/ok");
}

#[tokio::test]
async fn memory_cap_holds_after_repeated_sweeps() {
    let cfg = TrackerConfig {
        max_items_per_topic: 5,
        ..TrackerConfig::default()
    };
    let t = NewsTracker::new(cfg);

    let now = Utc::now();
    // Three sweeps of four distinct stories each; every token carries both
    // indices so no pair trips the near-dup layer and only the cap limits
    // growth.
    let batches: Vec<Vec<_>> = (0i64..3)
        .map(|sweep| {
            (0i64..4)
                .map(|i| {
                    raw(
                        &format!("story{sweep}x{i} alpha{sweep}{i} beta{sweep}{i} gamma{sweep}{i}"),
                        &format!("https://n/{sweep}/{i}"),
                        Some(&(now - TimeDelta::minutes(sweep * 10 + i)).to_rfc3339()),
                    )
                })
                .collect()
        })
        .collect();
    t.register_topic_with_feeds("Stocks", "GLOBAL", vec![StubFeed::with_batches(batches)]);

    for _ in 0..3 {
        t.refresh_topic("Stocks", 10).await;
        assert!(t.all_known("Stocks").len() <= 5);
    }
    // Cap reached and held; newest-first order preserved.
    let known = t.all_known("Stocks");
    assert_eq!(known.len(), 5);
    for pair in known.windows(2) {
        assert!(pair[0].published >= pair[1].published);
    }
}

#[tokio::test]
async fn last_fetched_is_capped_and_sorted() {
    let now = Utc::now();
    let items: Vec<_> = (0i64..6)
        .map(|i| {
            raw(
                &format!("headline alpha{i} beta{i} gamma{i}"),
                &format!("https://n/{i}"),
                Some(&(now - TimeDelta::minutes(i)).to_rfc3339()),
            )
        })
        .collect();
    let t = tracker();
    t.register_topic_with_feeds("FX", "GLOBAL", vec![StubFeed::once(items)]);

    let fresh = t.refresh_topic("FX", 3).await;
    assert_eq!(fresh.len(), 3);
    // Newest three of this sweep, descending.
    assert_eq!(fresh[0].link, "https://n/0");
    assert_eq!(fresh[2].link, "https://n/2");
    assert_eq!(t.last_fetched("FX"), fresh);
}

#[tokio::test]
async fn failing_source_does_not_abort_the_sweep() {
    let ok: Arc<dyn FeedSource> = StubFeed::once(vec![raw(
        "Tariff talks resume",
        "https://n/t1",
        None,
    )]);
    let down: Arc<dyn FeedSource> = StubFeed::failing();
    let t = tracker();
    t.register_topic_with_feeds("Tariffs", "CN", vec![down, ok]);

    let fresh = t.refresh_topic("Tariffs", 10).await;
    assert_eq!(fresh.len(), 1, "healthy source still contributes");
}

#[tokio::test]
async fn register_twice_is_a_noop() {
    let first = StubFeed::once(vec![raw("Only once", "https://n/1", None)]);
    let t = tracker();
    t.register_topic_with_feeds("Gold Price", "GLOBAL", vec![first.clone()]);
    t.refresh_topic("Gold Price", 10).await;
    assert_eq!(t.all_known("Gold Price").len(), 1);

    // Re-registering must keep existing bindings and state.
    t.register_topic("Gold Price", "GLOBAL", TopicOptions::default());
    t.register_topic_with_feeds("Gold Price", "GLOBAL", vec![StubFeed::failing()]);
    t.refresh_topic("Gold Price", 10).await;

    assert_eq!(t.all_known("Gold Price").len(), 1);
    assert_eq!(first.calls(), 2, "original feed still bound");
}

#[tokio::test]
async fn remove_topic_is_atomic_and_reads_default_empty() {
    let t = tracker();
    t.register_topic_with_feeds(
        "Russia Ukraine",
        "GLOBAL",
        vec![StubFeed::once(vec![raw("Ceasefire talks", "https://n/c", None)])],
    );
    t.refresh_topic("Russia Ukraine", 10).await;
    assert!(!t.all_known("Russia Ukraine").is_empty());

    t.remove_topic("Russia Ukraine").unwrap();
    assert!(t.last_fetched("Russia Ukraine").is_empty());
    assert!(t.all_known("Russia Ukraine").is_empty());
    assert!(t.refresh_topic("Russia Ukraine", 10).await.is_empty());

    assert_eq!(
        t.remove_topic("Russia Ukraine"),
        Err(TrackerError::TopicNotFound("Russia Ukraine".to_string()))
    );
}

#[tokio::test]
async fn refresh_all_sweeps_every_topic_and_stamps_time() {
    let t = tracker();
    t.register_topic_with_feeds(
        "Stocks",
        "GLOBAL",
        vec![StubFeed::once(vec![raw("Stocks rise", "https://n/s", None)])],
    );
    t.register_topic_with_feeds(
        "FX",
        "GLOBAL",
        vec![StubFeed::once(vec![raw("Dollar slips", "https://n/d", None)])],
    );
    t.register_topic_with_feeds("Broken", "US", vec![StubFeed::failing()]);

    assert_eq!(t.last_updated(), 0);
    t.refresh_all(10).await;

    assert_eq!(t.last_fetched("Stocks").len(), 1);
    assert_eq!(t.last_fetched("FX").len(), 1);
    assert!(t.last_fetched("Broken").is_empty());
    assert!(t.last_updated() > 0);
}
