// tests/common/mod.rs
//! Shared test helpers: an in-memory feed stub and article builders.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use news_tracker::feeds::{FeedSource, RawArticle};

/// Feed that serves queued batches, one per fetch call; the last batch
/// repeats. Can be flipped into a failing source.
pub struct StubFeed {
    batches: Mutex<Vec<Vec<RawArticle>>>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl StubFeed {
    pub fn with_batches(batches: Vec<Vec<RawArticle>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        })
    }

    pub fn once(items: Vec<RawArticle>) -> Arc<Self> {
        Self::with_batches(vec![items])
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedSource for StubFeed {
    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("stub feed down"));
        }
        let batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        Ok(batches[n.min(batches.len() - 1)].clone())
    }

    fn name(&self) -> &'static str {
        "Stub"
    }
}

pub fn raw(title: &str, link: &str, published: Option<&str>) -> RawArticle {
    RawArticle {
        title: title.to_string(),
        source: "UnitWire".to_string(),
        link: Some(link.to_string()),
        region: Some("US".to_string()),
        published: published.map(str::to_string),
        summary: None,
    }
}
