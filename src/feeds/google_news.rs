// src/feeds/google_news.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use super::{get_text_with_retry, normalize_summary, FeedSource, RawArticle};

const BASE_URL: &str = "https://news.google.com/rss/search";
const TIMEOUT: Duration = Duration::from_secs(10);
/// Short TTL cache so repeated sweeps within the refresh interval do not
/// re-hit the endpoint for the same (query, region).
const CACHE_TTL: Duration = Duration::from_secs(60);

static CACHE: Lazy<Mutex<HashMap<String, (Instant, Vec<RawArticle>)>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<SourceTag>,
}

/// `<source url="...">Outlet</source>` — the outlet name is the text node.
#[derive(Debug, Deserialize)]
struct SourceTag {
    #[serde(rename = "@url")]
    #[allow(dead_code)]
    url: Option<String>,
    #[serde(rename = "$text")]
    name: Option<String>,
}

/// Locale parameters per region code; unknown regions fall back to en-US.
fn region_locale(region: &str) -> (&'static str, &'static str) {
    match region {
        "BR" => ("pt-BR", "BR:pt"),
        "GB" => ("en-GB", "GB:en"),
        _ => ("en-US", "US:en"),
    }
}

fn parse_rfc2822_to_rfc3339(ts: &str) -> Option<String> {
    // Feed dates end in the obsolete "GMT" zone; normalize it to a numeric
    // offset before handing to the RFC 2822 parser.
    let ts = ts.trim();
    let normalized;
    let ts = match ts.strip_suffix(" GMT") {
        Some(stripped) => {
            normalized = format!("{stripped} +0000");
            normalized.as_str()
        }
        None => ts,
    };
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
}

/// Google's search feed titles come as "Headline - Outlet"; rsplit so a
/// headline containing a dash is not cut short.
fn split_title_source(raw: &str) -> (String, String) {
    if let Some(pos) = raw.rfind(" - ") {
        (
            raw[..pos].trim().to_string(),
            raw[pos + 3..].trim().to_string(),
        )
    } else {
        (raw.trim().to_string(), String::new())
    }
}

enum Mode {
    Http { client: reqwest::Client },
    Fixture(String),
}

/// Search-RSS-backed feed for one topic/region pair.
pub struct GoogleNewsFeed {
    query: String,
    max_items: usize,
    region: String,
    hl: &'static str,
    ceid: &'static str,
    mode: Mode,
}

impl GoogleNewsFeed {
    pub fn new(query: &str, max_items: usize, region: &str) -> Self {
        let region = region.to_uppercase();
        let (hl, ceid) = region_locale(&region);
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent("NewsTracker/1.0 (+https://localhost)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            query: query.to_string(),
            max_items,
            region,
            hl,
            ceid,
            mode: Mode::Http { client },
        }
    }

    /// Parse from canned XML instead of the network.
    pub fn from_fixture(query: &str, max_items: usize, region: &str, xml: &str) -> Self {
        let region = region.to_uppercase();
        let (hl, ceid) = region_locale(&region);
        Self {
            query: query.to_string(),
            max_items,
            region,
            hl,
            ceid,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn cache_key(&self) -> String {
        format!(
            "gnews::{}::{}::{}::{}::{}",
            self.query, self.hl, self.region, self.ceid, self.max_items
        )
    }

    fn parse_items(&self, xml: &str, cutoff: DateTime<Utc>) -> Result<Vec<RawArticle>> {
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(xml).context("parsing google news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(self.max_items));
        for it in rss.channel.item {
            let published = it.pub_date.as_deref().and_then(parse_rfc2822_to_rfc3339);
            // Today-only: dated items older than the UTC midnight cutoff are
            // stale search hits, not news.
            if let Some(ts) = published.as_deref().and_then(crate::freshness::parse_published) {
                if ts < cutoff {
                    continue;
                }
            }

            let raw_title = it.title.as_deref().unwrap_or_default();
            let (title, split_source) = split_title_source(raw_title);
            if title.is_empty() {
                continue;
            }
            let source = it
                .source
                .as_ref()
                .and_then(|s| s.name.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(split_source);

            out.push(RawArticle {
                title,
                source,
                link: it.link.clone(),
                region: Some(self.region.clone()),
                published,
                summary: it
                    .description
                    .as_deref()
                    .map(normalize_summary)
                    .filter(|s| !s.is_empty()),
            });
            if out.len() >= self.max_items {
                break;
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        counter!("feed_articles_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedSource for GoogleNewsFeed {
    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let cutoff = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();

        match &self.mode {
            Mode::Fixture(xml) => self.parse_items(xml, cutoff),
            Mode::Http { client } => {
                let key = self.cache_key();
                if let Some((stamp, data)) = CACHE.lock().expect("feed cache poisoned").get(&key) {
                    if stamp.elapsed() < CACHE_TTL {
                        return Ok(data.clone());
                    }
                }

                let body = get_text_with_retry(
                    client,
                    BASE_URL,
                    &[
                        ("q", self.query.as_str()),
                        ("hl", self.hl),
                        ("gl", self.region.as_str()),
                        ("ceid", self.ceid),
                    ],
                )
                .await?;

                let items = self.parse_items(&body, cutoff)?;
                CACHE
                    .lock()
                    .expect("feed cache poisoned")
                    .insert(key, (Instant::now(), items.clone()));
                Ok(items)
            }
        }
    }

    fn name(&self) -> &'static str {
        "GoogleNews"
    }
}
