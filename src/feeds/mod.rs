// src/feeds/mod.rs
pub mod gdelt;
pub mod google_news;

use std::time::Duration;

use anyhow::{Context, Result};

pub use gdelt::GdeltFeed;
pub use google_news::GoogleNewsFeed;

/// One candidate article as returned by a feed source, before any dedup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawArticle {
    pub title: String,
    pub source: String,
    pub link: Option<String>,
    pub region: Option<String>,
    /// ISO-8601 publish timestamp; `None` means the outlet gave no date.
    pub published: Option<String>,
    pub summary: Option<String>,
}

/// Capability interface for feed backends. The engine treats every variant
/// identically: a fallible fetch that yields raw candidate articles.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawArticle>>;
    fn name(&self) -> &'static str;
}

/// Transient HTTP statuses worth another attempt.
fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

const FETCH_ATTEMPTS: u8 = 3;
const BACKOFF_BASE_MS: u64 = 300;

/// GET with a small bounded retry for transient failures (429/5xx and
/// transport errors), shifted backoff capped by the attempt count.
pub(crate) async fn get_text_with_retry(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String> {
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        let res = client.get(url).query(query).send().await;
        match res {
            Ok(rsp) if is_retryable(rsp.status()) && attempt < FETCH_ATTEMPTS => {
                tokio::time::sleep(Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1))).await;
            }
            Ok(rsp) => {
                let rsp = rsp.error_for_status().context("feed http status")?;
                return rsp.text().await.context("feed http body");
            }
            Err(e) => {
                if attempt < FETCH_ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1)))
                        .await;
                    continue;
                }
                return Err(e).context("feed http get");
            }
        }
    }
}

/// Normalize feed-provided summary text: decode HTML entities, strip tags,
/// collapse whitespace. Feed summaries routinely embed anchor markup.
pub fn normalize_summary(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_summary_strips_tags_and_entities() {
        let s = "<a href=\"https://x\">Oil&nbsp;rises</a>&amp; more";
        assert_eq!(normalize_summary(s), "Oil rises & more");
    }

    #[test]
    fn normalize_summary_collapses_whitespace() {
        assert_eq!(normalize_summary("  a \n\t b  "), "a b");
    }
}
