// src/feeds/gdelt.rs
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;

use super::{get_text_with_retry, FeedSource, RawArticle};

const BASE_URL: &str =
    "https://api.gdeltproject.org/api/v1/search_ftxtsearch/search_ftxtsearch";
const TIMEOUT: Duration = Duration::from_secs(15);

fn region_language(region: &str) -> Option<&'static str> {
    match region {
        "US" => Some("english"),
        "BR" => Some("portuguese"),
        "DE" => Some("german"),
        "CN" => Some("chinese"),
        "JP" => Some("japanese"),
        _ => None,
    }
}

fn region_country(region: &str) -> Option<&'static str> {
    match region {
        "US" => Some("unitedstates"),
        "BR" => Some("brazil"),
        "DE" => Some("germany"),
        "CN" => Some("china"),
        "JP" => Some("japan"),
        "GB" => Some("unitedkingdom"),
        _ => None,
    }
}

fn parse_gdelt_datetime(ts: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Full-text-search-API-backed feed. The artlist output is line-oriented
/// TSV: `url \t datetime \t title \t outlet`, no header row.
pub struct GdeltFeed {
    query: String,
    max_items: usize,
    region: String,
    client: Option<reqwest::Client>,
    fixture: Option<String>,
}

impl GdeltFeed {
    pub fn new(query: &str, max_items: usize, region: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent("NewsTracker/1.0 (+https://localhost)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            query: query.to_string(),
            max_items,
            region: region.to_uppercase(),
            client: Some(client),
            fixture: None,
        }
    }

    /// Parse from a canned artlist body instead of the network.
    pub fn from_fixture(query: &str, max_items: usize, region: &str, body: &str) -> Self {
        Self {
            query: query.to_string(),
            max_items,
            region: region.to_uppercase(),
            client: None,
            fixture: Some(body.to_string()),
        }
    }

    fn query_param(&self) -> String {
        match (
            region_language(&self.region),
            region_country(&self.region),
        ) {
            (Some(lang), Some(country)) => {
                format!("{} sourcelang:{} sourcecountry:{}", self.query, lang, country)
            }
            (Some(lang), None) => format!("{} sourcelang:{}", self.query, lang),
            _ => self.query.clone(),
        }
    }

    fn parse_artlist(&self, body: &str, cutoff: DateTime<Utc>) -> Vec<RawArticle> {
        let mut out = Vec::new();
        for line in body.lines().take(self.max_items) {
            let mut parts = line.trim().split('\t');
            let (Some(url), Some(pubdate), Some(title), Some(outlet)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if url.is_empty() || title.is_empty() {
                continue;
            }

            let published_dt = parse_gdelt_datetime(pubdate.trim());
            if let Some(dt) = published_dt {
                if dt < cutoff {
                    continue;
                }
            }

            out.push(RawArticle {
                title: title.trim().to_string(),
                source: outlet.trim().to_string(),
                link: Some(url.trim().to_string()),
                region: Some(self.region.clone()),
                published: published_dt.map(|dt| dt.to_rfc3339()),
                // The artlist format carries no summary.
                summary: None,
            });
        }
        counter!("feed_articles_total").increment(out.len() as u64);
        out
    }
}

#[async_trait]
impl FeedSource for GdeltFeed {
    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let cutoff = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();

        if let Some(body) = &self.fixture {
            return Ok(self.parse_artlist(body, cutoff));
        }

        let client = self.client.as_ref().expect("http mode has a client");
        let max = self.max_items.to_string();
        let query = self.query_param();
        let body = get_text_with_retry(
            client,
            BASE_URL,
            &[
                ("query", query.as_str()),
                ("output", "artlist"),
                ("dropdup", "true"),
                ("maxrecords", max.as_str()),
            ],
        )
        .await?;

        Ok(self.parse_artlist(&body, cutoff))
    }

    fn name(&self) -> &'static str {
        "Gdelt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn artlist_lines_parse_into_articles() {
        let now = Utc::now();
        let cutoff = now - TimeDelta::hours(12);
        let body = format!(
            "https://a.example/one\t{}\tMarkets rally on rate cut\tExample Wire\n\
             short\tline\n\
             https://a.example/two\t{}\tSecond headline\tOther Outlet",
            now.format("%Y-%m-%dT%H:%M:%SZ"),
            now.format("%Y-%m-%dT%H:%M:%SZ"),
        );
        let feed = GdeltFeed::from_fixture("markets", 20, "US", &body);
        let items = feed.parse_artlist(&body, cutoff);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Markets rally on rate cut");
        assert_eq!(items[0].source, "Example Wire");
        assert_eq!(items[0].link.as_deref(), Some("https://a.example/one"));
        assert!(items[0].published.is_some());
    }

    #[test]
    fn dated_items_before_cutoff_are_dropped_undated_kept() {
        let cutoff: DateTime<Utc> = "2026-08-07T00:00:00Z".parse().unwrap();
        let body = "https://a/1\t2026-08-06T10:00:00Z\tYesterday news\tWire\n\
                    https://a/2\t\tUndated news\tWire";
        let feed = GdeltFeed::from_fixture("x", 20, "GLOBAL", body);
        let items = feed.parse_artlist(body, cutoff);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Undated news");
        assert!(items[0].published.is_none());
    }

    #[test]
    fn region_filter_lands_in_query_param() {
        let feed = GdeltFeed::from_fixture("tariffs", 10, "BR", "");
        assert_eq!(
            feed.query_param(),
            "tariffs sourcelang:portuguese sourcecountry:brazil"
        );
        let global = GdeltFeed::from_fixture("tariffs", 10, "GLOBAL", "");
        assert_eq!(global.query_param(), "tariffs");
    }
}
