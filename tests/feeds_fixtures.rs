// tests/feeds_fixtures.rs
//
// Provider parsing against canned payloads (no sockets): Google News search
// RSS and the GDELT artlist format.

use chrono::{TimeDelta, Utc};
use news_tracker::feeds::{FeedSource, GdeltFeed, GoogleNewsFeed};

fn google_rss(now_rfc2822: &str, old_rfc2822: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>"oil" - Google News</title>
    <item>
      <title>Oil prices rise on OPEC cut - Example Wire</title>
      <link>https://news.example.com/opec-cut</link>
      <pubDate>{now_rfc2822}</pubDate>
      <description>&lt;a href="https://news.example.com/opec-cut"&gt;Oil prices rise&lt;/a&gt;&amp;nbsp;after the announcement</description>
      <source url="https://example-wire.com">Example Wire</source>
    </item>
    <item>
      <title>Yesterday's stale story - Old Outlet</title>
      <link>https://news.example.com/stale</link>
      <pubDate>{old_rfc2822}</pubDate>
    </item>
    <item>
      <title>Undated follow-up - Other Outlet</title>
      <link>https://news.example.com/undated</link>
    </item>
  </channel>
</rss>"#
    )
}

#[tokio::test]
async fn google_feed_parses_items_and_applies_cutoff() {
    let now = Utc::now();
    let xml = google_rss(
        &now.to_rfc2822(),
        &(now - TimeDelta::days(3)).to_rfc2822(),
    );
    let feed = GoogleNewsFeed::from_fixture("oil", 20, "US", &xml);

    let items = feed.fetch().await.expect("fixture parse");
    // The three-day-old item falls outside the today cutoff; the undated
    // one is kept.
    assert_eq!(items.len(), 2);

    let first = &items[0];
    assert_eq!(first.title, "Oil prices rise on OPEC cut");
    assert_eq!(first.source, "Example Wire");
    assert_eq!(first.link.as_deref(), Some("https://news.example.com/opec-cut"));
    assert_eq!(first.region.as_deref(), Some("US"));
    assert!(first.published.is_some());
    let summary = first.summary.as_deref().unwrap();
    assert!(!summary.contains('<'), "summary must be tag-free: {summary}");
    assert!(summary.contains("Oil prices rise"));

    let undated = &items[1];
    assert_eq!(undated.title, "Undated follow-up");
    assert_eq!(undated.source, "Other Outlet");
    assert!(undated.published.is_none());
    assert!(undated.summary.is_none());
}

#[tokio::test]
async fn google_feed_honors_max_items() {
    let now = Utc::now().to_rfc2822();
    let items: String = (0..5)
        .map(|i| {
            format!(
                "<item><title>Story number {i} - Wire</title>\
                 <link>https://news.example.com/{i}</link>\
                 <pubDate>{now}</pubDate></item>"
            )
        })
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel>{items}</channel></rss>"
    );

    let feed = GoogleNewsFeed::from_fixture("x", 3, "GB", &xml);
    let out = feed.fetch().await.unwrap();
    assert_eq!(out.len(), 3);
}

#[tokio::test]
async fn gdelt_feed_parses_artlist_lines() {
    let now = Utc::now();
    let body = format!(
        "https://g.example/one\t{}\tTariff talks resume in Geneva\tGeneva Post\n\
         https://g.example/two\t{}\tShipping rates jump after announcement\tTrade Daily",
        now.format("%Y-%m-%dT%H:%M:%SZ"),
        now.format("%Y-%m-%dT%H:%M:%SZ"),
    );
    let feed = GdeltFeed::from_fixture("tariffs", 20, "US", &body);

    let items = feed.fetch().await.expect("fixture parse");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Tariff talks resume in Geneva");
    assert_eq!(items[0].source, "Geneva Post");
    assert_eq!(items[1].link.as_deref(), Some("https://g.example/two"));
    assert!(items.iter().all(|i| i.summary.is_none()));
}

#[tokio::test]
async fn malformed_payloads_error_not_panic() {
    let feed = GoogleNewsFeed::from_fixture("x", 5, "US", "this is not xml");
    assert!(feed.fetch().await.is_err());

    // GDELT's line format just skips unparsable rows.
    let feed = GdeltFeed::from_fixture("x", 5, "US", "one lonely column");
    assert!(feed.fetch().await.unwrap().is_empty());
}
