pub mod email;
pub mod webhook;

use chrono::{DateTime, TimeDelta, Utc};

use crate::freshness::{parse_published, Status};
use crate::store::StoredArticle;

pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

/// Default lookback for digest collection.
pub const DEFAULT_WINDOW_HOURS: i64 = 2;
const MAX_PER_TOPIC: usize = 20;

/// One digest run: the fresh items of the window plus rendering context.
#[derive(Debug, Clone)]
pub struct Digest {
    pub window_hours: i64,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<StoredArticle>,
}

/// A delivery channel for digests. Failures are reported to the caller and
/// never reach the fetch/dedup path.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, digest: &Digest) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-out to every configured channel, logging per-channel failures.
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn from_env() -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(webhook) = WebhookNotifier::from_env() {
            channels.push(Box::new(webhook));
        }
        if let Some(email) = EmailNotifier::from_env() {
            channels.push(Box::new(email));
        }
        Self { channels }
    }

    pub fn with_channels(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn notify(&self, digest: &Digest) {
        for ch in &self.channels {
            if let Err(e) = ch.send(digest).await {
                tracing::warn!(error = ?e, channel = ch.name(), "digest delivery failed");
            }
        }
    }
}

/// Fresh items published within the window, newest first.
pub fn collect_fresh(
    records: Vec<StoredArticle>,
    window_hours: i64,
    now: DateTime<Utc>,
) -> Vec<StoredArticle> {
    let cutoff = now - TimeDelta::hours(window_hours);
    let mut items: Vec<StoredArticle> = records
        .into_iter()
        .filter(|r| r.status == Some(Status::Fresh))
        .filter(|r| {
            r.published
                .as_deref()
                .and_then(parse_published)
                .is_some_and(|dt| dt >= cutoff)
        })
        .collect();
    items.sort_by(|a, b| b.published.cmp(&a.published));
    items
}

fn humanize_since(published: &str, now: DateTime<Utc>) -> String {
    let Some(dt) = parse_published(published) else {
        return String::new();
    };
    let mins = now.signed_duration_since(dt).num_minutes();
    if mins < 1 {
        return "now".to_string();
    }
    if mins < 60 {
        return format!("{mins} min ago");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours} h ago");
    }
    format!("{} d ago", hours / 24)
}

fn host_from_link(link: &str) -> String {
    link.split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(link)
        .split(['/', '?'])
        .next()
        .unwrap_or("")
        .trim_start_matches("www.")
        .to_string()
}

fn sentiment_chip(sentiment: &str) -> &'static str {
    let s = sentiment.trim().to_ascii_lowercase();
    if s.starts_with("pos") {
        "<span style='display:inline-block;background:#D1E7DD;color:#0F5132;border-radius:12px;padding:2px 8px;font-size:12px'>Positive</span>"
    } else if s.starts_with("neg") {
        "<span style='display:inline-block;background:#F8D7DA;color:#842029;border-radius:12px;padding:2px 8px;font-size:12px'>Negative</span>"
    } else {
        "<span style='display:inline-block;background:#E9ECEF;color:#495057;border-radius:12px;padding:2px 8px;font-size:12px'>Neutral</span>"
    }
}

/// Inline-styled HTML digest grouped by (topic, region), mail-client safe.
pub fn render_digest_html(digest: &Digest) -> String {
    use std::collections::BTreeMap;

    if digest.items.is_empty() {
        return "<p style='font-family:Segoe UI,Arial,sans-serif;font-size:14px'>No fresh news in the window.</p>".to_string();
    }

    let mut groups: BTreeMap<(String, String), Vec<&StoredArticle>> = BTreeMap::new();
    for item in &digest.items {
        let topic = item.topic.clone();
        let region = item
            .region
            .clone()
            .unwrap_or_else(|| "GLOBAL".to_string())
            .to_uppercase();
        groups.entry((topic, region)).or_default().push(item);
    }

    let mut html = String::new();
    html.push_str("<div style='font-family:Segoe UI,Arial,sans-serif;font-size:14px;color:#212529'>");
    html.push_str(&format!(
        "<h2 style='margin:0 0 12px'>News Tracker — Fresh (last {}h)</h2>\
         <div style='margin:0 0 12px;color:#6c757d'>Total: {} item(s)</div>",
        digest.window_hours,
        digest.items.len()
    ));

    for ((topic, region), items) in &groups {
        let shown = &items[..items.len().min(MAX_PER_TOPIC)];
        let extra = items.len() - shown.len();

        html.push_str(&format!(
            "<h3 style='margin:18px 0 6px;border-top:1px solid #dee2e6;padding-top:10px'>{} — {} \
             <span style='color:#6c757d;font-weight:normal'>({})</span></h3>",
            html_escape::encode_text(region),
            html_escape::encode_text(topic),
            items.len()
        ));
        html.push_str(
            "<table role='presentation' cellspacing='0' cellpadding='0' border='0' \
             style='width:100%;border-collapse:collapse;margin:0 0 8px'>",
        );

        for item in shown {
            let title = html_escape::encode_text(&item.title);
            let link = html_escape::encode_double_quoted_attribute(&item.link);
            let host = host_from_link(&item.link);
            let since = item
                .published
                .as_deref()
                .map(|p| humanize_since(p, digest.generated_at))
                .unwrap_or_default();
            let chip = item
                .sentiment
                .as_deref()
                .map(sentiment_chip)
                .unwrap_or_default();

            let mut meta = html_escape::encode_text(&item.source).to_string();
            for part in [host.as_str(), chip, since.as_str()] {
                if !part.is_empty() {
                    meta.push_str(" — ");
                    meta.push_str(part);
                }
            }

            html.push_str(&format!(
                "<tr><td valign='top' style='width:18px;padding:6px 6px 6px 0'>•</td>\
                 <td valign='top' style='padding:6px 0'>\
                 <div style='margin:0 0 2px'><a href=\"{link}\" style='color:#0d6efd;text-decoration:none'>{title}</a></div>\
                 <div style='font-size:12px;color:#6c757d'>{meta}</div>\
                 </td></tr>"
            ));
        }
        html.push_str("</table>");
        if extra > 0 {
            html.push_str(&format!(
                "<div style='font-size:12px;color:#6c757d;margin:-4px 0 8px'>+{extra} more item(s)…</div>"
            ));
        }
    }

    html.push_str("</div>");
    html
}

/// Compact plain-text lines for webhook cards (payload limits apply).
pub fn render_digest_lines(digest: &Digest, cap: usize) -> Vec<String> {
    digest
        .items
        .iter()
        .take(cap)
        .map(|item| {
            let line = format!("- [F] {} ({})", item.title, item.source);
            line.chars().take(180).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn record(title: &str, status: Status, published: Option<DateTime<Utc>>) -> StoredArticle {
        StoredArticle {
            link: format!("https://example.com/{}", title.replace(' ', "-")),
            title: title.to_string(),
            source: "Wire".to_string(),
            published: published.map(|dt| dt.to_rfc3339()),
            region: Some("US".to_string()),
            summary: None,
            topic: "Markets".to_string(),
            status: Some(status),
            fetched_at: None,
            sentiment: None,
            probabilities: None,
        }
    }

    #[test]
    fn collect_fresh_filters_status_and_window() {
        let now = Utc::now();
        let records = vec![
            record("inside window", Status::Fresh, Some(now - TimeDelta::minutes(20))),
            record("wrong status", Status::New, Some(now - TimeDelta::minutes(20))),
            record("too old", Status::Fresh, Some(now - TimeDelta::hours(3))),
            record("undated", Status::Fresh, None),
        ];
        let out = collect_fresh(records, 2, now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "inside window");
    }

    #[test]
    fn digest_html_groups_and_links() {
        let now = Utc::now();
        let digest = Digest {
            window_hours: 2,
            generated_at: now,
            items: vec![record(
                "Oil prices rise",
                Status::Fresh,
                Some(now - TimeDelta::minutes(10)),
            )],
        };
        let html = render_digest_html(&digest);
        assert!(html.contains("US — Markets"));
        assert!(html.contains("Oil prices rise"));
        assert!(html.contains("min ago"));
    }

    #[test]
    fn empty_digest_renders_placeholder() {
        let digest = Digest {
            window_hours: 2,
            generated_at: Utc::now(),
            items: vec![],
        };
        assert!(render_digest_html(&digest).contains("No fresh news"));
    }

    #[test]
    fn host_extraction_handles_paths_and_www() {
        assert_eq!(host_from_link("https://www.example.com/a/b?x=1"), "example.com");
        assert_eq!(host_from_link("example.org/path"), "example.org");
    }

    #[test]
    fn relative_times_humanize() {
        let now = Utc::now();
        let at = |d: TimeDelta| (now - d).to_rfc3339();
        assert_eq!(humanize_since(&at(TimeDelta::seconds(10)), now), "now");
        assert_eq!(humanize_since(&at(TimeDelta::minutes(5)), now), "5 min ago");
        assert_eq!(humanize_since(&at(TimeDelta::hours(3)), now), "3 h ago");
        assert_eq!(humanize_since(&at(TimeDelta::days(2)), now), "2 d ago");
    }
}
