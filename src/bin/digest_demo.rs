//! Demo that renders the current fresh-news digest to stdout and pushes it
//! through the configured channels (stdout only when none are configured).

use chrono::Utc;
use news_tracker::notify::{collect_fresh, render_digest_html, Digest, NotifierMux};
use news_tracker::store::NewsStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let _ = dotenvy::dotenv();

    let db_path =
        std::env::var("NEWS_DB_PATH").unwrap_or_else(|_| "data/news_db.json".to_string());
    let window_hours: i64 = std::env::var("NEWS_DIGEST_WINDOW_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2);

    let store = NewsStore::new(&db_path);
    let now = Utc::now();
    let digest = Digest {
        window_hours,
        generated_at: now,
        items: collect_fresh(store.all_records(), window_hours, now),
    };

    println!("{}", render_digest_html(&digest));

    let mux = NotifierMux::from_env();
    if mux.is_empty() {
        println!("(no channels configured — set NOTIFY_WEBHOOK_URL or SMTP_* to send)");
    } else {
        mux.notify(&digest).await;
    }

    println!("digest-demo done ({} fresh item(s))", digest.items.len());
}
