//! Freshness tiers for stored articles.
//!
//! Status is never stored as a forward-driven state machine; it is a pure
//! function of `(published, now)` recomputed on every read path, so a record
//! can only age toward `old` as the clock advances.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Freshness tier of an article relative to its publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Old,
    New,
    Fresh,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Old => "old",
            Status::New => "new",
            Status::Fresh => "fresh",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "old" => Ok(Status::Old),
            "new" => Ok(Status::New),
            "fresh" => Ok(Status::Fresh),
            _ => Err(()),
        }
    }
}

const FRESH_WINDOW_MINS: i64 = 30;
const NEW_WINDOW_HOURS: i64 = 6;

/// Parse an ISO-8601 timestamp; naive values are taken as UTC.
pub fn parse_published(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    // Fallback for "YYYY-MM-DDTHH:MM:SS" without an offset.
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Classify a publish timestamp against `now`.
///
/// Missing or unparsable timestamps are `old`: an undated article cannot be
/// proven recent, so it is served in the least urgent tier.
pub fn classify(published: Option<&str>, now: DateTime<Utc>) -> Status {
    let Some(ts) = published else {
        return Status::Old;
    };
    let Some(pub_dt) = parse_published(ts) else {
        return Status::Old;
    };

    let delta = now.signed_duration_since(pub_dt);
    if delta <= TimeDelta::minutes(FRESH_WINDOW_MINS) {
        Status::Fresh
    } else if delta <= TimeDelta::hours(NEW_WINDOW_HOURS) {
        Status::New
    } else {
        Status::Old
    }
}
