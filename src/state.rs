use chrono::{DateTime, Duration, Utc};

use crate::types::ExitSummary;

/// Live-status state owned by the polling loop, plus run counters.
///
/// Lives only for the process lifetime; nothing is persisted.
#[derive(Debug, Clone)]
pub struct PollerState {
    /// Last confirmed status. Never changed by a failed check.
    pub is_live: bool,
    /// Time of the last post that reached at least one platform.
    pub last_post_time: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub checks: u64,
    pub failed_checks: u64,
    pub posts: u64,
    pub skipped_posts: u64,
}

impl PollerState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            is_live: false,
            last_post_time: None,
            started_at: now,
            checks: 0,
            failed_checks: 0,
            posts: 0,
            skipped_posts: 0,
        }
    }

    /// Whether `now` falls inside the cooldown window of the last successful post.
    pub fn in_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_post_time
            .is_some_and(|last| now.signed_duration_since(last) < cooldown)
    }

    /// Record a post accepted by at least one platform.
    pub fn record_post(&mut self, now: DateTime<Utc>) {
        self.last_post_time = Some(now);
        self.posts += 1;
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.started_at)
    }

    pub fn exit_summary(&self, streamer: &str, now: DateTime<Utc>) -> ExitSummary {
        ExitSummary {
            streamer: streamer.to_string(),
            started_at: self.started_at.to_rfc3339(),
            uptime_secs: self.uptime(now).num_seconds(),
            total_checks: self.checks,
            failed_checks: self.failed_checks,
            total_posts: self.posts,
            skipped_posts: self.skipped_posts,
            last_seen_live: self.is_live,
            last_post_time: self.last_post_time.map(|t| t.to_rfc3339()),
        }
    }
}
