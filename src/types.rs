use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live stream as reported by Helix `GET /streams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub id: String,
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub game_name: Option<String>,
    #[serde(default)]
    pub viewer_count: Option<u64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Result of delivering one announcement to one platform.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub platform: String,
    pub delivered: bool,
    /// Delivered only after retrying without formatting.
    pub plain_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a single poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Status check failed; state left untouched.
    Unknown,
    StillOffline,
    /// Offline → live and at least one platform accepted the post.
    Posted,
    /// Offline → live but every platform failed.
    PostFailed,
    /// Offline → live inside the cooldown window.
    CooldownSkipped,
    StillLive,
    WentOffline,
}

/// Emitted to stdout for every rising edge that reached the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct PostEvent {
    pub timestamp: String,
    pub streamer: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    pub deliveries: Vec<DeliveryReport>,
}

/// Printed once on shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct ExitSummary {
    pub streamer: String,
    pub started_at: String,
    pub uptime_secs: i64,
    pub total_checks: u64,
    pub failed_checks: u64,
    pub total_posts: u64,
    pub skipped_posts: u64,
    pub last_seen_live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_post_time: Option<String>,
}
