use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::TWITCH_AUTH_URL;
use crate::config::TwitchCredentials;

/// Refresh this long before Twitch says the token expires.
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Used when the token response omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Twitch app access token obtained through the client credentials flow.
#[derive(Clone)]
pub struct AppToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AppToken {
    pub fn new(access_token: String, expires_in_secs: i64, now: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at: now + Duration::seconds(expires_in_secs),
        }
    }

    /// Whether the token should be replaced before the next request.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// Request a new app access token.
pub async fn authenticate(http: &Client, creds: &TwitchCredentials) -> Result<AppToken> {
    let resp = http
        .post(TWITCH_AUTH_URL)
        .form(&[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .context("Twitch token request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Twitch token request rejected: {status} {body}");
    }

    let token: TokenResponse = resp
        .json()
        .await
        .context("failed to decode Twitch token response")?;
    let lifetime = token.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
    debug!("Obtained Twitch app token (expires in {lifetime}s)");
    Ok(AppToken::new(token.access_token, lifetime, Utc::now()))
}
