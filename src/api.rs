use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::TWITCH_API_BASE;
use crate::auth::{self, AppToken};
use crate::config::TwitchCredentials;
use crate::types::StreamInfo;

/// Upstream live-status collaborator for a single channel.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Login of the watched channel.
    fn channel(&self) -> &str;

    /// Current stream, or `None` when the channel is offline.
    async fn fetch_stream(&self) -> Result<Option<StreamInfo>>;
}

/// Helix responses wrap results in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
}

/// Subset of a Helix user record.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub broadcaster_type: String,
    #[serde(default)]
    pub description: String,
}

/// Helix client authenticated with a cached app token.
pub struct TwitchClient {
    http: Client,
    creds: TwitchCredentials,
    token: Mutex<Option<AppToken>>,
}

impl TwitchClient {
    pub fn new(http: Client, creds: TwitchCredentials) -> Self {
        Self {
            http,
            creds,
            token: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, requesting a new one when absent or expired.
    pub async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.access_token.clone());
            }
            debug!("Twitch app token expired, refreshing");
        }
        let fresh = auth::authenticate(&self.http, &self.creds).await?;
        let access = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// GET a Helix endpoint. A 401 drops the cached token and retries once.
    async fn helix_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = format!("{TWITCH_API_BASE}/{path}");
        let mut reauthenticated = false;

        loop {
            let bearer = self.bearer().await?;
            let resp = self
                .http
                .get(&url)
                .header("Client-ID", &self.creds.client_id)
                .bearer_auth(&bearer)
                .query(query)
                .send()
                .await
                .with_context(|| format!("Helix {path} request failed"))?;

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                warn!("Helix {path} returned 401, requesting a new app token");
                self.invalidate_token().await;
                reauthenticated = true;
                continue;
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                bail!("Helix {path} failed: {status} {body}");
            }

            let page: HelixPage<T> = resp
                .json()
                .await
                .with_context(|| format!("failed to decode Helix {path} response"))?;
            return Ok(page.data);
        }
    }

    /// Fetch the live stream for `login`, if any.
    pub async fn stream_for(&self, login: &str) -> Result<Option<StreamInfo>> {
        let streams: Vec<StreamInfo> = self.helix_get("streams", &[("user_login", login)]).await?;
        debug!("Helix returned {} stream(s) for {login}", streams.len());
        Ok(streams.into_iter().next())
    }

    /// Look up a user by login.
    pub async fn user_for(&self, login: &str) -> Result<Option<TwitchUser>> {
        let users: Vec<TwitchUser> = self.helix_get("users", &[("login", login)]).await?;
        Ok(users.into_iter().next())
    }
}

#[async_trait]
impl StatusSource for TwitchClient {
    fn channel(&self) -> &str {
        &self.creds.streamer_login
    }

    async fn fetch_stream(&self) -> Result<Option<StreamInfo>> {
        self.stream_for(&self.creds.streamer_login).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_live_streams_page() {
        let body = r#"{
            "data": [{
                "id": "40952121085",
                "user_id": "101051819",
                "user_login": "afro",
                "user_name": "Afro",
                "game_id": "32982",
                "game_name": "Grand Theft Auto V",
                "type": "live",
                "title": "Jacob: Digital Den Laptops & Tablets",
                "viewer_count": 1490,
                "started_at": "2021-03-10T03:18:11Z",
                "language": "en",
                "tags": ["English"],
                "is_mature": false
            }],
            "pagination": {}
        }"#;
        let page: HelixPage<StreamInfo> = serde_json::from_str(body).unwrap();
        assert_eq!(page.data.len(), 1);
        let stream = &page.data[0];
        assert_eq!(stream.user_login, "afro");
        assert_eq!(stream.game_name.as_deref(), Some("Grand Theft Auto V"));
        assert_eq!(stream.viewer_count, Some(1490));
        assert!(stream.started_at.is_some());
    }

    #[test]
    fn decode_offline_streams_page() {
        let page: HelixPage<StreamInfo> =
            serde_json::from_str(r#"{"data": [], "pagination": {}}"#).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn decode_stream_with_blank_game() {
        let body = r#"{"data": [{"user_login": "x", "title": "t", "game_name": ""}]}"#;
        let page: HelixPage<StreamInfo> = serde_json::from_str(body).unwrap();
        assert!(page.data[0].game_name.is_none());
        assert!(page.data[0].viewer_count.is_none());
    }

    #[test]
    fn decode_user_page() {
        let body = r#"{"data": [{
            "id": "141981764",
            "login": "twitchdev",
            "display_name": "TwitchDev",
            "type": "",
            "broadcaster_type": "partner",
            "description": "Supporting third-party developers",
            "created_at": "2016-12-14T20:32:28Z"
        }]}"#;
        let page: HelixPage<TwitchUser> = serde_json::from_str(body).unwrap();
        assert_eq!(page.data[0].display_name, "TwitchDev");
        assert_eq!(page.data[0].broadcaster_type, "partner");
    }
}
