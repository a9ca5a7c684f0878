use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::VK_API_BASE;
use crate::config::VkCredentials;
use crate::message::Announcement;
use crate::notifier::{DeliveryError, ParseMode, Platform};

/// VK answers HTTP 200 with either `response` or `error`.
#[derive(Debug, Deserialize)]
pub struct VkResponse<T> {
    pub response: Option<T>,
    pub error: Option<VkApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VkApiError {
    pub error_code: i64,
    pub error_msg: String,
}

impl<T> VkResponse<T> {
    pub fn into_result(self) -> Result<T, DeliveryError> {
        match (self.response, self.error) {
            (_, Some(err)) => Err(DeliveryError::Api {
                code: err.error_code,
                description: err.error_msg,
            }),
            (Some(response), None) => Ok(response),
            (None, None) => Err(DeliveryError::Decode(
                "response without `response` or `error`".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WallPost {
    pub post_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VkGroup {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub screen_name: String,
}

/// `groups.getById` returns a bare array up to 5.131 and `{"groups": [...]}` after.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupsById {
    List(Vec<VkGroup>),
    Wrapped { groups: Vec<VkGroup> },
}

impl GroupsById {
    fn into_first(self) -> Option<VkGroup> {
        match self {
            Self::List(groups) | Self::Wrapped { groups } => groups.into_iter().next(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VkUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// Client for posting to a community wall.
pub struct VkClient {
    http: Client,
    creds: VkCredentials,
}

impl VkClient {
    pub fn new(http: Client, creds: VkCredentials) -> Self {
        Self { http, creds }
    }

    pub fn group_id(&self) -> &str {
        &self.creds.group_id
    }

    /// Community walls are addressed by the negated group id.
    fn owner_id(&self) -> String {
        format!("-{}", self.creds.group_id)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, DeliveryError> {
        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("access_token", self.creds.access_token.clone()));
        form.push(("v", self.creds.api_version.clone()));

        let resp = self
            .http
            .post(format!("{VK_API_BASE}/{method}"))
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Api {
                code: i64::from(status.as_u16()),
                description: format!("HTTP {status} from {method}"),
            });
        }
        let envelope: VkResponse<T> = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Decode(format!("{method}: {e}")))?;
        debug!("VK {method} -> {status}");
        envelope.into_result()
    }

    pub async fn wall_post(&self, message: &str) -> Result<WallPost, DeliveryError> {
        self.call(
            "wall.post",
            &[
                ("owner_id", self.owner_id()),
                ("from_group", "1".to_string()),
                ("message", message.to_string()),
            ],
        )
        .await
    }

    pub async fn wall_delete(&self, post_id: i64) -> Result<i64, DeliveryError> {
        self.call(
            "wall.delete",
            &[("owner_id", self.owner_id()), ("post_id", post_id.to_string())],
        )
        .await
    }

    pub async fn group(&self) -> Result<VkGroup, DeliveryError> {
        let groups: GroupsById = self
            .call("groups.getById", &[("group_id", self.creds.group_id.clone())])
            .await?;
        groups
            .into_first()
            .ok_or_else(|| DeliveryError::Decode("groups.getById returned no group".to_string()))
    }

    /// Owner of the access token.
    pub async fn current_user(&self) -> Result<VkUser, DeliveryError> {
        let users: Vec<VkUser> = self.call("users.get", &[]).await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| DeliveryError::Decode("users.get returned no user".to_string()))
    }
}

#[async_trait]
impl Platform for VkClient {
    fn name(&self) -> &'static str {
        "vk"
    }

    fn supports_markup(&self) -> bool {
        false
    }

    async fn send(
        &self,
        announcement: &Announcement,
        _mode: ParseMode,
    ) -> Result<(), DeliveryError> {
        let post = self.wall_post(&announcement.plain).await?;
        debug!("VK wall post {} created on {}", post.post_id, self.owner_id());
        Ok(())
    }
}
