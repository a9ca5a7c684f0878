//! Telegram Bot API client.
//!
//! Posting goes through `sendMessage`; the remaining methods back the
//! `probe-telegram` and `find-chat-id` diagnostics.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::TELEGRAM_API_BASE;
use crate::config::TelegramCredentials;
use crate::message::Announcement;
use crate::notifier::{DeliveryError, ParseMode, Platform};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// Map a non-OK envelope to a [`DeliveryError`].
    pub fn into_result(self) -> Result<T, DeliveryError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| DeliveryError::Decode("ok response without result".to_string()));
        }
        let code = self.error_code.unwrap_or_default();
        let description = self
            .description
            .unwrap_or_else(|| "no description".to_string());
        if code == 400 && is_entity_error(&description) {
            Err(DeliveryError::Formatting(description))
        } else {
            Err(DeliveryError::Api { code, description })
        }
    }
}

/// Whether a 400 description means the HTML markup could not be parsed.
pub fn is_entity_error(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("can't parse entities")
        || lower.contains("unsupported start tag")
        || lower.contains("can't find end tag")
        || lower.contains("unexpected end tag")
}

/// Human hint for common `sendMessage`/`getChat` error descriptions.
pub fn diagnose(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    if lower.contains("chat not found") {
        Some("wrong chat id, or the bot was never added to the chat")
    } else if lower.contains("bot was blocked") {
        Some("the user blocked the bot")
    } else if lower.contains("not enough rights") || lower.contains("forbidden") {
        Some("the bot lacks permission to post; make it a channel administrator")
    } else if lower.contains("chat_id") {
        Some("malformed chat id; use @channelname or the numeric -100... id")
    } else {
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub can_join_groups: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Chat {
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.first_name.as_deref())
            .or(self.username.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    #[serde(default)]
    pub can_post_messages: Option<bool>,
    #[serde(default)]
    pub can_edit_messages: Option<bool>,
    #[serde(default)]
    pub can_delete_messages: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessage {
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<UpdateMessage>,
    #[serde(default)]
    pub channel_post: Option<UpdateMessage>,
    #[serde(default)]
    pub my_chat_member: Option<UpdateMessage>,
}

impl Update {
    /// The chat this update originated from, whatever its kind.
    pub fn chat(&self) -> Option<&Chat> {
        self.message
            .as_ref()
            .or(self.channel_post.as_ref())
            .or(self.my_chat_member.as_ref())
            .map(|m| &m.chat)
    }
}

/// Bot API client bound to one bot token and one destination chat.
pub struct TelegramClient {
    http: Client,
    creds: TelegramCredentials,
}

impl TelegramClient {
    pub fn new(http: Client, creds: TelegramCredentials) -> Self {
        Self { http, creds }
    }

    pub fn chat_id(&self) -> &str {
        &self.creds.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{TELEGRAM_API_BASE}/bot{}/{method}", self.creds.bot_token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
    ) -> Result<T, DeliveryError> {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Decode(format!("{method} ({status}): {e}")))?;
        debug!("Telegram {method} -> {status}");
        envelope.into_result()
    }

    /// `sendMessage` to the configured chat. `parse_mode` of `None` sends plain text.
    pub async fn send_message(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<SentMessage, DeliveryError> {
        let mut payload = json!({
            "chat_id": self.creds.chat_id,
            "text": text,
            "disable_web_page_preview": false,
        });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = json!(mode);
        }
        self.call("sendMessage", &payload).await
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<bool, DeliveryError> {
        self.call(
            "deleteMessage",
            &json!({ "chat_id": self.creds.chat_id, "message_id": message_id }),
        )
        .await
    }

    pub async fn get_me(&self) -> Result<BotUser, DeliveryError> {
        self.call("getMe", &json!({})).await
    }

    /// `getChat` for an arbitrary chat id (not necessarily the configured one).
    pub async fn get_chat(&self, chat_id: &str) -> Result<Chat, DeliveryError> {
        self.call("getChat", &json!({ "chat_id": chat_id })).await
    }

    pub async fn get_chat_member(&self, user_id: i64) -> Result<ChatMember, DeliveryError> {
        self.call(
            "getChatMember",
            &json!({ "chat_id": self.creds.chat_id, "user_id": user_id }),
        )
        .await
    }

    pub async fn get_updates(&self) -> Result<Vec<Update>, DeliveryError> {
        self.call("getUpdates", &json!({})).await
    }
}

#[async_trait]
impl Platform for TelegramClient {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(
        &self,
        announcement: &Announcement,
        mode: ParseMode,
    ) -> Result<(), DeliveryError> {
        let sent = match mode {
            ParseMode::Html => self.send_message(&announcement.html, Some("HTML")).await?,
            ParseMode::Plain => self.send_message(&announcement.plain, None).await?,
        };
        debug!("Telegram message {} posted to {}", sent.message_id, self.creds.chat_id);
        Ok(())
    }
}
