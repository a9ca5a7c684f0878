use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::VK_DEFAULT_API_VERSION;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

pub const TWITCH_CLIENT_ID_VAR: &str = "TWITCH_CLIENT_ID";
pub const TWITCH_CLIENT_SECRET_VAR: &str = "TWITCH_CLIENT_SECRET";
pub const TWITCH_STREAMER_LOGIN_VAR: &str = "TWITCH_STREAMER_LOGIN";
pub const TELEGRAM_BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHANNEL_ID_VAR: &str = "TELEGRAM_CHANNEL_ID";
pub const VK_GROUP_ID_VAR: &str = "VK_GROUP_ID";
pub const VK_ACCESS_TOKEN_VAR: &str = "VK_ACCESS_TOKEN";
pub const VK_API_VERSION_VAR: &str = "VK_API_VERSION";

/// Environment variables that must be set before the poller can start.
pub const REQUIRED_VARS: [&str; 5] = [
    TWITCH_CLIENT_ID_VAR,
    TWITCH_CLIENT_SECRET_VAR,
    TWITCH_STREAMER_LOGIN_VAR,
    TELEGRAM_BOT_TOKEN_VAR,
    TELEGRAM_CHANNEL_ID_VAR,
];

/// Default announcement template.
pub const DEFAULT_MESSAGE_TEMPLATE: &str =
    "🎥 {streamer} started streaming!\n\n{title}\n\nJoin: {url}";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Sleep between status checks, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minimum time between two successful posts, in seconds.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Per-request HTTP timeout, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Safety margin below the Telegram 4096-character limit.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    /// Announcement template. See `message::render` for placeholders.
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_cooldown() -> u64 {
    300
}

fn default_http_timeout() -> u64 {
    30
}

fn default_max_message_chars() -> usize {
    4000
}

fn default_message_template() -> String {
    DEFAULT_MESSAGE_TEMPLATE.to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            cooldown_secs: default_cooldown(),
            http_timeout_secs: default_http_timeout(),
            max_message_chars: default_max_message_chars(),
            message_template: default_message_template(),
        }
    }
}

impl SettingsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Saturates at `chrono::Duration::MAX`; `AppConfig::parse` rejects such values.
    pub fn cooldown(&self) -> chrono::Duration {
        cooldown_from_secs(self.cooldown_secs).unwrap_or(chrono::Duration::MAX)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn cooldown_from_secs(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        if config.settings.poll_interval_secs == 0 {
            bail!("settings.poll_interval_secs must be positive");
        }
        if cooldown_from_secs(config.settings.cooldown_secs).is_none() {
            bail!(
                "settings.cooldown_secs is out of range: {}",
                config.settings.cooldown_secs
            );
        }
        if config.settings.http_timeout_secs == 0 {
            bail!("settings.http_timeout_secs must be positive");
        }
        if config.settings.max_message_chars < 4 {
            bail!("settings.max_message_chars must be at least 4");
        }
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Twitch application credentials and the watched channel.
#[derive(Clone)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub streamer_login: String,
}

/// Telegram bot token and destination chat.
#[derive(Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

/// VK community wall credentials.
#[derive(Clone)]
pub struct VkCredentials {
    /// Community id without the leading minus sign.
    pub group_id: String,
    pub access_token: String,
    pub api_version: String,
}

/// All credentials read from the process environment.
#[derive(Clone)]
pub struct Credentials {
    pub twitch: TwitchCredentials,
    pub telegram: TelegramCredentials,
    /// `None` when VK is not configured.
    pub vk: Option<VkCredentials>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`. Blank values count as unset.
    ///
    /// Fails listing every missing mandatory variable. VK is only enabled when
    /// both `VK_GROUP_ID` and `VK_ACCESS_TOKEN` are present.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing = missing_vars(&get);
        if !missing.is_empty() {
            bail!(
                "missing required environment variable(s): {}",
                missing.join(", ")
            );
        }
        let require = |key: &str| get(key).with_context(|| format!("{key} not set"));

        let twitch = TwitchCredentials {
            client_id: require(TWITCH_CLIENT_ID_VAR)?,
            client_secret: require(TWITCH_CLIENT_SECRET_VAR)?,
            streamer_login: require(TWITCH_STREAMER_LOGIN_VAR)?.to_lowercase(),
        };
        let telegram = TelegramCredentials {
            bot_token: require(TELEGRAM_BOT_TOKEN_VAR)?,
            chat_id: require(TELEGRAM_CHANNEL_ID_VAR)?,
        };

        let vk = match (get(VK_GROUP_ID_VAR), get(VK_ACCESS_TOKEN_VAR)) {
            (Some(group_id), Some(access_token)) => Some(VkCredentials {
                group_id: group_id.trim_start_matches('-').to_string(),
                access_token,
                api_version: get(VK_API_VERSION_VAR)
                    .unwrap_or_else(|| VK_DEFAULT_API_VERSION.to_string()),
            }),
            (None, None) => None,
            _ => {
                warn!("Only one of {VK_GROUP_ID_VAR}/{VK_ACCESS_TOKEN_VAR} is set; VK posting disabled");
                None
            }
        };

        Ok(Self {
            twitch,
            telegram,
            vk,
        })
    }
}

/// Mandatory variables absent (or blank) in the given lookup.
pub fn missing_vars(get: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|key| get(*key).is_none())
        .collect()
}

/// Shorten a secret for display: first 8 characters followed by `...`.
pub fn redact(secret: &str) -> String {
    let head: String = secret.chars().take(8).collect();
    format!("{head}...")
}
