pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod message;
pub mod monitor;
pub mod notifier;
pub mod poller;
pub mod reporter;
pub mod state;
pub mod telegram;
pub mod types;
pub mod vk;

/// Twitch OAuth token endpoint (client credentials flow)
pub const TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Twitch Helix REST API base URL
pub const TWITCH_API_BASE: &str = "https://api.twitch.tv/helix";

/// Public channel page, `{login}` appended
pub const TWITCH_CHANNEL_BASE: &str = "https://twitch.tv";

/// Telegram Bot API base URL. Append `/bot<token>/<method>`
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// VK API base URL. Append `/<method>`
pub const VK_API_BASE: &str = "https://api.vk.com/method";

/// VK API version used when `VK_API_VERSION` is unset
pub const VK_DEFAULT_API_VERSION: &str = "5.131";
