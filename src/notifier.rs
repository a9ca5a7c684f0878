use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::message::{self, Announcement};
use crate::types::{DeliveryReport, StreamInfo};

/// How a platform should interpret the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Plain,
}

/// Why a platform did not accept a message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The platform could not parse the markup. Worth one plain-text retry.
    #[error("message formatting rejected: {0}")]
    Formatting(String),
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl DeliveryError {
    pub fn is_formatting(&self) -> bool {
        matches!(self, Self::Formatting(_))
    }
}

/// A destination announcements are posted to.
#[async_trait]
pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether [`ParseMode::Html`] is understood. Plain-only platforms
    /// receive [`Announcement::plain`] on the first attempt.
    fn supports_markup(&self) -> bool {
        true
    }

    async fn send(
        &self,
        announcement: &Announcement,
        mode: ParseMode,
    ) -> Result<(), DeliveryError>;
}

/// Template and length limit applied to every announcement.
#[derive(Debug, Clone)]
pub struct MessageSettings {
    pub template: String,
    pub max_chars: usize,
}

/// Fans an announcement out to every configured platform.
///
/// Each platform is attempted independently: an error (or panic) on one never
/// prevents or undoes delivery on another.
pub struct Notifier {
    platforms: Vec<Box<dyn Platform>>,
    settings: MessageSettings,
}

impl Notifier {
    pub fn new(settings: MessageSettings) -> Self {
        Self {
            platforms: Vec::new(),
            settings,
        }
    }

    pub fn with_platform(mut self, platform: Box<dyn Platform>) -> Self {
        self.platforms.push(platform);
        self
    }

    pub fn platform_names(&self) -> Vec<&'static str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }

    pub fn build_announcement(&self, info: &StreamInfo, channel: &str) -> Announcement {
        message::build(
            &self.settings.template,
            info,
            channel,
            self.settings.max_chars,
        )
    }

    /// Format an announcement for `info` and deliver it everywhere.
    pub async fn notify(&self, info: &StreamInfo, channel: &str) -> Vec<DeliveryReport> {
        let announcement = self.build_announcement(info, channel);
        self.deliver_all(&announcement).await
    }

    pub async fn deliver_all(&self, announcement: &Announcement) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(self.platforms.len());
        for platform in &self.platforms {
            let name = platform.name();
            let report = match AssertUnwindSafe(deliver(platform.as_ref(), announcement))
                .catch_unwind()
                .await
            {
                Ok(report) => report,
                Err(_) => {
                    error!("{name}: delivery panicked");
                    failed(name, "delivery panicked".to_string())
                }
            };
            reports.push(report);
        }
        reports
    }
}

/// Deliver to one platform, retrying once without markup on a formatting rejection.
async fn deliver(platform: &dyn Platform, announcement: &Announcement) -> DeliveryReport {
    let name = platform.name();
    let mode = if platform.supports_markup() {
        ParseMode::Html
    } else {
        ParseMode::Plain
    };

    match platform.send(announcement, mode).await {
        Ok(()) => {
            info!("{name}: announcement posted");
            delivered(name, false)
        }
        Err(e) if e.is_formatting() && mode == ParseMode::Html => {
            warn!("{name}: {e}; retrying without formatting");
            match platform.send(announcement, ParseMode::Plain).await {
                Ok(()) => {
                    info!("{name}: announcement posted without formatting");
                    delivered(name, true)
                }
                Err(retry_err) => {
                    error!("{name}: plain retry failed: {retry_err}");
                    failed(name, retry_err.to_string())
                }
            }
        }
        Err(e) => {
            error!("{name}: {e}");
            failed(name, e.to_string())
        }
    }
}

fn delivered(platform: &str, plain_fallback: bool) -> DeliveryReport {
    DeliveryReport {
        platform: platform.to_string(),
        delivered: true,
        plain_fallback,
        error: None,
    }
}

fn failed(platform: &str, error: String) -> DeliveryReport {
    DeliveryReport {
        platform: platform.to_string(),
        delivered: false,
        plain_fallback: false,
        error: Some(error),
    }
}
