//! Logging decorators for the poller's collaborators.
//!
//! `Monitored<T>` wraps any [`StatusSource`] or [`Platform`] and logs each call
//! and its outcome before handing the result back unchanged.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::api::StatusSource;
use crate::message::Announcement;
use crate::notifier::{DeliveryError, ParseMode, Platform};
use crate::types::StreamInfo;

pub struct Monitored<T> {
    inner: T,
}

impl<T> Monitored<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

/// Box a status source, wrapped in [`Monitored`] when `enabled`.
pub fn status_source<S: StatusSource + 'static>(
    source: S,
    enabled: bool,
) -> Box<dyn StatusSource> {
    if enabled {
        Box::new(Monitored::new(source))
    } else {
        Box::new(source)
    }
}

/// Box a platform, wrapped in [`Monitored`] when `enabled`.
pub fn platform<P: Platform + 'static>(platform: P, enabled: bool) -> Box<dyn Platform> {
    if enabled {
        Box::new(Monitored::new(platform))
    } else {
        Box::new(platform)
    }
}

#[async_trait]
impl<T: StatusSource> StatusSource for Monitored<T> {
    fn channel(&self) -> &str {
        self.inner.channel()
    }

    async fn fetch_stream(&self) -> Result<Option<StreamInfo>> {
        let channel = self.inner.channel();
        debug!("Checking stream status for {channel}...");
        let started = Instant::now();
        let result = self.inner.fetch_stream().await;
        let elapsed = started.elapsed();

        match &result {
            Ok(Some(stream)) => info!(
                "{channel} is live: \"{}\" ({} viewers, {elapsed:?})",
                stream.title,
                stream.viewer_count.unwrap_or(0)
            ),
            Ok(None) => debug!("{channel} is offline ({elapsed:?})"),
            Err(e) => error!("Status check for {channel} failed after {elapsed:?}: {e:#}"),
        }
        result
    }
}

#[async_trait]
impl<T: Platform> Platform for Monitored<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn supports_markup(&self) -> bool {
        self.inner.supports_markup()
    }

    async fn send(
        &self,
        announcement: &Announcement,
        mode: ParseMode,
    ) -> Result<(), DeliveryError> {
        let name = self.inner.name();
        info!("Sending announcement to {name} ({mode:?})...");
        let started = Instant::now();
        let result = self.inner.send(announcement, mode).await;
        match &result {
            Ok(()) => info!("{name} accepted the announcement in {:?}", started.elapsed()),
            Err(e) => error!("{name} rejected the announcement: {e}"),
        }
        result
    }
}
