use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tracing::{error, info, warn};

use crate::api::StatusSource;
use crate::engine::{self, Plan};
use crate::notifier::Notifier;
use crate::reporter;
use crate::state::PollerState;
use crate::types::{CycleOutcome, PostEvent};

/// Log a statistics line every this many checks in monitor mode.
pub const STATS_EVERY: u64 = 10;

/// Loop timing and behaviour.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Sleep between the end of one cycle and the start of the next.
    pub interval: Duration,
    pub cooldown: chrono::Duration,
    /// Log per-check counters and uptime.
    pub monitor: bool,
}

/// What one cycle did, plus the event to report when it reached the notifier.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub event: Option<PostEvent>,
}

impl CycleReport {
    fn quiet(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            event: None,
        }
    }
}

/// Whether the channel is live right now. A failed check reads as `false`.
pub async fn check_status(source: &dyn StatusSource) -> bool {
    match source.fetch_stream().await {
        Ok(stream) => stream.is_some(),
        Err(e) => {
            warn!("Status check for {} failed: {e:#}", source.channel());
            false
        }
    }
}

/// Run one poll cycle against `state`.
///
/// A failed status check is treated as unknown: `is_live` keeps its previous
/// value. On an offline → live edge outside the cooldown window every
/// platform is attempted; `last_post_time` only moves when at least one of
/// them accepted the post.
pub async fn poll_cycle(
    state: &mut PollerState,
    source: &dyn StatusSource,
    notifier: &Notifier,
    cooldown: chrono::Duration,
    now: DateTime<Utc>,
) -> CycleReport {
    state.checks += 1;

    let stream = match source.fetch_stream().await {
        Ok(stream) => stream,
        Err(e) => {
            state.failed_checks += 1;
            warn!(
                "Status check failed, keeping previous state (live={}): {e:#}",
                state.is_live
            );
            return CycleReport::quiet(CycleOutcome::Unknown);
        }
    };

    let observed_live = stream.is_some();
    let plan = engine::plan(state, observed_live, now, cooldown);
    state.is_live = observed_live;

    match (plan, stream) {
        (Plan::Announce, Some(info)) => {
            info!("Stream started: {}", info.title);
            let deliveries = notifier.notify(&info, source.channel()).await;
            let delivered = deliveries.iter().filter(|d| d.delivered).count();

            let outcome = if delivered > 0 {
                state.record_post(now);
                info!("Announcement delivered to {delivered}/{} platform(s)", deliveries.len());
                CycleOutcome::Posted
            } else {
                error!("Announcement failed on every platform");
                CycleOutcome::PostFailed
            };

            CycleReport {
                outcome,
                event: Some(PostEvent {
                    timestamp: now.to_rfc3339(),
                    streamer: source.channel().to_string(),
                    title: info.title,
                    game_name: info.game_name,
                    deliveries,
                }),
            }
        }
        (Plan::SkipCooldown, _) => {
            state.skipped_posts += 1;
            info!("Stream is live again within the cooldown window, skipping post");
            CycleReport::quiet(CycleOutcome::CooldownSkipped)
        }
        (Plan::StillLive, _) => CycleReport::quiet(CycleOutcome::StillLive),
        (Plan::WentOffline, _) => {
            info!("Stream ended");
            CycleReport::quiet(CycleOutcome::WentOffline)
        }
        _ => CycleReport::quiet(CycleOutcome::StillOffline),
    }
}

/// Poll until `shutdown` resolves.
///
/// Errors and panics inside a cycle are logged and the loop carries on after
/// the usual sleep. `shutdown` is only observed between cycles.
pub async fn run<F>(
    state: &mut PollerState,
    source: &dyn StatusSource,
    notifier: &Notifier,
    settings: &LoopSettings,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let now = Utc::now();
        let cycle = poll_cycle(state, source, notifier, settings.cooldown, now);
        match AssertUnwindSafe(cycle).catch_unwind().await {
            Ok(report) => {
                if let Some(event) = &report.event {
                    reporter::report_event(event);
                }
            }
            Err(panic) => error!("Poll cycle panicked: {}", panic_message(panic.as_ref())),
        }

        if settings.monitor {
            let uptime = state.uptime(Utc::now());
            info!(
                "Check #{} done (uptime {}s, live={})",
                state.checks,
                uptime.num_seconds(),
                state.is_live
            );
            if state.checks % STATS_EVERY == 0 {
                info!(
                    "Stats: {} checks, {} failed, {} posts, {} skipped, uptime {}s",
                    state.checks,
                    state.failed_checks,
                    state.posts,
                    state.skipped_posts,
                    uptime.num_seconds()
                );
            }
        }

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }
}

/// Start waiting on `signal` in a background task right away.
///
/// The returned future resolves once the signal has fired, including when it
/// fired before the future was first polled. Pass it to [`run`] after any
/// startup work so an early Ctrl+C still ends in a graceful shutdown.
pub async fn spawn_shutdown<F>(signal: F) -> impl Future<Output = ()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(signal);
    // Let the listener install itself before the caller continues.
    tokio::task::yield_now().await;
    async move {
        if let Err(e) = handle.await {
            error!("Shutdown listener failed: {e}");
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use tokio::sync::Notify;

    use super::*;
    use crate::message::Announcement;
    use crate::notifier::tests::FakePlatform;
    use crate::notifier::{DeliveryError, MessageSettings, ParseMode, Platform};
    use crate::types::StreamInfo;

    /// One scripted status check.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Step {
        Live,
        Offline,
        Fail,
        Panic,
    }

    /// Scripted status source. Reports offline once the script runs out.
    pub(crate) struct FakeSource {
        channel: String,
        script: Mutex<VecDeque<Step>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        pub(crate) fn new(channel: &str, script: Vec<Step>) -> Self {
            Self {
                channel: channel.to_string(),
                script: Mutex::new(script.into()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    pub(crate) fn live_stream(channel: &str) -> StreamInfo {
        StreamInfo {
            id: "1".into(),
            user_login: channel.into(),
            user_name: channel.into(),
            title: "Ranked grind".into(),
            game_name: Some("Dota 2".into()),
            viewer_count: Some(10),
            started_at: None,
        }
    }

    #[async_trait]
    impl StatusSource for FakeSource {
        fn channel(&self) -> &str {
            &self.channel
        }

        async fn fetch_stream(&self) -> Result<Option<StreamInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Offline);
            match step {
                Step::Live => Ok(Some(live_stream(&self.channel))),
                Step::Offline => Ok(None),
                Step::Fail => Err(anyhow!("connection reset")),
                Step::Panic => panic!("status source exploded"),
            }
        }
    }

    /// Accepts every post and fires `posted` afterwards.
    struct SignallingPlatform {
        posted: Arc<Notify>,
    }

    #[async_trait]
    impl Platform for SignallingPlatform {
        fn name(&self) -> &'static str {
            "signal"
        }

        async fn send(&self, _: &Announcement, _: ParseMode) -> Result<(), DeliveryError> {
            self.posted.notify_one();
            Ok(())
        }
    }

    fn settings() -> MessageSettings {
        MessageSettings {
            template: "{streamer} is live: {title}".to_string(),
            max_chars: 4000,
        }
    }

    fn cooldown() -> ChronoDuration {
        ChronoDuration::seconds(300)
    }

    fn notifier_with(platform: FakePlatform) -> Notifier {
        Notifier::new(settings()).with_platform(Box::new(platform))
    }

    fn api_error() -> DeliveryError {
        DeliveryError::Api {
            code: 400,
            description: "Bad Request: chat not found".into(),
        }
    }

    // ── check_status ───────────────────────────────────────────────

    #[tokio::test]
    async fn check_status_reports_live_and_failure_as_offline() {
        let source = FakeSource::new("streamer", vec![Step::Live, Step::Fail, Step::Offline]);
        assert!(check_status(&source).await);
        assert!(!check_status(&source).await);
        assert!(!check_status(&source).await);
    }

    // ── poll_cycle ─────────────────────────────────────────────────

    #[tokio::test]
    async fn rising_edge_posts_exactly_once() {
        let platform = FakePlatform::ok("telegram");
        let calls = platform.calls.clone();
        let notifier = notifier_with(platform);
        let source = FakeSource::new("streamer", vec![Step::Live]);
        let now = Utc::now();
        let mut state = PollerState::new(now);

        let report = poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;

        assert_eq!(report.outcome, CycleOutcome::Posted);
        assert!(state.is_live);
        assert_eq!(state.last_post_time, Some(now));
        assert_eq!(state.posts, 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
        let event = report.event.unwrap();
        assert_eq!(event.streamer, "streamer");
        assert_eq!(event.title, "Ranked grind");
        assert!(event.deliveries[0].delivered);
    }

    #[tokio::test]
    async fn steady_live_does_not_post_again() {
        let platform = FakePlatform::ok("telegram");
        let calls = platform.calls.clone();
        let notifier = notifier_with(platform);
        let source = FakeSource::new("streamer", vec![Step::Live, Step::Live, Step::Live]);
        let start = Utc::now();
        let mut state = PollerState::new(start);

        for minute in 0..3 {
            let now = start + ChronoDuration::minutes(minute);
            poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;
        }

        assert_eq!(state.posts, 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_rising_edge_within_cooldown_skipped() {
        let platform = FakePlatform::ok("telegram");
        let calls = platform.calls.clone();
        let notifier = notifier_with(platform);
        let source = FakeSource::new(
            "streamer",
            vec![Step::Live, Step::Offline, Step::Live, Step::Offline, Step::Live],
        );
        let start = Utc::now();
        let mut state = PollerState::new(start);

        let mut outcomes = Vec::new();
        for minute in [0, 1, 2, 5, 6] {
            let now = start + ChronoDuration::minutes(minute);
            let report = poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;
            outcomes.push(report.outcome);
        }

        assert_eq!(
            outcomes,
            vec![
                CycleOutcome::Posted,
                CycleOutcome::WentOffline,
                CycleOutcome::CooldownSkipped,
                CycleOutcome::WentOffline,
                CycleOutcome::Posted,
            ]
        );
        assert_eq!(state.posts, 2);
        assert_eq!(state.skipped_posts, 1);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn falling_edge_only_updates_state() {
        let platform = FakePlatform::ok("telegram");
        let calls = platform.calls.clone();
        let notifier = notifier_with(platform);
        let source = FakeSource::new("streamer", vec![Step::Offline]);
        let now = Utc::now();
        let mut state = PollerState::new(now);
        state.is_live = true;

        let report = poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;

        assert_eq!(report.outcome, CycleOutcome::WentOffline);
        assert!(!state.is_live);
        assert!(report.event.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_check_leaves_state_untouched() {
        let notifier = notifier_with(FakePlatform::ok("telegram"));
        let source = FakeSource::new("streamer", vec![Step::Fail]);
        let now = Utc::now();
        let mut state = PollerState::new(now);
        state.is_live = true;

        let report = poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;

        assert_eq!(report.outcome, CycleOutcome::Unknown);
        assert!(state.is_live);
        assert_eq!(state.checks, 1);
        assert_eq!(state.failed_checks, 1);
    }

    #[tokio::test]
    async fn failed_check_mid_stream_does_not_cause_repost() {
        let platform = FakePlatform::ok("telegram");
        let calls = platform.calls.clone();
        let notifier = notifier_with(platform);
        let source = FakeSource::new("streamer", vec![Step::Live, Step::Fail, Step::Live]);
        let start = Utc::now();
        let mut state = PollerState::new(start);

        for minute in [0, 10, 20] {
            let now = start + ChronoDuration::minutes(minute);
            poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;
        }

        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_platforms_failing_keeps_cooldown_clear() {
        let notifier = notifier_with(FakePlatform::new("telegram", vec![Err(api_error())]));
        let source = FakeSource::new("streamer", vec![Step::Live]);
        let now = Utc::now();
        let mut state = PollerState::new(now);

        let report = poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;

        assert_eq!(report.outcome, CycleOutcome::PostFailed);
        assert!(state.is_live);
        assert!(state.last_post_time.is_none());
        assert_eq!(state.posts, 0);
        assert!(report.event.is_some());
    }

    #[tokio::test]
    async fn one_failing_platform_still_counts_as_posted() {
        let vk = FakePlatform::ok("vk");
        let vk_calls = vk.calls.clone();
        let notifier = Notifier::new(settings())
            .with_platform(Box::new(FakePlatform::new("telegram", vec![Err(api_error())])))
            .with_platform(Box::new(vk));
        let source = FakeSource::new("streamer", vec![Step::Live]);
        let now = Utc::now();
        let mut state = PollerState::new(now);

        let report = poll_cycle(&mut state, &source, &notifier, cooldown(), now).await;

        assert_eq!(report.outcome, CycleOutcome::Posted);
        assert_eq!(vk_calls.lock().unwrap().len(), 1);
        let deliveries = report.event.unwrap().deliveries;
        assert!(!deliveries[0].delivered);
        assert!(deliveries[1].delivered);
    }

    // ── run ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn loop_survives_errors_and_panics() {
        let posted = Arc::new(Notify::new());
        let notifier = Notifier::new(settings()).with_platform(Box::new(SignallingPlatform {
            posted: posted.clone(),
        }));
        let source = FakeSource::new("streamer", vec![Step::Fail, Step::Panic, Step::Live]);
        let calls = source.calls.clone();
        let mut state = PollerState::new(Utc::now());
        let loop_settings = LoopSettings {
            interval: Duration::from_millis(1),
            cooldown: cooldown(),
            monitor: true,
        };

        let shutdown = async move { posted.notified().await };
        tokio::time::timeout(
            Duration::from_secs(5),
            run(&mut state, &source, &notifier, &loop_settings, shutdown),
        )
        .await
        .expect("loop should stop after the post");

        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(state.failed_checks, 1);
        assert_eq!(state.posts, 1);
        assert!(state.is_live);
    }

    #[tokio::test]
    async fn shutdown_fired_before_loop_still_stops_it() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let shutdown = spawn_shutdown(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let notifier = notifier_with(FakePlatform::ok("telegram"));
        let source = FakeSource::new("streamer", vec![Step::Offline, Step::Offline]);
        let calls = source.calls.clone();
        let mut state = PollerState::new(Utc::now());
        let loop_settings = LoopSettings {
            interval: Duration::from_secs(3600),
            cooldown: cooldown(),
            monitor: false,
        };

        tokio::time::timeout(
            Duration::from_secs(5),
            run(&mut state, &source, &notifier, &loop_settings, shutdown),
        )
        .await
        .expect("loop should stop after one cycle");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.checks, 1);
    }

    #[test]
    fn panic_message_variants() {
        let static_msg: Box<dyn Any + Send> = Box::new("static");
        let owned_msg: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(static_msg.as_ref()), "static");
        assert_eq!(panic_message(owned_msg.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
