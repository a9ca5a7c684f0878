use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use twitch_autoposter::api::TwitchClient;
use twitch_autoposter::config::{AppConfig, CONFIG_PATH, Credentials};
use twitch_autoposter::monitor;
use twitch_autoposter::notifier::{MessageSettings, Notifier};
use twitch_autoposter::poller::{self, LoopSettings};
use twitch_autoposter::reporter;
use twitch_autoposter::state::PollerState;
use twitch_autoposter::telegram::TelegramClient;
use twitch_autoposter::vk::VkClient;

#[derive(Parser)]
#[command(
    name = "autoposter",
    about = "Announce a Twitch channel going live on Telegram and VK"
)]
struct Args {
    /// Settings file (defaults apply when it does not exist)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Log every status check and delivery, plus periodic statistics
    #[arg(long)]
    monitor: bool,

    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run a single check and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let config = AppConfig::load_or_default(&args.config)?;
    let settings = config.settings;
    let creds = Credentials::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(settings.http_timeout())
        .user_agent(concat!("twitch-autoposter/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let shutdown = poller::spawn_shutdown(shutdown_signal()).await;

    let twitch = TwitchClient::new(http.clone(), creds.twitch.clone());
    match twitch.bearer().await {
        Ok(_) => info!("Twitch app token acquired"),
        Err(e) => warn!("Could not acquire Twitch token yet, will retry every cycle: {e:#}"),
    }
    let source = monitor::status_source(twitch, args.monitor);

    let mut notifier = Notifier::new(MessageSettings {
        template: settings.message_template.clone(),
        max_chars: settings.max_message_chars,
    })
    .with_platform(monitor::platform(
        TelegramClient::new(http.clone(), creds.telegram.clone()),
        args.monitor,
    ));
    match creds.vk.clone() {
        Some(vk) => {
            info!("VK group: {}", vk.group_id);
            let vk = VkClient::new(http, vk);
            notifier = notifier.with_platform(monitor::platform(vk, args.monitor));
        }
        None => info!("VK group: not configured"),
    }

    info!(
        "Starting autoposter: channel={} telegram={} platforms={:?} poll={}s cooldown={}s",
        source.channel(),
        creds.telegram.chat_id,
        notifier.platform_names(),
        settings.poll_interval_secs,
        settings.cooldown_secs,
    );

    let mut state = PollerState::new(Utc::now());

    if args.once {
        let report = poller::poll_cycle(
            &mut state,
            source.as_ref(),
            &notifier,
            settings.cooldown(),
            Utc::now(),
        )
        .await;
        if let Some(event) = &report.event {
            reporter::report_event(event);
        }
        info!("Single check finished: {:?}", report.outcome);
        return Ok(());
    }

    let loop_settings = LoopSettings {
        interval: settings.poll_interval(),
        cooldown: settings.cooldown(),
        monitor: args.monitor,
    };
    info!(
        "Entering polling loop (interval: {}s). Press Ctrl+C to stop.",
        settings.poll_interval_secs
    );
    poller::run(
        &mut state,
        source.as_ref(),
        &notifier,
        &loop_settings,
        shutdown,
    )
    .await;

    info!("Stopped after {} check(s)", state.checks);
    reporter::report_exit_summary(&state.exit_summary(source.channel(), Utc::now()));
    Ok(())
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

/// stderr logging filtered by `RUST_LOG` (default `info`), optionally mirrored to a file.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("--log-file {} has no file name", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            Some(fmt::layer().with_ansi(false).with_writer(appender))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}
