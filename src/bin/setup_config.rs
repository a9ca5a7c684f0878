//! setup-config: first-time setup for the autoposter.
//!
//! Writes `config.toml` with default settings (refusing to overwrite unless
//! `--force`) and reports which credentials are still missing from the
//! environment / `.env`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use twitch_autoposter::config::{
    AppConfig, CONFIG_PATH, Credentials, VK_ACCESS_TOKEN_VAR, VK_GROUP_ID_VAR, missing_vars,
};

#[derive(Parser)]
#[command(
    name = "setup-config",
    about = "Write default config.toml and check credentials in the environment"
)]
struct Cli {
    /// Where to write the settings file
    #[arg(long, default_value = CONFIG_PATH)]
    path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,

    /// Override the poll interval in seconds
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Override the post cooldown in seconds
    #[arg(long)]
    cooldown: Option<u64>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    println!("=== Twitch Autoposter: Setup ===\n");

    // ── Step 1: settings file ──────────────────────────────────────
    if cli.path.exists() && !cli.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            cli.path.display()
        );
    }
    let mut config = AppConfig::default();
    if let Some(secs) = cli.poll_interval {
        if secs == 0 {
            bail!("--poll-interval must be positive");
        }
        config.settings.poll_interval_secs = secs;
    }
    if let Some(secs) = cli.cooldown {
        config.settings.cooldown_secs = secs;
    }
    config.save(&cli.path)?;
    println!("Wrote {}", cli.path.display());
    println!(
        "  poll every {}s, cooldown {}s, max {} chars",
        config.settings.poll_interval_secs,
        config.settings.cooldown_secs,
        config.settings.max_message_chars
    );
    println!();

    // ── Step 2: credentials ────────────────────────────────────────
    let env = |key: &str| {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let missing = missing_vars(env);
    if !missing.is_empty() {
        println!("Missing required variables (add them to .env):");
        for var in &missing {
            println!("  - {var}");
        }
        return Ok(());
    }

    let creds = Credentials::from_env()?;
    println!("All required variables found");
    println!("  channel:  {}", creds.twitch.streamer_login);
    println!("  telegram: {}", creds.telegram.chat_id);
    match &creds.vk {
        Some(vk) => println!("  vk:       group {} (API {})", vk.group_id, vk.api_version),
        None => println!("  vk:       disabled (set {VK_GROUP_ID_VAR} and {VK_ACCESS_TOKEN_VAR})"),
    }
    println!();

    println!("Next steps:");
    println!("  cargo run --bin probe-twitch");
    println!("  cargo run --bin probe-telegram");
    println!("  cargo run --bin autoposter -- --monitor");

    Ok(())
}
