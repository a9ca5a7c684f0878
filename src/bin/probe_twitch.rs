//! Probe: Twitch credentials and the watched channel.
//!
//! Acquires an app token, resolves TWITCH_STREAMER_LOGIN through
//! `GET /helix/users`, then reports the current live status the poller
//! would observe.

use std::time::Instant;

use anyhow::{Context, Result};
use twitch_autoposter::api::TwitchClient;
use twitch_autoposter::config::{
    TWITCH_CLIENT_ID_VAR, TWITCH_CLIENT_SECRET_VAR, TWITCH_STREAMER_LOGIN_VAR,
    TwitchCredentials, redact,
};
use twitch_autoposter::poller::check_status;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let creds = TwitchCredentials {
        client_id: std::env::var(TWITCH_CLIENT_ID_VAR)
            .with_context(|| format!("{TWITCH_CLIENT_ID_VAR} not set"))?,
        client_secret: std::env::var(TWITCH_CLIENT_SECRET_VAR)
            .with_context(|| format!("{TWITCH_CLIENT_SECRET_VAR} not set"))?,
        streamer_login: std::env::var(TWITCH_STREAMER_LOGIN_VAR)
            .with_context(|| format!("{TWITCH_STREAMER_LOGIN_VAR} not set"))?
            .to_lowercase(),
    };
    let login = creds.streamer_login.clone();

    println!("=== Probe: Twitch ===");
    println!("Client ID: {}", redact(&creds.client_id));
    println!("Channel:   {login}");
    println!();

    let client = TwitchClient::new(reqwest::Client::new(), creds);

    println!("--- 1. App token ---");
    let start = Instant::now();
    let token = client.bearer().await.context("token request failed")?;
    println!("Token: {} ({:?})", redact(&token), start.elapsed());
    println!();

    println!("--- 2. User lookup ---");
    match client.user_for(&login).await? {
        Some(user) => {
            println!("Found:        {} (id {})", user.display_name, user.id);
            println!("Broadcaster:  {}", non_empty(&user.broadcaster_type));
            println!("Description:  {}", non_empty(&user.description));
        }
        None => {
            println!("No Twitch user named {login}; check {TWITCH_STREAMER_LOGIN_VAR}");
            return Ok(());
        }
    }
    println!();

    println!("--- 3. Stream status ---");
    let start = Instant::now();
    match client.stream_for(&login).await? {
        Some(stream) => {
            println!("LIVE ({:?})", start.elapsed());
            println!("  title:   {}", stream.title);
            println!("  game:    {}", stream.game_name.as_deref().unwrap_or("-"));
            println!("  viewers: {}", stream.viewer_count.unwrap_or(0));
            if let Some(started) = stream.started_at {
                println!("  since:   {started}");
            }
        }
        None => println!("offline ({:?})", start.elapsed()),
    }
    println!();
    println!("check_status() -> {}", check_status(&client).await);

    Ok(())
}

fn non_empty(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
