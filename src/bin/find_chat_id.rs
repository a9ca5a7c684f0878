//! find-chat-id: discover the chat id to put in TELEGRAM_CHANNEL_ID.
//!
//! Lists every chat in the bot's pending `getUpdates`. Post something in the
//! channel (or message the bot) first so an update exists. With `--check`,
//! verifies a candidate id with `getChat` and a test message.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Parser;
use twitch_autoposter::config::{
    TELEGRAM_BOT_TOKEN_VAR, TELEGRAM_CHANNEL_ID_VAR, TelegramCredentials,
};
use twitch_autoposter::notifier::DeliveryError;
use twitch_autoposter::telegram::{Chat, TelegramClient, diagnose};

#[derive(Parser)]
#[command(name = "find-chat-id", about = "List chats the Telegram bot has seen")]
struct Cli {
    /// Verify this chat id by sending a test message
    #[arg(long)]
    check: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let bot_token = std::env::var(TELEGRAM_BOT_TOKEN_VAR)
        .with_context(|| format!("{TELEGRAM_BOT_TOKEN_VAR} not set"))?;
    let configured = std::env::var(TELEGRAM_CHANNEL_ID_VAR).unwrap_or_default();
    let candidate = cli.check.clone().unwrap_or_else(|| configured.clone());

    let client = TelegramClient::new(
        reqwest::Client::new(),
        TelegramCredentials {
            bot_token,
            chat_id: candidate.clone(),
        },
    );

    println!("=== Telegram chats seen by the bot ===");
    let updates = client.get_updates().await?;
    let mut chats: BTreeMap<i64, Chat> = BTreeMap::new();
    for update in &updates {
        if let Some(chat) = update.chat() {
            chats.entry(chat.id).or_insert_with(|| chat.clone());
        }
    }

    if chats.is_empty() {
        println!("No chats in pending updates ({} update(s)).", updates.len());
        println!("Post a message in the channel or send /start to the bot, then retry.");
    } else {
        for chat in chats.values() {
            println!("  {:>16}  {:<10}  {}", chat.id, chat.kind, chat.display_name());
        }
        println!();
        println!("Put the id in .env as {TELEGRAM_CHANNEL_ID_VAR}=<id>");
    }

    if cli.check.is_none() && configured.is_empty() {
        return Ok(());
    }

    println!();
    println!("=== Checking {candidate} ===");
    match client.get_chat(&candidate).await {
        Ok(chat) => println!("getChat OK: {} ({})", chat.display_name(), chat.kind),
        Err(e) => {
            print_error(&e);
            return Ok(());
        }
    }
    match client.send_message("🧪 Chat id check from twitch-autoposter", None).await {
        Ok(sent) => println!("Test message sent (id {})", sent.message_id),
        Err(e) => print_error(&e),
    }

    Ok(())
}

fn print_error(err: &DeliveryError) {
    println!("Error: {err}");
    if let DeliveryError::Api { description, .. } = err {
        if let Some(hint) = diagnose(description) {
            println!("  hint: {hint}");
        }
    }
}
