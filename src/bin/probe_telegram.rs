//! Probe: Telegram bot and destination chat.
//!
//! Checks the bot token (`getMe`), the configured chat (`getChat`), the bot's
//! membership and rights in it (`getChatMember`), then sends and deletes a
//! test message. Prints a fix-up hint for the usual failure descriptions.

use anyhow::{Context, Result};
use twitch_autoposter::config::{
    TELEGRAM_BOT_TOKEN_VAR, TELEGRAM_CHANNEL_ID_VAR, TelegramCredentials, redact,
};
use twitch_autoposter::notifier::DeliveryError;
use twitch_autoposter::telegram::{ChatMember, TelegramClient, diagnose};

const TEST_MESSAGE: &str = "🧪 Posting test from twitch-autoposter";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let creds = TelegramCredentials {
        bot_token: std::env::var(TELEGRAM_BOT_TOKEN_VAR)
            .with_context(|| format!("{TELEGRAM_BOT_TOKEN_VAR} not set"))?,
        chat_id: std::env::var(TELEGRAM_CHANNEL_ID_VAR)
            .with_context(|| format!("{TELEGRAM_CHANNEL_ID_VAR} not set"))?,
    };

    println!("=== Probe: Telegram ===");
    println!("Token:   {}", redact(&creds.bot_token));
    println!("Chat ID: {}", creds.chat_id);
    println!();

    let client = TelegramClient::new(reqwest::Client::new(), creds.clone());

    // ── 1. Bot ─────────────────────────────────────────────────────
    println!("--- 1. getMe ---");
    let bot = match client.get_me().await {
        Ok(bot) => bot,
        Err(e) => {
            println!("Bot token rejected: {e}");
            return Ok(());
        }
    };
    println!(
        "Bot: @{} (id {}, {})",
        bot.username.as_deref().unwrap_or("?"),
        bot.id,
        bot.first_name
    );
    if bot.can_join_groups == Some(false) {
        println!("  note: bot cannot be added to groups");
    }
    println!();

    // ── 2. Chat ────────────────────────────────────────────────────
    println!("--- 2. getChat ---");
    let chat = match client.get_chat(&creds.chat_id).await {
        Ok(chat) => chat,
        Err(e) => {
            report_error(&e);
            println!("Run `find-chat-id` to list chats the bot has seen.");
            return Ok(());
        }
    };
    println!("Chat: {} (id {}, type {})", chat.display_name(), chat.id, chat.kind);
    match chat.kind.as_str() {
        "channel" => println!("  channels require the bot to be an administrator"),
        "group" | "supergroup" => println!("  groups require the bot to be a member or administrator"),
        _ => println!("  private chat, no extra rights needed"),
    }
    println!();

    // ── 3. Membership ──────────────────────────────────────────────
    println!("--- 3. getChatMember ---");
    let member = match client.get_chat_member(bot.id).await {
        Ok(member) => {
            print_member(&member);
            Some(member)
        }
        Err(e) => {
            report_error(&e);
            None
        }
    };
    println!();

    // ── 4. Posting ─────────────────────────────────────────────────
    println!("--- 4. sendMessage + deleteMessage ---");
    let posting_works = match client.send_message(TEST_MESSAGE, None).await {
        Ok(sent) => {
            println!("Test message sent (id {})", sent.message_id);
            match client.delete_message(sent.message_id).await {
                Ok(_) => println!("Test message deleted"),
                Err(e) => println!("Could not delete test message: {e}"),
            }
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    };
    println!();

    println!("=== Result ===");
    println!("Chat type:   {}", chat.kind);
    println!(
        "Bot status:  {}",
        member.as_ref().map_or("unknown", |m| m.status.as_str())
    );
    println!("Posting:     {}", if posting_works { "OK" } else { "FAILED" });
    if !posting_works && chat.kind == "channel" {
        println!();
        println!("Open the channel settings → Administrators, add the bot and enable");
        println!("\"Post messages\". Wait a minute, then run this probe again.");
    }

    Ok(())
}

fn print_member(member: &ChatMember) {
    println!("Bot status: {}", member.status);
    match member.status.as_str() {
        "administrator" | "creator" => {
            println!("  post:   {}", yes_no(member.can_post_messages));
            println!("  edit:   {}", yes_no(member.can_edit_messages));
            println!("  delete: {}", yes_no(member.can_delete_messages));
        }
        "member" => println!("  channels need administrator rights to post"),
        "left" | "kicked" => println!("  bot is not in the chat"),
        _ => {}
    }
}

fn yes_no(flag: Option<bool>) -> &'static str {
    match flag {
        Some(true) => "yes",
        Some(false) => "no",
        None => "n/a",
    }
}

fn report_error(err: &DeliveryError) {
    println!("Error: {err}");
    if let DeliveryError::Api { description, .. } = err {
        if let Some(hint) = diagnose(description) {
            println!("  hint: {hint}");
        }
    }
}
