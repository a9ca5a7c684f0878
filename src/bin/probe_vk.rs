//! Probe: VK community wall posting.
//!
//! 1. `users.get` confirms the access token.
//! 2. `groups.getById` confirms the community is reachable.
//! 3. `wall.post` + `wall.delete` confirm the token may post on its wall.

use anyhow::{Result, bail};
use twitch_autoposter::VK_DEFAULT_API_VERSION;
use twitch_autoposter::config::{
    VK_ACCESS_TOKEN_VAR, VK_API_VERSION_VAR, VK_GROUP_ID_VAR, VkCredentials, redact,
};
use twitch_autoposter::vk::VkClient;

const TEST_POST: &str = "🧪 Posting test from twitch-autoposter\n\nThis post is removed right away.";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let group_id = std::env::var(VK_GROUP_ID_VAR).unwrap_or_default();
    let access_token = std::env::var(VK_ACCESS_TOKEN_VAR).unwrap_or_default();
    let api_version =
        std::env::var(VK_API_VERSION_VAR).unwrap_or_else(|_| VK_DEFAULT_API_VERSION.to_string());

    println!("=== Probe: VK ===");
    println!("Group ID:    {}", if group_id.is_empty() { "-" } else { group_id.as_str() });
    println!(
        "Token:       {}",
        if access_token.is_empty() { "-".to_string() } else { redact(&access_token) }
    );
    println!("API version: {api_version}");
    println!();

    if group_id.is_empty() || access_token.is_empty() {
        bail!("VK is not configured: set {VK_GROUP_ID_VAR} and {VK_ACCESS_TOKEN_VAR} in .env");
    }

    let client = VkClient::new(
        reqwest::Client::new(),
        VkCredentials {
            group_id: group_id.trim_start_matches('-').to_string(),
            access_token,
            api_version,
        },
    );

    println!("--- 1. users.get ---");
    match client.current_user().await {
        Ok(user) => println!("Token OK: {} {} (id {})", user.first_name, user.last_name, user.id),
        Err(e) => {
            // Community tokens cannot call users.get; not fatal for wall posting.
            println!("users.get failed: {e}");
        }
    }
    println!();

    println!("--- 2. groups.getById ---");
    match client.group().await {
        Ok(group) => {
            let kind = if group.kind == "page" { "public page" } else { "group" };
            println!("Community: {} ({kind}, id {}, {})", group.name, group.id, group.screen_name);
        }
        Err(e) => {
            println!("Community lookup failed: {e}");
            return Ok(());
        }
    }
    println!();

    println!("--- 3. wall.post + wall.delete ---");
    match client.wall_post(TEST_POST).await {
        Ok(post) => {
            println!("Test post published (id {})", post.post_id);
            match client.wall_delete(post.post_id).await {
                Ok(_) => println!("Test post deleted"),
                Err(e) => println!("Could not delete test post: {e}"),
            }
        }
        Err(e) => {
            println!("Posting failed: {e}");
            return Ok(());
        }
    }
    println!();
    println!("VK posting works for group {}", client.group_id());

    Ok(())
}
