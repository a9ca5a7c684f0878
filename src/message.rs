use crate::TWITCH_CHANNEL_BASE;
use crate::types::StreamInfo;

/// Appended to truncated messages.
pub const ELLIPSIS: &str = "...";

/// One announcement in the two renditions platforms accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Markup-escaped text for `parse_mode=HTML`.
    pub html: String,
    /// Unescaped text for platforms (or retries) without formatting.
    pub plain: String,
}

/// Public channel URL for `login`.
pub fn channel_url(login: &str) -> String {
    format!("{TWITCH_CHANNEL_BASE}/{login}")
}

/// Fill `template` for the given stream and append game/viewer lines.
///
/// Placeholders: `{streamer}`, `{title}`, `{url}`, `{game}`, `{viewers}`.
pub fn render(template: &str, info: &StreamInfo, channel: &str) -> String {
    let streamer = if info.user_name.is_empty() {
        channel
    } else {
        info.user_name.as_str()
    };
    let game = info.game_name.as_deref().unwrap_or_default();

    let value_of = |name: &str| -> Option<String> {
        match name {
            "streamer" => Some(streamer.to_string()),
            "title" => Some(info.title.clone()),
            "url" => Some(channel_url(channel)),
            "game" => Some(game.to_string()),
            "viewers" => Some(info.viewer_count.unwrap_or(0).to_string()),
            _ => None,
        }
    };

    // Single pass: substituted values are never scanned again.
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let tail = &rest[open..];
        let filled = tail
            .find('}')
            .and_then(|close| value_of(&tail[1..close]).map(|value| (value, close)));
        match filled {
            Some((value, close)) => {
                text.push_str(&value);
                rest = &tail[close + 1..];
            }
            None => {
                text.push('{');
                rest = &tail[1..];
            }
        }
    }
    text.push_str(rest);

    if !game.is_empty() {
        text.push_str(&format!("\n🎮 Game: {game}"));
    }
    if let Some(count) = info.viewer_count.filter(|n| *n > 0) {
        text.push_str(&format!("\n👥 Viewers: {count}"));
    }
    text
}

/// Escape the characters Telegram HTML mode reserves.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Cut `text` to at most `max_chars` characters, ending with [`ELLIPSIS`] when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let head: String = text.chars().take(keep).collect();
    format!("{head}{ELLIPSIS}")
}

/// Like [`truncate`], but never leaves a partial `&...;` entity behind.
pub fn truncate_html(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut head: String = text.chars().take(keep).collect();
    if let Some(amp) = head.rfind('&') {
        if !head[amp..].contains(';') {
            head.truncate(amp);
        }
    }
    format!("{head}{ELLIPSIS}")
}

/// Build both renditions, each bounded by `max_chars`.
pub fn build(template: &str, info: &StreamInfo, channel: &str, max_chars: usize) -> Announcement {
    let text = render(template, info, channel);
    Announcement {
        html: truncate_html(&escape_html(&text), max_chars),
        plain: truncate(&text, max_chars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MESSAGE_TEMPLATE;

    fn stream(title: &str) -> StreamInfo {
        StreamInfo {
            id: "1".into(),
            user_login: "streamer".into(),
            user_name: "Streamer".into(),
            title: title.into(),
            game_name: Some("Cyberpunk 2077".into()),
            viewer_count: Some(42),
            started_at: None,
        }
    }

    // ── render ─────────────────────────────────────────────────────

    #[test]
    fn render_default_template() {
        let text = render(DEFAULT_MESSAGE_TEMPLATE, &stream("Night run"), "streamer");
        assert!(text.starts_with("🎥 Streamer started streaming!"));
        assert!(text.contains("Night run"));
        assert!(text.contains("https://twitch.tv/streamer"));
        assert!(text.contains("\n🎮 Game: Cyberpunk 2077"));
        assert!(text.ends_with("\n👥 Viewers: 42"));
    }

    #[test]
    fn render_without_metadata() {
        let mut info = stream("Just chatting");
        info.game_name = None;
        info.viewer_count = Some(0);
        info.user_name.clear();
        let text = render("{streamer}: {title}", &info, "streamer");
        assert_eq!(text, "streamer: Just chatting");
    }

    #[test]
    fn render_extra_placeholders() {
        let text = render("{game} for {viewers}", &stream("t"), "streamer");
        assert!(text.starts_with("Cyberpunk 2077 for 42"));
    }

    #[test]
    fn render_leaves_placeholders_inside_values_alone() {
        let info = stream("Guide: paste {url} and {viewers}");
        let text = render("{title} | {url}", &info, "streamer");
        assert!(text.starts_with("Guide: paste {url} and {viewers} | https://twitch.tv/streamer"));
    }

    #[test]
    fn render_keeps_unknown_and_unclosed_braces() {
        let info = stream("t");
        assert!(render("{nope} {title", &info, "streamer").starts_with("{nope} {title"));
        assert!(render("{{title}}", &info, "streamer").starts_with("{t}"));
    }

    // ── escape / truncate ──────────────────────────────────────────

    #[test]
    fn escape_reserved_characters() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn truncate_short_text_untouched() {
        assert_eq!(truncate("hello", 4000), "hello");
    }

    #[test]
    fn truncate_long_text_with_ellipsis() {
        let long = "a".repeat(5000);
        let cut = truncate(&long, 4000);
        assert_eq!(cut.chars().count(), 4000);
        assert!(cut.ends_with(ELLIPSIS));
        assert!(cut.chars().count() < 4096);
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let long = "я".repeat(4001);
        let cut = truncate(&long, 4000);
        assert_eq!(cut.chars().count(), 4000);
    }

    #[test]
    fn truncate_html_drops_partial_entity() {
        let text = format!("{}&amp;tail", "a".repeat(5));
        // keep = 7 chars: "aaaaa&a" → entity cut, dropped
        let cut = truncate_html(&text, 10);
        assert_eq!(cut, "aaaaa...");
    }

    #[test]
    fn truncate_html_keeps_complete_entity() {
        let text = format!("{}&lt;tail-that-is-long", "a".repeat(3));
        // keep = 9 chars: "aaa&lt;ta"
        let cut = truncate_html(&text, 12);
        assert_eq!(cut, "aaa&lt;ta...");
    }

    #[test]
    fn build_bounds_both_renditions() {
        let info = stream(&"<b>".repeat(2000));
        let announcement = build(DEFAULT_MESSAGE_TEMPLATE, &info, "streamer", 4000);
        assert!(announcement.html.chars().count() <= 4000);
        assert!(announcement.plain.chars().count() <= 4000);
        assert!(announcement.html.ends_with(ELLIPSIS));
        assert!(announcement.plain.ends_with(ELLIPSIS));
        assert!(!announcement.html.contains('<'));
    }
}
