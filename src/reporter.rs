//! Machine-readable output on stdout. Logs go to stderr.

use crate::types::{ExitSummary, PostEvent};

/// Single-line JSON for a post event.
pub fn event_line(event: &PostEvent) -> Option<String> {
    serde_json::to_string(event).ok()
}

/// Print a post event so downstream tooling can tail stdout.
pub fn report_event(event: &PostEvent) {
    if let Some(line) = event_line(event) {
        println!("{line}");
    }
}

/// Print the shutdown summary as pretty JSON.
pub fn report_exit_summary(summary: &ExitSummary) {
    if let Ok(json) = serde_json::to_string_pretty(summary) {
        println!("{json}");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::types::DeliveryReport;

    #[test]
    fn event_line_shape() {
        let event = PostEvent {
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            streamer: "streamer".to_string(),
            title: "Title".to_string(),
            game_name: None,
            deliveries: vec![DeliveryReport {
                platform: "telegram".to_string(),
                delivered: false,
                plain_fallback: false,
                error: Some("API error 403: Forbidden".to_string()),
            }],
        };

        let line = event_line(&event).unwrap();
        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["streamer"], "streamer");
        assert!(value.get("game_name").is_none());
        assert_eq!(value["deliveries"][0]["platform"], "telegram");
        assert_eq!(value["deliveries"][0]["error"], "API error 403: Forbidden");
    }
}
