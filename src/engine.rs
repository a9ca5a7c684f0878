use chrono::{DateTime, Duration, Utc};

use crate::state::PollerState;

/// What to do after a successful status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Rising edge outside the cooldown window.
    Announce,
    /// Rising edge inside the cooldown window.
    SkipCooldown,
    StillLive,
    /// Falling edge: only the state changes.
    WentOffline,
    StillOffline,
}

/// Decide the action for an observed status given the previous state.
///
/// Only an offline → live edge can announce, and only when the last
/// successful post is at least `cooldown` old.
pub fn plan(
    state: &PollerState,
    observed_live: bool,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Plan {
    match (state.is_live, observed_live) {
        (false, true) if state.in_cooldown(now, cooldown) => Plan::SkipCooldown,
        (false, true) => Plan::Announce,
        (true, true) => Plan::StillLive,
        (true, false) => Plan::WentOffline,
        (false, false) => Plan::StillOffline,
    }
}
