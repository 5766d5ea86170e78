use std::time::{Duration, Instant};

use crate::status::CurrentStatus;

/// Window in which a repeated auto-bell is suppressed.
pub const AUTO_BELL_DEBOUNCE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BellTrigger {
    /// Fired by the status tick when a period boundary is reached.
    Auto,
    /// Fired by a `ring` command from the admin.
    Remote,
}

/// A period boundary is due once less than a whole minute remains.
pub fn auto_bell_due(status: &CurrentStatus) -> bool {
    status.minutes_to_bell == 0
}

/// Decides whether a bell should sound. Only auto-bells are debounced;
/// `last_auto_bell` is the instant the previous auto-bell rang.
pub fn should_ring(trigger: BellTrigger, last_auto_bell: Option<Instant>, now: Instant) -> bool {
    match trigger {
        BellTrigger::Remote => true,
        BellTrigger::Auto => match last_auto_bell {
            None => true,
            Some(last) => now.saturating_duration_since(last) > AUTO_BELL_DEBOUNCE,
        },
    }
}
