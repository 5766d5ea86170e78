use chrono::{Local, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::error::ModelError;

/// Timezone value meaning "use the host's local clock".
pub const LOCAL_TIMEZONE: &str = "local";

/// Source of the wall-clock time a screen's timetable is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenClock {
    Local,
    Zone(Tz),
}

impl ScreenClock {
    pub fn parse(timezone: &str) -> Result<Self, ModelError> {
        let trimmed = timezone.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(LOCAL_TIMEZONE) {
            return Ok(ScreenClock::Local);
        }
        trimmed
            .parse::<Tz>()
            .map(ScreenClock::Zone)
            .map_err(|_| ModelError::InvalidTimezone(timezone.to_string()))
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            ScreenClock::Local => Local::now().naive_local(),
            ScreenClock::Zone(tz) => Utc::now().with_timezone(tz).naive_local(),
        }
    }
}
