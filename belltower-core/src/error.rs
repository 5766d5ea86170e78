use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid wall-clock time '{0}', expected HH:mm or HH:mm:ss")]
    InvalidWallClock(String),

    #[error("Invalid weekday {0}, expected 1 (Monday) through 7 (Sunday)")]
    InvalidWeekday(i32),

    #[error("Period must end after it starts ({start} - {end})")]
    EmptyPeriod { start: String, end: String },

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("Unknown asset type '{0}'")]
    InvalidAssetKind(String),
}
