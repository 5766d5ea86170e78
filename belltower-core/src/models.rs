use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

pub const WALL_CLOCK_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub last_seen: Option<NaiveDateTime>,
    pub settings: Option<serde_json::Value>,
}

/// One period of the weekly timetable for a screen.
///
/// `start_time` and `end_time` are zero-padded `HH:mm:ss` strings and are
/// compared lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub screen_id: String,
    pub weekday: i32,
    pub period: i32,
    pub teacher: String,
    pub start_time: String,
    pub end_time: String,
}

impl Schedule {
    /// Normalizes both wall-clock fields and checks the weekday range.
    pub fn normalized(mut self) -> Result<Self, ModelError> {
        if !(1..=7).contains(&self.weekday) {
            return Err(ModelError::InvalidWeekday(self.weekday));
        }
        self.start_time = normalize_wall_clock(&self.start_time)?;
        self.end_time = normalize_wall_clock(&self.end_time)?;
        if self.end_time <= self.start_time {
            return Err(ModelError::EmptyPeriod {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(self)
    }

    /// Whether the two periods share any instant on the same screen and weekday.
    pub fn overlaps(&self, other: &Schedule) -> bool {
        self.screen_id == other.screen_id
            && self.weekday == other.weekday
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

/// Accepts `H:mm`, `HH:mm` or `HH:mm:ss` and returns the zero-padded `HH:mm:ss` form.
pub fn normalize_wall_clock(value: &str) -> Result<String, ModelError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, WALL_CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map(|t| t.format(WALL_CLOCK_FORMAT).to_string())
        .map_err(|_| ModelError::InvalidWallClock(value.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
        }
    }
}

impl FromStr for AssetKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AssetKind::Image),
            "video" => Ok(AssetKind::Video),
            other => Err(ModelError::InvalidAssetKind(other.to_string())),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub screen_id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub url: String,
    #[serde(default)]
    pub public_id: Option<String>,
    /// Dwell time in seconds, only meaningful for images.
    pub duration: i32,
    pub order: i32,
}

/// A one-shot instruction for one screen, or for every screen when `screen_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub screen_id: Option<String>,
    pub cmd: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        CommandKind::from(self.cmd.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Ring,
    Reload,
    Other(String),
}

impl From<&str> for CommandKind {
    fn from(cmd: &str) -> Self {
        match cmd {
            "ring" => CommandKind::Ring,
            "reload" => CommandKind::Reload,
            other => CommandKind::Other(other.to_string()),
        }
    }
}
