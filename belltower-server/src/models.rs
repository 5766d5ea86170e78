use belltower_core::models as wire;
use belltower_core::ModelError;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Deserialize;

// Screen models
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::screens)]
pub struct Screen {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub last_seen: Option<NaiveDateTime>,
    pub settings: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::screens)]
pub struct NewScreen {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub settings: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::screens)]
pub struct UpdateScreen {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub settings: Option<String>,
}

impl From<Screen> for wire::Screen {
    fn from(s: Screen) -> Self {
        let settings = s.settings.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| tracing::warn!("Screen {} has unreadable settings: {}", s.id, e))
                .ok()
        });
        wire::Screen {
            id: s.id,
            name: s.name,
            timezone: s.timezone,
            last_seen: s.last_seen,
            settings,
        }
    }
}

// Schedule models
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::schedules)]
pub struct Schedule {
    pub id: i32,
    pub screen_id: String,
    pub weekday: i32,
    pub period: i32,
    pub teacher: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Deserialize)]
#[diesel(table_name = crate::schema::schedules)]
pub struct NewSchedule {
    pub screen_id: String,
    pub weekday: i32,
    pub period: i32,
    #[serde(default)]
    pub teacher: String,
    pub start_time: String,
    pub end_time: String,
}

impl NewSchedule {
    /// Validates the row and rewrites its times in zero-padded `HH:mm:ss` form.
    pub fn normalized(self) -> Result<Self, ModelError> {
        wire::Schedule::from(self).normalized().map(NewSchedule::from)
    }
}

impl From<Schedule> for wire::Schedule {
    fn from(s: Schedule) -> Self {
        wire::Schedule {
            id: Some(s.id),
            screen_id: s.screen_id,
            weekday: s.weekday,
            period: s.period,
            teacher: s.teacher,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

impl From<NewSchedule> for wire::Schedule {
    fn from(s: NewSchedule) -> Self {
        wire::Schedule {
            id: None,
            screen_id: s.screen_id,
            weekday: s.weekday,
            period: s.period,
            teacher: s.teacher,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

impl From<wire::Schedule> for NewSchedule {
    fn from(s: wire::Schedule) -> Self {
        NewSchedule {
            screen_id: s.screen_id,
            weekday: s.weekday,
            period: s.period,
            teacher: s.teacher,
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

// Asset models
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::assets)]
pub struct Asset {
    pub id: String,
    pub screen_id: String,
    pub asset_type: String,
    pub url: String,
    pub public_id: Option<String>,
    pub duration: i32,
    pub position: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::assets)]
pub struct NewAsset {
    pub id: String,
    pub screen_id: String,
    pub asset_type: String,
    pub url: String,
    pub public_id: Option<String>,
    pub duration: i32,
    pub position: i32,
}

#[derive(Debug, Default, AsChangeset, Deserialize)]
#[diesel(table_name = crate::schema::assets)]
pub struct UpdateAsset {
    pub duration: Option<i32>,
    #[serde(rename = "order")]
    pub position: Option<i32>,
}

impl TryFrom<Asset> for wire::Asset {
    type Error = ModelError;

    fn try_from(a: Asset) -> Result<Self, Self::Error> {
        Ok(wire::Asset {
            kind: a.asset_type.parse()?,
            id: a.id,
            screen_id: a.screen_id,
            url: a.url,
            public_id: a.public_id,
            duration: a.duration,
            order: a.position,
        })
    }
}

// Command models
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::commands)]
pub struct Command {
    pub id: String,
    pub screen_id: Option<String>,
    pub cmd: String,
    pub payload: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::commands)]
pub struct NewCommand {
    pub id: String,
    pub screen_id: Option<String>,
    pub cmd: String,
    pub payload: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<Command> for wire::Command {
    fn from(c: Command) -> Self {
        wire::Command {
            payload: c.payload.as_deref().and_then(|raw| serde_json::from_str(raw).ok()),
            id: c.id,
            screen_id: c.screen_id,
            cmd: c.cmd,
            created_at: c.created_at,
        }
    }
}
