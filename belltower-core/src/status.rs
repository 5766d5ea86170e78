use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{Schedule, WALL_CLOCK_FORMAT};

/// `minutes_to_bell` value when no bell is pending today.
pub const NO_BELL_PENDING: i64 = 999;

/// Minutes to the bell at or below which a running period is shown as urgent.
pub const URGENT_MINUTES: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStatus {
    pub period: Option<Schedule>,
    pub next_period: Option<Schedule>,
    pub time_remaining: String,
    pub minutes_to_bell: i64,
    pub is_break: bool,
}

impl Default for CurrentStatus {
    fn default() -> Self {
        Self {
            period: None,
            next_period: None,
            time_remaining: String::new(),
            minutes_to_bell: NO_BELL_PENDING,
            is_break: false,
        }
    }
}

impl CurrentStatus {
    pub fn is_urgent(&self) -> bool {
        self.period.is_some() && !self.is_break && self.minutes_to_bell <= URGENT_MINUTES
    }

    /// Single-line summary for logs and on-screen text.
    pub fn summary(&self) -> String {
        match (&self.period, &self.next_period) {
            (Some(current), _) => format!(
                "Period {} ({}) - {}",
                current.period, current.teacher, self.time_remaining
            ),
            (None, Some(next)) => format!(
                "Next: Period {} ({}) - {}",
                next.period, next.teacher, self.time_remaining
            ),
            (None, None) => "End of Day".to_string(),
        }
    }
}

/// Maps a Sunday-based day number (Sunday = 0) to the timetable convention
/// where Monday = 1 and Sunday = 7.
pub fn schedule_weekday(days_from_sunday: u32) -> u32 {
    if days_from_sunday == 0 {
        7
    } else {
        days_from_sunday
    }
}

/// Resolves the current and next period for `now`, a local wall-clock instant.
///
/// Containment is tested on zero-padded `HH:mm:ss` strings, so a period can
/// never span midnight. Minute counts are floored.
pub fn resolve_status(schedules: &[Schedule], now: NaiveDateTime) -> CurrentStatus {
    let today = schedule_weekday(now.weekday().num_days_from_sunday()) as i32;

    let mut todays: Vec<&Schedule> = schedules.iter().filter(|s| s.weekday == today).collect();
    todays.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let now_str = now.format(WALL_CLOCK_FORMAT).to_string();

    let mut current: Option<&Schedule> = None;
    let mut next: Option<&Schedule> = None;
    let mut is_break = false;

    for (i, s) in todays.iter().enumerate() {
        if now_str.as_str() >= s.start_time.as_str() && now_str.as_str() < s.end_time.as_str() {
            current = Some(s);
            next = todays.get(i + 1).copied();
            break;
        }
        if now_str.as_str() < s.start_time.as_str() {
            next = Some(s);
            is_break = true;
            break;
        }
    }

    let mut status = CurrentStatus {
        period: current.cloned(),
        next_period: next.cloned(),
        is_break,
        ..CurrentStatus::default()
    };

    if let Some(p) = current {
        if let Some(mins) = minutes_until(now, &p.end_time) {
            status.minutes_to_bell = mins;
            status.time_remaining = format!("{} min", mins);
        }
    } else if let Some(p) = next {
        if let Some(mins) = minutes_until(now, &p.start_time) {
            status.minutes_to_bell = mins;
            status.time_remaining = format!("Starts in {} min", mins);
        }
    }

    status
}

fn minutes_until(now: NaiveDateTime, wall_clock: &str) -> Option<i64> {
    let time = NaiveTime::parse_from_str(wall_clock, WALL_CLOCK_FORMAT).ok()?;
    let target = now.date().and_time(time);
    Some((target - now).num_seconds().div_euclid(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn period(weekday: i32, number: i32, start: &str, end: &str) -> Schedule {
        Schedule {
            id: Some(number),
            screen_id: "room_101".to_string(),
            weekday,
            period: number,
            teacher: format!("Teacher {}", number),
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    // 2024-09-04 is a Wednesday.
    fn wednesday_at(time: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 4)
            .unwrap()
            .and_time(NaiveTime::parse_from_str(time, WALL_CLOCK_FORMAT).unwrap())
    }

    fn wednesday_timetable() -> Vec<Schedule> {
        vec![
            period(3, 2, "08:50:00", "09:35:00"),
            period(3, 1, "08:00:00", "08:45:00"),
            period(4, 1, "08:10:00", "09:00:00"),
        ]
    }

    #[test]
    fn test_schedule_weekday_remap() {
        assert_eq!(schedule_weekday(0), 7);
        for day in 1..=6 {
            assert_eq!(schedule_weekday(day), day);
        }
    }

    #[test]
    fn test_sunday_resolves_to_weekday_seven() {
        // 2024-09-08 is a Sunday.
        let now = NaiveDate::from_ymd_opt(2024, 9, 8)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let schedules = vec![period(7, 1, "09:30:00", "10:30:00"), period(1, 1, "09:30:00", "10:30:00")];

        let status = resolve_status(&schedules, now);
        assert_eq!(status.period.unwrap().weekday, 7);
        assert_eq!(status.minutes_to_bell, 30);
    }

    #[test]
    fn test_inside_first_period() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:10:00"));

        assert_eq!(status.period.as_ref().map(|p| p.period), Some(1));
        assert_eq!(status.next_period.as_ref().map(|p| p.period), Some(2));
        assert_eq!(status.minutes_to_bell, 35);
        assert_eq!(status.time_remaining, "35 min");
        assert!(!status.is_break);
    }

    #[test]
    fn test_between_periods_is_break() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:47:00"));

        assert!(status.period.is_none());
        assert_eq!(status.next_period.as_ref().map(|p| p.period), Some(2));
        assert_eq!(status.minutes_to_bell, 3);
        assert_eq!(status.time_remaining, "Starts in 3 min");
        assert!(status.is_break);
        assert!(!status.is_urgent());
    }

    #[test]
    fn test_before_school_day() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("06:30:00"));

        assert!(status.period.is_none());
        assert_eq!(status.next_period.as_ref().map(|p| p.period), Some(1));
        assert_eq!(status.minutes_to_bell, 90);
        assert!(status.is_break);
    }

    #[test]
    fn test_after_last_period() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("15:00:00"));

        assert_eq!(status, CurrentStatus::default());
        assert_eq!(status.minutes_to_bell, NO_BELL_PENDING);
        assert_eq!(status.time_remaining, "");
        assert_eq!(status.summary(), "End of Day");
    }

    #[test]
    fn test_no_schedule_today() {
        // Only Wednesday and Thursday rows; Saturday has nothing.
        let saturday = NaiveDate::from_ymd_opt(2024, 9, 7)
            .unwrap()
            .and_hms_opt(8, 10, 0)
            .unwrap();
        assert_eq!(
            resolve_status(&wednesday_timetable(), saturday),
            CurrentStatus::default()
        );
        assert_eq!(resolve_status(&[], saturday), CurrentStatus::default());
    }

    #[test]
    fn test_end_time_is_exclusive() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:45:00"));
        assert!(status.period.is_none());
        assert!(status.is_break);
        assert_eq!(status.minutes_to_bell, 5);

        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:44:59"));
        assert_eq!(status.period.as_ref().map(|p| p.period), Some(1));
        assert_eq!(status.minutes_to_bell, 0);
        assert_eq!(status.time_remaining, "0 min");
        assert!(status.is_urgent());
    }

    #[test]
    fn test_start_time_is_inclusive() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:50:00"));
        assert_eq!(status.period.as_ref().map(|p| p.period), Some(2));
        assert!(status.next_period.is_none());
        assert_eq!(status.minutes_to_bell, 45);
    }

    #[test]
    fn test_minutes_are_floored() {
        let now = wednesday_at("08:10:00") + chrono::Duration::milliseconds(500);
        let status = resolve_status(&wednesday_timetable(), now);
        assert_eq!(status.minutes_to_bell, 34);

        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:10:01"));
        assert_eq!(status.minutes_to_bell, 34);
    }

    #[test]
    fn test_minutes_never_negative_while_current() {
        let timetable = wednesday_timetable();
        let mut now = wednesday_at("08:00:00");
        while now < wednesday_at("08:45:00") {
            let status = resolve_status(&timetable, now);
            assert_eq!(status.period.as_ref().map(|p| p.period), Some(1));
            assert!(status.minutes_to_bell >= 0);
            now += chrono::Duration::seconds(37);
        }
    }

    #[test]
    fn test_unparseable_time_keeps_sentinel() {
        let schedules = vec![period(3, 1, "08:00:00", "08:45:xx")];
        let status = resolve_status(&schedules, wednesday_at("08:10:00"));

        assert_eq!(status.period.as_ref().map(|p| p.period), Some(1));
        assert_eq!(status.minutes_to_bell, NO_BELL_PENDING);
        assert_eq!(status.time_remaining, "");
    }

    #[test]
    fn test_status_json_uses_camel_case() {
        let status = resolve_status(&wednesday_timetable(), wednesday_at("08:47:00"));
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["minutesToBell"], 3);
        assert_eq!(json["isBreak"], true);
        assert_eq!(json["timeRemaining"], "Starts in 3 min");
        assert!(json["period"].is_null());
        assert_eq!(json["nextPeriod"]["period"], 2);
    }
}
