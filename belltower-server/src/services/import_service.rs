use crate::db::DbConnection;
use crate::models::{NewSchedule, Schedule};
use belltower_core::ModelError;
use diesel::prelude::*;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Empty CSV")]
    Empty,

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// Raw CSV row; numeric columns are coerced after trimming.
#[derive(Debug, Deserialize)]
struct CsvScheduleRow {
    screen_id: String,
    weekday: String,
    period: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    teacher: String,
}

impl CsvScheduleRow {
    fn into_schedule(self, row: usize) -> Result<NewSchedule, ImportError> {
        let invalid = |message: String| ImportError::InvalidRow { row, message };

        if self.screen_id.is_empty() {
            return Err(invalid("screen_id is empty".to_string()));
        }
        let weekday = self
            .weekday
            .parse::<i32>()
            .map_err(|_| invalid(format!("weekday '{}' is not an integer", self.weekday)))?;
        let period = self
            .period
            .parse::<i32>()
            .map_err(|_| invalid(format!("period '{}' is not an integer", self.period)))?;

        NewSchedule {
            screen_id: self.screen_id,
            weekday,
            period,
            teacher: self.teacher,
            start_time: self.start_time,
            end_time: self.end_time,
        }
        .normalized()
        .map_err(|e: ModelError| invalid(e.to_string()))
    }
}

/// Parses a timetable CSV with a header row naming
/// `screen_id, weekday, period, start_time, end_time, teacher` in any order.
/// Fails on the first bad row; blank lines are skipped.
pub fn parse_schedule_csv(csv_text: &str) -> Result<Vec<NewSchedule>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<CsvScheduleRow>().enumerate() {
        let raw = result?;
        rows.push(raw.into_schedule(index + 1)?);
    }

    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rows)
}

/// Inserts every row or none of them.
pub fn insert_schedules(
    conn: &mut DbConnection,
    rows: &[NewSchedule],
) -> Result<Vec<Schedule>, diesel::result::Error> {
    use crate::schema::schedules;

    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        rows.iter()
            .map(|row| {
                diesel::insert_into(schedules::table)
                    .values(row)
                    .returning(Schedule::as_select())
                    .get_result(conn)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_csv() {
        let csv_text = "screen_id,weekday,period,start_time,end_time,teacher\n\
                        room_101,3,1,08:00:00,08:45:00,Ms. Ortiz\n\
                        \n\
                        room_101, 3 , 2 ,8:50,9:35,Mr. Chen\n";

        let rows = parse_schedule_csv(csv_text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].weekday, 3);
        assert_eq!(rows[1].period, 2);
        assert_eq!(rows[1].start_time, "08:50:00");
        assert_eq!(rows[1].end_time, "09:35:00");
        assert_eq!(rows[1].teacher, "Mr. Chen");
    }

    #[test]
    fn test_columns_in_any_order() {
        let csv_text = "teacher,end_time,start_time,period,weekday,screen_id\n\
                        Ms. Ortiz,08:45,08:00,1,5,gym\n";

        let rows = parse_schedule_csv(csv_text).unwrap();
        assert_eq!(rows[0].screen_id, "gym");
        assert_eq!(rows[0].weekday, 5);
        assert_eq!(rows[0].start_time, "08:00:00");
    }

    #[test]
    fn test_empty_csv_rejected() {
        assert!(matches!(parse_schedule_csv(""), Err(ImportError::Empty)));
        assert!(matches!(
            parse_schedule_csv("screen_id,weekday,period,start_time,end_time,teacher\n"),
            Err(ImportError::Empty)
        ));
    }

    #[test]
    fn test_bad_row_fails_whole_import() {
        let csv_text = "screen_id,weekday,period,start_time,end_time,teacher\n\
                        room_101,3,1,08:00,08:45,A\n\
                        room_101,Wed,2,08:50,09:35,B\n";

        match parse_schedule_csv(csv_text) {
            Err(ImportError::InvalidRow { row, message }) => {
                assert_eq!(row, 2);
                assert!(message.contains("weekday"));
            }
            other => panic!("expected invalid row, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_times_rejected() {
        let csv_text = "screen_id,weekday,period,start_time,end_time,teacher\n\
                        room_101,3,1,09:00,08:00,A\n";
        assert!(matches!(
            parse_schedule_csv(csv_text),
            Err(ImportError::InvalidRow { row: 1, .. })
        ));

        let csv_text = "screen_id,weekday,period,start_time,end_time,teacher\n\
                        room_101,9,1,08:00,08:45,A\n";
        assert!(matches!(
            parse_schedule_csv(csv_text),
            Err(ImportError::InvalidRow { row: 1, .. })
        ));
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let csv_text = "screen_id,weekday,start_time,end_time\nroom_101,3,08:00,08:45\n";
        assert!(matches!(parse_schedule_csv(csv_text), Err(ImportError::Csv(_))));
    }
}
