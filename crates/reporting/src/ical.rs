//! Calendar feed. Each assignment lands on its weekday within one fixed
//! reference week, as floating local times.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::{Calendar, Component, Event, EventLike};
use timetable_core::types::{AssignmentView, Weekday};

pub const CALENDAR_NAME: &str = "Timetable";

pub fn date_in_week(reference_monday: NaiveDate, day: Weekday) -> NaiveDate {
    reference_monday + Duration::days(i64::from(day.offset_from_monday()))
}

fn event(row: &AssignmentView, reference_monday: NaiveDate) -> Event {
    let date = date_in_week(reference_monday, row.day);
    Event::new()
        .uid(&format!("timetable-assignment-{}", row.id))
        .summary(&row.course_name)
        .location(&row.room_name)
        .starts(NaiveDateTime::new(date, row.start_time))
        .ends(NaiveDateTime::new(date, row.end_time))
        .done()
}

pub fn render(rows: &[AssignmentView], reference_monday: NaiveDate) -> String {
    let mut calendar = Calendar::new();
    calendar.name(CALENDAR_NAME);
    for row in rows {
        calendar.push(event(row, reference_monday));
    }
    calendar.done().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::row;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 22).unwrap()
    }

    #[test]
    fn test_weekday_dates() {
        assert_eq!(date_in_week(monday(), Weekday::Monday), monday());
        assert_eq!(
            date_in_week(monday(), Weekday::Friday),
            NaiveDate::from_ymd_opt(2025, 9, 26).unwrap()
        );
    }

    #[test]
    fn test_events() {
        let feed = render(
            &[
                row(1, Weekday::Monday, 9, "Algorithms"),
                row(2, Weekday::Wednesday, 14, "Databases"),
            ],
            monday(),
        );
        assert!(feed.starts_with("BEGIN:VCALENDAR"));
        assert!(feed.contains("NAME:Timetable"));
        assert_eq!(feed.matches("BEGIN:VEVENT").count(), 2);
        assert!(feed.contains("SUMMARY:Algorithms"));
        assert!(feed.contains("LOCATION:LH-1"));
        assert!(feed.contains("DTSTART:20250922T090000"));
        assert!(feed.contains("DTEND:20250922T103000"));
        assert!(feed.contains("DTSTART:20250924T140000"));
    }

    #[test]
    fn test_empty_feed() {
        let feed = render(&[], monday());
        assert!(feed.contains("BEGIN:VCALENDAR"));
        assert!(!feed.contains("BEGIN:VEVENT"));
    }
}
