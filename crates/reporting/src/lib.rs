//! Timetable exports: a printable PDF, an xlsx workbook, and an iCalendar
//! feed of the assignments a caller may see.

pub mod excel;
pub mod ical;
pub mod pdf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use timetable_core::types::AssignmentView;
use timetable_core::TimetableError;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("Spreadsheet rendering failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
}

impl From<ExportError> for TimetableError {
    fn from(err: ExportError) -> Self {
        TimetableError::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Pdf,
    Excel,
    Ical,
}

impl ExportFormat {
    pub fn render(&self, rows: &[AssignmentView], reference_monday: NaiveDate) -> Result<Vec<u8>, ExportError> {
        debug!(format = self.extension(), rows = rows.len(), "Rendering export");
        match self {
            ExportFormat::Pdf => pdf::render(rows),
            ExportFormat::Excel => excel::render(rows),
            ExportFormat::Ical => Ok(ical::render(rows, reference_monday).into_bytes()),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Ical => "ics",
        }
    }

    pub fn filename(&self) -> String {
        format!("timetable.{}", self.extension())
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Ical => "text/calendar; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    /// Matches the route segment: `/export/pdf`, `/export/excel`, `/export/ical`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" => Ok(ExportFormat::Excel),
            "ical" => Ok(ExportFormat::Ical),
            other => Err(format!("Unknown export format: {other}")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segment = match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
            ExportFormat::Ical => "ical",
        };
        f.write_str(segment)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveTime;
    use timetable_core::types::{AssignmentView, Weekday};

    pub fn row(id: i32, day: Weekday, hour: u32, course: &str) -> AssignmentView {
        AssignmentView {
            id,
            course_id: id,
            faculty_id: 10,
            room_id: 20,
            time_slot_id: 30,
            semester: 3,
            college_id: Some(1),
            department_id: Some(1),
            course_name: course.to_string(),
            course_code: format!("C{id}"),
            faculty_name: "Dr. Rao".to_string(),
            room_name: "LH-1".to_string(),
            day,
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(hour + 1, 30, 0).unwrap(),
        }
    }
}
