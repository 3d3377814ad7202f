//! Single-sheet workbook with a bold header row.

use rust_xlsxwriter::{Format, Workbook};
use timetable_core::types::AssignmentView;

use crate::ExportError;

pub const SHEET_NAME: &str = "Timetable";
pub const HEADERS: [&str; 5] = ["Day", "Time", "Course", "Faculty", "Room"];

pub fn cells(row: &AssignmentView) -> [String; 5] {
    [
        row.day.to_string(),
        row.time_range(),
        row.course_name.clone(),
        row.faculty_name.clone(),
        row.room_name.clone(),
    ]
}

pub fn render(rows: &[AssignmentView]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in HEADERS.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *header, &header_format)?;
        worksheet.set_column_width(col, 22)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        for (col, value) in cells(row).into_iter().enumerate() {
            worksheet.write_string(line, col as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
