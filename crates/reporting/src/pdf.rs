//! A4 listing: a centred title, then one line per assignment.

use printpdf::{BuiltinFont, Mm, PdfDocument};
use timetable_core::types::AssignmentView;

use crate::ExportError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const TITLE_SIZE: f32 = 18.0;
const BODY_SIZE: f32 = 11.0;
const LINE_HEIGHT: f32 = 7.0;
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

pub fn title(rows: &[AssignmentView]) -> String {
    match rows.first() {
        Some(row) => format!("Timetable - Semester {}", row.semester),
        None => "Timetable - Semester Unknown".to_string(),
    }
}

pub fn line(row: &AssignmentView) -> String {
    format!(
        "{} {}: {} | {} | {}",
        row.day,
        row.time_range(),
        row.course_name,
        row.faculty_name,
        row.room_name
    )
}

/// Split the listing into pages. The first page loses two lines to the title.
fn paginate(lines: Vec<String>) -> Vec<Vec<String>> {
    let per_page = ((PAGE_HEIGHT - 2.0 * MARGIN) / LINE_HEIGHT) as usize;
    let first = per_page.saturating_sub(2);

    let mut pages = Vec::new();
    let mut lines = lines.into_iter();
    pages.push(lines.by_ref().take(first).collect::<Vec<_>>());
    loop {
        let page: Vec<String> = lines.by_ref().take(per_page).collect();
        if page.is_empty() {
            break;
        }
        pages.push(page);
    }
    pages
}

pub fn render(rows: &[AssignmentView]) -> Result<Vec<u8>, ExportError> {
    let (doc, first_page, first_layer) = PdfDocument::new("Timetable", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let body = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    let heading = title(rows);
    let heading_width = heading.chars().count() as f32 * TITLE_SIZE * AVG_GLYPH_WIDTH * PT_TO_MM;
    let pages = paginate(rows.iter().map(line).collect());

    for (index, lines) in pages.into_iter().enumerate() {
        let mut y = PAGE_HEIGHT - MARGIN;
        let layer = if index == 0 {
            let layer = doc.get_page(first_page).get_layer(first_layer);
            layer.use_text(
                heading.clone(),
                TITLE_SIZE,
                Mm(((PAGE_WIDTH - heading_width) / 2.0).max(MARGIN)),
                Mm(y),
                &bold,
            );
            y -= LINE_HEIGHT * 2.0;
            layer
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        for text in lines {
            layer.use_text(text, BODY_SIZE, Mm(MARGIN), Mm(y), &body);
            y -= LINE_HEIGHT;
        }
    }

    doc.save_to_bytes().map_err(|e| ExportError::Pdf(e.to_string()))
}
