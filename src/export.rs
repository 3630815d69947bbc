use axum::http::header;
use axum::response::{IntoResponse, Response};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};

use crate::calendar::CalendarLayout;
use crate::error::AppResult;
use crate::mileage::KilometerMap;

/// Content type of generated workbooks
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Response serving `bytes` as a file download
pub fn attachment(bytes: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Escape one CSV field - commas, quotes and newlines force quoting
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a kilometer map as CSV, one line per route plus a total line
pub fn kilometer_csv(map: &KilometerMap) -> String {
    let mut csv_content = String::from("date,origin,destination,waypoints,project,kilometers\n");

    for line in &map.routes {
        let fields = [
            line.date.to_string(),
            line.origin.clone(),
            line.destination.clone(),
            line.waypoints.join(" > "),
            line.project_name.clone().unwrap_or_default(),
            format!("{:.1}", line.kilometers),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        csv_content.push_str(&row.join(","));
        csv_content.push('\n');
    }

    csv_content.push_str(&format!("total,,,,,{:.1}\n", map.total_kilometers));
    csv_content
}

/// Convert a kilometer map to an XLSX workbook
///
/// The first sheet lists every route, the second one the per-day totals.
pub fn kilometer_xlsx(map: &KilometerMap) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let km = Format::new().set_num_format("0.0");
    let bold_km = Format::new().set_bold().set_num_format("0.0");

    let mut routes = Worksheet::new();
    routes.set_name("Routes")?;
    let headers = ["Date", "Origin", "Destination", "Waypoints", "Project", "Kilometers"];
    for (col, title) in headers.iter().enumerate() {
        routes.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    let mut row = 1u32;
    for line in &map.routes {
        routes.write_string(row, 0, line.date.to_string())?;
        routes.write_string(row, 1, &line.origin)?;
        routes.write_string(row, 2, &line.destination)?;
        routes.write_string(row, 3, line.waypoints.join(" > "))?;
        routes.write_string(row, 4, line.project_name.as_deref().unwrap_or(""))?;
        routes.write_number_with_format(row, 5, line.kilometers, &km)?;
        row += 1;
    }
    routes.write_string_with_format(row + 1, 0, "Total", &bold)?;
    routes.write_number_with_format(row + 1, 5, map.total_kilometers, &bold_km)?;
    routes.set_column_width(1, 24)?;
    routes.set_column_width(2, 24)?;
    routes.set_column_width(3, 30)?;
    routes.set_column_width(4, 20)?;

    let mut days = Worksheet::new();
    days.set_name("Per day")?;
    days.write_string_with_format(0, 0, "Date", &bold)?;
    days.write_string_with_format(0, 1, "Kilometers", &bold)?;
    for (i, total) in map.days.iter().enumerate() {
        let row = i as u32 + 1;
        days.write_string(row, 0, total.date.to_string())?;
        days.write_number_with_format(row, 1, total.kilometers, &km)?;
    }

    workbook.push_worksheet(routes);
    workbook.push_worksheet(days);
    Ok(workbook.save_to_buffer()?)
}

fn parse_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    u32::from_str_radix(digits, 16).ok().map(Color::RGB)
}

/// Convert a calendar layout to an XLSX overview
///
/// One row per owner, one column per day of the month; held days are
/// filled with the owner's color and marked with the lane number.
pub fn holiday_xlsx(layout: &CalendarLayout) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut sheet = Worksheet::new();
    sheet.set_name(layout.year_month.to_string())?;
    let bold = Format::new().set_bold();

    sheet.write_string_with_format(0, 0, "Name", &bold)?;
    for day in 1..=layout.days_in_month {
        sheet.write_number_with_format(0, day as u16, day as f64, &bold)?;
        sheet.set_column_width(day as u16, 4)?;
    }
    let comment_col = layout.days_in_month as u16 + 1;
    sheet.write_string_with_format(0, comment_col, "Comments", &bold)?;
    sheet.set_column_width(0, 22)?;
    sheet.set_column_width(comment_col, 40)?;

    let mut owners: Vec<&str> = Vec::new();
    for span in &layout.spans {
        if !owners.contains(&span.owner_id.as_str()) {
            owners.push(&span.owner_id);
        }
    }

    for (i, owner) in owners.iter().enumerate() {
        let row = i as u32 + 1;
        let mut comments: Vec<&str> = Vec::new();
        if let Some(first) = layout.spans_of(owner).next() {
            let name = if first.is_preview {
                format!("{} (preview)", first.display_name)
            } else {
                first.display_name.clone()
            };
            sheet.write_string(row, 0, name)?;
        }
        for span in layout.spans_of(owner) {
            let mut fill = Format::new();
            if let Some(color) = parse_color(&span.display_color) {
                fill = fill.set_background_color(color);
            }
            for day in &span.days {
                sheet.write_number_with_format(row, *day as u16, span.slot as f64, &fill)?;
            }
            if let Some(text) = &span.comment_text {
                comments.push(text);
            }
        }
        if !comments.is_empty() {
            sheet.write_string(row, comment_col, comments.join("; "))?;
        }
    }

    workbook.push_worksheet(sheet);
    Ok(workbook.save_to_buffer()?)
}
