use std::fs;
use std::path::Path;

use color_eyre::Result;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};

use crate::normalize::{JobRow, HEADERS};

const HEADER_FILL: Color = Color::RGB(0xFFFF99);

fn column_width(header: &str) -> f64 {
    match header {
        "COMMODITY" => 50.0,
        "REMARKS" => 60.0,
        "JOB NO AND DATE" | "SUPPLIER/ EXPORTER" | "SHIPPING LINE" => 40.0,
        "INVOICE VALUE AND UNIT PRICE" | "BE NUMBER AND DATE" | "DETAILED STATUS" => 35.0,
        "CONTAINER NUM & SIZE" => 30.0,
        "INVOICE NUMBER AND DATE" | "BL NUMBER AND DATE" | "PORT" => 25.0,
        "NET WEIGHT" | "ARRIVAL DATE" | "DETENTION FROM" | "NUMBER OF CONTAINERS" => 15.0,
        "FREE TIME" => 12.0,
        _ => 20.0,
    }
}

/// Row fill keyed on the clearance stage, so the report reads at a glance.
fn status_fill(detailed_status: &str) -> Color {
    match detailed_status {
        "Estimated Time of Arrival" => Color::RGB(0xFFFF99),
        "Custom Clearance Completed" => Color::RGB(0xCCFFFF),
        "PCV Done, Duty Payment Pending" => Color::RGB(0xFFDBFF),
        "Discharged" | "Gateway IGM Filed" => Color::RGB(0xFFCC99),
        "BE Noted, Arrival Pending" | "BE Noted, Clearance Pending" => Color::RGB(0x99CCFF),
        _ => Color::White,
    }
}

/// Render the job table as a single-sheet xlsx report: styled header row
/// plus one centered row per job.
pub fn write_report(rows: &[JobRow], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let header_format = Format::new()
        .set_bold()
        .set_background_color(HEADER_FILL)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    for (col, header) in HEADERS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, column_width(header))?;
        sheet.write_string_with_format(0, col, *header, &header_format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let data_format = Format::new()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_background_color(status_fill(&row.detailed_status));

        for (col, cell) in row.cells().iter().enumerate() {
            sheet.write_string_with_format(i as u32 + 1, col as u16, *cell, &data_format)?;
        }
    }

    // Saved to a sibling temp path and renamed into place; the download
    // endpoint reads this file while a refresh may be writing it.
    let tmp = path.with_extension("xlsx.tmp");
    workbook.save(&tmp)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobRecord;

    #[test]
    fn writes_a_non_empty_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        let rows = vec![JobRow::from_record(&JobRecord {
            job_no: Some("INC/00123/24-25".into()),
            detailed_status: Some("Discharged".into()),
            ..Default::default()
        })];
        write_report(&rows, &path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.len() > 0);
    }

    #[test]
    fn rewrite_replaces_in_place_without_leftover_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        write_report(&[], &path).unwrap();
        let rows = vec![JobRow::from_record(&JobRecord {
            job_no: Some("INC/00123/24-25".into()),
            ..Default::default()
        })];
        write_report(&rows, &path).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("report.xlsx.tmp").exists());
    }

    #[test]
    fn empty_table_still_produces_header_only_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_report(&[], &path).unwrap();
        assert!(path.exists());
    }
}
