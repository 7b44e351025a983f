//! Student import from spreadsheets.
//!
//! The pipeline reads the first worksheet into a grid, finds the header row,
//! maps each following row to a candidate student, validates the candidates
//! against the selected class and teacher, then writes the valid ones one by
//! one. Nothing is deduplicated: importing the same file twice creates every
//! student twice.

pub mod age;
pub mod header;
pub mod rows;
pub mod sheet;
pub mod template;
pub mod validate;
pub mod writer;

use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub use sheet::Grid;
pub use validate::Selection;
pub use writer::{NewStudent, RowOutcome, StudentSink};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("header not found: no row has a Nom, Prénom or Name column")]
    HeaderNotFound,
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("failed to read spreadsheet: {0}")]
    Read(String),
    #[error("spreadsheet has no worksheet")]
    NoWorksheet,
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::HeaderNotFound => "import_header_not_found",
            ImportError::UnsupportedFileType(_) => "import_unsupported_file",
            ImportError::Read(_) | ImportError::NoWorksheet => "import_read_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowReport {
    pub row_number: usize,
    pub name: String,
    pub age: Option<u32>,
    pub birth_date: Option<String>,
    pub valid: bool,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RowOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// 1-based sheet row of the header.
    pub header_row: usize,
    pub total_rows: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub attempted_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub rows: Vec<RowReport>,
}

/// Reads, maps and validates without writing anything.
pub fn preview(grid: &Grid, selection: &Selection, today: NaiveDate) -> Result<ImportReport, ImportError> {
    let header = header::locate_header(&grid.rows)?;
    let candidates = rows::map_rows(grid, &header, today);

    let row_reports: Vec<RowReport> = candidates
        .into_iter()
        .map(|c| {
            let reasons = validate::validate(&c.name, c.age, selection);
            RowReport {
                row_number: c.row_number,
                name: c.name,
                age: c.age,
                birth_date: c.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                valid: reasons.is_empty(),
                reasons,
                outcome: None,
            }
        })
        .collect();

    let valid_count = row_reports.iter().filter(|r| r.valid).count();
    Ok(ImportReport {
        header_row: grid.sheet_row_number(header.row_index),
        total_rows: row_reports.len(),
        valid_count,
        invalid_count: row_reports.len() - valid_count,
        attempted_count: 0,
        success_count: 0,
        error_count: 0,
        rows: row_reports,
    })
}

/// Full import: invalid rows are reported and skipped, valid rows are handed
/// to `sink` in sheet order.
pub fn run<S: StudentSink + ?Sized>(
    grid: &Grid,
    selection: &Selection,
    today: NaiveDate,
    sink: &mut S,
) -> Result<ImportReport, ImportError> {
    let mut report = preview(grid, selection, today)?;

    let mut pending: Vec<(usize, NewStudent)> = Vec::new();
    for (idx, row) in report.rows.iter().enumerate() {
        if !row.valid {
            continue;
        }
        let Some(age) = row.age else { continue };
        if let Some(student) = writer::new_student(&row.name, age, selection) {
            pending.push((idx, student));
        }
    }

    let students: Vec<NewStudent> = pending.iter().map(|(_, s)| s.clone()).collect();
    let outcomes = writer::write_students(sink, &students);
    for ((idx, _), outcome) in pending.iter().zip(outcomes) {
        report.rows[*idx].outcome = Some(outcome);
    }

    let outcomes = report.rows.iter().filter_map(|r| r.outcome.as_ref());
    report.success_count = outcomes.clone().filter(|o| o.is_created()).count();
    report.error_count = outcomes.filter(|o| !o.is_created()).count();
    report.attempted_count = report.success_count + report.error_count;

    tracing::info!(
        total = report.total_rows,
        valid = report.valid_count,
        created = report.success_count,
        failed = report.error_count,
        "student import finished"
    );
    Ok(report)
}

pub fn read_grid(path: &Path) -> Result<Grid, ImportError> {
    sheet::read_grid(path)
}
