use crate::db::{self, StudentFields};
use crate::import::{self, template, ImportError, NewStudent, Selection, StudentSink};
use crate::ipc::helpers::{get_optional_str, get_required_text, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::Local;
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

pub const DEFAULT_CLASS_SETTING: &str = "import.defaultClassId";

/// Autocommit inserts: every student is its own write, nothing is rolled back.
struct SqliteStudentSink<'a> {
    conn: &'a Connection,
}

impl StudentSink for SqliteStudentSink<'_> {
    fn insert_student(&mut self, student: &NewStudent) -> anyhow::Result<String> {
        db::insert_student(
            self.conn,
            &StudentFields {
                name: &student.name,
                age: Some(student.age),
                class_id: Some(&student.class_id),
                teacher_id: Some(&student.teacher_id),
                parent_id: None,
                account_id: None,
            },
        )
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

fn selection_from(conn: &Connection, params: &serde_json::Value) -> Result<Selection, HandlerErr> {
    let class_id = match get_optional_str(params, "classId") {
        Some(id) => Some(id),
        None => db::settings_get_json(conn, DEFAULT_CLASS_SETTING)
            .map_err(HandlerErr::query)?
            .and_then(|v| v.as_str().map(str::to_string)),
    };
    let teacher_id = get_optional_str(params, "teacherId");
    Ok(Selection::new(class_id.as_deref(), teacher_id.as_deref()))
}

fn read_sheet(params: &serde_json::Value) -> Result<import::Grid, HandlerErr> {
    let path = PathBuf::from(get_required_text(params, "path")?);
    import::read_grid(&path).map_err(|e| HandlerErr {
        code: e.code(),
        message: e.to_string(),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })
}

fn import_preview(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let selection = selection_from(conn, params)?;
    let grid = read_sheet(params)?;
    let report = import::preview(&grid, &selection, Local::now().date_naive())?;
    Ok(json!({ "report": report }))
}

fn import_commit(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let selection = selection_from(conn, params)?;
    let grid = read_sheet(params)?;
    let mut sink = SqliteStudentSink { conn };
    let report = import::run(&grid, &selection, Local::now().date_naive(), &mut sink)?;
    Ok(json!({ "report": report }))
}

fn import_template(_conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_text(params, "outPath")?);
    let summary = template::write_template(&out_path).map_err(|e| HandlerErr {
        code: "template_write_failed",
        message: e.to_string(),
        details: Some(json!({ "outPath": out_path.to_string_lossy() })),
    })?;
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "sampleRows": summary.sample_rows,
        "entryCount": summary.entry_count
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "import.preview" => import_preview,
        "import.commit" => import_commit,
        "import.template" => import_template,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
