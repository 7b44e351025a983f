use crate::db;
use crate::ipc::helpers::{
    get_optional_bool, get_optional_str, get_required_str, get_required_text, require_exists,
    with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn class_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: String = r.get(0)?;
    let name: String = r.get(1)?;
    let level: String = r.get(2)?;
    let active: i64 = r.get(3)?;
    let student_count: i64 = r.get(4)?;
    Ok(json!({
        "id": id,
        "name": name,
        "level": level,
        "active": active != 0,
        "studentCount": student_count
    }))
}

// Correlated subquery so the count is not multiplied by joins.
const CLASS_SELECT: &str = "SELECT
       c.id,
       c.name,
       c.level,
       c.active,
       (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count
     FROM classes c";

fn classes_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let active_only = get_optional_bool(params, "activeOnly")?.unwrap_or(false);
    let mut stmt = conn
        .prepare(&format!(
            "{} WHERE (?1 = 0 OR c.active = 1) ORDER BY c.level, c.name",
            CLASS_SELECT
        ))
        .map_err(HandlerErr::query)?;
    let classes = stmt
        .query_map([active_only as i64], class_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;
    Ok(json!({ "classes": classes }))
}

fn classes_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let class = conn
        .query_row(
            &format!("{} WHERE c.id = ?", CLASS_SELECT),
            [&class_id],
            class_from_row,
        )
        .optional()
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("class"))?;
    Ok(json!({ "class": class }))
}

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_text(params, "name")?;
    let level = get_optional_str(params, "level").unwrap_or_default();

    let class_id = db::new_id();
    conn.execute(
        "INSERT INTO classes(id, name, level, active, created_at) VALUES(?, ?, ?, 1, ?)",
        (&class_id, &name, &level, db::now_rfc3339()),
    )
    .map_err(|e| HandlerErr::write("db_insert_failed", "classes", e))?;

    Ok(json!({ "classId": class_id, "name": name, "level": level }))
}

fn classes_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_exists(conn, "classes", &class_id, "class")?;

    if let Some(name) = get_optional_str(params, "name") {
        conn.execute("UPDATE classes SET name = ? WHERE id = ?", (&name, &class_id))
            .map_err(|e| HandlerErr::write("db_update_failed", "classes", e))?;
    }
    if params.get("level").is_some() {
        let level = get_optional_str(params, "level").unwrap_or_default();
        conn.execute("UPDATE classes SET level = ? WHERE id = ?", (&level, &class_id))
            .map_err(|e| HandlerErr::write("db_update_failed", "classes", e))?;
    }
    if let Some(active) = get_optional_bool(params, "active")? {
        conn.execute(
            "UPDATE classes SET active = ? WHERE id = ?",
            (active as i64, &class_id),
        )
        .map_err(|e| HandlerErr::write("db_update_failed", "classes", e))?;
    }

    classes_get(conn, &json!({ "classId": class_id }))
}

fn classes_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_exists(conn, "classes", &class_id, "class")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    // Reading history of the class's students, then the students, then the class.
    let history_deleted = tx
        .execute(
            "DELETE FROM reading_history
             WHERE student_id IN (SELECT s.id FROM students s WHERE s.class_id = ?)",
            [&class_id],
        )
        .map_err(|e| HandlerErr::write("db_delete_failed", "reading_history", e))?;
    let students_deleted = tx
        .execute("DELETE FROM students WHERE class_id = ?", [&class_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "students", e))?;
    tx.execute("DELETE FROM classes WHERE id = ?", [&class_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "classes", e))?;

    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    tracing::info!(
        class_id = %class_id,
        students = students_deleted,
        history = history_deleted,
        "class deleted"
    );
    Ok(json!({
        "deleted": true,
        "studentsDeleted": students_deleted,
        "readingHistoryDeleted": history_deleted
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "classes.list" => classes_list,
        "classes.get" => classes_get,
        "classes.create" => classes_create,
        "classes.update" => classes_update,
        "classes.delete" => classes_delete,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
