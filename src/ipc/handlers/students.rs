use crate::auth::{Role, Session};
use crate::db::{self, StudentFields};
use crate::import::validate::{age_problem, name_problem};
use crate::ipc::handlers::reading::visible_student;
use crate::ipc::handlers::users::find_user;
use crate::ipc::helpers::{
    get_optional_bool, get_optional_str, get_optional_u32, get_required_str, get_required_text,
    require_exists, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
    pub parent_id: Option<String>,
    pub account_id: Option<String>,
    pub active: bool,
}

impl StudentRow {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "age": self.age,
            "classId": self.class_id,
            "teacherId": self.teacher_id,
            "parentId": self.parent_id,
            "accountId": self.account_id,
            "active": self.active,
        })
    }
}

const STUDENT_COLUMNS: &str =
    "id, name, age, class_id, teacher_id, parent_id, account_id, active";

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        name: r.get(1)?,
        age: r.get(2)?,
        class_id: r.get(3)?,
        teacher_id: r.get(4)?,
        parent_id: r.get(5)?,
        account_id: r.get(6)?,
        active: r.get::<_, i64>(7)? != 0,
    })
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
    pub parent_id: Option<String>,
    pub account_id: Option<String>,
}

pub fn list_students(conn: &Connection, filter: &StudentFilter) -> Result<Vec<StudentRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM students
             WHERE (?1 IS NULL OR class_id = ?1)
               AND (?2 IS NULL OR teacher_id = ?2)
               AND (?3 IS NULL OR parent_id = ?3)
               AND (?4 IS NULL OR account_id = ?4)
             ORDER BY name, created_at",
            STUDENT_COLUMNS
        ))
        .map_err(HandlerErr::query)?;
    stmt.query_map(
        (
            &filter.class_id,
            &filter.teacher_id,
            &filter.parent_id,
            &filter.account_id,
        ),
        student_from_row,
    )
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

pub fn find_student(conn: &Connection, student_id: &str) -> Result<Option<StudentRow>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS),
        [student_id],
        student_from_row,
    )
    .optional()
    .map_err(HandlerErr::query)
}

fn check_fields(name: &str, age: Option<u32>) -> Result<(), HandlerErr> {
    let problems: Vec<String> = name_problem(name)
        .into_iter()
        .chain(age_problem(age))
        .collect();
    if problems.is_empty() {
        return Ok(());
    }
    Err(HandlerErr {
        code: "bad_params",
        message: problems.join("; "),
        details: Some(json!({ "reasons": problems })),
    })
}

fn students_list(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut filter = StudentFilter {
        class_id: get_optional_str(params, "classId"),
        teacher_id: get_optional_str(params, "teacherId"),
        parent_id: get_optional_str(params, "parentId"),
        account_id: None,
    };
    // Only admins list freely; everyone else sees the students linked to them.
    if let Some(session) = session {
        let own = Some(session.user_id.clone());
        match session.role {
            Role::Admin => {}
            Role::Teacher => filter.teacher_id = own,
            Role::Parent => filter.parent_id = own,
            Role::Student => filter.account_id = own,
        }
    }
    let students: Vec<serde_json::Value> = list_students(conn, &filter)?
        .iter()
        .map(StudentRow::to_json)
        .collect();
    Ok(json!({ "students": students }))
}

/// A linked login must be an existing `student` account.
fn check_account(conn: &Connection, account_id: Option<&str>) -> Result<(), HandlerErr> {
    let Some(account_id) = account_id else {
        return Ok(());
    };
    match find_user(conn, account_id)? {
        Some(user) if user.role == Role::Student => Ok(()),
        Some(_) => Err(HandlerErr::bad_params("accountId must be a student account")),
        None => Err(HandlerErr::not_found("account")),
    }
}

fn students_get(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = visible_student(conn, session, &student_id)?;
    Ok(json!({ "student": student.to_json() }))
}

fn students_create(
    conn: &Connection,
    _session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_text(params, "name")?;
    let age = get_optional_u32(params, "age")?;
    check_fields(&name, age)?;

    let class_id = get_optional_str(params, "classId");
    let teacher_id = get_optional_str(params, "teacherId");
    let parent_id = get_optional_str(params, "parentId");
    let account_id = get_optional_str(params, "accountId");
    if let Some(class_id) = class_id.as_deref() {
        require_exists(conn, "classes", class_id, "class")?;
    }
    check_account(conn, account_id.as_deref())?;

    let student_id = db::insert_student(
        conn,
        &StudentFields {
            name: &name,
            age,
            class_id: class_id.as_deref(),
            teacher_id: teacher_id.as_deref(),
            parent_id: parent_id.as_deref(),
            account_id: account_id.as_deref(),
        },
    )
    .map_err(|e| HandlerErr::write("db_insert_failed", "students", e))?;

    let student = find_student(conn, &student_id)?.ok_or_else(|| HandlerErr::not_found("student"))?;
    Ok(json!({ "student": student.to_json() }))
}

fn students_update(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let mut s = visible_student(conn, session, &student_id)?;

    if let Some(name) = get_optional_str(params, "name") {
        s.name = name;
    }
    if let Some(age) = get_optional_u32(params, "age")? {
        s.age = Some(age);
    }
    check_fields(&s.name, s.age)?;

    // Present-but-empty clears a reference.
    for (key, slot) in [
        ("classId", &mut s.class_id),
        ("teacherId", &mut s.teacher_id),
        ("parentId", &mut s.parent_id),
        ("accountId", &mut s.account_id),
    ] {
        if params.get(key).is_some() {
            *slot = get_optional_str(params, key);
        }
    }
    if let Some(class_id) = s.class_id.as_deref() {
        require_exists(conn, "classes", class_id, "class")?;
    }
    check_account(conn, s.account_id.as_deref())?;
    if let Some(active) = get_optional_bool(params, "active")? {
        s.active = active;
    }

    conn.execute(
        "UPDATE students
         SET name = ?, age = ?, class_id = ?, teacher_id = ?, parent_id = ?, account_id = ?,
             active = ?
         WHERE id = ?",
        (
            &s.name,
            s.age,
            &s.class_id,
            &s.teacher_id,
            &s.parent_id,
            &s.account_id,
            s.active as i64,
            &s.id,
        ),
    )
    .map_err(|e| HandlerErr::write("db_update_failed", "students", e))?;
    Ok(json!({ "student": s.to_json() }))
}

fn students_delete(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    visible_student(conn, session, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let history_deleted = tx
        .execute(
            "DELETE FROM reading_history WHERE student_id = ?",
            [&student_id],
        )
        .map_err(|e| HandlerErr::write("db_delete_failed", "reading_history", e))?;
    tx.execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "students", e))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "deleted": true, "readingHistoryDeleted": history_deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        _ => return None,
    };
    let session = state.session.clone();
    Some(with_db(state, req, |conn, params| {
        f(conn, session.as_ref(), params)
    }))
}
