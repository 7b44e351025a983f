use crate::auth::{Role, Session};
use crate::db;
use crate::ipc::handlers::questions::list_questions;
use crate::ipc::handlers::students::{find_student, StudentRow};
use crate::ipc::helpers::{get_required_str, require_exists, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: String,
    pub student_id: String,
    pub story_id: String,
    pub story_title: Option<String>,
    pub completed_at: String,
    pub score: Option<f64>,
}

impl HistoryRow {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "studentId": self.student_id,
            "storyId": self.story_id,
            "storyTitle": self.story_title,
            "completedAt": self.completed_at,
            "score": self.score,
        })
    }
}

/// Admins reach every student. Parents reach their own children, teachers
/// their own students and a student login only the record linked to it.
pub fn visible_student(
    conn: &Connection,
    session: Option<&Session>,
    student_id: &str,
) -> Result<StudentRow, HandlerErr> {
    let student = find_student(conn, student_id)?.ok_or_else(|| HandlerErr::not_found("student"))?;
    let Some(session) = session else {
        return Ok(student);
    };
    let owner = match session.role {
        Role::Parent => student.parent_id.as_deref(),
        Role::Teacher => student.teacher_id.as_deref(),
        Role::Student => student.account_id.as_deref(),
        Role::Admin => return Ok(student),
    };
    if owner == Some(session.user_id.as_str()) {
        Ok(student)
    } else {
        Err(HandlerErr::new(
            "forbidden",
            "student is not linked to this account",
        ))
    }
}

pub fn history_for_student(conn: &Connection, student_id: &str) -> Result<Vec<HistoryRow>, HandlerErr> {
    // Stories may have been deleted by hand; keep the event and leave the title empty.
    let mut stmt = conn
        .prepare(
            "SELECT h.id, h.student_id, h.story_id, st.title, h.completed_at, h.score
             FROM reading_history h
             LEFT JOIN stories st ON st.id = h.story_id
             WHERE h.student_id = ?
             ORDER BY h.completed_at DESC, h.id",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([student_id], |r| {
        Ok(HistoryRow {
            id: r.get(0)?,
            student_id: r.get(1)?,
            story_id: r.get(2)?,
            story_title: r.get(3)?,
            completed_at: r.get(4)?,
            score: r.get(5)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

/// Appends one completion event. Repeated reads are separate events.
pub fn record_reading(
    conn: &Connection,
    student_id: &str,
    story_id: &str,
    score: Option<f64>,
) -> Result<HistoryRow, HandlerErr> {
    let row = HistoryRow {
        id: db::new_id(),
        student_id: student_id.to_string(),
        story_id: story_id.to_string(),
        story_title: None,
        completed_at: db::now_rfc3339(),
        score,
    };
    conn.execute(
        "INSERT INTO reading_history(id, student_id, story_id, completed_at, score)
         VALUES(?, ?, ?, ?, ?)",
        (
            &row.id,
            &row.student_id,
            &row.story_id,
            &row.completed_at,
            row.score,
        ),
    )
    .map_err(|e| HandlerErr::write("db_insert_failed", "reading_history", e))?;
    Ok(row)
}

fn parse_score(params: &serde_json::Value) -> Result<Option<f64>, HandlerErr> {
    match params.get("score") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => {
            let s = v
                .as_f64()
                .ok_or_else(|| HandlerErr::bad_params("score must be a number"))?;
            if !(0.0..=100.0).contains(&s) {
                return Err(HandlerErr::bad_params("score must be between 0 and 100"));
            }
            Ok(Some(s))
        }
    }
}

/// Percentage of questions whose chosen index matches the answer, rounded to
/// a whole number. Unanswered questions count as wrong.
pub fn grade(answer_indexes: &[u32], answers: &[Option<u32>]) -> (usize, f64) {
    let correct = answer_indexes
        .iter()
        .enumerate()
        .filter(|(i, expected)| answers.get(*i).copied().flatten() == Some(**expected))
        .count();
    let score = if answer_indexes.is_empty() {
        0.0
    } else {
        (correct as f64 * 100.0 / answer_indexes.len() as f64).round()
    };
    (correct, score)
}

fn parse_answers(params: &serde_json::Value) -> Result<Vec<Option<u32>>, HandlerErr> {
    let arr = params
        .get("answers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params("missing answers"))?;
    arr.iter()
        .map(|v| match v {
            serde_json::Value::Null => Ok(None),
            v => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| HandlerErr::bad_params("answers must be choice indexes or null")),
        })
        .collect()
}

fn reading_mark_read(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let story_id = get_required_str(params, "storyId")?;
    let score = parse_score(params)?;
    visible_student(conn, session, &student_id)?;
    require_exists(conn, "stories", &story_id, "story")?;

    let row = record_reading(conn, &student_id, &story_id, score)?;
    Ok(json!({ "entry": row.to_json() }))
}

fn reading_list(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    visible_student(conn, session, &student_id)?;
    let entries: Vec<serde_json::Value> = history_for_student(conn, &student_id)?
        .iter()
        .map(HistoryRow::to_json)
        .collect();
    Ok(json!({ "entries": entries }))
}

fn quiz_submit(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let story_id = get_required_str(params, "storyId")?;
    let answers = parse_answers(params)?;
    visible_student(conn, session, &student_id)?;
    require_exists(conn, "stories", &story_id, "story")?;

    let questions = list_questions(conn, &story_id)?;
    if questions.is_empty() {
        return Err(HandlerErr::new("no_questions", "story has no quiz questions"));
    }
    let expected: Vec<u32> = questions.iter().map(|q| q.answer_index).collect();
    let (correct, score) = grade(&expected, &answers);

    let row = record_reading(conn, &student_id, &story_id, Some(score))?;
    Ok(json!({
        "entry": row.to_json(),
        "correct": correct,
        "total": questions.len(),
        "score": score
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "reading.markRead" => reading_mark_read,
        "reading.list" => reading_list,
        "quiz.submit" => quiz_submit,
        _ => return None,
    };
    let session = state.session.clone();
    Some(with_db(state, req, |conn, params| {
        f(conn, session.as_ref(), params)
    }))
}
