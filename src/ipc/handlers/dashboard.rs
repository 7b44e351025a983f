use crate::auth::{Role, Session};
use crate::ipc::handlers::reading::{history_for_student, visible_student, HistoryRow};
use crate::ipc::handlers::stories::list_stories;
use crate::ipc::handlers::students::{list_students, StudentFilter};
use crate::ipc::helpers::{get_optional_str, get_required_str, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

fn count(conn: &Connection, sql: &str) -> Result<i64, HandlerErr> {
    conn.query_row(sql, [], |r| r.get(0)).map_err(HandlerErr::query)
}

fn dashboard_admin(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut users_by_role = serde_json::Map::new();
    for role in [Role::Admin, Role::Teacher, Role::Parent, Role::Student] {
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE role = ?",
                [role.as_str()],
                |r| r.get(0),
            )
            .map_err(HandlerErr::query)?;
        users_by_role.insert(role.as_str().to_string(), json!(n));
    }
    Ok(json!({
        "users": count(conn, "SELECT COUNT(*) FROM users")?,
        "usersByRole": users_by_role,
        "classes": count(conn, "SELECT COUNT(*) FROM classes")?,
        "students": count(conn, "SELECT COUNT(*) FROM students")?,
        "activeStudents": count(conn, "SELECT COUNT(*) FROM students WHERE active = 1")?,
        "stories": count(conn, "SELECT COUNT(*) FROM stories")?,
        "questions": count(conn, "SELECT COUNT(*) FROM questions")?,
        "readingEvents": count(conn, "SELECT COUNT(*) FROM reading_history")?,
    }))
}

/// The caller's own id for the matching role. Only admins may name another subject.
fn subject_id(
    session: Option<&Session>,
    own_role: Role,
    params: &serde_json::Value,
    key: &str,
) -> Result<String, HandlerErr> {
    match session {
        Some(s) if s.role == own_role => Ok(s.user_id.clone()),
        Some(s) if s.role == Role::Admin => get_optional_str(params, key)
            .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key))),
        Some(s) => Err(HandlerErr::new(
            "forbidden",
            format!("a {} account cannot open this dashboard", s.role.as_str()),
        )),
        None => Err(HandlerErr::new("unauthenticated", "sign in first")),
    }
}

fn class_names(conn: &Connection) -> Result<HashMap<String, String>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM classes")
        .map_err(HandlerErr::query)?;
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .and_then(|it| it.collect::<Result<HashMap<_, _>, _>>())
        .map_err(HandlerErr::query)
}

fn reading_summary(history: &[HistoryRow]) -> serde_json::Value {
    let scores: Vec<f64> = history.iter().filter_map(|h| h.score).collect();
    let average = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };
    json!({
        "readCount": history.len(),
        "lastReadAt": history.first().map(|h| h.completed_at.clone()),
        "averageScore": average,
    })
}

fn dashboard_teacher(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = subject_id(session, Role::Teacher, params, "teacherId")?;
    let students = list_students(
        conn,
        &StudentFilter {
            teacher_id: Some(teacher_id.clone()),
            ..StudentFilter::default()
        },
    )?;
    let names = class_names(conn)?;

    let mut by_class: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();
    for s in &students {
        let history = history_for_student(conn, &s.id)?;
        let mut entry = s.to_json();
        entry["reading"] = reading_summary(&history);
        by_class
            .entry(s.class_id.clone().unwrap_or_default())
            .or_default()
            .push(entry);
    }

    let classes: Vec<serde_json::Value> = by_class
        .into_iter()
        .map(|(class_id, students)| {
            let class_ref = (!class_id.is_empty()).then(|| class_id.clone());
            json!({
                "classId": class_ref,
                "className": names.get(&class_id),
                "students": students,
            })
        })
        .collect();
    Ok(json!({
        "teacherId": teacher_id,
        "studentCount": students.len(),
        "classes": classes
    }))
}

fn dashboard_parent(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let parent_id = subject_id(session, Role::Parent, params, "parentId")?;
    let children = list_students(
        conn,
        &StudentFilter {
            parent_id: Some(parent_id.clone()),
            ..StudentFilter::default()
        },
    )?;

    let mut out = Vec::with_capacity(children.len());
    for child in &children {
        let history = history_for_student(conn, &child.id)?;
        out.push(json!({
            "student": child.to_json(),
            "reading": reading_summary(&history),
            "history": history.iter().map(HistoryRow::to_json).collect::<Vec<_>>(),
        }));
    }
    Ok(json!({ "parentId": parent_id, "children": out }))
}

fn dashboard_student(
    conn: &Connection,
    session: Option<&Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = visible_student(conn, session, &student_id)?;
    let history = history_for_student(conn, &student_id)?;

    let mut reads: HashMap<&str, (usize, Option<f64>)> = HashMap::new();
    for h in &history {
        let e = reads.entry(h.story_id.as_str()).or_insert((0, None));
        e.0 += 1;
        if let Some(score) = h.score {
            e.1 = Some(e.1.map_or(score, |best| best.max(score)));
        }
    }

    let stories: Vec<serde_json::Value> = list_stories(conn, None)?
        .iter()
        .map(|story| {
            let (read_count, best_score) = reads.get(story.id.as_str()).copied().unwrap_or((0, None));
            let mut v = story.to_json();
            v["read"] = json!(read_count > 0);
            v["readCount"] = json!(read_count);
            v["bestScore"] = json!(best_score);
            v
        })
        .collect();

    Ok(json!({
        "student": student.to_json(),
        "reading": reading_summary(&history),
        "stories": stories
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let session = state.session.clone();
    let session = session.as_ref();
    match req.method.as_str() {
        "dashboard.admin" => Some(with_db(state, req, |conn, _| dashboard_admin(conn))),
        "dashboard.teacher" => Some(with_db(state, req, |conn, params| {
            dashboard_teacher(conn, session, params)
        })),
        "dashboard.parent" => Some(with_db(state, req, |conn, params| {
            dashboard_parent(conn, session, params)
        })),
        "dashboard.student" => Some(with_db(state, req, |conn, params| {
            dashboard_student(conn, session, params)
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: "me".into(),
            role,
            name: "Test".into(),
            email: "me@example.org".into(),
        }
    }

    #[test]
    fn own_role_always_gets_its_own_id() {
        let parent = session(Role::Parent);
        let id = subject_id(Some(&parent), Role::Parent, &json!({ "parentId": "other" }), "parentId")
            .expect("own dashboard");
        assert_eq!(id, "me");
    }

    #[test]
    fn only_admins_name_another_subject() {
        let params = json!({ "parentId": "p2" });
        let admin = session(Role::Admin);
        assert_eq!(
            subject_id(Some(&admin), Role::Parent, &params, "parentId").expect("admin"),
            "p2"
        );
        for role in [Role::Teacher, Role::Student] {
            let err = subject_id(Some(&session(role)), Role::Parent, &params, "parentId")
                .err()
                .expect("rejected");
            assert_eq!(err.code, "forbidden");
        }
        let err = subject_id(Some(&admin), Role::Parent, &json!({}), "parentId")
            .err()
            .expect("missing");
        assert_eq!(err.code, "bad_params");
    }
}
