use crate::db;
use crate::ipc::helpers::{
    get_optional_str, get_optional_u32, get_required_str, get_required_text, require_exists,
    with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub id: String,
    pub story_id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub answer_index: u32,
    pub sort_order: i64,
}

impl QuestionRow {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "storyId": self.story_id,
            "prompt": self.prompt,
            "choices": self.choices,
            "answerIndex": self.answer_index,
            "sortOrder": self.sort_order,
        })
    }
}

fn question_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<QuestionRow> {
    let choices_json: String = r.get(3)?;
    let choices = serde_json::from_str(&choices_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(QuestionRow {
        id: r.get(0)?,
        story_id: r.get(1)?,
        prompt: r.get(2)?,
        choices,
        answer_index: r.get(4)?,
        sort_order: r.get(5)?,
    })
}

const QUESTION_COLUMNS: &str = "id, story_id, prompt, choices_json, answer_index, sort_order";

pub fn list_questions(conn: &Connection, story_id: &str) -> Result<Vec<QuestionRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM questions WHERE story_id = ? ORDER BY sort_order",
            QUESTION_COLUMNS
        ))
        .map_err(HandlerErr::query)?;
    stmt.query_map([story_id], question_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)
}

fn find_question(conn: &Connection, question_id: &str) -> Result<Option<QuestionRow>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS),
        [question_id],
        question_from_row,
    )
    .optional()
    .map_err(HandlerErr::query)
}

fn parse_choices(params: &serde_json::Value) -> Result<Option<Vec<String>>, HandlerErr> {
    let Some(v) = params.get("choices") else {
        return Ok(None);
    };
    let arr = v
        .as_array()
        .ok_or_else(|| HandlerErr::bad_params("choices must be an array of strings"))?;
    let mut choices = Vec::with_capacity(arr.len());
    for c in arr {
        let s = c
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HandlerErr::bad_params("choices must be non-empty strings"))?;
        choices.push(s);
    }
    if choices.len() < 2 {
        return Err(HandlerErr::bad_params("a question needs at least 2 choices"));
    }
    Ok(Some(choices))
}

fn check_answer(choices: &[String], answer_index: u32) -> Result<(), HandlerErr> {
    if (answer_index as usize) < choices.len() {
        Ok(())
    } else {
        Err(HandlerErr::bad_params("answerIndex is out of range"))
    }
}

fn questions_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let story_id = get_required_str(params, "storyId")?;
    let questions: Vec<serde_json::Value> = list_questions(conn, &story_id)?
        .iter()
        .map(QuestionRow::to_json)
        .collect();
    Ok(json!({ "questions": questions }))
}

fn questions_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let story_id = get_required_str(params, "storyId")?;
    require_exists(conn, "stories", &story_id, "story")?;
    let prompt = get_required_text(params, "prompt")?;
    let choices = parse_choices(params)?.ok_or_else(|| HandlerErr::bad_params("missing choices"))?;
    let answer_index =
        get_optional_u32(params, "answerIndex")?.ok_or_else(|| HandlerErr::bad_params("missing answerIndex"))?;
    check_answer(&choices, answer_index)?;

    let sort_order: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM questions WHERE story_id = ?",
            [&story_id],
            |r| r.get(0),
        )
        .map_err(HandlerErr::query)?;

    let q = QuestionRow {
        id: db::new_id(),
        story_id,
        prompt,
        choices,
        answer_index,
        sort_order,
    };
    let choices_json =
        serde_json::to_string(&q.choices).map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    conn.execute(
        "INSERT INTO questions(id, story_id, prompt, choices_json, answer_index, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &q.id,
            &q.story_id,
            &q.prompt,
            &choices_json,
            q.answer_index,
            q.sort_order,
        ),
    )
    .map_err(|e| HandlerErr::write("db_insert_failed", "questions", e))?;
    Ok(json!({ "question": q.to_json() }))
}

fn questions_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let question_id = get_required_str(params, "questionId")?;
    let mut q = find_question(conn, &question_id)?.ok_or_else(|| HandlerErr::not_found("question"))?;
    if let Some(prompt) = get_optional_str(params, "prompt") {
        q.prompt = prompt;
    }
    if let Some(choices) = parse_choices(params)? {
        q.choices = choices;
    }
    if let Some(answer_index) = get_optional_u32(params, "answerIndex")? {
        q.answer_index = answer_index;
    }
    check_answer(&q.choices, q.answer_index)?;

    let choices_json =
        serde_json::to_string(&q.choices).map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    conn.execute(
        "UPDATE questions SET prompt = ?, choices_json = ?, answer_index = ? WHERE id = ?",
        (&q.prompt, &choices_json, q.answer_index, &q.id),
    )
    .map_err(|e| HandlerErr::write("db_update_failed", "questions", e))?;
    Ok(json!({ "question": q.to_json() }))
}

fn questions_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let question_id = get_required_str(params, "questionId")?;
    let n = conn
        .execute("DELETE FROM questions WHERE id = ?", [&question_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "questions", e))?;
    if n == 0 {
        return Err(HandlerErr::not_found("question"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "questions.list" => questions_list,
        "questions.create" => questions_create,
        "questions.update" => questions_update,
        "questions.delete" => questions_delete,
        _ => return None,
    };
    Some(with_db(state, req, f))
}
