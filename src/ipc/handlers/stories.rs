use crate::assets;
use crate::db;
use crate::ipc::error::err;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, get_required_text, require_exists, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StoryRow {
    pub id: String,
    pub title: String,
    pub language: String,
    pub summary: String,
    pub illustration_ref: Option<String>,
    pub pdf_ref: Option<String>,
}

impl StoryRow {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "title": self.title,
            "language": self.language,
            "summary": self.summary,
            "illustrationRef": self.illustration_ref,
            "pdfRef": self.pdf_ref,
        })
    }
}

const STORY_COLUMNS: &str = "id, title, language, summary, illustration_ref, pdf_ref";

fn story_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: r.get(0)?,
        title: r.get(1)?,
        language: r.get(2)?,
        summary: r.get(3)?,
        illustration_ref: r.get(4)?,
        pdf_ref: r.get(5)?,
    })
}

pub fn list_stories(conn: &Connection, language: Option<&str>) -> Result<Vec<StoryRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM stories WHERE (?1 IS NULL OR language = ?1) ORDER BY title",
            STORY_COLUMNS
        ))
        .map_err(HandlerErr::query)?;
    stmt.query_map([language], story_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)
}

fn find_story(conn: &Connection, story_id: &str) -> Result<Option<StoryRow>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM stories WHERE id = ?", STORY_COLUMNS),
        [story_id],
        story_from_row,
    )
    .optional()
    .map_err(HandlerErr::query)
}

fn stories_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let language = get_optional_str(params, "language");
    let stories: Vec<serde_json::Value> = list_stories(conn, language.as_deref())?
        .iter()
        .map(StoryRow::to_json)
        .collect();
    Ok(json!({ "stories": stories }))
}

fn stories_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let story_id = get_required_str(params, "storyId")?;
    let story = find_story(conn, &story_id)?.ok_or_else(|| HandlerErr::not_found("story"))?;
    Ok(json!({ "story": story.to_json() }))
}

fn stories_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let story = StoryRow {
        id: db::new_id(),
        title: get_required_text(params, "title")?,
        language: get_required_text(params, "language")?,
        summary: get_optional_str(params, "summary").unwrap_or_default(),
        illustration_ref: None,
        pdf_ref: None,
    };
    conn.execute(
        "INSERT INTO stories(id, title, language, summary, created_at) VALUES(?, ?, ?, ?, ?)",
        (
            &story.id,
            &story.title,
            &story.language,
            &story.summary,
            db::now_rfc3339(),
        ),
    )
    .map_err(|e| HandlerErr::write("db_insert_failed", "stories", e))?;
    Ok(json!({ "story": story.to_json() }))
}

fn stories_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let story_id = get_required_str(params, "storyId")?;
    let mut story = find_story(conn, &story_id)?.ok_or_else(|| HandlerErr::not_found("story"))?;
    if let Some(title) = get_optional_str(params, "title") {
        story.title = title;
    }
    if let Some(language) = get_optional_str(params, "language") {
        story.language = language;
    }
    if params.get("summary").is_some() {
        story.summary = get_optional_str(params, "summary").unwrap_or_default();
    }
    conn.execute(
        "UPDATE stories SET title = ?, language = ?, summary = ? WHERE id = ?",
        (&story.title, &story.language, &story.summary, &story.id),
    )
    .map_err(|e| HandlerErr::write("db_update_failed", "stories", e))?;
    Ok(json!({ "story": story.to_json() }))
}

fn stories_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let story_id = get_required_str(params, "storyId")?;
    require_exists(conn, "stories", &story_id, "story")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let questions_deleted = tx
        .execute("DELETE FROM questions WHERE story_id = ?", [&story_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "questions", e))?;
    let history_deleted = tx
        .execute("DELETE FROM reading_history WHERE story_id = ?", [&story_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "reading_history", e))?;
    tx.execute("DELETE FROM stories WHERE id = ?", [&story_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "stories", e))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "deleted": true,
        "questionsDeleted": questions_deleted,
        "readingHistoryDeleted": history_deleted
    }))
}

#[derive(Clone, Copy)]
enum StoryAsset {
    Illustration,
    Pdf,
}

impl StoryAsset {
    fn column(self) -> &'static str {
        match self {
            StoryAsset::Illustration => "illustration_ref",
            StoryAsset::Pdf => "pdf_ref",
        }
    }
}

fn stories_set_asset(
    conn: &Connection,
    workspace: &Path,
    params: &serde_json::Value,
    kind: StoryAsset,
) -> Result<serde_json::Value, HandlerErr> {
    let story_id = get_required_str(params, "storyId")?;
    let path = PathBuf::from(get_required_text(params, "path")?);
    require_exists(conn, "stories", &story_id, "story")?;

    let stored = assets::store_asset(workspace, &path).map_err(|e| HandlerErr {
        code: "asset_store_failed",
        message: e.to_string(),
        details: Some(json!({ "path": path.to_string_lossy() })),
    })?;
    conn.execute(
        &format!("UPDATE stories SET {} = ? WHERE id = ?", kind.column()),
        (&stored.reference, &story_id),
    )
    .map_err(|e| HandlerErr::write("db_update_failed", "stories", e))?;

    Ok(json!({
        "storyId": story_id,
        "reference": stored.reference,
        "sha256": stored.sha256,
        "size": stored.size
    }))
}

fn handle_set_asset(state: &mut AppState, req: &Request, kind: StoryAsset) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    with_db(state, req, |conn, params| {
        stories_set_asset(conn, &workspace, params, kind)
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "stories.list" => stories_list,
        "stories.get" => stories_get,
        "stories.create" => stories_create,
        "stories.update" => stories_update,
        "stories.delete" => stories_delete,
        "stories.setIllustration" => {
            return Some(handle_set_asset(state, req, StoryAsset::Illustration))
        }
        "stories.setPdf" => return Some(handle_set_asset(state, req, StoryAsset::Pdf)),
        _ => return None,
    };
    Some(with_db(state, req, f))
}
