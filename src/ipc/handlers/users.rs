use crate::auth::{self, Role};
use crate::db;
use crate::ipc::helpers::{
    get_optional_bool, get_optional_str, get_required_str, get_required_text, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

pub struct UserRow {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub password_hash: String,
    pub password_salt: String,
    pub created_at: String,
}

impl UserRow {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "role": self.role,
            "name": self.name,
            "email": self.email,
            "active": self.active,
            "createdAt": self.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, role, name, email, active, password_hash, password_salt, created_at";

fn user_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = r.get(1)?;
    Ok(UserRow {
        id: r.get(0)?,
        // Unknown roles in hand-edited stores degrade to the least privileged one.
        role: Role::parse(&role).unwrap_or(Role::Student),
        name: r.get(2)?,
        email: r.get(3)?,
        active: r.get::<_, i64>(4)? != 0,
        password_hash: r.get(5)?,
        password_salt: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
        [auth::normalize_email(email)],
        user_from_row,
    )
    .optional()
    .map_err(HandlerErr::query)
}

pub fn find_user(conn: &Connection, user_id: &str) -> Result<Option<UserRow>, HandlerErr> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
        [user_id],
        user_from_row,
    )
    .optional()
    .map_err(HandlerErr::query)
}

pub fn count_users(conn: &Connection) -> Result<i64, HandlerErr> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .map_err(HandlerErr::query)
}

/// Validates and inserts a user account. Email is stored lowercased and must be unique.
pub fn create_user(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<UserRow, HandlerErr> {
    if name.trim().is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let email = auth::normalize_email(email);
    if !email.contains('@') {
        return Err(HandlerErr::bad_params("email is not valid"));
    }
    if let Some(problem) = auth::password_problem(password) {
        return Err(HandlerErr::bad_params(problem));
    }
    if find_user_by_email(conn, &email)?.is_some() {
        return Err(HandlerErr {
            code: "conflict",
            message: "email already registered".to_string(),
            details: Some(json!({ "email": email })),
        });
    }

    let salt = auth::new_salt();
    let user = UserRow {
        id: db::new_id(),
        role,
        name: name.trim().to_string(),
        email,
        active: true,
        password_hash: auth::hash_password(&salt, password),
        password_salt: salt,
        created_at: db::now_rfc3339(),
    };
    conn.execute(
        "INSERT INTO users(id, role, name, email, active, password_hash, password_salt, created_at)
         VALUES(?, ?, ?, ?, 1, ?, ?, ?)",
        (
            &user.id,
            user.role.as_str(),
            &user.name,
            &user.email,
            &user.password_hash,
            &user.password_salt,
            &user.created_at,
        ),
    )
    .map_err(|e| HandlerErr::write("db_insert_failed", "users", e))?;
    Ok(user)
}

fn parse_role(params: &serde_json::Value) -> Result<Option<Role>, HandlerErr> {
    match get_optional_str(params, "role") {
        None => Ok(None),
        Some(r) => Role::parse(&r)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", r))),
    }
}

fn users_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role = parse_role(params)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM users WHERE (?1 IS NULL OR role = ?1) ORDER BY name",
            USER_COLUMNS
        ))
        .map_err(HandlerErr::query)?;
    let users = stmt
        .query_map([role.map(Role::as_str)], user_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;
    let users: Vec<serde_json::Value> = users.iter().map(UserRow::to_json).collect();
    Ok(json!({ "users": users }))
}

fn users_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let user = find_user(conn, &user_id)?.ok_or_else(|| HandlerErr::not_found("user"))?;
    Ok(json!({ "user": user.to_json() }))
}

fn users_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_text(params, "name")?;
    let email = get_required_text(params, "email")?;
    let password = get_required_str(params, "password")?;
    let role = parse_role(params)?.ok_or_else(|| HandlerErr::bad_params("missing role"))?;
    let user = create_user(conn, &name, &email, &password, role)?;
    Ok(json!({ "user": user.to_json() }))
}

fn users_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let mut user = find_user(conn, &user_id)?.ok_or_else(|| HandlerErr::not_found("user"))?;

    if let Some(name) = get_optional_str(params, "name") {
        user.name = name;
    }
    if let Some(email) = get_optional_str(params, "email") {
        let email = auth::normalize_email(&email);
        if email != user.email {
            if find_user_by_email(conn, &email)?.is_some() {
                return Err(HandlerErr::new("conflict", "email already registered"));
            }
            user.email = email;
        }
    }
    if let Some(role) = parse_role(params)? {
        user.role = role;
    }
    if let Some(active) = get_optional_bool(params, "active")? {
        user.active = active;
    }

    conn.execute(
        "UPDATE users SET name = ?, email = ?, role = ?, active = ? WHERE id = ?",
        (
            &user.name,
            &user.email,
            user.role.as_str(),
            user.active as i64,
            &user.id,
        ),
    )
    .map_err(|e| HandlerErr::write("db_update_failed", "users", e))?;
    Ok(json!({ "user": user.to_json() }))
}

fn users_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let n = conn
        .execute("DELETE FROM users WHERE id = ?", [&user_id])
        .map_err(|e| HandlerErr::write("db_delete_failed", "users", e))?;
    if n == 0 {
        return Err(HandlerErr::not_found("user"));
    }
    Ok(json!({ "deleted": true }))
}

/// An admin editing their own account: role or active changes and deletion
/// end the session, name and email changes carry over into it.
fn follow_own_account_change(state: &mut AppState, req: &Request, response: &serde_json::Value) {
    let Some(own_id) = state.session.as_ref().map(|s| s.user_id.clone()) else {
        return;
    };
    if get_optional_str(&req.params, "userId").as_deref() != Some(own_id.as_str()) {
        return;
    }

    let user = response.pointer("/result/user");
    let role = user
        .and_then(|u| u.get("role"))
        .and_then(|v| v.as_str())
        .and_then(Role::parse);
    let active = user.and_then(|u| u.get("active")).and_then(|v| v.as_bool());
    let unchanged = req.method == "users.update"
        && active == Some(true)
        && role.is_some()
        && role == state.session.as_ref().map(|s| s.role);
    if !unchanged {
        state.sign_out();
        return;
    }

    if let (Some(session), Some(user)) = (state.session.as_mut(), user) {
        if let Some(name) = user.get("name").and_then(|v| v.as_str()) {
            session.name = name.to_string();
        }
        if let Some(email) = user.get("email").and_then(|v| v.as_str()) {
            session.email = email.to_string();
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f = match req.method.as_str() {
        "users.list" => users_list,
        "users.get" => users_get,
        "users.create" => users_create,
        "users.update" => users_update,
        "users.delete" => users_delete,
        _ => return None,
    };
    let response = with_db(state, req, f);
    let succeeded = response.get("ok").and_then(|v| v.as_bool()) == Some(true);
    if succeeded && matches!(req.method.as_str(), "users.update" | "users.delete") {
        follow_own_account_change(state, req, &response);
    }
    Some(response)
}
