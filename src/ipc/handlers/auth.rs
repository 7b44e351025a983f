use crate::auth::{self, Role, Session};
use crate::ipc::error::ok;
use crate::ipc::handlers::users::{count_users, create_user, find_user_by_email};
use crate::ipc::helpers::{get_required_str, get_required_text, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn session_json(session: &Option<Session>) -> serde_json::Value {
    json!({ "session": session })
}

fn auth_sign_up(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let name = get_required_text(params, "name")?;
    let email = get_required_text(params, "email")?;
    let password = get_required_str(params, "password")?;

    // The first account of a workspace administers it; later self sign-ups are parents.
    let role = if count_users(conn)? == 0 {
        Role::Admin
    } else {
        Role::Parent
    };
    let user = create_user(conn, &name, &email, &password, role)?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "account created");
    Ok(json!({ "user": user.to_json() }))
}

fn auth_sign_in(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let email = get_required_text(params, "email")?;
    let password = get_required_str(params, "password")?;

    let rejected = || HandlerErr::new("invalid_credentials", "wrong email or password");
    let user = find_user_by_email(conn, &email)?.ok_or_else(rejected)?;
    if !auth::verify_password(&user.password_salt, &password, &user.password_hash) {
        tracing::debug!(email = %user.email, "sign-in rejected");
        return Err(rejected());
    }
    if !user.active {
        return Err(HandlerErr::new("account_disabled", "account is disabled"));
    }

    state.sign_in(Session {
        user_id: user.id,
        role: user.role,
        name: user.name,
        email: user.email,
    });
    Ok(session_json(&state.session))
}

fn respond(
    req: &Request,
    res: Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match res {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signUp" => Some(respond(req, auth_sign_up(state, &req.params))),
        "auth.signIn" => Some(respond(req, auth_sign_in(state, &req.params))),
        "auth.signOut" => {
            state.sign_out();
            Some(ok(&req.id, session_json(&state.session)))
        }
        "auth.session" => Some(ok(&req.id, session_json(&state.session))),
        _ => None,
    }
}
