use super::guard;
use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Family = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: [Family; 10] = [
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::users::try_handle,
    handlers::classes::try_handle,
    handlers::students::try_handle,
    handlers::stories::try_handle,
    handlers::questions::try_handle,
    handlers::reading::try_handle,
    handlers::dashboard::try_handle,
    handlers::import::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");

    if let Err(e) = guard::check(state, &req.method) {
        tracing::debug!(method = %req.method, code = e.code, "request rejected");
        return e.response(&req.id);
    }

    for family in FAMILIES {
        if let Some(resp) = family(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
