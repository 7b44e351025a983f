use crate::auth::Session;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of input: `{"id", "method", "params"}`.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the process remembers between requests. A session is only
/// meaningful for the workspace it was opened in.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn sign_in(&mut self, session: Session) {
        tracing::info!(user_id = %session.user_id, role = session.role.as_str(), "signed in");
        self.session = Some(session);
    }

    pub fn sign_out(&mut self) {
        if let Some(s) = self.session.take() {
            tracing::info!(user_id = %s.user_id, "signed out");
        }
    }
}
