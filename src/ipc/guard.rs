use crate::auth::Role;
use crate::ipc::helpers::HandlerErr;
use crate::ipc::types::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    SignedIn,
    Roles(&'static [Role]),
}

const ADMIN: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::Teacher];

pub fn access_for(method: &str) -> Access {
    match method {
        "health" | "workspace.select" | "auth.signUp" | "auth.signIn" | "auth.signOut"
        | "auth.session" => Access::Public,

        "users.list" | "users.get" | "users.create" | "users.update" | "users.delete"
        | "classes.create" | "classes.update" | "classes.delete" | "stories.create"
        | "stories.update" | "stories.delete" | "stories.setIllustration" | "stories.setPdf"
        | "import.preview" | "import.commit" | "import.template" | "settings.set"
        | "dashboard.admin" => Access::Roles(ADMIN),

        "students.create" | "students.update" | "students.delete" | "questions.create"
        | "questions.update" | "questions.delete" | "dashboard.teacher" => Access::Roles(STAFF),

        _ => Access::SignedIn,
    }
}

pub fn check(state: &AppState, method: &str) -> Result<(), HandlerErr> {
    let access = access_for(method);
    if access == Access::Public {
        return Ok(());
    }
    let Some(session) = state.session.as_ref() else {
        return Err(HandlerErr::new("unauthenticated", "sign in first"));
    };
    match access {
        Access::Roles(roles) if !roles.contains(&session.role) => Err(HandlerErr {
            code: "forbidden",
            message: format!("{} is not allowed for role {}", method, session.role.as_str()),
            details: None,
        }),
        _ => Ok(()),
    }
}
