mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_at, temp_dir};

#[test]
fn first_account_is_admin_and_later_sign_ups_are_parents() {
    let workspace = temp_dir("hikaya-auth-signup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.signUp",
        json!({ "name": "Salma", "email": "Salma@Ecole.tn", "password": "secret1" }),
    );
    assert_eq!(str_at(&admin, "/user/role"), "admin");
    assert_eq!(str_at(&admin, "/user/email"), "salma@ecole.tn");

    let parent = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signUp",
        json!({ "name": "Karim", "email": "karim@example.tn", "password": "secret2" }),
    );
    assert_eq!(str_at(&parent, "/user/role"), "parent");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signUp",
        json!({ "name": "Karim again", "email": "KARIM@example.tn", "password": "secret3" }),
    );
    assert_eq!(code, "conflict");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "auth.signUp",
        json!({ "name": "Short", "email": "short@example.tn", "password": "abc" }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn sign_in_checks_password_and_opens_a_session() {
    let workspace = temp_dir("hikaya-auth-signin");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.signUp",
        json!({ "name": "Salma", "email": "salma@ecole.tn", "password": "secret1" }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "salma@ecole.tn", "password": "wrong-one" }),
    );
    assert_eq!(code, "invalid_credentials");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signIn",
        json!({ "email": "nobody@ecole.tn", "password": "secret1" }),
    );
    assert_eq!(code, "invalid_credentials");

    let signed_in = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "auth.signIn",
        json!({ "email": " SALMA@ecole.tn ", "password": "secret1" }),
    );
    assert_eq!(str_at(&signed_in, "/session/role"), "admin");

    let health = request_ok(&mut stdin, &mut reader, "6", "health", json!({}));
    assert_eq!(health.get("signedIn").and_then(|v| v.as_bool()), Some(true));

    let _ = request_ok(&mut stdin, &mut reader, "7", "auth.signOut", json!({}));
    let session = request_ok(&mut stdin, &mut reader, "8", "auth.session", json!({}));
    assert!(session.get("session").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn role_guard_rejects_anonymous_and_out_of_role_calls() {
    let workspace = temp_dir("hikaya-auth-guard");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let code = request_err(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(code, "unauthenticated");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signUp",
        json!({ "name": "Salma", "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signIn",
        json!({ "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "users.create",
        json!({ "name": "Mme Hela", "email": "hela@ecole.tn", "password": "secret2", "role": "teacher" }),
    );
    assert_eq!(str_at(&teacher, "/user/role"), "teacher");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "users.create",
        json!({ "name": "Karim", "email": "karim@example.tn", "password": "secret3", "role": "parent" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "7", "auth.signOut", json!({}));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "auth.signIn",
        json!({ "email": "hela@ecole.tn", "password": "secret2" }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "classes.create",
        json!({ "name": "CE1" }),
    );
    assert_eq!(code, "forbidden");
    let code = request_err(&mut stdin, &mut reader, "10", "users.list", json!({}));
    assert_eq!(code, "forbidden");
    let _ = request_ok(&mut stdin, &mut reader, "11", "classes.list", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "12", "auth.signOut", json!({}));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "auth.signIn",
        json!({ "email": "karim@example.tn", "password": "secret3" }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "students.create",
        json!({ "name": "Ahmed", "age": 8 }),
    );
    assert_eq!(code, "forbidden");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "15",
        "import.template",
        json!({ "outPath": workspace.join("modele.xlsx").to_string_lossy() }),
    );
    assert_eq!(code, "forbidden");
}

#[test]
fn selecting_a_workspace_drops_the_session() {
    let first = temp_dir("hikaya-auth-ws-a");
    let second = temp_dir("hikaya-auth-ws-b");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": first.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.signUp",
        json!({ "name": "Salma", "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.select",
        json!({ "path": second.to_string_lossy() }),
    );
    let code = request_err(&mut stdin, &mut reader, "5", "stories.list", json!({}));
    assert_eq!(code, "unauthenticated");
}

#[test]
fn editing_your_own_account_updates_or_ends_the_session() {
    let workspace = temp_dir("hikaya-auth-self-edit");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.signUp",
        json!({ "name": "Salma", "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let admin_id = str_at(&admin, "/user/id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "salma@ecole.tn", "password": "secret1" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.update",
        json!({ "userId": admin_id, "name": "Salma Ben Youssef" }),
    );
    let session = request_ok(&mut stdin, &mut reader, "5", "auth.session", json!({}));
    assert_eq!(str_at(&session, "/session/name"), "Salma Ben Youssef");
    assert_eq!(str_at(&session, "/session/role"), "admin");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "users.update",
        json!({ "userId": admin_id, "role": "teacher" }),
    );
    let session = request_ok(&mut stdin, &mut reader, "7", "auth.session", json!({}));
    assert!(session.get("session").is_some_and(|s| s.is_null()));
    let code = request_err(&mut stdin, &mut reader, "8", "users.list", json!({}));
    assert_eq!(code, "unauthenticated");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "auth.signIn",
        json!({ "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let session = request_ok(&mut stdin, &mut reader, "10", "auth.session", json!({}));
    assert_eq!(str_at(&session, "/session/role"), "teacher");
}
