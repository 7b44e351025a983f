mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{len_at, request_err, request_ok, spawn_sidecar, str_at, temp_dir};

/// Opens a fresh workspace and signs in as its administrator. Returns the admin's user id.
fn admin_session(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let admin = request_ok(
        stdin,
        reader,
        "signup",
        "auth.signUp",
        json!({ "name": "Salma", "email": "salma@ecole.tn", "password": "secret1" }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "signin",
        "auth.signIn",
        json!({ "email": "salma@ecole.tn", "password": "secret1" }),
    );
    str_at(&admin, "/user/id").to_string()
}

#[test]
fn class_and_student_crud_with_cascading_class_delete() {
    let workspace = temp_dir("hikaya-school-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin_id = admin_session(&mut stdin, &mut reader, &workspace);

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "CE1 A", "level": "CE1" }),
    );
    let class_id = str_at(&class, "/classId").to_string();

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Ahmed Ben Ali", "age": 7, "classId": class_id, "teacherId": admin_id }),
    );
    let student_id = str_at(&student, "/student/id").to_string();

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "A", "age": 25, "classId": class_id }),
    );
    assert_eq!(code, "bad_params");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({ "studentId": student_id, "age": 8 }),
    );
    assert_eq!(updated.pointer("/student/age").and_then(|v| v.as_u64()), Some(8));

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.get",
        json!({ "classId": class_id }),
    );
    assert_eq!(
        got.pointer("/class/studentCount").and_then(|v| v.as_i64()),
        Some(1)
    );

    let story = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "stories.create",
        json!({ "title": "Le petit chat", "language": "fr" }),
    );
    let story_id = str_at(&story, "/story/id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "reading.markRead",
        json!({ "studentId": student_id, "storyId": story_id }),
    );

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    assert_eq!(deleted.get("studentsDeleted").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        deleted.get("readingHistoryDeleted").and_then(|v| v.as_u64()),
        Some(1)
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "students.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(code, "not_found");
    let stories = request_ok(&mut stdin, &mut reader, "10", "stories.list", json!({}));
    assert_eq!(len_at(&stories, "/stories"), 1);
}

#[test]
fn import_commit_creates_valid_rows_and_reports_the_rest() {
    let workspace = temp_dir("hikaya-school-import");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin_id = admin_session(&mut stdin, &mut reader, &workspace);

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "CE2", "level": "CE2" }),
    );
    let class_id = str_at(&class, "/classId").to_string();

    let sheet = workspace.join("liste.csv");
    std::fs::write(
        &sheet,
        "Ecole Ibn Khaldoun,,,\n\
         Nom,Prénom,Date de naissance,Âge\n\
         Ben Ali,Ahmed,15/06/2018,\n\
         Trabelsi,Yasmine,,9\n\
         X,,,8\n\
         Haddad,Omar,,45\n",
    )
    .expect("write sheet");

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "import.preview",
        json!({ "path": sheet.to_string_lossy(), "classId": class_id, "teacherId": admin_id }),
    );
    assert_eq!(preview.pointer("/report/headerRow").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(preview.pointer("/report/validCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(preview.pointer("/report/attemptedCount").and_then(|v| v.as_u64()), Some(0));
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(len_at(&listed, "/students"), 0);

    let commit = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "import.commit",
        json!({ "path": sheet.to_string_lossy(), "classId": class_id, "teacherId": admin_id }),
    );
    assert_eq!(commit.pointer("/report/successCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(commit.pointer("/report/invalidCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(str_at(&commit, "/report/rows/0/name"), "Ahmed Ben Ali");
    assert_eq!(str_at(&commit, "/report/rows/0/outcome/status"), "created");

    // No duplicate detection: a second commit inserts the same children again.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "import.commit",
        json!({ "path": sheet.to_string_lossy(), "classId": class_id, "teacherId": admin_id }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(len_at(&listed, "/students"), 4);
}

#[test]
fn import_without_selection_writes_nothing() {
    let workspace = temp_dir("hikaya-school-noselect");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = admin_session(&mut stdin, &mut reader, &workspace);

    let sheet = workspace.join("liste.csv");
    std::fs::write(&sheet, "Prénom,Nom,Âge\nAhmed,Ben Ali,8\n").expect("write sheet");

    let commit = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "import.commit",
        json!({ "path": sheet.to_string_lossy() }),
    );
    assert_eq!(commit.pointer("/report/validCount").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(commit.pointer("/report/attemptedCount").and_then(|v| v.as_u64()), Some(0));
    let reasons = commit
        .pointer("/report/rows/0/reasons")
        .and_then(|v| v.as_array())
        .expect("reasons");
    assert!(reasons.iter().any(|r| r == "no class selected"));
    assert!(reasons.iter().any(|r| r == "no teacher selected"));

    let listed = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(len_at(&listed, "/students"), 0);
}

#[test]
fn import_errors_carry_stable_codes() {
    let workspace = temp_dir("hikaya-school-import-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = admin_session(&mut stdin, &mut reader, &workspace);

    let sheet = workspace.join("sans-nom.csv");
    std::fs::write(&sheet, "Élève,Classe\nAhmed,CE1\n").expect("write sheet");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "import.preview",
        json!({ "path": sheet.to_string_lossy() }),
    );
    assert_eq!(code, "import_header_not_found");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "import.preview",
        json!({ "path": workspace.join("liste.pdf").to_string_lossy() }),
    );
    assert_eq!(code, "import_unsupported_file");
}

#[test]
fn exported_template_previews_three_sample_rows() {
    let workspace = temp_dir("hikaya-school-template");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let admin_id = admin_session(&mut stdin, &mut reader, &workspace);

    let out_path = workspace.join("modele-eleves.xlsx");
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "import.template",
        json!({ "outPath": out_path.to_string_lossy() }),
    );
    assert_eq!(exported.get("sampleRows").and_then(|v| v.as_u64()), Some(3));
    assert!(out_path.is_file());

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "CP" }),
    );
    let class_id = str_at(&class, "/classId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "settings.set",
        json!({ "key": "import.defaultClassId", "value": class_id }),
    );

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "import.preview",
        json!({ "path": out_path.to_string_lossy(), "teacherId": admin_id }),
    );
    assert_eq!(len_at(&preview, "/report/rows"), 3);
    assert_eq!(preview.pointer("/report/validCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(str_at(&preview, "/report/rows/2/name"), "Omar Haddad");
}
