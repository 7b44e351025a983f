use super::validate::Selection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub age: u32,
    pub class_id: String,
    pub teacher_id: String,
}

/// Destination for imported students. Each call is one independent write.
pub trait StudentSink {
    fn insert_student(&mut self, student: &NewStudent) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RowOutcome {
    #[serde(rename_all = "camelCase")]
    Created { student_id: String },
    Failed { message: String },
}

impl RowOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, RowOutcome::Created { .. })
    }
}

/// Writes students one after another. A failed write is recorded and the
/// loop moves on; earlier writes stay in place.
pub fn write_students<S: StudentSink + ?Sized>(
    sink: &mut S,
    students: &[NewStudent],
) -> Vec<RowOutcome> {
    students
        .iter()
        .map(|s| match sink.insert_student(s) {
            Ok(student_id) => RowOutcome::Created { student_id },
            Err(e) => {
                tracing::warn!(name = %s.name, error = %e, "student import write failed");
                RowOutcome::Failed {
                    message: e.to_string(),
                }
            }
        })
        .collect()
}

pub fn new_student(name: &str, age: u32, selection: &Selection) -> Option<NewStudent> {
    Some(NewStudent {
        name: name.trim().to_string(),
        age,
        class_id: selection.class_id.clone()?,
        teacher_id: selection.teacher_id.clone()?,
    })
}
