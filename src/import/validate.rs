pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_AGE: u32 = 3;
pub const MAX_AGE: u32 = 20;

/// Class and teacher chosen on the import screen. Blank ids count as not selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
}

impl Selection {
    pub fn new(class_id: Option<&str>, teacher_id: Option<&str>) -> Selection {
        let pick = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Selection {
            class_id: pick(class_id),
            teacher_id: pick(teacher_id),
        }
    }
}

pub fn name_problem(name: &str) -> Option<String> {
    if name.trim().chars().count() < MIN_NAME_CHARS {
        Some(format!(
            "name must be at least {} characters",
            MIN_NAME_CHARS
        ))
    } else {
        None
    }
}

pub fn age_problem(age: Option<u32>) -> Option<String> {
    match age {
        Some(a) if (MIN_AGE..=MAX_AGE).contains(&a) => None,
        Some(a) => Some(format!(
            "age {} is outside {}-{}",
            a, MIN_AGE, MAX_AGE
        )),
        None => Some("age is missing or could not be read".to_string()),
    }
}

/// Every reason the row cannot be imported; empty means valid.
pub fn validate(name: &str, age: Option<u32>, selection: &Selection) -> Vec<String> {
    let mut reasons = Vec::new();
    reasons.extend(name_problem(name));
    reasons.extend(age_problem(age));
    if selection.class_id.is_none() {
        reasons.push("no class selected".to_string());
    }
    if selection.teacher_id.is_none() {
        reasons.push("no teacher selected".to_string());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected() -> Selection {
        Selection::new(Some("class-1"), Some("teacher-1"))
    }

    #[test]
    fn single_character_names_are_rejected_whatever_else_holds() {
        let reasons = validate("A", Some(8), &selected());
        assert_eq!(reasons, vec!["name must be at least 2 characters"]);
        assert_eq!(validate(" é ", Some(8), &selected()).len(), 1);
        assert!(validate("Li", Some(8), &selected()).is_empty());
    }

    #[test]
    fn ages_outside_three_to_twenty_are_rejected() {
        assert_eq!(validate("Ahmed", Some(2), &selected()).len(), 1);
        assert_eq!(validate("Ahmed", Some(21), &selected()).len(), 1);
        assert_eq!(validate("Ahmed", None, &selected()).len(), 1);
        assert!(validate("Ahmed", Some(3), &selected()).is_empty());
        assert!(validate("Ahmed", Some(20), &selected()).is_empty());
    }

    #[test]
    fn missing_class_and_teacher_each_add_a_reason() {
        let none = Selection::new(Some("  "), None);
        let reasons = validate("Ahmed", Some(8), &none);
        assert_eq!(reasons, vec!["no class selected", "no teacher selected"]);
    }

    #[test]
    fn all_problems_accumulate() {
        let reasons = validate("", Some(40), &Selection::default());
        assert_eq!(reasons.len(), 4);
    }
}
