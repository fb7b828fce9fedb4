/// Max task title length, in characters
pub const MAX_TASK_TITLE_LENGTH: usize = 200;

/// Max task description length, in characters
pub const MAX_TASK_DESCRIPTION_LENGTH: usize = 1000;

/// Max project name length, in characters
pub const MAX_PROJECT_NAME_LENGTH: usize = 50;

/// Max characters for the initials badge
pub const MAX_INITIALS_LENGTH: usize = 3;

fn clamp(raw: &str, max: usize) -> String {
    raw.trim().chars().take(max).collect()
}

/// Trim and clamp a task title. Blank input gives an empty string.
pub fn sanitize_task_title(raw: &str) -> String {
    clamp(raw, MAX_TASK_TITLE_LENGTH)
}

pub fn sanitize_task_description(raw: &str) -> String {
    clamp(raw, MAX_TASK_DESCRIPTION_LENGTH)
}

/// Trim and clamp a project name. Blank input gives an empty string.
pub fn sanitize_project_name(raw: &str) -> String {
    clamp(raw, MAX_PROJECT_NAME_LENGTH)
}

/// Uppercase ASCII letters only, at most three
pub fn sanitize_initials(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .take(MAX_INITIALS_LENGTH)
        .collect()
}

/// Check a `YYYY-MM-DD` due date
pub fn is_valid_due_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_clamped() {
        assert_eq!(sanitize_task_title("  hello  "), "hello");
        let long = "x".repeat(250);
        assert_eq!(sanitize_task_title(&long).chars().count(), 200);
        assert_eq!(sanitize_task_title("   "), "");
    }

    #[test]
    fn clamp_counts_chars_not_bytes() {
        let name = "é".repeat(60);
        assert_eq!(sanitize_project_name(&name).chars().count(), 50);
    }

    #[test]
    fn description_limit() {
        let long = "d".repeat(1500);
        assert_eq!(sanitize_task_description(&long).len(), 1000);
    }

    #[test]
    fn initials_letters_only() {
        assert_eq!(sanitize_initials("a.b-c d"), "ABC");
        assert_eq!(sanitize_initials("jo"), "JO");
        assert_eq!(sanitize_initials("12"), "");
    }

    #[test]
    fn due_date_shape() {
        assert!(is_valid_due_date("2026-02-28"));
        assert!(!is_valid_due_date("2026-02-30"));
        assert!(!is_valid_due_date("Feb 28"));
    }
}
