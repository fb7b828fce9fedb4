use chrono::NaiveDate;
use serde::Serialize;

use crate::model::project::Project;
use crate::model::state::{AccentColor, AppState, DeletedProject, DeletedTask, SyncStatus};
use crate::model::task::{Priority, Task};
use crate::ops::dates;

/// Length of the ID prefix shown in listings
pub const SHORT_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SubtaskJson {
    pub id: String,
    pub text: String,
    pub done: bool,
}

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub priority: Priority,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub overdue: bool,
    pub column: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubtaskJson>,
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub id: String,
    pub title: String,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct BoardJson {
    pub project_id: String,
    pub project: String,
    pub accent: AccentColor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub columns: Vec<ColumnJson>,
}

#[derive(Serialize)]
pub struct ProjectJson {
    pub id: String,
    pub name: String,
    pub tasks: usize,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<AccentColor>,
    pub has_background: bool,
}

#[derive(Serialize)]
pub struct DeletedTaskJson {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub project_id: String,
    pub deleted_at: i64,
}

#[derive(Serialize)]
pub struct DeletedProjectJson {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub tasks: usize,
    pub deleted_at: i64,
}

#[derive(Serialize)]
pub struct TrashJson {
    pub tasks: Vec<DeletedTaskJson>,
    pub projects: Vec<DeletedProjectJson>,
}

#[derive(Serialize)]
pub struct StatusJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_dir: Option<String>,
    pub data_dir: String,
    pub sync: SyncStatus,
    pub initials: String,
    pub accent: AccentColor,
    pub projects: usize,
    pub tasks: usize,
    pub deleted_tasks: usize,
    pub deleted_projects: usize,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task, today: NaiveDate) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        priority: task.priority,
        date: task.date.clone(),
        due_date: task.due_date.clone(),
        overdue: dates::is_overdue(task.due_date.as_deref(), today),
        column: task.column_id.clone(),
        subtasks: task
            .subtasks
            .iter()
            .map(|s| SubtaskJson {
                id: s.id.clone(),
                text: s.text.clone(),
                done: s.done,
            })
            .collect(),
    }
}

pub fn projects_to_json(state: &AppState) -> Vec<ProjectJson> {
    let active = state.active_project().map(|p| p.id.as_str());
    state
        .projects
        .iter()
        .map(|p| ProjectJson {
            id: p.id.clone(),
            name: p.name.clone(),
            tasks: p.tasks.len(),
            active: Some(p.id.as_str()) == active,
            accent: p.accent_color,
            has_background: p.background_image.is_some(),
        })
        .collect()
}

pub fn trash_to_json(state: &AppState) -> TrashJson {
    TrashJson {
        tasks: state
            .deleted_tasks
            .iter()
            .enumerate()
            .map(|(index, d)| DeletedTaskJson {
                index,
                id: d.task.id.clone(),
                title: d.task.title.clone(),
                project_id: d.project_id.clone(),
                deleted_at: d.deleted_at,
            })
            .collect(),
        projects: state
            .deleted_projects
            .iter()
            .enumerate()
            .map(|(index, d)| DeletedProjectJson {
                index,
                id: d.project.id.clone(),
                name: d.project.name.clone(),
                tasks: d.project.tasks.len(),
                deleted_at: d.deleted_at,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "!!!",
        Priority::Medium => "!!",
        Priority::Low => "!",
    }
}

/// One-line task summary: id, priority, title, due date, subtask progress
pub fn format_task_line(task: &Task, today: NaiveDate) -> String {
    let mut line = format!(
        "{} {:<3} {}",
        short_id(&task.id),
        priority_marker(task.priority),
        task.title
    );
    if let Some(due) = task.due_date.as_deref() {
        line.push_str(&format!("  due {}", dates::format_due_date(due)));
        if dates::is_overdue(Some(due), today) {
            line.push_str(" (overdue)");
        }
    }
    if !task.subtasks.is_empty() {
        line.push_str(&format!("  [{}/{}]", task.subtasks_done(), task.subtasks.len()));
    }
    line
}

/// Task summary with its description and subtasks, indented
pub fn format_task_tree(task: &Task, today: NaiveDate, indent: usize) -> Vec<String> {
    let prefix = "  ".repeat(indent);
    let mut lines = vec![format!("{}{}", prefix, format_task_line(task, today))];
    if !task.description.is_empty() {
        lines.push(format!("{}    {}", prefix, task.description));
    }
    for (n, sub) in task.subtasks.iter().enumerate() {
        let check = if sub.done { 'x' } else { ' ' };
        lines.push(format!("{}    [{}] {}. {}", prefix, check, n + 1, sub.text));
    }
    lines
}

/// The board: a header, then each column with its (filtered) tasks
pub fn format_board(
    project: &Project,
    columns: &[(&str, Vec<&Task>)],
    today: NaiveDate,
) -> Vec<String> {
    let mut lines = vec![format!("# {}", project.name)];
    for (column_id, tasks) in columns {
        let title = project
            .columns
            .iter()
            .find(|c| c.id == *column_id)
            .map(|c| c.title.as_str())
            .unwrap_or(*column_id);
        lines.push(String::new());
        lines.push(format!("{} ({})", title, tasks.len()));
        for task in tasks {
            lines.extend(format_task_tree(task, today, 1));
        }
    }
    lines
}

pub fn format_project_list(state: &AppState) -> Vec<String> {
    projects_to_json(state)
        .into_iter()
        .map(|p| {
            let marker = if p.active { '*' } else { ' ' };
            format!(
                "{} {} {}  ({} tasks)",
                marker,
                short_id(&p.id),
                p.name,
                p.tasks
            )
        })
        .collect()
}

fn format_deleted_task(index: usize, d: &DeletedTask) -> String {
    format!("  {:>2}. {} {}", index, short_id(&d.task.id), d.task.title)
}

fn format_deleted_project(index: usize, d: &DeletedProject) -> String {
    format!(
        "  {:>2}. {} {}  ({} tasks)",
        index,
        short_id(&d.project.id),
        d.project.name,
        d.project.tasks.len()
    )
}

pub fn format_trash(state: &AppState) -> Vec<String> {
    if state.deleted_tasks.is_empty() && state.deleted_projects.is_empty() {
        return vec!["trash is empty".to_string()];
    }
    let mut lines = Vec::new();
    if !state.deleted_tasks.is_empty() {
        lines.push("Tasks:".to_string());
        lines.extend(
            state
                .deleted_tasks
                .iter()
                .enumerate()
                .map(|(i, d)| format_deleted_task(i, d)),
        );
    }
    if !state.deleted_projects.is_empty() {
        lines.push("Projects:".to_string());
        lines.extend(
            state
                .deleted_projects
                .iter()
                .enumerate()
                .map(|(i, d)| format_deleted_project(i, d)),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seed::default_state;
    use crate::model::task::Subtask;
    use pretty_assertions::assert_eq;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task() -> Task {
        Task {
            id: "0123456789abcdef".into(),
            title: "SHIP IT".into(),
            description: "before friday".into(),
            priority: Priority::High,
            date: "Mar 1".into(),
            due_date: Some("2026-03-05".into()),
            column_id: "todo".into(),
            subtasks: vec![
                Subtask {
                    id: "s1".into(),
                    text: "tests".into(),
                    done: true,
                },
                Subtask {
                    id: "s2".into(),
                    text: "docs".into(),
                    done: false,
                },
            ],
        }
    }

    #[test]
    fn task_line_shows_due_and_progress() {
        assert_eq!(
            format_task_line(&task(), day("2026-03-01")),
            "01234567 !!! SHIP IT  due Mar 5  [1/2]"
        );
        assert_eq!(
            format_task_line(&task(), day("2026-03-06")),
            "01234567 !!! SHIP IT  due Mar 5 (overdue)  [1/2]"
        );
    }

    #[test]
    fn task_tree_lists_subtasks() {
        let lines = format_task_tree(&task(), day("2026-03-01"), 0);
        assert_eq!(
            lines[1..].to_vec(),
            vec!["    before friday", "    [x] 1. tests", "    [ ] 2. docs"]
        );
    }

    #[test]
    fn short_ids() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("0123456789"), "01234567");
    }

    #[test]
    fn project_list_marks_active() {
        let lines = format_project_list(&default_state());
        assert!(lines[0].starts_with("* 00000000 Shrek is Love"));
        assert!(lines[1].starts_with("  00000000 Work"));
    }

    #[test]
    fn empty_trash() {
        assert_eq!(format_trash(&default_state()), vec!["trash is empty"]);
    }

    #[test]
    fn task_json_flags_overdue() {
        let json = serde_json::to_value(task_to_json(&task(), day("2026-03-06"))).unwrap();
        assert_eq!(json["overdue"], true);
        assert_eq!(json["priority"], "High");
        assert_eq!(json["subtasks"][0]["done"], true);
    }
}
