use crate::model::state::{AppState, DeletedTask, MAX_DELETED_TASKS};
use crate::model::task::{Priority, Task};
use crate::ops::dates;
use crate::ops::validation::{sanitize_task_description, sanitize_task_title};

/// Fields for a new task card
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Task CRUD
// ---------------------------------------------------------------------------

/// Append a task to the end of a column in the active project.
/// Returns the new task ID, or None if the title is blank or the column
/// does not exist.
pub fn add_task(state: &mut AppState, column_id: &str, new: NewTask) -> Option<String> {
    let title = sanitize_task_title(&new.title).to_uppercase();
    if title.is_empty() {
        return None;
    }
    let project = state.active_project_mut()?;
    if !project.has_column(column_id) {
        return None;
    }

    let id = uuid::Uuid::new_v4().to_string();
    project.tasks.push(Task {
        id: id.clone(),
        title,
        description: sanitize_task_description(&new.description),
        priority: new.priority,
        date: dates::creation_label(dates::today()),
        due_date: new.due_date,
        column_id: column_id.to_string(),
        subtasks: Vec::new(),
    });
    Some(id)
}

/// Replace a task in the active project with an updated version (matched by ID).
/// Edits that would move the task to an unknown column, or blank its title,
/// are ignored.
pub fn edit_task(state: &mut AppState, mut updated: Task) -> bool {
    updated.title = sanitize_task_title(&updated.title);
    updated.description = sanitize_task_description(&updated.description);
    if updated.title.is_empty() {
        return false;
    }
    let Some(project) = state.active_project_mut() else {
        return false;
    };
    if !project.has_column(&updated.column_id) {
        return false;
    }
    match project.tasks.iter_mut().find(|t| t.id == updated.id) {
        Some(slot) if *slot != updated => {
            *slot = updated;
            true
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Move a task to `target_index` within `target_column_id` in the active project.
///
/// Works for both reordering inside a column and moving across columns. The
/// index is clamped to the target column's length. After the move the flat
/// list holds every other-column task first (relative order kept), followed
/// by the target column in its new order.
pub fn move_task(
    state: &mut AppState,
    task_id: &str,
    target_column_id: &str,
    target_index: usize,
) -> bool {
    let Some(project) = state.active_project_mut() else {
        return false;
    };
    if !project.has_column(target_column_id) {
        return false;
    }
    let Some(idx) = project.tasks.iter().position(|t| t.id == task_id) else {
        return false;
    };

    let mut task = project.tasks.remove(idx);
    task.column_id = target_column_id.to_string();

    let (mut target, mut others): (Vec<Task>, Vec<Task>) = std::mem::take(&mut project.tasks)
        .into_iter()
        .partition(|t| t.column_id == target_column_id);
    let at = target_index.min(target.len());
    target.insert(at, task);
    others.append(&mut target);
    project.tasks = others;
    true
}

// ---------------------------------------------------------------------------
// Delete / restore
// ---------------------------------------------------------------------------

/// Delete a task from the active project, keeping a snapshot at the front of
/// the deleted-tasks buffer.
pub fn delete_task(state: &mut AppState, task_id: &str) -> bool {
    delete_task_at(state, task_id, dates::now_millis())
}

pub(crate) fn delete_task_at(state: &mut AppState, task_id: &str, now_ms: i64) -> bool {
    let Some(project) = state.active_project_mut() else {
        return false;
    };
    let Some(idx) = project.tasks.iter().position(|t| t.id == task_id) else {
        return false;
    };
    let project_id = project.id.clone();
    let task = project.tasks.remove(idx);

    state.deleted_tasks.insert(
        0,
        DeletedTask {
            task,
            project_id,
            deleted_at: now_ms,
        },
    );
    state.deleted_tasks.truncate(MAX_DELETED_TASKS);
    true
}

/// Restore the deleted task at `index` (0 = most recent).
///
/// The task is appended to its original project, or to the active project if
/// the original has since been deleted.
pub fn restore_task(state: &mut AppState, index: usize) -> bool {
    let Some(entry) = state.deleted_tasks.get(index) else {
        return false;
    };
    let position = |id: &str| state.projects.iter().position(|p| p.id == id);
    let Some(target) = position(&entry.project_id)
        .or_else(|| position(&state.active_project_id))
        .or_else(|| (!state.projects.is_empty()).then_some(0))
    else {
        return false;
    };
    let entry = state.deleted_tasks.remove(index);
    state.projects[target].tasks.push(entry.task);
    true
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Tasks in `column_id`, filtered by a case-insensitive substring match on
/// title or description. A blank query returns the whole column.
pub fn get_filtered_tasks<'a>(tasks: &'a [Task], column_id: &str, query: &str) -> Vec<&'a Task> {
    let column = tasks.iter().filter(|t| t.column_id == column_id);
    if query.trim().is_empty() {
        return column.collect();
    }
    let q = query.to_lowercase();
    column
        .filter(|t| t.title.to_lowercase().contains(&q) || t.description.to_lowercase().contains(&q))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::Project;
    use crate::model::seed::default_state;
    use pretty_assertions::assert_eq;

    fn task(id: &str, column: &str) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            priority: Priority::Medium,
            date: "Feb 24".into(),
            due_date: None,
            column_id: column.to_string(),
            subtasks: vec![],
        }
    }

    /// Project P with [A(todo), B(todo), C(done)], plus a second project Q.
    fn sample_state() -> AppState {
        let mut p = Project::new("P".into(), "P".into());
        p.tasks = vec![task("A", "todo"), task("B", "todo"), task("C", "done")];
        let q = Project::new("Q".into(), "Q".into());
        let mut state = default_state();
        state.projects = vec![p, q];
        state.active_project_id = "P".into();
        state
    }

    fn ids(tasks: Vec<&Task>) -> Vec<&str> {
        tasks.into_iter().map(|t| t.id.as_str()).collect()
    }

    fn column(state: &AppState, column: &str) -> Vec<String> {
        let project = state.active_project().unwrap();
        get_filtered_tasks(&project.tasks, column, "")
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    // --- Ordering ---

    #[test]
    fn test_move_across_columns_to_top() {
        let mut state = sample_state();
        assert!(move_task(&mut state, "B", "done", 0));
        assert_eq!(column(&state, "done"), vec!["B", "C"]);
        assert_eq!(column(&state, "todo"), vec!["A"]);
        let b = state.active_project().unwrap().find_task("B").unwrap();
        assert_eq!(b.column_id, "done");
    }

    #[test]
    fn test_move_within_column() {
        let mut state = sample_state();
        assert!(move_task(&mut state, "A", "todo", 1));
        assert_eq!(column(&state, "todo"), vec!["B", "A"]);
        assert_eq!(column(&state, "done"), vec!["C"]);
    }

    #[test]
    fn test_move_index_is_clamped() {
        let mut state = sample_state();
        assert!(move_task(&mut state, "A", "done", 99));
        assert_eq!(column(&state, "done"), vec!["C", "A"]);
    }

    #[test]
    fn test_move_flat_order_puts_target_column_last() {
        let mut state = sample_state();
        move_task(&mut state, "C", "todo", 1);
        let flat: Vec<&str> = state.active_project().unwrap().tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(flat, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_move_final_position_property() {
        for target in ["todo", "in-progress", "done"] {
            for index in 0..5 {
                for id in ["A", "B", "C"] {
                    let mut state = sample_state();
                    move_task(&mut state, id, target, index);
                    let col = column(&state, target);
                    let expected = index.min(col.len() - 1);
                    assert_eq!(col[expected], id, "{} -> {}[{}]", id, target, index);
                }
            }
        }
    }

    #[test]
    fn test_move_unknown_task_is_noop() {
        let mut state = sample_state();
        let before = state.clone();
        assert!(!move_task(&mut state, "nope", "done", 0));
        assert_eq!(state, before);
    }

    #[test]
    fn test_move_unknown_column_is_noop() {
        let mut state = sample_state();
        let before = state.clone();
        assert!(!move_task(&mut state, "A", "archive", 0));
        assert_eq!(state, before);
    }

    // --- Delete / restore ---

    #[test]
    fn test_delete_then_restore() {
        let mut state = sample_state();
        assert!(delete_task(&mut state, "A"));
        assert_eq!(column(&state, "todo"), vec!["B"]);
        assert_eq!(state.deleted_tasks[0].task.id, "A");
        assert_eq!(state.deleted_tasks[0].project_id, "P");

        assert!(restore_task(&mut state, 0));
        assert_eq!(column(&state, "todo"), vec!["B", "A"]);
        assert!(state.deleted_tasks.is_empty());
    }

    #[test]
    fn test_delete_restore_preserves_multiset() {
        let mut state = sample_state();
        let mut before: Vec<Task> = state.active_project().unwrap().tasks.clone();
        delete_task(&mut state, "B");
        restore_task(&mut state, 0);
        let mut after = state.active_project().unwrap().tasks.clone();
        before.sort_by(|a, b| a.id.cmp(&b.id));
        after.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(after, before);
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut state = sample_state();
        assert!(!delete_task(&mut state, "Z"));
        assert!(state.deleted_tasks.is_empty());
    }

    #[test]
    fn test_restore_out_of_range_is_noop() {
        let mut state = sample_state();
        delete_task(&mut state, "A");
        let before = state.clone();
        assert!(!restore_task(&mut state, 1));
        assert_eq!(state, before);
    }

    #[test]
    fn test_restore_into_original_project() {
        let mut state = sample_state();
        delete_task(&mut state, "A");
        state.active_project_id = "Q".into();
        restore_task(&mut state, 0);
        assert!(state.project("P").unwrap().find_task("A").is_some());
        assert!(state.project("Q").unwrap().tasks.is_empty());
    }

    #[test]
    fn test_restore_falls_back_to_active_project() {
        let mut state = sample_state();
        delete_task(&mut state, "A");
        state.projects.retain(|p| p.id != "P");
        state.active_project_id = "Q".into();
        assert!(restore_task(&mut state, 0));
        assert_eq!(state.project("Q").unwrap().tasks[0].id, "A");
    }

    #[test]
    fn test_deleted_buffer_is_capped_fifo() {
        let mut state = sample_state();
        let project = state.active_project_mut().unwrap();
        project.tasks = (0..21).map(|i| task(&format!("t{}", i), "todo")).collect();
        for i in 0..21 {
            assert!(delete_task_at(&mut state, &format!("t{}", i), i));
        }
        assert_eq!(state.deleted_tasks.len(), MAX_DELETED_TASKS);
        assert_eq!(state.deleted_tasks[0].task.id, "t20");
        assert_eq!(state.deleted_tasks[19].task.id, "t1");
        assert!(!state.deleted_tasks.iter().any(|d| d.task.id == "t0"));
    }

    // --- CRUD ---

    #[test]
    fn test_add_task_appends_uppercased() {
        let mut state = sample_state();
        let id = add_task(
            &mut state,
            "todo",
            NewTask {
                title: "  buy onions ".into(),
                description: "layers".into(),
                priority: Priority::High,
                due_date: Some("2026-03-01".into()),
            },
        )
        .unwrap();
        let project = state.active_project().unwrap();
        let added = project.tasks.last().unwrap();
        assert_eq!(added.id, id);
        assert_eq!(added.title, "BUY ONIONS");
        assert_eq!(added.column_id, "todo");
        assert!(added.subtasks.is_empty());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_add_task_rejects_blank_and_unknown_column() {
        let mut state = sample_state();
        let blank = NewTask {
            title: "   ".into(),
            ..Default::default()
        };
        assert!(add_task(&mut state, "todo", blank).is_none());
        let good = NewTask {
            title: "x".into(),
            ..Default::default()
        };
        assert!(add_task(&mut state, "later", good).is_none());
        assert_eq!(state.active_project().unwrap().tasks.len(), 3);
    }

    #[test]
    fn test_edit_task_replaces_in_place() {
        let mut state = sample_state();
        let mut b = state.active_project().unwrap().find_task("B").unwrap().clone();
        b.description = "edited".into();
        assert!(edit_task(&mut state, b));
        let tasks = &state.active_project().unwrap().tasks;
        assert_eq!(tasks[1].id, "B");
        assert_eq!(tasks[1].description, "edited");
    }

    #[test]
    fn test_edit_unknown_or_invalid_is_noop() {
        let mut state = sample_state();
        assert!(!edit_task(&mut state, task("Z", "todo")));
        assert!(!edit_task(&mut state, task("A", "nowhere")));
        let mut blank = task("A", "todo");
        blank.title = " ".into();
        assert!(!edit_task(&mut state, blank));
    }

    // --- Filtering ---

    #[test]
    fn test_filter_by_query() {
        let mut tasks = vec![task("A", "todo"), task("B", "todo"), task("C", "done")];
        tasks[0].title = "RESCUE FIONA".into();
        tasks[1].description = "needs a fiona escort".into();
        tasks[2].title = "FIONA DONE".into();
        assert_eq!(ids(get_filtered_tasks(&tasks, "todo", "Fiona")), vec!["A", "B"]);
        assert_eq!(ids(get_filtered_tasks(&tasks, "todo", "rescue")), vec!["A"]);
        assert_eq!(ids(get_filtered_tasks(&tasks, "todo", "  ")), vec!["A", "B"]);
        assert_eq!(ids(get_filtered_tasks(&tasks, "done", "dragon")), Vec::<&str>::new());
    }
}
