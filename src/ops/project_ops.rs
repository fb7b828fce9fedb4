use crate::model::project::Project;
use crate::model::state::{AccentColor, AppState, DeletedProject, MAX_DELETED_PROJECTS};
use crate::ops::dates;
use crate::ops::validation::{sanitize_initials, sanitize_project_name};

/// Append a new empty project with the default columns.
/// Returns its ID, or None when the name is blank.
pub fn add_project(state: &mut AppState, name: &str) -> Option<String> {
    let name = sanitize_project_name(name);
    if name.is_empty() {
        return None;
    }
    let id = uuid::Uuid::new_v4().to_string();
    state.projects.push(Project::new(id.clone(), name));
    Some(id)
}

/// Delete a project, keeping a snapshot (tasks included) for restore.
///
/// The last remaining project cannot be deleted. If the deleted project was
/// active, the first remaining project becomes active.
pub fn delete_project(state: &mut AppState, project_id: &str) -> bool {
    delete_project_at(state, project_id, dates::now_millis())
}

pub(crate) fn delete_project_at(state: &mut AppState, project_id: &str, now_ms: i64) -> bool {
    if state.projects.len() <= 1 {
        return false;
    }
    let Some(idx) = state.projects.iter().position(|p| p.id == project_id) else {
        return false;
    };
    let project = state.projects.remove(idx);

    if state.active_project_id == project_id {
        state.active_project_id = state.projects[0].id.clone();
    }
    state.deleted_projects.insert(
        0,
        DeletedProject {
            project,
            deleted_at: now_ms,
        },
    );
    state.deleted_projects.truncate(MAX_DELETED_PROJECTS);
    true
}

/// Restore the deleted project at `index` (0 = most recent) to the end of the
/// project list, with its original ID and tasks.
pub fn restore_project(state: &mut AppState, index: usize) -> bool {
    if index >= state.deleted_projects.len() {
        return false;
    }
    let entry = state.deleted_projects.remove(index);
    state.projects.push(entry.project);
    true
}

pub fn rename_project(state: &mut AppState, project_id: &str, new_name: &str) -> bool {
    let name = sanitize_project_name(new_name);
    if name.is_empty() {
        return false;
    }
    match state.project_mut(project_id) {
        Some(p) if p.name != name => {
            p.name = name;
            true
        }
        _ => false,
    }
}

pub fn set_active_project(state: &mut AppState, project_id: &str) -> bool {
    if state.active_project_id == project_id || state.project(project_id).is_none() {
        return false;
    }
    state.active_project_id = project_id.to_string();
    true
}

/// Set (or clear, with None) the active project's background image
pub fn set_background_image(state: &mut AppState, image: Option<String>) -> bool {
    match state.active_project_mut() {
        Some(p) if p.background_image != image => {
            p.background_image = image;
            true
        }
        _ => false,
    }
}

/// Set the accent color of the active project
pub fn set_accent_color(state: &mut AppState, color: AccentColor) -> bool {
    match state.active_project_mut() {
        Some(p) if p.accent_color != Some(color) => {
            p.accent_color = Some(color);
            true
        }
        _ => false,
    }
}

/// Set the user's initials badge. Input that sanitizes to nothing is ignored.
pub fn set_user_initials(state: &mut AppState, raw: &str) -> bool {
    let initials = sanitize_initials(raw);
    if initials.is_empty() || initials == state.user_initials {
        return false;
    }
    state.user_initials = initials;
    true
}

/// Empty both undo buffers. Not reversible.
pub fn clear_all_deleted(state: &mut AppState) -> bool {
    if state.deleted_tasks.is_empty() && state.deleted_projects.is_empty() {
        return false;
    }
    state.deleted_tasks.clear();
    state.deleted_projects.clear();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seed::{SEED_PROJECT_ID, default_state};
    use crate::ops::task_ops;
    use pretty_assertions::assert_eq;

    fn project_ids(state: &AppState) -> Vec<&str> {
        state.projects.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_add_project() {
        let mut state = default_state();
        let id = add_project(&mut state, "  Swamp Chores  ").unwrap();
        let added = state.projects.last().unwrap();
        assert_eq!(added.id, id);
        assert_eq!(added.name, "Swamp Chores");
        assert_eq!(added.columns.len(), 3);
        assert!(add_project(&mut state, "   ").is_none());
    }

    #[test]
    fn test_delete_active_project_retargets() {
        let mut state = default_state();
        assert!(delete_project(&mut state, SEED_PROJECT_ID));
        assert_eq!(state.active_project_id, state.projects[0].id);
        assert_eq!(state.deleted_projects[0].project.id, SEED_PROJECT_ID);
        assert_eq!(state.deleted_projects[0].project.tasks.len(), 6);
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let mut state = default_state();
        let work = state.projects[1].id.clone();
        assert!(delete_project(&mut state, &work));
        assert_eq!(state.active_project_id, SEED_PROJECT_ID);
    }

    #[test]
    fn test_delete_last_project_rejected() {
        let mut state = default_state();
        state.projects.truncate(1);
        let before = state.clone();
        assert!(!delete_project(&mut state, SEED_PROJECT_ID));
        assert_eq!(state, before);
        assert_eq!(state.projects.len(), 1);
    }

    #[test]
    fn test_delete_unknown_project_noop() {
        let mut state = default_state();
        assert!(!delete_project(&mut state, "missing"));
        assert!(state.deleted_projects.is_empty());
    }

    #[test]
    fn test_restore_project_appends_with_tasks() {
        let mut state = default_state();
        delete_project(&mut state, SEED_PROJECT_ID);
        assert!(restore_project(&mut state, 0));
        let ids = project_ids(&state);
        assert_eq!(ids.last().copied(), Some(SEED_PROJECT_ID));
        assert_eq!(state.projects.last().unwrap().tasks.len(), 6);
        assert!(state.deleted_projects.is_empty());
        assert!(!restore_project(&mut state, 0));
    }

    #[test]
    fn test_deleted_projects_capped() {
        let mut state = default_state();
        for i in 0..12 {
            add_project(&mut state, &format!("P{}", i));
        }
        for i in 0..12 {
            let id = state.projects.iter().find(|p| p.name == format!("P{}", i)).unwrap().id.clone();
            assert!(delete_project_at(&mut state, &id, i));
        }
        assert_eq!(state.deleted_projects.len(), MAX_DELETED_PROJECTS);
        assert_eq!(state.deleted_projects[0].project.name, "P11");
        assert_eq!(state.deleted_projects[9].project.name, "P2");
    }

    #[test]
    fn test_restored_task_goes_to_active_when_project_gone() {
        let mut state = default_state();
        let seed_task = state.projects[0].tasks[0].id.clone();
        task_ops::delete_task(&mut state, &seed_task);
        delete_project(&mut state, SEED_PROJECT_ID);
        task_ops::restore_task(&mut state, 0);
        let active = state.active_project().unwrap();
        assert_eq!(active.name, "Work");
        assert_eq!(active.tasks[0].id, seed_task);
    }

    #[test]
    fn test_rename_project() {
        let mut state = default_state();
        assert!(rename_project(&mut state, SEED_PROJECT_ID, "Ogre Stuff"));
        assert_eq!(state.projects[0].name, "Ogre Stuff");
        assert!(!rename_project(&mut state, SEED_PROJECT_ID, "  "));
        assert!(!rename_project(&mut state, "missing", "X"));
    }

    #[test]
    fn test_active_and_theming() {
        let mut state = default_state();
        let work = state.projects[1].id.clone();
        assert!(set_active_project(&mut state, &work));
        assert!(!set_active_project(&mut state, "missing"));
        assert!(set_accent_color(&mut state, AccentColor::Red));
        assert_eq!(state.projects[1].accent_color, Some(AccentColor::Red));
        assert_eq!(state.effective_accent(), AccentColor::Red);
        assert!(set_background_image(&mut state, Some("data:image/png;base64,AA".into())));
        assert!(state.projects[1].background_image.is_some());
        assert!(set_user_initials(&mut state, "sk"));
        assert_eq!(state.user_initials, "SK");
        assert!(!set_user_initials(&mut state, "42"));
    }

    #[test]
    fn test_clear_all_deleted() {
        let mut state = default_state();
        let seed_task = state.projects[0].tasks[0].id.clone();
        task_ops::delete_task(&mut state, &seed_task);
        let work = state.projects[1].id.clone();
        delete_project(&mut state, &work);
        assert!(clear_all_deleted(&mut state));
        assert!(state.deleted_tasks.is_empty());
        assert!(state.deleted_projects.is_empty());
        assert!(!clear_all_deleted(&mut state));
    }
}
