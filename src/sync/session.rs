//! Sign-in decisions: which board to use when a user signs in.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;
use uuid::Uuid;

use super::engine::{fetch_app_state, sync_app_state};
use super::remote::{RemoteError, RemoteStore};
use crate::model::seed::default_state;
use crate::model::state::AppState;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap_or_else(|e| unreachable!("uuid pattern is valid: {e}"))
});

/// What to do with the board when a user signs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialLoad {
    /// The remote has a board; it replaces the local one
    Remote(AppState),
    /// The remote is empty but this device has its own changes. The user
    /// must pick a `MigrationChoice`.
    NeedsChoice,
    /// Nothing on either side; keep the local seed board
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationChoice {
    /// Upload the local board
    MigrateLocal,
    /// Discard local changes and start from the seed board
    StartFresh,
}

pub async fn resolve_initial_load(
    remote: &dyn RemoteStore,
    user_id: &str,
    local: &AppState,
) -> Result<InitialLoad, RemoteError> {
    if let Some(state) = fetch_app_state(remote, user_id).await? {
        info!(user = user_id, "loaded board from remote");
        return Ok(InitialLoad::Remote(state));
    }
    if *local != default_state() {
        Ok(InitialLoad::NeedsChoice)
    } else {
        Ok(InitialLoad::Fresh)
    }
}

/// Apply the user's choice and push the result. Returns the board to use.
pub async fn apply_migration_choice(
    remote: &dyn RemoteStore,
    user_id: &str,
    local: &AppState,
    choice: MigrationChoice,
) -> Result<AppState, RemoteError> {
    let state = match choice {
        MigrationChoice::MigrateLocal => {
            let mut state = local.clone();
            let remapped = remap_legacy_ids(&mut state);
            info!(user = user_id, remapped, "migrating local board");
            state
        }
        MigrationChoice::StartFresh => {
            info!(user = user_id, "starting with a fresh board");
            default_state()
        }
    };
    sync_app_state(remote, user_id, &state).await?;
    Ok(state)
}

pub fn is_uuid(id: &str) -> bool {
    UUID_RE.is_match(id)
}

fn fresh_id(id: &mut String) -> bool {
    if is_uuid(id) {
        return false;
    }
    *id = Uuid::new_v4().to_string();
    true
}

/// Replace every id that is not a UUID with a new v4 UUID. References to
/// remapped projects (active project, deleted-task origins) follow along.
/// Returns how many ids changed.
pub fn remap_legacy_ids(state: &mut AppState) -> usize {
    let mut project_map: HashMap<String, String> = HashMap::new();
    let mut count = 0;

    let projects = state
        .projects
        .iter_mut()
        .chain(state.deleted_projects.iter_mut().map(|d| &mut d.project));
    for project in projects {
        let old = project.id.clone();
        if fresh_id(&mut project.id) {
            project_map.insert(old, project.id.clone());
            count += 1;
        }
        for task in &mut project.tasks {
            count += usize::from(fresh_id(&mut task.id));
            for subtask in &mut task.subtasks {
                count += usize::from(fresh_id(&mut subtask.id));
            }
        }
    }

    for deleted in &mut state.deleted_tasks {
        count += usize::from(fresh_id(&mut deleted.task.id));
        for subtask in &mut deleted.task.subtasks {
            count += usize::from(fresh_id(&mut subtask.id));
        }
        if let Some(new_id) = project_map.get(&deleted.project_id) {
            deleted.project_id = new_id.clone();
        }
    }

    if let Some(new_id) = project_map.get(&state.active_project_id) {
        state.active_project_id = new_id.clone();
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::Project;
    use crate::model::state::DeletedTask;
    use crate::model::task::{Priority, Subtask, Task};
    use crate::ops::project_ops;
    use crate::sync::tables::MemoryRemote;
    use pretty_assertions::assert_eq;

    fn legacy_state() -> AppState {
        let mut state = default_state();
        let mut project = Project::new("1".into(), "Legacy".into());
        project.tasks.push(Task {
            id: "42".into(),
            title: "OLD".into(),
            description: String::new(),
            priority: Priority::Low,
            date: "Jan 2".into(),
            due_date: None,
            column_id: "todo".into(),
            subtasks: vec![Subtask {
                id: "s1".into(),
                text: "step".into(),
                done: false,
            }],
        });
        state.projects.push(project);
        state.active_project_id = "1".into();
        state.deleted_tasks.push(DeletedTask {
            task: Task {
                id: "43".into(),
                title: "GONE".into(),
                description: String::new(),
                priority: Priority::Medium,
                date: "Jan 3".into(),
                due_date: None,
                column_id: "done".into(),
                subtasks: vec![],
            },
            project_id: "1".into(),
            deleted_at: 1,
        });
        state
    }

    #[tokio::test]
    async fn remote_data_wins() {
        let remote = MemoryRemote::new();
        let mut theirs = default_state();
        theirs.user_initials = "RM".into();
        sync_app_state(&remote, "u1", &theirs).await.unwrap();

        let local = legacy_state();
        let load = resolve_initial_load(&remote, "u1", &local).await.unwrap();
        assert_eq!(load, InitialLoad::Remote(theirs));
    }

    #[tokio::test]
    async fn empty_remote_with_local_changes_needs_a_choice() {
        let remote = MemoryRemote::new();
        let mut local = default_state();
        project_ops::add_project(&mut local, "Side");
        let load = resolve_initial_load(&remote, "u1", &local).await.unwrap();
        assert_eq!(load, InitialLoad::NeedsChoice);
        // Deciding is left to the caller
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn empty_remote_with_seed_board_is_fresh() {
        let remote = MemoryRemote::new();
        let load = resolve_initial_load(&remote, "u1", &default_state())
            .await
            .unwrap();
        assert_eq!(load, InitialLoad::Fresh);
    }

    #[tokio::test]
    async fn migrate_local_uploads_with_uuid_ids() {
        let remote = MemoryRemote::new();
        let local = legacy_state();
        let migrated =
            apply_migration_choice(&remote, "u1", &local, MigrationChoice::MigrateLocal)
                .await
                .unwrap();

        let legacy = &migrated.projects[3];
        assert!(is_uuid(&legacy.id));
        assert!(is_uuid(&legacy.tasks[0].id));
        assert!(is_uuid(&legacy.tasks[0].subtasks[0].id));
        assert_eq!(migrated.active_project_id, legacy.id);
        assert_eq!(migrated.deleted_tasks[0].project_id, legacy.id);
        assert!(is_uuid(&migrated.deleted_tasks[0].task.id));
        // UUID-shaped seed ids are left alone
        assert_eq!(migrated.projects[0].id, local.projects[0].id);

        let fetched = fetch_app_state(&remote, "u1").await.unwrap().unwrap();
        assert_eq!(fetched, migrated);
    }

    #[tokio::test]
    async fn start_fresh_uploads_seed_board() {
        let remote = MemoryRemote::new();
        let state = apply_migration_choice(&remote, "u1", &legacy_state(), MigrationChoice::StartFresh)
            .await
            .unwrap();
        assert_eq!(state, default_state());
        let fetched = fetch_app_state(&remote, "u1").await.unwrap().unwrap();
        assert_eq!(fetched, default_state());
    }

    #[test]
    fn remap_counts_changed_ids() {
        let mut state = legacy_state();
        assert_eq!(remap_legacy_ids(&mut state), 4);
        assert_eq!(remap_legacy_ids(&mut state), 0);
    }

    #[test]
    fn uuid_shape() {
        assert!(is_uuid("00000000-0000-4000-a000-000000000101"));
        assert!(is_uuid(&Uuid::new_v4().to_string()));
        assert!(!is_uuid("1"));
        assert!(!is_uuid("00000000-0000-4000-a000-00000000010"));
    }
}
