//! Full-state sync between an `AppState` and the remote tables.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::remote::{
    DeletedProjectRow, DeletedTaskRow, ProfileRow, ProjectRow, RemoteError, RemoteStore, TaskRow,
    background_path,
};
use crate::model::project::Project;
use crate::model::state::{AppState, DeletedProject, DeletedTask};
use crate::model::task::Task;

/// Initials shown for a remote profile that never set any
pub const REMOTE_DEFAULT_INITIALS: &str = "ME";

fn to_timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Push the whole state to the remote.
///
/// Each table is written in turn; a failure part-way leaves the remote
/// partially updated and the next sync overwrites it.
pub async fn sync_app_state(
    remote: &dyn RemoteStore,
    user_id: &str,
    state: &AppState,
) -> Result<(), RemoteError> {
    remote
        .upsert_profile(ProfileRow {
            id: user_id.to_string(),
            accent_color: state.accent_color,
            user_initials: Some(state.user_initials.clone()),
            active_project_id: Some(state.active_project_id.clone()),
        })
        .await?;

    let local_ids: HashSet<&str> = state.projects.iter().map(|p| p.id.as_str()).collect();
    let mut removed: Vec<String> = remote
        .fetch_projects(user_id)
        .await?
        .into_iter()
        .map(|p| p.id)
        .filter(|id| !local_ids.contains(id.as_str()))
        .collect();
    if !removed.is_empty() {
        removed.sort();
        debug!(count = removed.len(), "deleting remote projects");
        remote.delete_projects(user_id, &removed).await?;
    }

    for (position, project) in state.projects.iter().enumerate() {
        sync_project(remote, user_id, project, position).await?;
    }

    remote.delete_all_deleted_tasks(user_id).await?;
    if !state.deleted_tasks.is_empty() {
        let rows = state
            .deleted_tasks
            .iter()
            .map(|d| DeletedTaskRow {
                user_id: user_id.to_string(),
                original_project_id: Some(d.project_id.clone()),
                task_snapshot: d.task.clone(),
                deleted_at: to_timestamp(d.deleted_at),
            })
            .collect();
        remote.insert_deleted_tasks(rows).await?;
    }

    remote.delete_all_deleted_projects(user_id).await?;
    if !state.deleted_projects.is_empty() {
        let rows = state
            .deleted_projects
            .iter()
            .map(|d| DeletedProjectRow {
                user_id: user_id.to_string(),
                project_snapshot: d.project.clone(),
                deleted_at: to_timestamp(d.deleted_at),
            })
            .collect();
        remote.insert_deleted_projects(rows).await?;
    }

    info!(
        user = user_id,
        projects = state.projects.len(),
        "board synced"
    );
    Ok(())
}

async fn sync_project(
    remote: &dyn RemoteStore,
    user_id: &str,
    project: &Project,
    position: usize,
) -> Result<(), RemoteError> {
    let background_image_path = match &project.background_image {
        Some(image) if image.starts_with("data:") => {
            Some(remote.upload_background(user_id, &project.id, image).await?)
        }
        other => other.clone(),
    };
    remote
        .upsert_project(ProjectRow {
            id: project.id.clone(),
            user_id: user_id.to_string(),
            name: project.name.clone(),
            columns: project.columns.clone(),
            background_image_path,
            accent_color: project.accent_color,
            position,
        })
        .await?;

    let local_ids: HashSet<&str> = project.tasks.iter().map(|t| t.id.as_str()).collect();
    let mut removed: Vec<String> = remote
        .task_ids_for_project(user_id, &project.id)
        .await?
        .into_iter()
        .filter(|id| !local_ids.contains(id.as_str()))
        .collect();
    if !removed.is_empty() {
        removed.sort();
        remote.delete_tasks(user_id, &removed).await?;
    }

    for (position, task) in project.tasks.iter().enumerate() {
        remote
            .upsert_task(TaskRow::from_task(task, &project.id, user_id, position))
            .await?;
    }
    Ok(())
}

/// Assemble a user's board from the remote. None when the user has no
/// profile or no projects.
pub async fn fetch_app_state(
    remote: &dyn RemoteStore,
    user_id: &str,
) -> Result<Option<AppState>, RemoteError> {
    let Some(profile) = remote.fetch_profile(user_id).await? else {
        return Ok(None);
    };
    let project_rows = remote.fetch_projects(user_id).await?;
    if project_rows.is_empty() {
        return Ok(None);
    }

    let mut tasks_by_project: HashMap<String, Vec<Task>> = HashMap::new();
    for row in remote.fetch_tasks(user_id).await? {
        tasks_by_project
            .entry(row.project_id.clone())
            .or_default()
            .push(row.into_task());
    }

    let mut projects = Vec::with_capacity(project_rows.len());
    for row in project_rows {
        let background_image = match row.background_image_path {
            Some(path) if path == background_path(user_id, &row.id) => {
                remote.download_background(&path).await?
            }
            other => other,
        };
        projects.push(Project {
            tasks: tasks_by_project.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            columns: row.columns,
            background_image,
            accent_color: row.accent_color,
        });
    }

    let deleted_tasks = remote
        .fetch_deleted_tasks(user_id)
        .await?
        .into_iter()
        .map(|row| DeletedTask {
            task: row.task_snapshot,
            project_id: row.original_project_id.unwrap_or_default(),
            deleted_at: row.deleted_at.timestamp_millis(),
        })
        .collect();
    let deleted_projects = remote
        .fetch_deleted_projects(user_id)
        .await?
        .into_iter()
        .map(|row| DeletedProject {
            project: row.project_snapshot,
            deleted_at: row.deleted_at.timestamp_millis(),
        })
        .collect();

    let active_project_id = profile
        .active_project_id
        .filter(|id| projects.iter().any(|p: &Project| &p.id == id))
        .unwrap_or_else(|| projects[0].id.clone());
    let user_initials = profile
        .user_initials
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| REMOTE_DEFAULT_INITIALS.to_string());

    debug!(user = user_id, projects = projects.len(), "fetched remote board");
    Ok(Some(AppState {
        projects,
        active_project_id,
        accent_color: profile.accent_color,
        user_initials,
        deleted_tasks,
        deleted_projects,
    }))
}

/// Whether the user has any projects stored remotely
pub async fn has_remote_data(remote: &dyn RemoteStore, user_id: &str) -> Result<bool, RemoteError> {
    Ok(!remote.fetch_projects(user_id).await?.is_empty())
}
