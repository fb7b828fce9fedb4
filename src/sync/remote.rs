//! The remote store: five logical tables plus a blob store for background
//! images. Each table is written independently; nothing here is
//! transactional.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::project::{Column, Project};
use crate::model::state::AccentColor;
use crate::model::task::{Priority, Subtask, Task};

/// Error type for remote store calls
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("remote rejected request: {0}")]
    Backend(String),
    #[error("remote io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("remote data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One row per user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// The user ID
    pub id: String,
    pub accent_color: AccentColor,
    pub user_initials: Option<String>,
    pub active_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub columns: Vec<Column>,
    /// Blob path (`{user_id}/{project_id}`) or an inline/external image reference
    pub background_image_path: Option<String>,
    pub accent_color: Option<AccentColor>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub date: String,
    pub due_date: Option<String>,
    pub column_id: String,
    pub subtasks: Vec<Subtask>,
    pub position: usize,
}

impl TaskRow {
    pub fn from_task(task: &Task, project_id: &str, user_id: &str, position: usize) -> Self {
        TaskRow {
            id: task.id.clone(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            date: task.date.clone(),
            due_date: task.due_date.clone(),
            column_id: task.column_id.clone(),
            subtasks: task.subtasks.clone(),
            position,
        }
    }

    pub fn into_task(self) -> Task {
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            date: self.date,
            due_date: self.due_date,
            column_id: self.column_id,
            subtasks: self.subtasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedTaskRow {
    pub user_id: String,
    pub original_project_id: Option<String>,
    pub task_snapshot: Task,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedProjectRow {
    pub user_id: String,
    pub project_snapshot: Project,
    pub deleted_at: DateTime<Utc>,
}

/// Blob path for a project's background image
pub fn background_path(user_id: &str, project_id: &str) -> String {
    format!("{}/{}", user_id, project_id)
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Row-level access to the remote tables.
///
/// Rows are identified by `(user_id, id)`. Selects are scoped by user ID;
/// deletes take an explicit ID set. Deleting a project cascades to its tasks.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<ProfileRow>, RemoteError>;
    async fn upsert_profile(&self, row: ProfileRow) -> Result<(), RemoteError>;

    /// Projects for a user, ordered by position
    async fn fetch_projects(&self, user_id: &str) -> Result<Vec<ProjectRow>, RemoteError>;
    async fn upsert_project(&self, row: ProjectRow) -> Result<(), RemoteError>;
    async fn delete_projects(&self, user_id: &str, ids: &[String]) -> Result<(), RemoteError>;

    /// Tasks for a user, ordered by position
    async fn fetch_tasks(&self, user_id: &str) -> Result<Vec<TaskRow>, RemoteError>;
    async fn task_ids_for_project(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<Vec<String>, RemoteError>;
    async fn upsert_task(&self, row: TaskRow) -> Result<(), RemoteError>;
    async fn delete_tasks(&self, user_id: &str, ids: &[String]) -> Result<(), RemoteError>;

    /// Deleted-task snapshots for a user, most recent first
    async fn fetch_deleted_tasks(&self, user_id: &str) -> Result<Vec<DeletedTaskRow>, RemoteError>;
    async fn delete_all_deleted_tasks(&self, user_id: &str) -> Result<(), RemoteError>;
    async fn insert_deleted_tasks(&self, rows: Vec<DeletedTaskRow>) -> Result<(), RemoteError>;

    /// Deleted-project snapshots for a user, most recent first
    async fn fetch_deleted_projects(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeletedProjectRow>, RemoteError>;
    async fn delete_all_deleted_projects(&self, user_id: &str) -> Result<(), RemoteError>;
    async fn insert_deleted_projects(&self, rows: Vec<DeletedProjectRow>)
    -> Result<(), RemoteError>;

    /// Store an image under `{user_id}/{project_id}` and return its path
    async fn upload_background(
        &self,
        user_id: &str,
        project_id: &str,
        data: &str,
    ) -> Result<String, RemoteError>;
    async fn download_background(&self, path: &str) -> Result<Option<String>, RemoteError>;
}
