use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::remote::{
    DeletedProjectRow, DeletedTaskRow, ProfileRow, ProjectRow, RemoteError, RemoteStore, TaskRow,
    background_path,
};

/// The full contents of a remote store, shared by every table-backed remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTables {
    #[serde(default)]
    pub profiles: Vec<ProfileRow>,
    #[serde(default)]
    pub projects: Vec<ProjectRow>,
    #[serde(default)]
    pub tasks: Vec<TaskRow>,
    #[serde(default)]
    pub deleted_tasks: Vec<DeletedTaskRow>,
    #[serde(default)]
    pub deleted_projects: Vec<DeletedProjectRow>,
    /// Blob store, keyed by path
    #[serde(default)]
    pub blobs: BTreeMap<String, String>,
}

fn upsert_by<T>(rows: &mut Vec<T>, row: T, same: impl Fn(&T, &T) -> bool) {
    match rows.iter_mut().find(|r| same(r, &row)) {
        Some(slot) => *slot = row,
        None => rows.push(row),
    }
}

impl RemoteTables {
    fn profile(&self, user_id: &str) -> Option<ProfileRow> {
        self.profiles.iter().find(|p| p.id == user_id).cloned()
    }

    fn projects_for(&self, user_id: &str) -> Vec<ProjectRow> {
        let mut rows: Vec<ProjectRow> = self
            .projects
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.position);
        rows
    }

    fn tasks_for(&self, user_id: &str) -> Vec<TaskRow> {
        let mut rows: Vec<TaskRow> = self
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.position);
        rows
    }

    /// Delete a user's projects by ID, cascading to their tasks
    fn delete_projects(&mut self, user_id: &str, ids: &[String]) {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.projects
            .retain(|p| p.user_id != user_id || !ids.contains(p.id.as_str()));
        self.tasks
            .retain(|t| t.user_id != user_id || !ids.contains(t.project_id.as_str()));
    }

    fn delete_tasks(&mut self, user_id: &str, ids: &[String]) {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.tasks
            .retain(|t| t.user_id != user_id || !ids.contains(t.id.as_str()));
    }

    fn deleted_tasks_for(&self, user_id: &str) -> Vec<DeletedTaskRow> {
        let mut rows: Vec<DeletedTaskRow> = self
            .deleted_tasks
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        rows
    }

    fn deleted_projects_for(&self, user_id: &str) -> Vec<DeletedProjectRow> {
        let mut rows: Vec<DeletedProjectRow> = self
            .deleted_projects
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        rows
    }
}

// ---------------------------------------------------------------------------
// Table backends
// ---------------------------------------------------------------------------

/// Somewhere a whole `RemoteTables` lives. Every `RemoteStore` call is one
/// `with_tables` round: read, apply, and (for writes) persist.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn with_tables<R, F>(&self, write: bool, f: F) -> Result<R, RemoteError>
    where
        F: FnOnce(&mut RemoteTables) -> R + Send,
        R: Send;
}

#[async_trait]
impl<B: TableBackend> RemoteStore for B {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<ProfileRow>, RemoteError> {
        self.with_tables(false, |t| t.profile(user_id)).await
    }

    async fn upsert_profile(&self, row: ProfileRow) -> Result<(), RemoteError> {
        self.with_tables(true, move |t| upsert_by(&mut t.profiles, row, |a, b| a.id == b.id))
            .await
    }

    async fn fetch_projects(&self, user_id: &str) -> Result<Vec<ProjectRow>, RemoteError> {
        self.with_tables(false, |t| t.projects_for(user_id)).await
    }

    async fn upsert_project(&self, row: ProjectRow) -> Result<(), RemoteError> {
        self.with_tables(true, move |t| {
            upsert_by(&mut t.projects, row, |a, b| {
                a.id == b.id && a.user_id == b.user_id
            })
        })
        .await
    }

    async fn delete_projects(&self, user_id: &str, ids: &[String]) -> Result<(), RemoteError> {
        self.with_tables(true, |t| t.delete_projects(user_id, ids))
            .await
    }

    async fn fetch_tasks(&self, user_id: &str) -> Result<Vec<TaskRow>, RemoteError> {
        self.with_tables(false, |t| t.tasks_for(user_id)).await
    }

    async fn task_ids_for_project(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> Result<Vec<String>, RemoteError> {
        self.with_tables(false, |t| {
            t.tasks
                .iter()
                .filter(|r| r.user_id == user_id && r.project_id == project_id)
                .map(|r| r.id.clone())
                .collect()
        })
        .await
    }

    async fn upsert_task(&self, row: TaskRow) -> Result<(), RemoteError> {
        self.with_tables(true, move |t| {
            upsert_by(&mut t.tasks, row, |a, b| a.id == b.id && a.user_id == b.user_id)
        })
        .await
    }

    async fn delete_tasks(&self, user_id: &str, ids: &[String]) -> Result<(), RemoteError> {
        self.with_tables(true, |t| t.delete_tasks(user_id, ids)).await
    }

    async fn fetch_deleted_tasks(&self, user_id: &str) -> Result<Vec<DeletedTaskRow>, RemoteError> {
        self.with_tables(false, |t| t.deleted_tasks_for(user_id)).await
    }

    async fn delete_all_deleted_tasks(&self, user_id: &str) -> Result<(), RemoteError> {
        self.with_tables(true, |t| t.deleted_tasks.retain(|r| r.user_id != user_id))
            .await
    }

    async fn insert_deleted_tasks(&self, rows: Vec<DeletedTaskRow>) -> Result<(), RemoteError> {
        self.with_tables(true, move |t| t.deleted_tasks.extend(rows)).await
    }

    async fn fetch_deleted_projects(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeletedProjectRow>, RemoteError> {
        self.with_tables(false, |t| t.deleted_projects_for(user_id)).await
    }

    async fn delete_all_deleted_projects(&self, user_id: &str) -> Result<(), RemoteError> {
        self.with_tables(true, |t| t.deleted_projects.retain(|r| r.user_id != user_id))
            .await
    }

    async fn insert_deleted_projects(
        &self,
        rows: Vec<DeletedProjectRow>,
    ) -> Result<(), RemoteError> {
        self.with_tables(true, move |t| t.deleted_projects.extend(rows)).await
    }

    async fn upload_background(
        &self,
        user_id: &str,
        project_id: &str,
        data: &str,
    ) -> Result<String, RemoteError> {
        let path = background_path(user_id, project_id);
        let key = path.clone();
        let data = data.to_string();
        self.with_tables(true, move |t| t.blobs.insert(key, data))
            .await?;
        Ok(path)
    }

    async fn download_background(&self, path: &str) -> Result<Option<String>, RemoteError> {
        self.with_tables(false, |t| t.blobs.get(path).cloned()).await
    }
}

// ---------------------------------------------------------------------------
// In-memory remote
// ---------------------------------------------------------------------------

/// In-process remote, with hooks for simulating outages and slow links
#[derive(Debug, Default)]
pub struct MemoryRemote {
    tables: Mutex<RemoteTables>,
    failing: AtomicBool,
    latency_ms: AtomicUsize,
    writes: AtomicUsize,
    profile_writes: std::sync::Mutex<Vec<ProfileRow>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `RemoteError::Unavailable` until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as usize, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> RemoteTables {
        self.tables.lock().await.clone()
    }

    /// Number of write calls that reached the tables
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every profile version written, in arrival order. Upserts that leave
    /// the row unchanged are not recorded.
    pub fn profile_writes(&self) -> Vec<ProfileRow> {
        match self.profile_writes.lock() {
            Ok(writes) => writes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TableBackend for MemoryRemote {
    async fn with_tables<R, F>(&self, write: bool, f: F) -> Result<R, RemoteError>
    where
        F: FnOnce(&mut RemoteTables) -> R + Send,
        R: Send,
    {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated outage".into()));
        }
        let mut tables = self.tables.lock().await;
        let before = tables.profiles.clone();
        let out = f(&mut tables);
        if write {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let changed: Vec<ProfileRow> = tables
                .profiles
                .iter()
                .filter(|p| !before.contains(p))
                .cloned()
                .collect();
            if !changed.is_empty()
                && let Ok(mut log) = self.profile_writes.lock()
            {
                log.extend(changed);
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Directory-backed remote
// ---------------------------------------------------------------------------

/// A remote kept in `<dir>/tables.json`, for running sync without a hosted backend
#[derive(Debug)]
pub struct FileRemote {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileRemote {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn tables_path(&self) -> PathBuf {
        self.dir.join("tables.json")
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RemoteError + '_ {
    move |source| RemoteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl TableBackend for FileRemote {
    async fn with_tables<R, F>(&self, write: bool, f: F) -> Result<R, RemoteError>
    where
        F: FnOnce(&mut RemoteTables) -> R + Send,
        R: Send,
    {
        if !self.dir.is_dir() {
            return Err(RemoteError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        let _guard = self.lock.lock().await;
        let path = self.tables_path();
        let mut tables = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RemoteTables::default(),
            Err(e) => return Err(io_err(&path)(e)),
        };
        let out = f(&mut tables);
        if write {
            let text = serde_json::to_string_pretty(&tables)?;
            let tmp = self.dir.join("tables.json.tmp");
            tokio::fs::write(&tmp, text).await.map_err(io_err(&tmp))?;
            tokio::fs::rename(&tmp, &path).await.map_err(io_err(&path))?;
            debug!(path = %path.display(), "remote tables written");
        }
        Ok(out)
    }
}
