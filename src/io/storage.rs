use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::model::project::Project;
use crate::model::seed::{SEED_PROJECT_NAME, default_state, seed_project};
use crate::model::state::{AppState, DeletedProject, default_initials};

/// Key holding the serialized board. Bumped when the format changes
/// incompatibly; data under an older key is left behind.
pub const STORAGE_KEY: &str = "kanban_board_v7";

/// Error type for key-value storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {size} bytes > {quota} bytes")]
    QuotaExceeded { size: u64, quota: u64 },
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A string key-value store holding whole serialized values
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key under a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore {
            dir: dir.into(),
            quota_bytes: None,
        }
    }

    /// Refuse writes larger than `quota` bytes
    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota_bytes = quota;
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(value, self.quota_bytes)?;
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        atomic_write(&path, value.as_bytes()).map_err(|source| StorageError::Io { path, source })
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn check_quota(value: &str, quota: Option<u64>) -> Result<(), StorageError> {
    match quota {
        Some(quota) if value.len() as u64 > quota => Err(StorageError::QuotaExceeded {
            size: value.len() as u64,
            quota,
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        MemoryStore {
            entries: HashMap::new(),
            quota_bytes: Some(quota),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(value, self.quota_bytes)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the board from the store.
///
/// Missing, unreadable or malformed data yields the seed state. Never fails.
pub fn load_state(store: &dyn KeyValueStore) -> AppState {
    let raw = match store.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no stored board, using seed state");
            return default_state();
        }
        Err(e) => {
            warn!(error = %e, "could not read stored board, using seed state");
            return default_state();
        }
    };
    match parse_state(&raw) {
        Some(state) => state,
        None => {
            warn!("stored board is malformed, using seed state");
            default_state()
        }
    }
}

/// Parse and normalize a serialized board. None when the JSON is malformed
/// or `projects` / `activeProjectId` are missing. Below the top level,
/// entries that don't fit are skipped and the rest of the board is kept.
pub fn parse_state(raw: &str) -> Option<AppState> {
    let Value::Object(mut root) = serde_json::from_str(raw).ok()? else {
        return None;
    };
    let Some(Value::Array(projects)) = root.remove("projects") else {
        return None;
    };
    let active_project_id = match root.remove("activeProjectId") {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => return None,
    };

    let mut state = AppState {
        projects: projects.into_iter().filter_map(parse_project).collect(),
        active_project_id,
        accent_color: field_or_default(&mut root, "accentColor"),
        user_initials: field_or_default(&mut root, "userInitials"),
        deleted_tasks: salvage(root.remove("deletedTasks"), "deleted task"),
        deleted_projects: match root.remove("deletedProjects") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(parse_deleted_project)
                .collect(),
            _ => Vec::new(),
        },
    };
    normalize(&mut state);
    Some(state)
}

/// A project with its tasks read one at a time
fn parse_project(mut value: Value) -> Option<Project> {
    let tasks = value.get_mut("tasks").map(Value::take);
    match serde_json::from_value::<Project>(value) {
        Ok(mut project) => {
            project.tasks = salvage(tasks, "task");
            Some(project)
        }
        Err(e) => {
            warn!(error = %e, "skipping unreadable project in stored board");
            None
        }
    }
}

fn parse_deleted_project(mut value: Value) -> Option<DeletedProject> {
    let project = parse_project(value.get_mut("project")?.take())?;
    let deleted_at = value
        .get("deletedAt")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    Some(DeletedProject {
        project,
        deleted_at,
    })
}

/// Deserialize array elements one by one, dropping the ones that fail
fn salvage<T: DeserializeOwned>(value: Option<Value>, what: &str) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "skipping unreadable {} in stored board", what);
                None
            }
        })
        .collect()
}

fn field_or_default<T: DeserializeOwned + Default>(root: &mut Map<String, Value>, key: &str) -> T {
    root.remove(key)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

fn normalize(state: &mut AppState) {
    if state.user_initials.is_empty() {
        state.user_initials = default_initials();
    }

    if !state.projects.iter().any(|p| p.name == SEED_PROJECT_NAME) {
        let mut seed = seed_project();
        // A renamed seed project keeps its IDs; the re-inserted copy needs new ones.
        if state.projects.iter().any(|p| p.id == seed.id) {
            seed.id = uuid::Uuid::new_v4().to_string();
            for task in &mut seed.tasks {
                task.id = uuid::Uuid::new_v4().to_string();
            }
        }
        state.projects.insert(0, seed);
    }

    if state.project(&state.active_project_id).is_none() {
        state.active_project_id = state.projects[0].id.clone();
    }
}

/// What `save_state` managed to write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The full state did not fit; saved with background images dropped
    SavedWithoutImages,
    /// Nothing was written; the state lives in memory only
    Failed,
}

/// Write the whole board. On failure retries once with every background
/// image removed; a second failure is logged and otherwise ignored.
pub fn save_state(store: &mut dyn KeyValueStore, state: &AppState) -> SaveOutcome {
    let first = serde_json::to_string(state)
        .map_err(StorageError::from)
        .and_then(|json| store.set(STORAGE_KEY, &json));
    let Err(e) = first else {
        return SaveOutcome::Saved;
    };
    debug!(error = %e, "save failed, retrying without background images");

    let mut slim = state.clone();
    for project in &mut slim.projects {
        project.background_image = None;
    }
    let second = serde_json::to_string(&slim)
        .map_err(StorageError::from)
        .and_then(|json| store.set(STORAGE_KEY, &json));
    match second {
        Ok(()) => {
            warn!("board saved without background images (storage full)");
            SaveOutcome::SavedWithoutImages
        }
        Err(e) => {
            warn!(error = %e, "could not save board; changes will not survive a restart");
            SaveOutcome::Failed
        }
    }
}
