//! The board store: owns the state and fans every accepted change out to
//! local storage and, when signed in, the sync worker.

use crate::io::storage::{KeyValueStore, SaveOutcome, load_state, save_state};
use crate::model::state::{AccentColor, AppState, SyncStatus};
use crate::model::task::Task;
use crate::ops::project_ops;
use crate::ops::task_ops::{self, NewTask};
use crate::sync::SyncHandle;

/// A state change requested by the user
#[derive(Debug, Clone)]
pub enum Action {
    AddTask { column_id: String, task: NewTask },
    EditTask(Task),
    MoveTask {
        task_id: String,
        column_id: String,
        index: usize,
    },
    DeleteTask(String),
    RestoreTask(usize),
    AddProject(String),
    DeleteProject(String),
    RestoreProject(usize),
    RenameProject { project_id: String, name: String },
    SetActiveProject(String),
    SetBackgroundImage(Option<String>),
    SetAccentColor(AccentColor),
    SetUserInitials(String),
    ClearAllDeleted,
}

/// Result of a dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatched {
    pub changed: bool,
    /// ID of the task or project the action created
    pub created: Option<String>,
}

pub struct Store {
    state: AppState,
    storage: Box<dyn KeyValueStore>,
    sync: SyncHandle,
    last_save: Option<SaveOutcome>,
}

impl Store {
    /// Load the board from `storage`. Starts in local-only mode.
    pub fn open(storage: Box<dyn KeyValueStore>) -> Self {
        let state = load_state(storage.as_ref());
        Store {
            state,
            storage,
            sync: SyncHandle::offline(),
            last_save: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Outcome of the most recent save, if anything was saved
    pub fn last_save(&self) -> Option<SaveOutcome> {
        self.last_save
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    /// Apply an action. Rejected actions leave the state untouched and
    /// trigger no save or sync.
    pub fn dispatch(&mut self, action: Action) -> Dispatched {
        let state = &mut self.state;
        let (changed, created) = match action {
            Action::AddTask { column_id, task } => {
                let id = task_ops::add_task(state, &column_id, task);
                (id.is_some(), id)
            }
            Action::EditTask(task) => (task_ops::edit_task(state, task), None),
            Action::MoveTask {
                task_id,
                column_id,
                index,
            } => (task_ops::move_task(state, &task_id, &column_id, index), None),
            Action::DeleteTask(id) => (task_ops::delete_task(state, &id), None),
            Action::RestoreTask(index) => (task_ops::restore_task(state, index), None),
            Action::AddProject(name) => {
                let id = project_ops::add_project(state, &name);
                (id.is_some(), id)
            }
            Action::DeleteProject(id) => (project_ops::delete_project(state, &id), None),
            Action::RestoreProject(index) => (project_ops::restore_project(state, index), None),
            Action::RenameProject { project_id, name } => {
                (project_ops::rename_project(state, &project_id, &name), None)
            }
            Action::SetActiveProject(id) => (project_ops::set_active_project(state, &id), None),
            Action::SetBackgroundImage(image) => {
                (project_ops::set_background_image(state, image), None)
            }
            Action::SetAccentColor(color) => (project_ops::set_accent_color(state, color), None),
            Action::SetUserInitials(raw) => (project_ops::set_user_initials(state, &raw), None),
            Action::ClearAllDeleted => (project_ops::clear_all_deleted(state), None),
        };
        if changed {
            self.commit();
        }
        Dispatched { changed, created }
    }

    /// Swap in a whole board (e.g. one loaded from the remote) and save it
    pub fn replace_state(&mut self, state: AppState) {
        self.state = state;
        self.commit();
    }

    /// Start sending changes through `handle`
    pub fn attach_sync(&mut self, handle: SyncHandle) {
        self.sync = handle;
    }

    /// Send the current board to the sync worker without changing it
    pub fn queue_sync(&mut self) {
        self.sync.notify(&self.state);
    }

    /// Wait for any queued sync to finish
    pub async fn flush_sync(&self) -> SyncStatus {
        self.sync.flush().await
    }

    /// Stop sending changes. Returns the detached handle so the caller can
    /// shut it down.
    pub fn detach_sync(&mut self) -> SyncHandle {
        std::mem::replace(&mut self.sync, SyncHandle::offline())
    }

    /// Back to local-only mode, reloading the board from local storage
    pub fn sign_out(&mut self) -> SyncHandle {
        let handle = self.detach_sync();
        self.state = load_state(self.storage.as_ref());
        handle
    }

    fn commit(&mut self) {
        self.last_save = Some(save_state(self.storage.as_mut(), &self.state));
        self.sync.notify(&self.state);
    }
}
