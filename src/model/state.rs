use serde::{Deserialize, Serialize};

use super::project::Project;
use super::task::Task;

/// Max deleted tasks kept for undo (oldest dropped first)
pub const MAX_DELETED_TASKS: usize = 20;

/// Max deleted projects kept for undo
pub const MAX_DELETED_PROJECTS: usize = 10;

/// Accent color names available for theming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccentColor {
    #[default]
    Green,
    Orange,
    Blue,
    Red,
    Lime,
}

impl AccentColor {
    pub const ALL: [AccentColor; 5] = [
        AccentColor::Green,
        AccentColor::Orange,
        AccentColor::Blue,
        AccentColor::Red,
        AccentColor::Lime,
    ];

    pub fn hex(self) -> &'static str {
        match self {
            AccentColor::Green => "#34D399",
            AccentColor::Orange => "#F97316",
            AccentColor::Blue => "#60A5FA",
            AccentColor::Red => "#F87171",
            AccentColor::Lime => "#A3E635",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AccentColor::Green => "green",
            AccentColor::Orange => "orange",
            AccentColor::Blue => "blue",
            AccentColor::Red => "red",
            AccentColor::Lime => "lime",
        }
    }

    pub fn parse_color(s: &str) -> Option<AccentColor> {
        AccentColor::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
    }
}

/// Snapshot of a deleted task, kept for restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedTask {
    pub task: Task,
    /// The project the task lived in when it was deleted
    pub project_id: String,
    /// Unix timestamp in milliseconds
    pub deleted_at: i64,
}

/// Snapshot of a deleted project (tasks included)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedProject {
    pub project: Project,
    pub deleted_at: i64,
}

/// Root aggregate, persisted as a whole on every mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub projects: Vec<Project>,
    pub active_project_id: String,
    #[serde(default)]
    pub accent_color: AccentColor,
    #[serde(default = "default_initials")]
    pub user_initials: String,
    /// Most recent first
    #[serde(default, deserialize_with = "null_as_default")]
    pub deleted_tasks: Vec<DeletedTask>,
    /// Most recent first
    #[serde(default, deserialize_with = "null_as_default")]
    pub deleted_projects: Vec<DeletedProject>,
}

pub(crate) fn default_initials() -> String {
    "AP".to_string()
}

/// Treat an explicit `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AppState {
    /// The active project, falling back to the first one if the id is stale
    pub fn active_project(&self) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == self.active_project_id)
            .or_else(|| self.projects.first())
    }

    pub fn active_project_mut(&mut self) -> Option<&mut Project> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.id == self.active_project_id)
            .unwrap_or(0);
        self.projects.get_mut(idx)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Effective accent for the active project
    pub fn effective_accent(&self) -> AccentColor {
        self.active_project()
            .and_then(|p| p.accent_color)
            .unwrap_or(self.accent_color)
    }

    /// Task count per project id, in project order
    pub fn task_counts(&self) -> Vec<(&str, usize)> {
        self.projects
            .iter()
            .map(|p| (p.id.as_str(), p.tasks.len()))
            .collect()
    }
}

/// Cloud sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Not signed in, or nothing pending
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
    /// No remote configured or reachable
    Offline,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Error => write!(f, "error"),
            SyncStatus::Offline => write!(f, "offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_state_gets_defaults() {
        let state: AppState =
            serde_json::from_str(r#"{"projects":[],"activeProjectId":"p1"}"#).unwrap();
        assert_eq!(state.accent_color, AccentColor::Green);
        assert_eq!(state.user_initials, "AP");
        assert!(state.deleted_tasks.is_empty());
        assert!(state.deleted_projects.is_empty());
    }

    #[test]
    fn null_lists_become_empty() {
        let state: AppState = serde_json::from_str(
            r#"{"projects":[],"activeProjectId":"p1","deletedTasks":null,"deletedProjects":null}"#,
        )
        .unwrap();
        assert!(state.deleted_tasks.is_empty());
        assert!(state.deleted_projects.is_empty());
    }

    #[test]
    fn missing_active_project_id_is_an_error() {
        assert!(serde_json::from_str::<AppState>(r#"{"projects":[]}"#).is_err());
    }

    #[test]
    fn active_project_falls_back_to_first() {
        let state = AppState {
            projects: vec![Project::new("a".into(), "A".into())],
            active_project_id: "gone".into(),
            accent_color: AccentColor::Blue,
            user_initials: "AP".into(),
            deleted_tasks: vec![],
            deleted_projects: vec![],
        };
        assert_eq!(state.active_project().unwrap().id, "a");
        assert_eq!(state.effective_accent(), AccentColor::Blue);
    }

    #[test]
    fn accent_parse_and_hex() {
        assert_eq!(AccentColor::parse_color("Lime"), Some(AccentColor::Lime));
        assert_eq!(AccentColor::Orange.hex(), "#F97316");
        assert_eq!(AccentColor::parse_color("purple"), None);
    }
}
