use serde::{Deserialize, Serialize};

use super::state::{AccentColor, null_as_default};
use super::task::Task;

/// A board column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub title: String,
}

impl Column {
    fn new(id: &str, title: &str) -> Self {
        Column {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

/// The three columns every project starts with
pub fn default_columns() -> Vec<Column> {
    vec![
        Column::new("todo", "To Do"),
        Column::new("in-progress", "In Progress"),
        Column::new("done", "Done"),
    ]
}

/// A project: one board with its own tasks and columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Tasks in display order (array position is the sort key)
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
    #[serde(default = "default_columns")]
    pub columns: Vec<Column>,
    /// Base64 data URL, a blob path, or None for the default background
    #[serde(default)]
    pub background_image: Option<String>,
    /// Per-project accent; falls back to the global accent when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<AccentColor>,
}

impl Project {
    /// Create an empty project with the default columns
    pub fn new(id: String, name: String) -> Self {
        Project {
            id,
            name,
            tasks: Vec::new(),
            columns: default_columns(),
            background_image: None,
            accent_color: None,
        }
    }

    pub fn has_column(&self, column_id: &str) -> bool {
        self.columns.iter().any(|c| c.id == column_id)
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}
