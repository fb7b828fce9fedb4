//! Seed data for a first run.
//!
//! Ids are fixed v4-format UUIDs so the seed board survives a sync to the
//! remote store without being remapped.

use super::project::{Project, default_columns};
use super::state::{AccentColor, AppState};
use super::task::{Priority, Subtask, Task};

/// Name of the seed project that `load` guarantees is always present
pub const SEED_PROJECT_NAME: &str = "Shrek is Love";

pub const SEED_PROJECT_ID: &str = "00000000-0000-4000-a000-000000000101";

fn subtask(n: u32, text: &str, done: bool) -> Subtask {
    Subtask {
        id: format!("00000000-0000-4000-b000-{:012}", n),
        text: text.to_string(),
        done,
    }
}

#[allow(clippy::too_many_arguments)]
fn task(
    n: u32,
    title: &str,
    description: &str,
    priority: Priority,
    date: &str,
    due: &str,
    column: &str,
    subtasks: Vec<Subtask>,
) -> Task {
    Task {
        id: format!("00000000-0000-4000-a000-{:012}", n),
        title: title.to_string(),
        description: description.to_string(),
        priority,
        date: date.to_string(),
        due_date: Some(due.to_string()),
        column_id: column.to_string(),
        subtasks,
    }
}

pub fn seed_tasks() -> Vec<Task> {
    vec![
        task(
            1,
            "RESCUE PRINCESS FIONA",
            "Retrieve the princess from the dragon-guarded tower for Lord Farquaad",
            Priority::High,
            "Feb 24",
            "2026-02-28",
            "todo",
            vec![
                subtask(1, "Cross the rickety bridge over the lava", true),
                subtask(2, "Sneak past the dragon in the keep", false),
                subtask(3, "Find the highest room in the tallest tower", false),
            ],
        ),
        task(
            2,
            "CLEAR THE SWAMP",
            "Evict the fairy tale creatures Farquaad dumped on the property",
            Priority::High,
            "Feb 24",
            "2026-03-01",
            "todo",
            vec![
                subtask(4, "Confront Farquaad in Duloc about the deed", true),
                subtask(5, "Complete the quest to earn the swamp back", false),
                subtask(6, "Relocate the Three Bears, Pinocchio & friends", false),
            ],
        ),
        task(
            3,
            "ESCORT FIONA TO DULOC",
            "Deliver the princess to Lord Farquaad before sunset each day",
            Priority::Medium,
            "Feb 22",
            "2026-02-25",
            "in-progress",
            vec![
                subtask(7, "Set up camp before nightfall", true),
                subtask(8, "Cook dinner with Donkey by the fire", true),
                subtask(9, "Figure out why Fiona won't travel after dark", false),
            ],
        ),
        task(
            4,
            "CONFRONT LORD FARQUAAD",
            "Crash the royal wedding at Duloc cathedral",
            Priority::High,
            "Feb 22",
            "2026-02-26",
            "in-progress",
            vec![
                subtask(10, "Convince Donkey to fly Dragon to Duloc", false),
                subtask(11, "Reach the cathedral before 'I do'", false),
            ],
        ),
        task(
            5,
            "SURVIVE THE DRAGON'S KEEP",
            "Navigate the castle ruins, find Fiona, escape with Donkey alive",
            Priority::Low,
            "Feb 21",
            "2026-02-20",
            "done",
            vec![
                subtask(12, "Donkey distracts the dragon", true),
                subtask(13, "Slide down the dragon's tail to escape", true),
            ],
        ),
        task(
            6,
            "TOURNAMENT IN DULOC",
            "Win Farquaad's tournament to earn the quest assignment",
            Priority::Medium,
            "Feb 21",
            "2026-02-19",
            "done",
            vec![],
        ),
    ]
}

/// The seed project, with its tasks
pub fn seed_project() -> Project {
    Project {
        id: SEED_PROJECT_ID.to_string(),
        name: SEED_PROJECT_NAME.to_string(),
        tasks: seed_tasks(),
        columns: default_columns(),
        background_image: None,
        accent_color: None,
    }
}

/// Initial state used when nothing usable is stored
pub fn default_state() -> AppState {
    AppState {
        projects: vec![
            seed_project(),
            Project::new("00000000-0000-4000-a000-000000000102".into(), "Work".into()),
            Project::new(
                "00000000-0000-4000-a000-000000000103".into(),
                "Personal".into(),
            ),
        ],
        active_project_id: SEED_PROJECT_ID.to_string(),
        accent_color: AccentColor::Green,
        user_initials: "AP".to_string(),
        deleted_tasks: Vec::new(),
        deleted_projects: Vec::new(),
    }
}

impl Default for AppState {
    fn default() -> Self {
        default_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_ids_are_stable() {
        let tasks = seed_tasks();
        assert_eq!(tasks[0].id, "00000000-0000-4000-a000-000000000001");
        assert_eq!(tasks[3].subtasks[1].id, "00000000-0000-4000-b000-000000000011");
    }

    #[test]
    fn seed_tasks_use_declared_columns() {
        let project = seed_project();
        for task in &project.tasks {
            assert!(project.has_column(&task.column_id), "{}", task.column_id);
        }
    }

    #[test]
    fn default_state_is_consistent() {
        let state = default_state();
        assert_eq!(state.projects.len(), 3);
        assert_eq!(state.projects[0].name, SEED_PROJECT_NAME);
        assert_eq!(state.active_project().unwrap().id, SEED_PROJECT_ID);
    }
}
