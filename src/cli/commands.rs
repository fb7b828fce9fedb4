use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kb", about = concat!("kanboard v", env!("CARGO_PKG_VERSION"), " - a personal kanban board"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the active project's board (default)
    Board(BoardArgs),
    /// Add a task to the active project
    Add(AddArgs),
    /// Edit a task
    Edit(EditArgs),
    /// Manage a task's subtasks
    Subtask(SubtaskCmd),
    /// Move a task to a column, optionally at a position
    Mv(MvArgs),
    /// Delete a task (restorable from the trash)
    Rm(RmArgs),
    /// List recently deleted tasks and projects
    Trash,
    /// Restore a deleted task by its trash index
    Restore(RestoreArgs),
    /// Empty the trash
    ClearTrash,
    /// Project management
    Project(ProjectCmd),
    /// Set the active project's accent color
    Accent(AccentArgs),
    /// Set your initials
    Initials(InitialsArgs),
    /// Sign in and start syncing
    Login(LoginArgs),
    /// Sign out and go back to the local board
    Logout,
    /// Push the board to the remote now
    Sync,
    /// Show session and sync status
    Status,
}

// ---------------------------------------------------------------------------
// Board args
// ---------------------------------------------------------------------------

#[derive(Args, Default)]
pub struct BoardArgs {
    /// Only show tasks whose title or description contains this text
    #[arg(long, short = 's')]
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Task args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Column ID
    #[arg(long, short = 'c', default_value = "todo")]
    pub column: String,
    /// Description
    #[arg(long = "desc", short = 'd')]
    pub description: Option<String>,
    /// Priority (high, medium, low)
    #[arg(long, short = 'p')]
    pub priority: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID or unique ID prefix
    pub task: String,
    /// New title
    #[arg(long, short = 't')]
    pub title: Option<String>,
    /// New description
    #[arg(long = "desc", short = 'd')]
    pub description: Option<String>,
    /// New priority (high, medium, low)
    #[arg(long, short = 'p')]
    pub priority: Option<String>,
    /// New due date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "no_due")]
    pub due: Option<String>,
    /// Clear the due date
    #[arg(long)]
    pub no_due: bool,
}

#[derive(Args)]
pub struct SubtaskCmd {
    #[command(subcommand)]
    pub action: SubtaskAction,
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Add a subtask
    Add {
        /// Task ID or unique ID prefix
        task: String,
        /// Subtask text
        text: String,
    },
    /// Toggle a subtask's done flag
    Toggle {
        /// Task ID or unique ID prefix
        task: String,
        /// Subtask number (1-based, as listed)
        number: usize,
    },
    /// Remove a subtask
    Rm {
        /// Task ID or unique ID prefix
        task: String,
        /// Subtask number (1-based, as listed)
        number: usize,
    },
}

#[derive(Args)]
pub struct MvArgs {
    /// Task ID or unique ID prefix
    pub task: String,
    /// Target column ID
    pub column: String,
    /// Position within the column (0 = top; default: bottom)
    #[arg(long, short = 'i')]
    pub index: Option<usize>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Task ID or unique ID prefix
    pub task: String,
}

#[derive(Args)]
pub struct RestoreArgs {
    /// Trash index as shown by `kb trash`
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Project args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectCmd {
    #[command(subcommand)]
    pub action: Option<ProjectAction>,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List projects
    List,
    /// Create a project
    Add {
        /// Project name
        name: String,
    },
    /// Delete a project (restorable)
    Rm {
        /// Project ID, unique ID prefix, or exact name
        project: String,
    },
    /// Rename a project
    Rename {
        /// Project ID, unique ID prefix, or exact name
        project: String,
        /// New name
        name: String,
    },
    /// Switch the active project
    Use {
        /// Project ID, unique ID prefix, or exact name
        project: String,
    },
    /// Restore a deleted project by its trash index
    Restore {
        /// Index as shown by `kb trash`
        index: usize,
    },
    /// Set or clear the active project's background image
    Bg(BgArgs),
}

#[derive(Args)]
pub struct BgArgs {
    /// Image URL or data URL
    #[arg(conflicts_with = "clear", required_unless_present = "clear")]
    pub image: Option<String>,
    /// Remove the background image
    #[arg(long)]
    pub clear: bool,
}

// ---------------------------------------------------------------------------
// Settings args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AccentArgs {
    /// green, orange, blue, red or lime
    pub color: String,
}

#[derive(Args)]
pub struct InitialsArgs {
    /// Up to three letters
    pub initials: String,
}

// ---------------------------------------------------------------------------
// Session args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    /// User ID
    pub user: String,
    /// Upload this device's board when the remote one is empty
    #[arg(long, conflicts_with = "fresh")]
    pub migrate: bool,
    /// Start from the default board when the remote one is empty
    #[arg(long)]
    pub fresh: bool,
}
