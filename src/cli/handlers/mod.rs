mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, Session};
use crate::io::storage::{FileStore, SaveOutcome};
use crate::model::config::AppConfig;
use crate::model::project::Project;
use crate::model::state::{AccentColor, AppState, SyncStatus};
use crate::model::task::{Priority, Subtask, Task};
use crate::ops::task_ops::{self, NewTask};
use crate::ops::{dates, validation};
use crate::store::{Action, Store};
use crate::sync::{FileRemote, RemoteStore, SyncHandle, fetch_app_state, fingerprint};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Error type for command-line usage problems
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("'{query}' matches more than one task: {matches}")]
    AmbiguousTask { query: String, matches: String },
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("'{query}' matches more than one project: {matches}")]
    AmbiguousProject { query: String, matches: String },
    #[error("unknown column '{column}' (columns: {available})")]
    UnknownColumn { column: String, available: String },
    #[error("invalid priority '{0}' (use high, medium or low)")]
    InvalidPriority(String),
    #[error("invalid due date '{0}' (use YYYY-MM-DD)")]
    InvalidDueDate(String),
    #[error("unknown accent color '{0}' (use {1})")]
    InvalidAccent(String, String),
    #[error("task {task} has no subtask {number}")]
    NoSuchSubtask { task: String, number: usize },
    #[error("nothing in the trash at index {0}")]
    NoTrashEntry(usize),
    #[error("{0}")]
    Rejected(&'static str),
    #[error("not signed in (run `kb login <user>`)")]
    NotSignedIn,
    #[error("no remote configured; set sync.remote_dir in {0}")]
    NoRemote(PathBuf),
    #[error(
        "the remote board for '{0}' is empty and this device has its own board; \
         rerun with --migrate to upload it or --fresh to start over"
    )]
    NeedsChoice(String),
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a command needs: config, the local store and the session
pub(crate) struct Context {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub session: Option<Session>,
    pub store: Store,
    pub json: bool,
}

impl Context {
    fn open(data_dir_override: Option<&str>, json: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let config = config_io::read_config()?;
        let data_dir = config_io::resolve_data_dir(data_dir_override.map(Path::new), &config);
        let storage = FileStore::new(&data_dir).with_quota(config.storage.quota_bytes);
        let store = Store::open(Box::new(storage));
        let session = config_io::read_session(&data_dir);
        Ok(Context {
            config,
            data_dir,
            session,
            store,
            json,
        })
    }

    fn remote(&self) -> Option<Arc<dyn RemoteStore>> {
        let dir = self.config.sync.remote_dir.as_ref()?;
        Some(Arc::new(FileRemote::new(dir)))
    }

    fn require_remote(&self) -> Result<Arc<dyn RemoteStore>, CliError> {
        self.remote()
            .ok_or_else(|| CliError::NoRemote(config_io::config_path()))
    }

    /// When signed in, start syncing. The remote board replaces the local
    /// one unless the local board has changed since the last sync, in which
    /// case the local board is pushed. An unreachable remote leaves us
    /// local-only.
    async fn connect(&mut self) {
        let (Some(session), Some(remote)) = (self.session.clone(), self.remote()) else {
            return;
        };
        let debounce = self.config.sync.debounce();
        let fetched = match fetch_app_state(remote.as_ref(), &session.user_id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "remote unavailable, working offline");
                return;
            }
        };
        let local = fingerprint(self.store.state());
        let unsynced = session.synced.as_deref() != Some(local.as_str());

        match fetched {
            Some(state) if !unsynced => {
                let handle = SyncHandle::spawn(remote, &session.user_id, debounce, Some(&state));
                self.store.attach_sync(handle);
                self.store.replace_state(state);
            }
            _ => {
                if unsynced {
                    info!(user = %session.user_id, "sending changes made since the last sync");
                }
                let handle = SyncHandle::spawn(remote, &session.user_id, debounce, None);
                self.store.attach_sync(handle);
                self.store.queue_sync();
            }
        }
    }

    /// Remember the current board as the one the remote holds
    fn record_synced(&mut self) -> Result<(), config_io::ConfigError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let current = fingerprint(self.store.state());
        if session.synced.as_deref() == Some(current.as_str()) {
            return Ok(());
        }
        session.synced = Some(current);
        config_io::write_session(&self.data_dir, session)
    }

    /// Wait for the sync worker and surface anything that went wrong
    async fn finish(&mut self) {
        match self.store.flush_sync().await {
            SyncStatus::Synced => {
                if let Err(e) = self.record_synced() {
                    warn!(error = %e, "could not record sync state");
                }
            }
            SyncStatus::Error => {
                eprintln!("warning: sync failed; changes are saved on this device and sent on the next run")
            }
            _ => {}
        }
        match self.store.last_save() {
            Some(SaveOutcome::SavedWithoutImages) => {
                eprintln!("warning: storage is full; background images were not saved")
            }
            Some(SaveOutcome::Failed) => {
                eprintln!("warning: could not save the board; changes will be lost on exit")
            }
            _ => {}
        }
        let handle = self.store.detach_sync();
        handle.shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub async fn dispatch(cli: Cli) -> CmdResult {
    let mut ctx = Context::open(cli.data_dir.as_deref(), cli.json)?;
    let command = cli
        .command
        .unwrap_or(Commands::Board(BoardArgs::default()));

    match command {
        // Session commands manage their own remote access
        Commands::Login(args) => session::cmd_login(&mut ctx, args).await,
        Commands::Logout => session::cmd_logout(&mut ctx).await,
        Commands::Sync => session::cmd_sync(&mut ctx).await,
        Commands::Status => {
            ctx.connect().await;
            ctx.store.flush_sync().await;
            let result = session::cmd_status(&ctx);
            ctx.finish().await;
            result
        }
        command => {
            ctx.connect().await;
            let result = run(&mut ctx, command);
            ctx.finish().await;
            result
        }
    }
}

fn run(ctx: &mut Context, command: Commands) -> CmdResult {
    match command {
        Commands::Board(args) => cmd_board(ctx, args),
        Commands::Add(args) => cmd_add(ctx, args),
        Commands::Edit(args) => cmd_edit(ctx, args),
        Commands::Subtask(args) => cmd_subtask(ctx, args),
        Commands::Mv(args) => cmd_mv(ctx, args),
        Commands::Rm(args) => cmd_rm(ctx, args),
        Commands::Trash => cmd_trash(ctx),
        Commands::Restore(args) => cmd_restore(ctx, args),
        Commands::ClearTrash => cmd_clear_trash(ctx),
        Commands::Project(args) => cmd_project(ctx, args),
        Commands::Accent(args) => cmd_accent(ctx, args),
        Commands::Initials(args) => cmd_initials(ctx, args),
        Commands::Login(_) | Commands::Logout | Commands::Sync | Commands::Status => {
            unreachable!("session commands are dispatched separately")
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn active_project(state: &AppState) -> Result<&Project, CliError> {
    state
        .active_project()
        .ok_or(CliError::Rejected("there are no projects"))
}

/// Find a task in the active project by full ID or unique ID prefix
fn resolve_task<'a>(state: &'a AppState, query: &str) -> Result<&'a Task, CliError> {
    let project = active_project(state)?;
    if let Some(task) = project.find_task(query) {
        return Ok(task);
    }
    let matches: Vec<&Task> = project
        .tasks
        .iter()
        .filter(|t| t.id.starts_with(query))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::TaskNotFound(query.to_string())),
        [task] => Ok(task),
        many => Err(CliError::AmbiguousTask {
            query: query.to_string(),
            matches: many
                .iter()
                .map(|t| short_id(&t.id))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Find a project by full ID, exact name, or unique ID prefix
fn resolve_project<'a>(state: &'a AppState, query: &str) -> Result<&'a Project, CliError> {
    if let Some(project) = state.project(query) {
        return Ok(project);
    }
    let by_name: Vec<&Project> = state
        .projects
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case(query))
        .collect();
    if let [project] = by_name.as_slice() {
        return Ok(project);
    }
    let matches: Vec<&Project> = state
        .projects
        .iter()
        .filter(|p| p.id.starts_with(query))
        .collect();
    match matches.as_slice() {
        [] if by_name.is_empty() => Err(CliError::ProjectNotFound(query.to_string())),
        [project] => Ok(project),
        _ => {
            let candidates = if by_name.is_empty() { &matches } else { &by_name };
            Err(CliError::AmbiguousProject {
                query: query.to_string(),
                matches: candidates
                    .iter()
                    .map(|p| format!("{} ({})", p.name, short_id(&p.id)))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

fn check_column(project: &Project, column_id: &str) -> Result<(), CliError> {
    if project.has_column(column_id) {
        return Ok(());
    }
    Err(CliError::UnknownColumn {
        column: column_id.to_string(),
        available: project
            .columns
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn parse_priority(raw: &str) -> Result<Priority, CliError> {
    Priority::parse_priority(raw).ok_or_else(|| CliError::InvalidPriority(raw.to_string()))
}

fn parse_due(raw: &str) -> Result<String, CliError> {
    let raw = raw.trim();
    if validation::is_valid_due_date(raw) {
        Ok(raw.to_string())
    } else {
        Err(CliError::InvalidDueDate(raw.to_string()))
    }
}

fn print_task(ctx: &Context, id: &str) -> CmdResult {
    let today = dates::today();
    let task = resolve_task(ctx.store.state(), id)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task, today))?);
    } else {
        for line in format_task_tree(task, today, 0) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

fn cmd_board(ctx: &Context, args: BoardArgs) -> CmdResult {
    let state = ctx.store.state();
    let project = active_project(state)?;
    let query = args.search.as_deref().unwrap_or("");
    let columns: Vec<(&str, Vec<&Task>)> = project
        .columns
        .iter()
        .map(|c| {
            (
                c.id.as_str(),
                task_ops::get_filtered_tasks(&project.tasks, &c.id, query),
            )
        })
        .collect();
    let today = dates::today();

    if ctx.json {
        let board = BoardJson {
            project_id: project.id.clone(),
            project: project.name.clone(),
            accent: state.effective_accent(),
            search: args.search.clone().filter(|q| !q.trim().is_empty()),
            columns: project
                .columns
                .iter()
                .zip(&columns)
                .map(|(column, (_, tasks))| ColumnJson {
                    id: column.id.clone(),
                    title: column.title.clone(),
                    tasks: tasks.iter().map(|t| task_to_json(t, today)).collect(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else {
        for line in format_board(project, &columns, today) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &mut Context, args: AddArgs) -> CmdResult {
    check_column(active_project(ctx.store.state())?, &args.column)?;
    let task = NewTask {
        title: args.title,
        description: args.description.unwrap_or_default(),
        priority: args
            .priority
            .as_deref()
            .map(parse_priority)
            .transpose()?
            .unwrap_or_default(),
        due_date: args.due.as_deref().map(parse_due).transpose()?,
    };
    let id = ctx
        .store
        .dispatch(Action::AddTask {
            column_id: args.column,
            task,
        })
        .created
        .ok_or(CliError::Rejected("task title cannot be empty"))?;
    if ctx.json {
        print_task(ctx, &id)
    } else {
        println!("{}", id);
        Ok(())
    }
}

fn cmd_edit(ctx: &mut Context, args: EditArgs) -> CmdResult {
    let mut task = resolve_task(ctx.store.state(), &args.task)?.clone();
    if let Some(title) = args.title {
        if validation::sanitize_task_title(&title).is_empty() {
            return Err(CliError::Rejected("task title cannot be empty").into());
        }
        task.title = title;
    }
    if let Some(description) = args.description {
        task.description = description;
    }
    if let Some(priority) = args.priority.as_deref() {
        task.priority = parse_priority(priority)?;
    }
    if let Some(due) = args.due.as_deref() {
        task.due_date = Some(parse_due(due)?);
    }
    if args.no_due {
        task.due_date = None;
    }
    let id = task.id.clone();
    if !ctx.store.dispatch(Action::EditTask(task)).changed && !ctx.json {
        println!("no changes");
        return Ok(());
    }
    print_task(ctx, &id)
}

fn cmd_subtask(ctx: &mut Context, args: SubtaskCmd) -> CmdResult {
    let (query, number) = match &args.action {
        SubtaskAction::Add { task, .. } => (task, None),
        SubtaskAction::Toggle { task, number } | SubtaskAction::Rm { task, number } => {
            (task, Some(*number))
        }
    };
    let mut task = resolve_task(ctx.store.state(), query)?.clone();
    let index = match number {
        Some(n) if n >= 1 && n <= task.subtasks.len() => Some(n - 1),
        Some(n) => {
            return Err(CliError::NoSuchSubtask {
                task: short_id(&task.id).to_string(),
                number: n,
            }
            .into());
        }
        None => None,
    };

    match (args.action, index) {
        (SubtaskAction::Add { text, .. }, _) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(CliError::Rejected("subtask text cannot be empty").into());
            }
            task.subtasks.push(Subtask {
                id: uuid::Uuid::new_v4().to_string(),
                text: text.to_string(),
                done: false,
            });
        }
        (SubtaskAction::Toggle { .. }, Some(i)) => task.subtasks[i].done = !task.subtasks[i].done,
        (SubtaskAction::Rm { .. }, Some(i)) => {
            task.subtasks.remove(i);
        }
        _ => {}
    }
    let id = task.id.clone();
    ctx.store.dispatch(Action::EditTask(task));
    print_task(ctx, &id)
}

fn cmd_mv(ctx: &mut Context, args: MvArgs) -> CmdResult {
    let state = ctx.store.state();
    check_column(active_project(state)?, &args.column)?;
    let id = resolve_task(state, &args.task)?.id.clone();
    ctx.store.dispatch(Action::MoveTask {
        task_id: id.clone(),
        column_id: args.column,
        index: args.index.unwrap_or(usize::MAX),
    });
    if ctx.json {
        print_task(ctx, &id)
    } else {
        println!("{}", id);
        Ok(())
    }
}

fn cmd_rm(ctx: &mut Context, args: RmArgs) -> CmdResult {
    let task = resolve_task(ctx.store.state(), &args.task)?;
    let (id, title) = (task.id.clone(), task.title.clone());
    ctx.store.dispatch(Action::DeleteTask(id.clone()));
    if ctx.json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("deleted {} {} (kb restore 0 to undo)", short_id(&id), title);
    }
    Ok(())
}

fn cmd_trash(ctx: &Context) -> CmdResult {
    let state = ctx.store.state();
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&trash_to_json(state))?);
    } else {
        for line in format_trash(state) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_restore(ctx: &mut Context, args: RestoreArgs) -> CmdResult {
    let entry = ctx
        .store
        .state()
        .deleted_tasks
        .get(args.index)
        .ok_or(CliError::NoTrashEntry(args.index))?;
    let id = entry.task.id.clone();
    ctx.store.dispatch(Action::RestoreTask(args.index));
    if ctx.json {
        println!("{}", serde_json::json!({ "restored": id }));
    } else {
        println!("restored {}", id);
    }
    Ok(())
}

fn cmd_clear_trash(ctx: &mut Context) -> CmdResult {
    ctx.store.dispatch(Action::ClearAllDeleted);
    if !ctx.json {
        println!("trash emptied");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

fn cmd_project(ctx: &mut Context, args: ProjectCmd) -> CmdResult {
    match args.action.unwrap_or(ProjectAction::List) {
        ProjectAction::List => {
            let state = ctx.store.state();
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&projects_to_json(state))?);
            } else {
                for line in format_project_list(state) {
                    println!("{}", line);
                }
            }
        }
        ProjectAction::Add { name } => {
            let id = ctx
                .store
                .dispatch(Action::AddProject(name))
                .created
                .ok_or(CliError::Rejected("project name cannot be empty"))?;
            println!("{}", id);
        }
        ProjectAction::Rm { project } => {
            let state = ctx.store.state();
            let project = resolve_project(state, &project)?;
            if state.projects.len() <= 1 {
                return Err(CliError::Rejected("cannot delete the last project").into());
            }
            let (id, name) = (project.id.clone(), project.name.clone());
            ctx.store.dispatch(Action::DeleteProject(id));
            println!("deleted project {} (kb project restore 0 to undo)", name);
        }
        ProjectAction::Rename { project, name } => {
            let project_id = resolve_project(ctx.store.state(), &project)?.id.clone();
            if validation::sanitize_project_name(&name).is_empty() {
                return Err(CliError::Rejected("project name cannot be empty").into());
            }
            ctx.store
                .dispatch(Action::RenameProject { project_id, name });
        }
        ProjectAction::Use { project } => {
            let project = resolve_project(ctx.store.state(), &project)?;
            let (id, name) = (project.id.clone(), project.name.clone());
            ctx.store.dispatch(Action::SetActiveProject(id));
            if !ctx.json {
                println!("now on {}", name);
            }
        }
        ProjectAction::Restore { index } => {
            let entry = ctx
                .store
                .state()
                .deleted_projects
                .get(index)
                .ok_or(CliError::NoTrashEntry(index))?;
            let name = entry.project.name.clone();
            ctx.store.dispatch(Action::RestoreProject(index));
            if !ctx.json {
                println!("restored project {}", name);
            }
        }
        ProjectAction::Bg(bg) => {
            let image = if bg.clear {
                None
            } else {
                bg.image.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
            };
            ctx.store.dispatch(Action::SetBackgroundImage(image));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

fn cmd_accent(ctx: &mut Context, args: AccentArgs) -> CmdResult {
    let color = AccentColor::parse_color(args.color.trim()).ok_or_else(|| {
        CliError::InvalidAccent(
            args.color.clone(),
            AccentColor::ALL
                .iter()
                .map(|c| c.name())
                .collect::<Vec<_>>()
                .join(", "),
        )
    })?;
    ctx.store.dispatch(Action::SetAccentColor(color));
    if !ctx.json {
        println!("accent {} ({})", color.name(), color.hex());
    }
    Ok(())
}

fn cmd_initials(ctx: &mut Context, args: InitialsArgs) -> CmdResult {
    if validation::sanitize_initials(&args.initials).is_empty() {
        return Err(CliError::Rejected("initials must contain at least one letter").into());
    }
    ctx.store.dispatch(Action::SetUserInitials(args.initials));
    if !ctx.json {
        println!("{}", ctx.store.state().user_initials);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::seed::default_state;
    use crate::ops::project_ops;

    #[test]
    fn resolves_tasks_by_prefix() {
        let state = default_state();
        let first = &state.projects[0].tasks[0];
        assert_eq!(resolve_task(&state, &first.id).unwrap().id, first.id);
        assert!(matches!(
            resolve_task(&state, "00000000"),
            Err(CliError::AmbiguousTask { .. })
        ));
        assert!(matches!(
            resolve_task(&state, "ffff"),
            Err(CliError::TaskNotFound(_))
        ));
        let last = &state.projects[0].tasks[5];
        let tail = &last.id;
        assert_eq!(resolve_task(&state, tail).unwrap().title, last.title);
    }

    #[test]
    fn resolves_projects_by_name_or_prefix() {
        let mut state = default_state();
        assert_eq!(resolve_project(&state, "work").unwrap().name, "Work");
        let id = project_ops::add_project(&mut state, "Garden").unwrap();
        assert_eq!(resolve_project(&state, &id[..8]).unwrap().name, "Garden");
        assert!(matches!(
            resolve_project(&state, "00000000"),
            Err(CliError::AmbiguousProject { .. })
        ));
        assert!(matches!(
            resolve_project(&state, "nope"),
            Err(CliError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn unknown_column_lists_choices() {
        let state = default_state();
        let err = check_column(&state.projects[0], "later").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown column 'later' (columns: todo, in-progress, done)"
        );
    }

    fn signed_in(remote_dir: &Path, data_dir: &Path, synced: Option<String>) -> Context {
        let mut config = AppConfig::default();
        config.sync.remote_dir = Some(remote_dir.to_path_buf());
        Context {
            config,
            data_dir: data_dir.to_path_buf(),
            session: Some(Session {
                user_id: "u1".into(),
                synced,
            }),
            store: Store::open(Box::new(FileStore::new(data_dir))),
            json: false,
        }
    }

    fn seed_marker() -> Option<String> {
        Some(fingerprint(&default_state()))
    }

    #[tokio::test]
    async fn connect_pushes_a_board_changed_since_the_last_sync() {
        let remote_dir = tempfile::TempDir::new().unwrap();
        let data_dir = tempfile::TempDir::new().unwrap();
        let remote = FileRemote::new(remote_dir.path());
        crate::sync::sync_app_state(&remote, "u1", &default_state())
            .await
            .unwrap();

        let mut ctx = signed_in(remote_dir.path(), data_dir.path(), seed_marker());
        ctx.store.dispatch(Action::SetUserInitials("LC".into()));
        drop(ctx);

        let mut ctx = signed_in(remote_dir.path(), data_dir.path(), seed_marker());
        ctx.connect().await;
        assert_eq!(ctx.store.state().user_initials, "LC");
        ctx.finish().await;

        let fetched = fetch_app_state(&remote, "u1").await.unwrap().unwrap();
        assert_eq!(fetched.user_initials, "LC");
        let session = config_io::read_session(data_dir.path()).unwrap();
        assert_eq!(session.synced, Some(fingerprint(ctx.store.state())));
    }

    #[tokio::test]
    async fn connect_takes_the_remote_board_when_local_is_in_sync() {
        let remote_dir = tempfile::TempDir::new().unwrap();
        let data_dir = tempfile::TempDir::new().unwrap();
        let remote = FileRemote::new(remote_dir.path());
        let mut elsewhere = default_state();
        elsewhere.user_initials = "RM".into();
        crate::sync::sync_app_state(&remote, "u1", &elsewhere)
            .await
            .unwrap();

        let mut ctx = signed_in(remote_dir.path(), data_dir.path(), seed_marker());
        ctx.connect().await;
        assert_eq!(ctx.store.state().user_initials, "RM");
        ctx.finish().await;
    }

    #[test]
    fn due_dates_are_validated() {
        assert_eq!(parse_due(" 2026-02-28 ").unwrap(), "2026-02-28");
        assert!(parse_due("2026-02-30").is_err());
    }
}
