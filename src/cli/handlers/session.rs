use crate::cli::output::StatusJson;
use crate::io::config_io::{self, Session};
use crate::model::state::SyncStatus;
use crate::sync::{
    InitialLoad, MigrationChoice, apply_migration_choice, fingerprint, resolve_initial_load,
    sync_app_state,
};

use super::{CliError, CmdResult, Context};

pub(super) async fn cmd_login(ctx: &mut Context, args: crate::cli::commands::LoginArgs) -> CmdResult {
    let user_id = args.user.trim().to_string();
    if user_id.is_empty() {
        return Err(CliError::Rejected("user ID cannot be empty").into());
    }
    if let Some(current) = &ctx.session
        && current.user_id != user_id
    {
        return Err(format!(
            "already signed in as {} (run `kb logout` first)",
            current.user_id
        )
        .into());
    }
    let remote = ctx.require_remote()?;

    let message = match resolve_initial_load(remote.as_ref(), &user_id, ctx.store.state()).await? {
        InitialLoad::Remote(state) => {
            ctx.store.replace_state(state);
            "loaded board from remote"
        }
        InitialLoad::NeedsChoice => {
            let choice = match (args.migrate, args.fresh) {
                (true, _) => MigrationChoice::MigrateLocal,
                (_, true) => MigrationChoice::StartFresh,
                _ => return Err(CliError::NeedsChoice(user_id).into()),
            };
            let state =
                apply_migration_choice(remote.as_ref(), &user_id, ctx.store.state(), choice)
                    .await?;
            ctx.store.replace_state(state);
            match choice {
                MigrationChoice::MigrateLocal => "uploaded this device's board",
                MigrationChoice::StartFresh => "started a fresh board",
            }
        }
        InitialLoad::Fresh => {
            sync_app_state(remote.as_ref(), &user_id, ctx.store.state()).await?;
            "uploaded this device's board"
        }
    };

    let session = Session {
        user_id: user_id.clone(),
        synced: Some(fingerprint(ctx.store.state())),
    };
    config_io::write_session(&ctx.data_dir, &session)?;
    ctx.session = Some(session);
    if ctx.json {
        println!("{}", serde_json::json!({ "user": user_id, "result": message }));
    } else {
        println!("signed in as {}; {}", user_id, message);
    }
    Ok(())
}

pub(super) async fn cmd_logout(ctx: &mut Context) -> CmdResult {
    let Some(session) = ctx.session.take() else {
        println!("not signed in");
        return Ok(());
    };
    config_io::clear_session(&ctx.data_dir)?;
    ctx.store.sign_out().shutdown().await;
    println!("signed out {}", session.user_id);
    Ok(())
}

pub(super) async fn cmd_sync(ctx: &mut Context) -> CmdResult {
    let session = ctx.session.clone().ok_or(CliError::NotSignedIn)?;
    let remote = ctx.require_remote()?;
    sync_app_state(remote.as_ref(), &session.user_id, ctx.store.state()).await?;
    ctx.record_synced()?;
    if ctx.json {
        println!("{}", serde_json::json!({ "sync": SyncStatus::Synced }));
    } else {
        println!("synced");
    }
    Ok(())
}

pub(super) fn cmd_status(ctx: &Context) -> CmdResult {
    let state = ctx.store.state();
    let status = StatusJson {
        user: ctx.session.as_ref().map(|s| s.user_id.clone()),
        remote_dir: ctx
            .config
            .sync
            .remote_dir
            .as_ref()
            .map(|d| d.display().to_string()),
        data_dir: ctx.data_dir.display().to_string(),
        sync: ctx.store.sync_status(),
        initials: state.user_initials.clone(),
        accent: state.accent_color,
        projects: state.projects.len(),
        tasks: state.task_counts().iter().map(|(_, n)| n).sum(),
        deleted_tasks: state.deleted_tasks.len(),
        deleted_projects: state.deleted_projects.len(),
    };

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    match &status.user {
        Some(user) => println!("user:   {}", user),
        None => println!("user:   (local only)"),
    }
    if let Some(dir) = &status.remote_dir {
        println!("remote: {}", dir);
    }
    println!("sync:   {}", status.sync);
    println!("data:   {}", status.data_dir);
    println!(
        "board:  {} projects, {} tasks ({} initials, {} accent)",
        status.projects,
        status.tasks,
        status.initials,
        status.accent.name()
    );
    println!(
        "trash:  {} tasks, {} projects",
        status.deleted_tasks, status.deleted_projects
    );
    Ok(())
}
