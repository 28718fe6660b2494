//! Hivemind CLI entry point.

use clap::Parser;
use std::process::ExitCode;

use hivemind::cli::commands::{init, memory, session, spawn, task, AppContext, CommandError};
use hivemind::cli::{Cli, Commands, MemoryCommands, TaskCommands};
use hivemind::services::{init_tracing, ConfigLoader};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::from(1);
        }
    };
    init_tracing(&config);

    let ctx = match AppContext::initialize(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let result = dispatch(&ctx, cli).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn dispatch(ctx: &AppContext, cli: Cli) -> Result<(), CommandError> {
    let json = cli.json;
    match cli.command {
        Commands::Init {
            name,
            topology,
            queen_type,
            max_workers,
        } => init::handle_init(ctx, name, topology, queen_type, max_workers, json).await,

        Commands::Spawn {
            objective,
            name,
            queen_type,
            max_workers,
        } => spawn::handle_spawn(ctx, objective, name, queen_type, max_workers, json).await,

        Commands::Sessions => session::handle_sessions(ctx, json).await,

        Commands::Resume { session_id, claude } => {
            session::handle_resume(ctx, session_id, claude, json).await
        }

        Commands::Status { session_id } => session::handle_status(ctx, session_id, json).await,

        Commands::Pause { session_id } => session::handle_pause(ctx, session_id, json).await,

        Commands::Stop { session_id } => session::handle_stop(ctx, session_id, json).await,

        Commands::Memory(cmd) => match cmd {
            MemoryCommands::Store {
                key,
                value,
                namespace,
                tags,
                ttl,
            } => memory::handle_store(ctx, key, value, namespace, tags, ttl, json).await,
            MemoryCommands::Retrieve { key, namespace } => {
                memory::handle_retrieve(ctx, key, namespace, json).await
            }
            MemoryCommands::List {
                namespace,
                pattern,
                tags,
                limit,
            } => memory::handle_list(ctx, namespace, pattern, tags, limit, json).await,
            MemoryCommands::Delete { key, namespace } => {
                memory::handle_delete(ctx, key, namespace, json).await
            }
            MemoryCommands::Clear { namespace, force } => {
                memory::handle_clear(ctx, namespace, force, json).await
            }
            MemoryCommands::Export { path, namespace } => {
                memory::handle_export(ctx, &path, namespace, json).await
            }
            MemoryCommands::Import { path } => memory::handle_import(ctx, &path, json).await,
            MemoryCommands::Stats => memory::handle_stats(ctx, json).await,
        },

        Commands::Task(cmd) => match cmd {
            TaskCommands::List { status, limit } => {
                task::handle_list(ctx, status, limit, json).await
            }
            TaskCommands::Create {
                task_type,
                name,
                description,
                instructions,
                dependencies,
                priority,
            } => {
                task::handle_create(
                    ctx,
                    task_type,
                    name,
                    description,
                    instructions,
                    dependencies,
                    priority,
                    json,
                )
                .await
            }
            TaskCommands::Update {
                task_id,
                status,
                priority,
                add_dependency,
                remove_dependency,
            } => {
                task::handle_update(
                    ctx,
                    task_id,
                    status,
                    priority,
                    add_dependency,
                    remove_dependency,
                    json,
                )
                .await
            }
            TaskCommands::Show { task_id } => task::handle_show(ctx, task_id, json).await,
            TaskCommands::Delete { task_id } => task::handle_delete(ctx, task_id, json).await,
            TaskCommands::Stats => task::handle_stats(ctx, json).await,
            TaskCommands::Search { query } => task::handle_search(ctx, query, json).await,
        },
    }
}
