//! CLI argument parsing tests.

use clap::Parser;
use hivemind::cli::{Cli, Commands, MemoryCommands, TaskCommands};

#[test]
fn test_init_defaults() {
    let cli = Cli::parse_from(["hivemind", "init"]);
    match cli.command {
        Commands::Init {
            name,
            topology,
            queen_type,
            max_workers,
        } => {
            assert_eq!(name, "hive");
            assert_eq!(topology, "hierarchical");
            assert_eq!(queen_type, "strategic");
            assert_eq!(max_workers, 8);
        }
        _ => panic!("expected init"),
    }
    assert!(!cli.json);
}

#[test]
fn test_spawn_with_options() {
    let cli = Cli::parse_from([
        "hivemind",
        "spawn",
        "Build the auth service",
        "--name",
        "auth-swarm",
        "--queen-type",
        "tactical",
        "--max-workers",
        "4",
    ]);
    match cli.command {
        Commands::Spawn {
            objective,
            name,
            queen_type,
            max_workers,
        } => {
            assert_eq!(objective, "Build the auth service");
            assert_eq!(name.as_deref(), Some("auth-swarm"));
            assert_eq!(queen_type.as_deref(), Some("tactical"));
            assert_eq!(max_workers, Some(4));
        }
        _ => panic!("expected spawn"),
    }
}

#[test]
fn test_resume_with_claude_flag() {
    let cli = Cli::parse_from(["hivemind", "resume", "session-abc", "--claude"]);
    match cli.command {
        Commands::Resume { session_id, claude } => {
            assert_eq!(session_id, "session-abc");
            assert!(claude);
        }
        _ => panic!("expected resume"),
    }
}

#[test]
fn test_global_json_flag() {
    let cli = Cli::parse_from(["hivemind", "--json", "sessions"]);
    assert!(cli.json);
    assert!(matches!(cli.command, Commands::Sessions));

    // Also valid after the subcommand.
    let cli = Cli::parse_from(["hivemind", "sessions", "--json"]);
    assert!(cli.json);
}

#[test]
fn test_memory_store_with_tags_and_ttl() {
    let cli = Cli::parse_from([
        "hivemind",
        "memory",
        "store",
        "api/user",
        "{\"id\":1}",
        "--namespace",
        "services",
        "--tags",
        "api,v2",
        "--ttl",
        "300",
    ]);
    match cli.command {
        Commands::Memory(MemoryCommands::Store {
            key,
            value,
            namespace,
            tags,
            ttl,
        }) => {
            assert_eq!(key, "api/user");
            assert_eq!(value, "{\"id\":1}");
            assert_eq!(namespace, "services");
            assert_eq!(tags, vec!["api", "v2"]);
            assert_eq!(ttl, Some(300));
        }
        _ => panic!("expected memory store"),
    }
}

#[test]
fn test_memory_list_pattern() {
    let cli = Cli::parse_from([
        "hivemind", "memory", "list", "--pattern", "api/*", "--limit", "10",
    ]);
    match cli.command {
        Commands::Memory(MemoryCommands::List {
            pattern, limit, ..
        }) => {
            assert_eq!(pattern.as_deref(), Some("api/*"));
            assert_eq!(limit, 10);
        }
        _ => panic!("expected memory list"),
    }
}

#[test]
fn test_memory_clear_requires_namespace_default() {
    let cli = Cli::parse_from(["hivemind", "memory", "clear", "--force"]);
    match cli.command {
        Commands::Memory(MemoryCommands::Clear { namespace, force }) => {
            assert_eq!(namespace, "default");
            assert!(force);
        }
        _ => panic!("expected memory clear"),
    }
}

#[test]
fn test_task_create_with_dependencies() {
    let cli = Cli::parse_from([
        "hivemind",
        "task",
        "create",
        "wire the login flow",
        "--task-type",
        "coding",
        "--dependencies",
        "abc123,def456",
        "--priority",
        "5",
    ]);
    match cli.command {
        Commands::Task(TaskCommands::Create {
            task_type,
            name,
            dependencies,
            priority,
            ..
        }) => {
            assert_eq!(task_type, "coding");
            assert_eq!(name, "wire the login flow");
            assert_eq!(dependencies, vec!["abc123", "def456"]);
            assert_eq!(priority, 5);
        }
        _ => panic!("expected task create"),
    }
}

#[test]
fn test_task_update_dependency_edits() {
    let cli = Cli::parse_from([
        "hivemind",
        "task",
        "update",
        "abc123",
        "--add-dependency",
        "d1",
        "--remove-dependency",
        "d2",
    ]);
    match cli.command {
        Commands::Task(TaskCommands::Update {
            task_id,
            add_dependency,
            remove_dependency,
            ..
        }) => {
            assert_eq!(task_id, "abc123");
            assert_eq!(add_dependency, vec!["d1"]);
            assert_eq!(remove_dependency, vec!["d2"]);
        }
        _ => panic!("expected task update"),
    }
}

#[test]
fn test_missing_subcommand_fails() {
    assert!(Cli::try_parse_from(["hivemind"]).is_err());
    assert!(Cli::try_parse_from(["hivemind", "resume"]).is_err());
}
