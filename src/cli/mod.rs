//! CLI interface: command definitions, handlers, and output formatting.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hivemind")]
#[command(about = "Hivemind - persistent multi-agent swarm coordination", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a swarm and its session
    Init {
        /// Swarm name
        #[arg(short, long, default_value = "hive")]
        name: String,

        /// Topology (hierarchical, mesh, star, centralized, distributed)
        #[arg(short, long, default_value = "hierarchical")]
        topology: String,

        /// Queen scheduling type (strategic, tactical, adaptive)
        #[arg(short, long, default_value = "strategic")]
        queen_type: String,

        /// Maximum worker agents
        #[arg(short = 'w', long, default_value = "8")]
        max_workers: u32,
    },

    /// Init a swarm, decompose the objective, and execute it
    Spawn {
        /// Objective description
        objective: String,

        /// Swarm name
        #[arg(long)]
        name: Option<String>,

        /// Queen scheduling type (strategic, tactical, adaptive)
        #[arg(long)]
        queen_type: Option<String>,

        /// Maximum worker agents
        #[arg(long)]
        max_workers: Option<u32>,
    },

    /// List active sessions with completion percentages
    Sessions,

    /// Rehydrate a session
    Resume {
        /// Session id (full or unique prefix)
        session_id: String,

        /// Emit a human-readable context prompt and exit
        #[arg(long)]
        claude: bool,
    },

    /// Print session detail
    Status {
        /// Session id (full or unique prefix)
        session_id: String,
    },

    /// Pause a session
    Pause {
        /// Session id (full or unique prefix)
        session_id: String,
    },

    /// Stop a session, terminating its child processes
    Stop {
        /// Session id (full or unique prefix)
        session_id: String,
    },

    /// Memory management commands
    #[command(subcommand)]
    Memory(MemoryCommands),

    /// Task management commands
    #[command(subcommand)]
    Task(TaskCommands),
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Store a value
    Store {
        /// Key
        key: String,
        /// Value (parsed as JSON, falling back to a string)
        value: String,
        /// Namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,
        /// Tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        /// TTL in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Retrieve a value by key
    Retrieve {
        key: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// List entries
    List {
        #[arg(short, long)]
        namespace: Option<String>,
        /// Glob pattern over keys (`*` wildcard)
        #[arg(short, long)]
        pattern: Option<String>,
        /// Tags (comma-separated, any-of)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Delete an entry
    Delete {
        key: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Remove every entry in a namespace
    Clear {
        #[arg(short, long, default_value = "default")]
        namespace: String,
        /// Skip the confirmation check
        #[arg(short, long)]
        force: bool,
    },

    /// Export a namespace to a JSON file
    Export {
        path: PathBuf,
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Import entries from a JSON file
    Import { path: PathBuf },

    /// Show store statistics
    Stats,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Create a task
    Create {
        /// Task type (coding, analysis, testing, generic, ...)
        #[arg(short = 't', long, default_value = "generic")]
        task_type: String,
        /// Task name
        name: String,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Instructions passed to the agent driver
        #[arg(short, long, default_value = "")]
        instructions: String,
        /// Dependencies (comma-separated task ids or prefixes)
        #[arg(short = 'D', long, value_delimiter = ',')]
        dependencies: Vec<String>,
        /// Priority (higher runs earlier among ready tasks)
        #[arg(short, long, default_value = "0")]
        priority: i32,
    },

    /// Update a task's status, priority, or dependencies
    Update {
        /// Task id (full or unique prefix)
        task_id: String,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        priority: Option<i32>,
        /// Add dependencies (comma-separated task ids or prefixes)
        #[arg(long, value_delimiter = ',')]
        add_dependency: Vec<String>,
        /// Remove dependencies (comma-separated task ids or prefixes)
        #[arg(long, value_delimiter = ',')]
        remove_dependency: Vec<String>,
    },

    /// Show a task
    Show {
        /// Task id (full or unique prefix)
        task_id: String,
    },

    /// Delete a task
    Delete {
        /// Task id (full or unique prefix)
        task_id: String,
    },

    /// Show task statistics
    Stats,

    /// Search tasks by name or description
    Search { query: String },
}
