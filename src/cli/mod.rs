//! CLI argument definitions for taskloom.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// taskloom - A task-manifest engine for code-generation agents.
///
/// Start with `tl init`, feed planned tasks through `tl ingest`, then use
/// `tl ready` and `tl context <id>` to hand work to an agent.
#[derive(Parser, Debug)]
#[command(name = "tl")]
#[command(author, version = crate::commands::VERSION, long_about = None)]
#[command(about = "Task-manifest engine for code-generation agents")]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if tl was started in <path> instead of the current directory.
    /// The path must exist. Can also be set via TL_ROOT environment variable.
    #[arg(short = 'C', long = "root", global = true, env = "TL_ROOT")]
    pub root: Option<PathBuf>,

    /// Manifest file (overrides TL_MANIFEST and config.kdl)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Research cache directory (overrides TL_CACHE_DIR and config.kdl)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Research cache TTL in minutes (overrides TL_CACHE_TTL and config.kdl)
    #[arg(long, global = true)]
    pub cache_ttl: Option<u64>,

    /// Log debug events to stderr (TL_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty manifest (no-op if one exists)
    Init {
        /// Project name
        #[arg(short, long)]
        name: String,

        /// Project description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Task inspection and lifecycle commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Show pending tasks whose dependencies are all completed
    Ready,

    /// Show tasks waiting on dependencies or explicitly blocked
    Blocked,

    /// Render bounded context for one task
    Context {
        /// Task ID (e.g., TASK-001)
        id: String,

        /// Single paragraph instead of the full markdown context
        #[arg(long)]
        compact: bool,
    },

    /// Lightweight task listing for planners
    Summary {
        /// Only list pending and in-progress tasks
        #[arg(long)]
        incomplete: bool,
    },

    /// Validate and merge a batch of proposed tasks
    ///
    /// The batch is a JSON object `{"source": "...", "tasks": [...]}` or a
    /// bare array of tasks. Dependencies are zero-based batch indices or
    /// existing task ids. Preview is the default; nothing is written
    /// without --commit.
    Ingest {
        /// Batch file, or `-` for stdin
        file: String,

        /// Show the planned ids without writing (default)
        #[arg(long, conflicts_with = "commit")]
        preview: bool,

        /// Write the batch to the manifest
        #[arg(long)]
        commit: bool,

        /// Source identifier recorded in the transaction
        #[arg(long)]
        source: Option<String>,

        /// Treat warnings as validation errors
        #[arg(long)]
        strict: bool,
    },

    /// Transaction history and rollback
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Research cache commands
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Check manifest integrity without modifying it
    Doctor,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Show the full task record
    Show {
        /// Task ID
        id: String,
    },

    /// Mark a task in progress
    Start {
        /// Task ID
        id: String,

        /// Start even if dependencies are not completed
        #[arg(long)]
        force: bool,
    },

    /// Mark a task completed and record its validation
    Complete {
        /// Task ID
        id: String,

        /// Tests pass for this task
        #[arg(long)]
        tests_pass: bool,

        /// Acceptance criteria were verified
        #[arg(long)]
        ac_verified: bool,

        /// Commit SHA produced for this task (repeatable)
        #[arg(long = "commit", value_name = "SHA")]
        commits: Vec<String>,
    },

    /// Mark a task blocked
    Block {
        /// Task ID
        id: String,
    },
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List recent transactions, newest first
    List {
        /// Maximum number of transactions
        #[arg(short = 'n', long, default_value_t = crate::history::DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Show one transaction and the current state of its tasks
    Show {
        /// Transaction ID (e.g., TX-20260101-001)
        id: String,
    },

    /// Remove the tasks a transaction added
    Rollback {
        /// Transaction ID
        id: String,

        /// Show what would be removed without writing
        #[arg(long)]
        dry_run: bool,

        /// Roll back even if other tasks depend on the removed ones
        #[arg(long)]
        force: bool,
    },
}

/// Research cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Store a result for a query
    Set {
        query: String,
        result: String,

        /// Tag for later search (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Entry lifetime in minutes (defaults to the configured TTL)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Print the cached result for a query
    Get { query: String },

    /// Check whether a fresh entry exists
    Has { query: String },

    /// List fresh entries carrying every given tag
    Search {
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Delete cache entries
    Clear {
        /// Only delete expired entries
        #[arg(long)]
        expired: bool,
    },

    /// Show cache size and counters
    Stats,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved settings and where each came from
    Show,
}
