//! taskloom CLI - A task-manifest engine for code-generation agents.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process;
use taskloom::cli::{CacheCommands, Cli, Commands, ConfigCommands, HistoryCommands, TaskCommands};
use taskloom::commands::{self, Output};
use taskloom::config::{ConfigOverrides, ResolvedConfig, resolve_config};

/// Environment variable holding the log filter (e.g. `TL_LOG=taskloom=debug`).
const LOG_ENV: &str = "TL_LOG";

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_logging(cli.verbose);

    let result = resolve(&cli).and_then(|config| run_command(cli.command, &config, human));

    if let Err(e) = result {
        report_error(&e, human);
        process::exit(e.exit_code());
    }
}

/// Install the stderr subscriber. `TL_LOG` wins over `-v`.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}

/// Project root: --root flag > TL_ROOT env > current directory.
fn resolve(cli: &Cli) -> Result<ResolvedConfig, taskloom::Error> {
    let root = match &cli.root {
        Some(path) => {
            commands::validate_root(path)?;
            path.clone()
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    let overrides = ConfigOverrides {
        manifest_path: cli.manifest.clone(),
        cache_dir: cli.cache_dir.clone(),
        cache_ttl: cli.cache_ttl,
    };
    resolve_config(&root, &overrides)
}

fn report_error(e: &taskloom::Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
        if let Some(hint) = e.hint() {
            eprintln!("Hint: {}", hint);
        }
    } else {
        let err = serde_json::json!({
            "error": e.to_string(),
            "kind": e.kind(),
            "hint": e.hint(),
        });
        eprintln!("{}", err);
    }
}

fn run_command(
    command: Commands,
    config: &ResolvedConfig,
    human: bool,
) -> Result<(), taskloom::Error> {
    match command {
        Commands::Init { name, description } => {
            output(&commands::init(config, &name, &description)?, human)
        }

        Commands::Task { command } => match command {
            TaskCommands::Show { id } => output(&commands::task_show(config, &id)?, human),
            TaskCommands::Start { id, force } => {
                output(&commands::task_start(config, &id, force)?, human)
            }
            TaskCommands::Complete {
                id,
                tests_pass,
                ac_verified,
                commits,
            } => output(
                &commands::task_complete(config, &id, tests_pass, ac_verified, commits)?,
                human,
            ),
            TaskCommands::Block { id } => output(&commands::task_block(config, &id)?, human),
        },

        Commands::Ready => output(&commands::ready(config)?, human),
        Commands::Blocked => output(&commands::blocked(config)?, human),

        Commands::Context { id, compact } => {
            output(&commands::context(config, &id, compact)?, human)
        }

        Commands::Summary { incomplete } => output(&commands::summary(config, incomplete)?, human),

        Commands::Ingest {
            file,
            preview: _,
            commit,
            source,
            strict,
        } => output(
            &commands::ingest(config, &file, commit, source, strict)?,
            human,
        ),

        Commands::History { command } => match command {
            HistoryCommands::List { limit } => {
                output(&commands::history_list(config, limit)?, human)
            }
            HistoryCommands::Show { id } => output(&commands::history_show(config, &id)?, human),
            HistoryCommands::Rollback { id, dry_run, force } => {
                if dry_run {
                    output(&commands::history_rollback_preview(config, &id)?, human)
                } else {
                    output(&commands::history_rollback(config, &id, force)?, human)
                }
            }
        },

        Commands::Cache { command } => match command {
            CacheCommands::Set {
                query,
                result,
                tags,
                ttl,
            } => output(
                &commands::cache_set(config, &query, &result, &tags, ttl)?,
                human,
            ),
            CacheCommands::Get { query } => output(&commands::cache_get(config, &query)?, human),
            CacheCommands::Has { query } => output(&commands::cache_has(config, &query)?, human),
            CacheCommands::Search { tags } => {
                output(&commands::cache_search(config, tags)?, human)
            }
            CacheCommands::Clear { expired } => {
                output(&commands::cache_clear(config, expired)?, human)
            }
            CacheCommands::Stats => output(&commands::cache_stats(config)?, human),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(config), human),
        },

        Commands::Doctor => output(&commands::doctor(config)?, human),
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
