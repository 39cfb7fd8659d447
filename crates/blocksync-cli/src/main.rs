//! blocksync CLI
//!
//! Command-line interface for syncing markdown files into remote pages.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blocksync_core::{Config, SyncError};

mod commands;
mod credential;
mod editor;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "blocksync")]
#[command(about = "blocksync - Sync markdown files into block-structured remote pages")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print request timings after remote calls
    #[arg(long, global = true)]
    debug: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pages in the configured database
    #[command(alias = "ls")]
    List,
    /// Print a page as markdown
    Pull {
        /// Page ID
        page_id: String,
    },
    /// Sync a markdown file into a page
    Push {
        /// Page ID
        page_id: String,
        /// Markdown file to sync
        file: PathBuf,
    },
    /// Edit a page in $EDITOR and sync the result
    Edit {
        /// Page ID
        page_id: String,
    },
    /// Create a page in the configured database
    #[command(alias = "new")]
    Create {
        /// Page title
        title: String,
        /// Markdown file with the initial content
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Rename a page
    Rename {
        /// Page ID
        page_id: String,
        /// New title
        title: String,
    },
    /// Archive a page
    #[command(alias = "rm")]
    Archive {
        /// Page ID
        page_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (database_id, api_base_url, token_env, ...)
        key: String,
        /// Configuration value ("none" clears optional keys)
        value: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.error(&e, recovery_hint(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_ref();

    // Config commands work without a valid remote setup
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, output)
            }
        };
    }

    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    config.debug |= cli.debug;
    init_logging(&config);

    match cli.command {
        Commands::List => commands::list::list(&config, output),
        Commands::Pull { page_id } => commands::pull::pull(&config, &page_id, output),
        Commands::Push { page_id, file } => commands::push::push(&config, &page_id, &file, output),
        Commands::Edit { page_id } => commands::edit::edit(&config, &page_id, output),
        Commands::Create { title, file } => {
            commands::create::create(&config, &title, file.as_deref(), output)
        }
        Commands::Rename { page_id, title } => {
            commands::rename::rename(&config, &page_id, &title, output)
        }
        Commands::Archive { page_id, yes } => {
            commands::archive::archive(&config, &page_id, yes, output)
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Recovery hint for errors raised by the core library
fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SyncError>())
        .and_then(SyncError::recovery_suggestion)
}

/// Initialize logging
///
/// Only initializes if BLOCKSYNC_LOG environment variable is set.
/// Logs to file (config.log_file or default {data_dir}/debug.log).
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("BLOCKSYNC_LOG") else {
        return;
    };

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "blocksync_core={},blocksync_cli={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
