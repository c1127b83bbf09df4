use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage::{self, FileStore};

pub mod commands;

use self::commands::{NewArgs, NormalizeArgs, ShowArgs};

#[derive(Parser, Debug)]
#[command(
    name = "outlinetui",
    version,
    about = "Keyboard-first terminal outliner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over OUTLINETUI_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over OUTLINETUI_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Create a new outline file
    New(NewArgs),
    /// List outline files, most recently updated first
    List,
    /// Print a file's outline in normalized form
    Show(ShowArgs),
    /// Normalize outline text read from stdin
    Normalize(NormalizeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let command = cli.command.unwrap_or(Commands::Tui);
    if let Commands::Normalize(args) = &command {
        return commands::normalize_stdin(args);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let config = loader.load_or_init()?;
    let handle = storage::init(&paths, &config.storage).context("opening outline store")?;
    let store: Arc<dyn FileStore> = Arc::new(handle);

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config.clone(), store.clone(), &paths)?;
            commands::run_tui(&mut app)
        }
        Commands::New(args) => commands::new_file(store.as_ref(), args),
        Commands::List => commands::list_files(store.as_ref()),
        Commands::Show(args) => commands::show_file(&config, store.as_ref(), args),
        Commands::Normalize(_) => Ok(()),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
