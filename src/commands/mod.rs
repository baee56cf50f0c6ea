//! Command-line front-end
//!
//! Each subcommand lives in its own module; this one holds the clap
//! definitions and the dispatch.

use crate::settings::{Settings, SettingsStore};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod run;
pub mod server;

/// Rename images from descriptions produced by a local vision model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check that the inference server answers
    Health(ServerArgs),
    /// List models available on the server
    Models(ServerArgs),
    /// Analyse images and rename them (or only propose names)
    Run(RunArgs),
    /// Show or change persisted settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Clone)]
pub struct ServerArgs {
    /// Server address: host, host:port or URL
    #[arg(short, long)]
    pub server: Option<String>,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Image files or folders (folders are read one level deep).
    /// Defaults to the folder granted with `config authorize`.
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Vision model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Language of the generated names
    #[arg(short, long)]
    pub language: Option<String>,

    /// Replace the base prompt
    #[arg(long)]
    pub prompt: Option<String>,

    /// Files per batch window
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Only propose names, do not rename
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run: rename each batch's proposals after printing it
    #[arg(long, requires = "dry_run")]
    pub apply: bool,

    /// Remember server, model and language for next time
    #[arg(long)]
    pub save: bool,
}

/// Settings subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current settings
    Show,
    /// Change settings
    Set {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        auto_rename: Option<bool>,
    },
    /// Grant access to a folder and remember it
    Authorize {
        folder: PathBuf,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let store = match &self.settings {
            Some(path) => SettingsStore::at(path),
            None => SettingsStore::new()?,
        };

        match self.command {
            Commands::Health(args) => server::health(&load_settings(&store)?, &args).await,
            Commands::Models(args) => server::models(&load_settings(&store)?, &args).await,
            Commands::Run(args) => run::execute(&store, load_settings(&store)?, args).await,
            Commands::Config(cmd) => config::execute(&store, cmd),
        }
    }
}

/// Stored settings with the environment override applied
fn load_settings(store: &SettingsStore) -> Result<Settings> {
    let mut settings = store.load()?;
    settings.apply_env();
    Ok(settings)
}
