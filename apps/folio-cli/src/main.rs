//! # folio-cli
//!
//! Command-line front-end for the folio content engine.
//!
//! - `folio activity start/list/show/complete/abandon/clobber` — activity lifecycle
//! - `folio review status/approve/feedback/request` — peer review
//! - `folio page read/save/create/article/category/upload/delete/move` — content edits
//! - `folio init` — write the resolved settings to `folio.toml`
//!
//! Settings come from `folio.toml` (or `--config`), with command-line
//! flags taking precedence.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_activity::{ActivityError, Engine, EngineConfig, DEFAULT_CONFIG_FILE};
use folio_git::Identity;
use tracing_subscriber::EnvFilter;

/// folio: edit a Git-backed site through reviewed activities.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Config file (defaults to ./folio.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bare origin repository.
    #[arg(long)]
    origin: Option<PathBuf>,

    /// Directory holding per-user working copies.
    #[arg(long)]
    work_path: Option<PathBuf>,

    /// Branch activities fork from and publish to.
    #[arg(long)]
    default_branch: Option<String>,

    /// Skip review gating.
    #[arg(long)]
    single_user: bool,

    /// Email of the person making changes. Required for everything but `init`.
    #[arg(long)]
    email: Option<String>,

    /// Display name (defaults to the email's local part).
    #[arg(long)]
    name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start, inspect and finish activities.
    Activity {
        #[command(subcommand)]
        command: commands::activity::ActivityCommands,
    },
    /// Request, give and inspect peer review.
    Review {
        #[command(subcommand)]
        command: commands::review::ReviewCommands,
    },
    /// Read and change content on an activity.
    Page {
        #[command(subcommand)]
        command: commands::content::PageCommands,
    },
    /// Save the current settings to the config file.
    Init,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("folio_activity=info".parse()?)
                .add_directive("folio_workspace=info".parse()?)
                .add_directive("folio_git=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    if let Commands::Init = cli.command {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        config.save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let email = cli
        .email
        .as_deref()
        .context("--email is required to make or review changes")?;
    let identity = match &cli.name {
        Some(name) => Identity::new(name, email),
        None => Identity::from_email(email),
    };
    let mut engine = Engine::new(config, identity);

    let result = match &cli.command {
        Commands::Activity { command } => commands::activity::execute(command, &mut engine),
        Commands::Review { command } => commands::review::execute(command, &mut engine),
        Commands::Page { command } => commands::content::execute(command, &engine),
        Commands::Init => Ok(()),
    };

    if let Err(err) = &result {
        if let Some(ActivityError::MergeConflict(conflict)) = err.downcast_ref::<ActivityError>() {
            eprintln!("{}", conflict);
            match conflict.files() {
                Ok(files) => eprintln!("{}", files.summary()),
                Err(e) => tracing::warn!("could not list conflicting files: {}", e),
            }
        }
    }
    result
}

/// Config file first, then flags on top. Without a file, `--origin` and
/// `--work-path` are required.
fn resolve_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let file = match &cli.config {
        Some(path) if matches!(cli.command, Commands::Init) => EngineConfig::load_if_present(path)?,
        Some(path) => Some(EngineConfig::load(path)?),
        None => EngineConfig::load_if_present(&PathBuf::from(DEFAULT_CONFIG_FILE))?,
    };

    let mut config = match (file, &cli.origin, &cli.work_path) {
        (Some(config), _, _) => config,
        (None, Some(origin), Some(work_path)) => EngineConfig::for_origin(origin, work_path),
        (None, _, _) => {
            return Err(anyhow::anyhow!(
                "no {} found; pass --config, or both --origin and --work-path",
                DEFAULT_CONFIG_FILE
            ))
        }
    };

    if let Some(origin) = &cli.origin {
        config.origin_path = origin.clone();
    }
    if let Some(work_path) = &cli.work_path {
        config.work_path = work_path.clone();
    }
    if let Some(branch) = &cli.default_branch {
        config.default_branch = branch.clone();
    }
    config.single_user |= cli.single_user;

    config.origin_path = absolute(&config.origin_path)?;
    config.work_path = absolute(&config.work_path)?;
    Ok(config)
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    Ok(cwd.join(path))
}
