mod context;
mod report;
mod rollback;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use modmig_config::ConfigLoader;
use modmig_migrator::{ModuleLocator, RollbackScope};
use tracing_subscriber::EnvFilter;

use crate::context::AppContext;

#[derive(Parser)]
#[command(
    name = "modmig",
    version,
    about = "modmig - roll back per-module migration batches"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory containing config.yml or config.toml
    #[arg(long, global = true, env = "MODMIG_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll back the latest migration batch of one module, or of every module
    Rollback {
        /// Module slug; all registered modules when omitted
        module: Option<String>,

        /// Database connection to use
        #[arg(long)]
        database: Option<String>,

        /// Skip the confirmation prompt in production
        #[arg(long)]
        force: bool,

        /// Print the statements that would run without running them
        #[arg(long)]
        pretend: bool,
    },

    /// Show applied, pending and orphaned migrations
    Status {
        /// Module slug; all registered modules when omitted
        module: Option<String>,

        /// Database connection to use
        #[arg(long)]
        database: Option<String>,
    },

    /// List registered modules
    Modules,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = match cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new()?,
    };
    let config = config_loader.load()?;

    let log_level = cli
        .log_level
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();
    tracing::debug!("config directory: {}", config_loader.config_dir().display());

    config_loader.ensure_dirs(&config)?;
    let ctx = AppContext::new(config_loader, config);

    match cli.command {
        Commands::Rollback {
            module,
            database,
            force,
            pretend,
        } => {
            rollback::run(
                &ctx,
                rollback::RollbackArgs {
                    module,
                    database,
                    force,
                    pretend,
                },
            )
            .await?;
        }
        Commands::Status { module, database } => {
            match ctx.orchestrator(database.as_deref(), false)? {
                Some(orchestrator) => {
                    let statuses = orchestrator.status(&RollbackScope::from(module))?;
                    report::print_lines(&report::render_status(&statuses));
                }
                None => println!("No migrations have been recorded yet."),
            }
        }
        Commands::Modules => {
            println!("Registered modules:");
            let modules = ctx.module_locator().list_modules()?;
            report::print_lines(&report::render_modules(&modules));
        }
    }

    Ok(())
}
