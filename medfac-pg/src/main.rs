//! Point d'entrée CLI pour medfac-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{Commands, PipelineArgs};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Charger le flux des établissements de santé dans PostGIS et le servir en GeoJSON
#[derive(Parser)]
#[command(name = "medfac-pg")]
#[command(author, version)]
#[command(about = "Load the medical facility feed into PostGIS and serve it as GeoJSON")]
#[command(long_about = "Fetches the GISCO healthcare GeoJSON feed, loads it into PostGIS in a single transaction and serves it on GET /all-facilities.\n\nWithout a subcommand, runs 'run': provision, serve and ingest.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: run)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de la commande par défaut
    #[command(flatten)]
    run: Option<PipelineArgs>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Ingest(args)) => {
            info!("Ingesting feed");
            cli::cmd_ingest(args).await?;
        }
        Some(Commands::Serve(args)) => {
            cli::cmd_serve(args).await?;
        }
        Some(Commands::Run(args)) => {
            cli::cmd_run(args).await?;
        }
        None => {
            cli::cmd_run(cli.run.unwrap_or_default()).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
