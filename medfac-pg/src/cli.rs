//! Définition et implémentation des commandes CLI
//!
//! - `ingest` : flux → PostGIS, puis sortie
//! - `serve` : lecture seule, `GET /all-facilities`
//! - `run` (défaut) : provisioning, serveur, puis ingestion

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use medfac::FeedError;
use tracing::{error, info};

use medfac_pg::server::{self, AppState};
use medfac_pg::store::schema;
use medfac_pg::{pipeline, AppConfig, DatabaseConfig, LoadReport, PipelineError, RecordPolicy};

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the table and load the feed, then exit
    Ingest(PipelineArgs),

    /// Serve GET /all-facilities from an already loaded table
    Serve(PipelineArgs),

    /// Provision, start the HTTP server, then load the feed (default)
    Run(PipelineArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Feed URL (http/https) or local GeoJSON file [default: GISCO healthcare feed]
    #[arg(long)]
    pub source: Option<String>,

    /// Target table, optionally schema-qualified [default: medical_facilities]
    #[arg(long)]
    pub table: Option<String>,

    /// What to do with an invalid feature: abort (rollback everything) or skip
    #[arg(long, value_name = "POLICY")]
    pub on_invalid: Option<RecordPolicy>,

    /// Feed download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub fetch_timeout: Option<u64>,

    /// Bulk load timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub load_timeout: Option<u64>,

    /// HTTP listen address [default: 0.0.0.0:5000]
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keep the existing table instead of dropping it before the load
    #[arg(long)]
    pub keep_existing: bool,

    /// Write the load report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host [default: env PGHOST, then localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name [default: env PGDATABASE, then medfac]
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user [default: env PGUSER, then postgres]
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password [default: env PGPASSWORD]
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port [default: env PGPORT, then 5432]
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require [default: env PGSSLMODE, then disable]
    #[arg(long)]
    pub ssl: Option<String>,

    /// Connection pool size [default: env POOL_SIZE, then 8]
    #[arg(long)]
    pub pool_size: Option<usize>,
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: DatabaseArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.dbname = database;
    }
    if let Some(user) = args.user {
        config.user = user;
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = args.ssl {
        config.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }
    Ok(())
}

/// Fusionne fichier de configuration, environnement et options
fn resolve_config(args: PipelineArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    config.database = DatabaseConfig::from_env();
    apply_database_overrides(&mut config.database, args.database)?;

    if let Some(source) = args.source {
        config.source.location = source;
    }
    if let Some(table) = args.table {
        config.load.table = table;
    }
    if let Some(policy) = args.on_invalid {
        config.load.on_invalid = policy;
    }
    if let Some(secs) = args.fetch_timeout {
        config.source.fetch_timeout_secs = secs;
    }
    if let Some(secs) = args.load_timeout {
        config.load.timeout_secs = secs;
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if args.keep_existing {
        config.load.drop_existing = false;
    }

    config.validate()?;
    Ok(config)
}

/// Affiche et sauvegarde le rapport, quelle que soit l'issue du chargement
fn finish_ingest(
    result: Result<LoadReport, PipelineError>,
    report_path: Option<&Path>,
) -> Result<LoadReport> {
    let report = match &result {
        Ok(report) => Some(report),
        Err(PipelineError::LoadAborted { report, .. }) => Some(&**report),
        Err(_) => None,
    };

    if let Some(report) = report {
        report.display();
        if let Some(path) = report_path {
            report
                .save_to_file(path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Load report saved");
        }
    }

    result.map_err(|e| {
        if let Some(index) = e.feed_error().and_then(FeedError::feature_index) {
            error!(feature = index, "Offending feature");
        }
        error!(error = %e, "Ingestion failed");
        anyhow::Error::new(e).context("Ingestion failed")
    })
}

/// Exécute la commande ingest
pub async fn cmd_ingest(args: PipelineArgs) -> Result<()> {
    let report_path = args.report.clone();
    let config = resolve_config(args)?;

    info!(
        source = %config.source.location,
        table = %config.load.table,
        policy = ?config.load.on_invalid,
        "Starting ingestion"
    );

    let pool = medfac_pg::connect(&config.database).await?;
    let result = pipeline::ingest(&pool, &config).await;
    finish_ingest(result, report_path.as_deref())?;
    Ok(())
}

/// Exécute la commande serve
pub async fn cmd_serve(args: PipelineArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let pool = medfac_pg::connect(&config.database).await?;

    let state = Arc::new(AppState::new(pool, config.load.table.clone()));
    server::serve(config.server.listen, state, server::shutdown_signal()).await
}

/// Exécute la commande run : le serveur répond pendant l'ingestion
pub async fn cmd_run(args: PipelineArgs) -> Result<()> {
    let report_path = args.report.clone();
    let config = resolve_config(args)?;
    let pool = medfac_pg::connect(&config.database).await?;

    // La table existe avant le démarrage du serveur ; l'ingestion ne remplace
    // la version servie qu'après lecture et transcodage complets du flux.
    schema::provision(&pool, &config.load.table, false).await?;

    let state = Arc::new(AppState::new(pool.clone(), config.load.table.clone()));
    let mut server = tokio::spawn(server::serve(
        config.server.listen,
        state,
        server::shutdown_signal(),
    ));

    tokio::select! {
        joined = &mut server => {
            joined??;
            anyhow::bail!("HTTP server stopped before ingestion completed");
        }
        result = pipeline::ingest(&pool, &config) => {
            let report = finish_ingest(result, report_path.as_deref())?;
            info!("{}", report.summary());
        }
    }

    server.await?
}
