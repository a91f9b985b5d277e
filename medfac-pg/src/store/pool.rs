//! Pool de connexions PostgreSQL

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::info;

use crate::retry::{retry, Backoff};

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Pas de SSL (défaut)
    #[default]
    Disable,
    /// SSL préféré mais non requis
    Prefer,
    /// SSL requis
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

/// Configuration de la base de données
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
    /// Délai max pour établir une connexion
    pub connect_timeout: Duration,
    /// Nombre de tentatives pour la première connexion
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "medfac".into(),
            user: "postgres".into(),
            password: None,
            pool_size: 8,
            ssl_mode: SslMode::Disable,
            connect_timeout: Duration::from_secs(10),
            connect_attempts: 3,
        }
    }
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("PGHOST").unwrap_or(defaults.host),
            port: std::env::var("PGPORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("PGDATABASE").unwrap_or(defaults.dbname),
            user: std::env::var("PGUSER").unwrap_or(defaults.user),
            password: std::env::var("PGPASSWORD").ok(),
            pool_size: std::env::var("POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            ssl_mode: std::env::var("PGSSLMODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            connect_timeout: std::env::var("PGCONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            connect_attempts: defaults.connect_attempts,
        }
    }

    /// Description sans mot de passe, pour les logs
    pub fn describe(&self) -> String {
        format!(
            "{}@{}:{}/{} (SSL: {:?})",
            self.user, self.host, self.port, self.dbname, self.ssl_mode
        )
    }
}

/// Crée la configuration TLS pour rustls
fn make_tls_connector() -> MakeRustlsConnect {
    let root_store = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

/// Crée un pool de connexions
///
/// Aucune connexion n'est ouverte ici : elles le sont à la demande par `pool.get()`.
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();
    cfg.connect_timeout = Some(config.connect_timeout);

    cfg.pool = Some(PoolConfig {
        max_size: config.pool_size,
        timeouts: Timeouts {
            wait: Some(Duration::from_secs(30)),
            create: Some(config.connect_timeout),
            recycle: Some(Duration::from_secs(30)),
        },
        ..Default::default()
    });

    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create database pool"),
        SslMode::Prefer | SslMode::Require => cfg
            .create_pool(Some(Runtime::Tokio1), make_tls_connector())
            .context("Failed to create database pool with TLS"),
    }
}

/// Teste la connexion à la base
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(())
}

/// Crée le pool et attend que la base réponde, avec nouvelles tentatives
pub async fn connect(config: &DatabaseConfig) -> Result<Pool> {
    let pool = create_pool(config)?;

    retry(
        "database connection",
        config.connect_attempts,
        Backoff::default(),
        || test_connection(&pool),
    )
    .await
    .with_context(|| format!("Database unreachable: {}", config.describe()))?;

    info!(database = %config.describe(), "Connected to PostgreSQL");
    Ok(pool)
}
