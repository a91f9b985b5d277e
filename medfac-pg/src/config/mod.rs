//! Configuration du pipeline
//!
//! Les valeurs viennent, par ordre de priorité croissante : défauts, fichier JSON
//! (`--config`), variables d'environnement pour la base, options de la ligne de commande.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::Backoff;
use crate::store::pool::DatabaseConfig;
use crate::store::schema::{validate_identifier, DEFAULT_TABLE};

/// Flux GISCO de la Commission européenne
pub const DEFAULT_SOURCE: &str =
    "https://gisco-services.ec.europa.eu/pub/healthcare/geojson/all.geojson";

/// Comportement face à une feature invalide
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordPolicy {
    /// Annule tout le chargement (rollback)
    #[default]
    Abort,
    /// Ignore la feature et la consigne dans le rapport
    Skip,
}

impl std::str::FromStr for RecordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(RecordPolicy::Abort),
            "skip" => Ok(RecordPolicy::Skip),
            _ => Err(format!("Invalid record policy: {}. Use: abort, skip", s)),
        }
    }
}

/// Emplacement du flux : URL HTTP(S) ou fichier local
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Url(String),
    File(PathBuf),
}

impl SourceDescriptor {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            SourceDescriptor::Url(location.to_string())
        } else {
            SourceDescriptor::File(PathBuf::from(location.strip_prefix("file://").unwrap_or(location)))
        }
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceDescriptor::Url(url) => write!(f, "{}", url),
            SourceDescriptor::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Section `source`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL ou chemin du flux
    pub location: String,
    /// Délai max de téléchargement (secondes)
    pub fetch_timeout_secs: u64,
    /// Nombre de tentatives de téléchargement
    pub max_attempts: u32,
    /// Premier délai entre deux tentatives (millisecondes)
    pub initial_backoff_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: DEFAULT_SOURCE.to_string(),
            fetch_timeout_secs: 120,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl SourceConfig {
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor::parse(&self.location)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_secs(30),
            2.0,
        )
    }
}

/// Section `load`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Table cible (`table` ou `schema.table`)
    pub table: String,
    /// Politique pour les features invalides
    pub on_invalid: RecordPolicy,
    /// Délai max du bulk load (secondes)
    pub timeout_secs: u64,
    /// Supprimer la table avant de la recréer
    pub drop_existing: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            on_invalid: RecordPolicy::Abort,
            timeout_secs: 600,
            drop_existing: true,
        }
    }
}

impl LoadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Section `server`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Adresse d'écoute HTTP
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

/// Configuration complète, passée explicitement aux composants
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub load: LoadConfig,
    pub server: ServerConfig,
    /// Lue depuis l'environnement, jamais depuis le fichier
    #[serde(skip)]
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Charge une configuration depuis un fichier JSON
    ///
    /// Les sections et champs absents prennent leur valeur par défaut.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse config JSON")
    }

    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.load.table)?;
        if self.source.location.trim().is_empty() {
            anyhow::bail!("Source location is empty");
        }
        if self.source.fetch_timeout_secs == 0 || self.load.timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than zero");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("Pool size must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.source.location, DEFAULT_SOURCE);
        assert_eq!(config.load.table, "medical_facilities");
        assert_eq!(config.load.on_invalid, RecordPolicy::Abort);
        assert!(config.load.drop_existing);
        assert_eq!(config.server.listen.port(), 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_record_policy_parsing() {
        assert_eq!("abort".parse::<RecordPolicy>(), Ok(RecordPolicy::Abort));
        assert_eq!("SKIP".parse::<RecordPolicy>(), Ok(RecordPolicy::Skip));
        assert!("ignore".parse::<RecordPolicy>().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "source": { "location": "data/all.geojson", "max_attempts": 5 },
                "load": { "on_invalid": "skip" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.source.location, "data/all.geojson");
        assert_eq!(config.source.max_attempts, 5);
        assert_eq!(config.source.fetch_timeout_secs, 120);
        assert_eq!(config.load.on_invalid, RecordPolicy::Skip);
        assert_eq!(config.load.table, "medical_facilities");
        assert_eq!(config.server.listen.port(), 5000);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(AppConfig::from_json(r#"{ "load": { "on_invalid": "maybe" } }"#).is_err());
        assert!(AppConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_table() {
        let mut config = AppConfig::default();
        config.load.table = "facilities; DROP TABLE x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_descriptor() {
        assert_eq!(
            SourceDescriptor::parse("https://example.org/all.geojson"),
            SourceDescriptor::Url("https://example.org/all.geojson".to_string())
        );
        assert_eq!(
            SourceDescriptor::parse("file:///tmp/all.geojson"),
            SourceDescriptor::File(PathBuf::from("/tmp/all.geojson"))
        );
        assert_eq!(
            SourceDescriptor::parse("data/all.geojson"),
            SourceDescriptor::File(PathBuf::from("data/all.geojson"))
        );
    }
}
