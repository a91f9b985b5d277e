//! Erreurs du pipeline d'ingestion et de lecture

use std::time::Duration;

use medfac::FeedError;
use thiserror::Error;

use crate::report::LoadReport;

/// Erreurs du pipeline (source, stockage, assemblage)
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Flux injoignable (réseau, statut HTTP, fichier absent)
    #[error("Source unavailable ({location}): {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// Erreur de flux ou de transcodage
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Chargement annulé : la transaction a été rollback, aucune ligne visible
    #[error("Load into {} rolled back: {cause}", .report.table)]
    LoadAborted {
        report: Box<LoadReport>,
        #[source]
        cause: FeedError,
    },

    /// Géométrie stockée illisible
    #[error("Row {row_id}: {source}")]
    RowDecode {
        row_id: i64,
        #[source]
        source: FeedError,
    },

    /// Erreur PostgreSQL (connexion, requête, transaction)
    #[error("Storage error: {}", describe_storage_error(.0))]
    Storage(#[from] tokio_postgres::Error),

    /// Impossible d'obtenir une connexion du pool
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Délai dépassé
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Configuration invalide
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Tâche interne interrompue
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn source_unavailable(location: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Erreur de flux sous-jacente, y compris celle qui a provoqué un rollback
    pub fn feed_error(&self) -> Option<&FeedError> {
        match self {
            Self::Feed(e) | Self::LoadAborted { cause: e, .. } | Self::RowDecode { source: e, .. } => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Message, code SQLSTATE et détail du serveur quand l'erreur vient de PostgreSQL
pub fn describe_storage_error(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => {
            let mut text = format!("{} [{}]", db.message(), db.code().code());
            if let Some(detail) = db.detail() {
                text.push_str(": ");
                text.push_str(detail);
            }
            text
        }
        None => e.to_string(),
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}
