//! Transaction atomique de chargement
//!
//! Garantit le tout-ou-rien : soit toutes les lignes acceptées sont commitées,
//! soit rien n'est visible.

use std::time::Instant;

use deadpool_postgres::{Object, Transaction};
use tracing::{error, info};

use crate::report::LoadReport;
use crate::PipelineError;

/// Gestionnaire de transaction pour un chargement de table
///
/// Encapsule une transaction PostgreSQL et le rapport en cours de construction.
/// Une transaction abandonnée sans `commit` est rollback au drop.
pub struct LoadTransaction<'a> {
    transaction: Transaction<'a>,
    report: LoadReport,
    started_at: Instant,
}

impl<'a> LoadTransaction<'a> {
    /// Démarre une nouvelle transaction de chargement
    ///
    /// # Errors
    /// Retourne une erreur si la transaction ne peut pas être démarrée
    pub async fn begin(client: &'a mut Object, table: &str) -> Result<Self, PipelineError> {
        let transaction = client.transaction().await?;

        info!(table = %table, "Starting load transaction");

        Ok(Self {
            transaction,
            report: LoadReport::new(table),
            started_at: Instant::now(),
        })
    }

    /// Accède à la transaction sous-jacente pour exécuter des requêtes
    pub fn transaction(&self) -> &Transaction<'a> {
        &self.transaction
    }

    /// Enregistre une ligne acceptée par le COPY
    pub fn record_accepted(&mut self) {
        self.report.record_accepted();
    }

    /// Enregistre une feature rejetée (politique `skip`)
    pub fn record_rejection(&mut self, index: Option<usize>, message: impl Into<String>) {
        self.report.record_rejection(index, message);
    }

    pub fn accepted(&self) -> usize {
        self.report.accepted
    }

    /// Valide et commit la transaction
    ///
    /// # Errors
    /// Retourne une erreur si le commit échoue (rien n'est alors visible)
    pub async fn commit(mut self) -> Result<LoadReport, PipelineError> {
        self.transaction.commit().await?;

        self.report.set_duration(self.started_at.elapsed());
        self.report.finalize_committed();

        info!(
            table = %self.report.table,
            accepted = self.report.accepted,
            rejected = self.report.rejected,
            duration_secs = self.report.duration_secs,
            "Load transaction committed"
        );

        Ok(self.report)
    }

    /// Annule la transaction (rollback)
    ///
    /// Appelé explicitement en cas d'erreur fatale, avec la position de la
    /// feature fautive si elle est connue.
    /// La transaction est également rollback automatiquement si droppée.
    pub async fn rollback(mut self, index: Option<usize>, reason: &str) -> LoadReport {
        error!(
            table = %self.report.table,
            feature = ?index,
            reason = %reason,
            rows_attempted = self.report.accepted,
            "Rolling back load transaction"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }

        self.report.set_duration(self.started_at.elapsed());
        self.report.finalize_rolled_back(index, reason);
        self.report
    }
}
