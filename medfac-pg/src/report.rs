//! Rapport de chargement
//!
//! Résumé structuré retourné par le bulk loader (compteurs, rejets, statut),
//! à la place d'un affichage ligne par ligne pendant le chargement.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut final du chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    /// Toutes les features ont été commitées
    Committed,
    /// Commit effectué, certaines features rejetées (politique `skip`)
    PartiallyCommitted,
    /// Transaction annulée, aucune ligne visible
    RolledBack,
}

/// Feature rejetée
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Position dans le flux (si connue)
    pub index: Option<usize>,
    /// Message d'erreur
    pub message: String,
}

/// Rapport complet de chargement
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Table cible
    pub table: String,
    /// URL ou chemin du flux
    pub source: Option<String>,
    /// Empreinte blake3 (hex) du flux brut
    pub source_checksum: Option<String>,
    /// Statut global
    pub status: LoadStatus,
    /// Lignes acceptées par le COPY
    pub accepted: usize,
    /// Features rejetées
    pub rejected: usize,
    /// Détail des rejets
    pub rejections: Vec<Rejection>,
    /// Durée du chargement
    pub duration_secs: f64,
}

impl LoadReport {
    /// Crée un rapport vide pour une table
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            source: None,
            source_checksum: None,
            status: LoadStatus::Committed,
            accepted: 0,
            rejected: 0,
            rejections: Vec::new(),
            duration_secs: 0.0,
        }
    }

    pub fn record_accepted(&mut self) {
        self.accepted += 1;
    }

    pub fn record_rejection(&mut self, index: Option<usize>, message: impl Into<String>) {
        self.rejected += 1;
        self.rejections.push(Rejection {
            index,
            message: message.into(),
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Statut après commit, selon la présence de rejets
    pub fn finalize_committed(&mut self) {
        self.status = if self.rejected > 0 {
            LoadStatus::PartiallyCommitted
        } else {
            LoadStatus::Committed
        };
    }

    /// Marque le rapport comme annulé : plus aucune ligne n'est acceptée
    ///
    /// `index` est la position de la feature fautive, si le rollback vient d'une feature.
    pub fn finalize_rolled_back(&mut self, index: Option<usize>, reason: &str) {
        self.status = LoadStatus::RolledBack;
        self.accepted = 0;
        self.record_rejection(index, reason);
    }

    /// Nombre total de features vues
    pub fn total(&self) -> usize {
        self.accepted + self.rejected
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("LOAD REPORT - {}", self.table);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(source) = &self.source {
            println!("Source: {}", source);
        }
        if let Some(checksum) = &self.source_checksum {
            println!("Checksum: {}", checksum);
        }

        println!("\n--- SUMMARY ---");
        println!(
            "Features: {} seen, {} accepted, {} rejected",
            self.total(),
            self.accepted,
            self.rejected
        );

        if !self.rejections.is_empty() {
            println!("\n--- REJECTIONS ({}) ---", self.rejections.len());
            for r in self.rejections.iter().take(20) {
                match r.index {
                    Some(index) => println!("  [#{}] {}", index, r.message),
                    None => println!("  {}", r.message),
                }
            }
            if self.rejections.len() > 20 {
                println!("  ... and {} more", self.rejections.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour les logs
    pub fn summary(&self) -> String {
        format!(
            "{}: {} accepted, {} rejected ({:?})",
            self.table, self.accepted, self.rejected, self.status
        )
    }
}
