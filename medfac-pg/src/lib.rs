//! # medfac-pg
//!
//! Chargement du flux GeoJSON des établissements de santé dans PostGIS, et
//! restitution en FeatureCollection par HTTP.
//!
//! ## Features
//!
//! - Téléchargement du flux (HTTP(S) ou fichier) avec nouvelles tentatives
//! - Bulk load `COPY ... FROM STDIN` en une seule transaction (tout ou rien)
//! - Politique configurable pour les features invalides (`abort` / `skip`)
//! - Endpoint `GET /all-facilities` (axum), réponse `application/geo+json`
//!
//! ## Usage CLI
//!
//! ```bash
//! # Provisionne, sert sur :5000 et ingère le flux GISCO
//! medfac-pg
//!
//! # Ingestion seule depuis un fichier local, rapport JSON
//! medfac-pg ingest --source ./all.geojson --report load.json
//!
//! # Lecture seule
//! medfac-pg serve --listen 127.0.0.1:8080
//! ```

pub mod assemble;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod server;
pub mod source;
pub mod store;

pub use config::{AppConfig, RecordPolicy};
pub use error::PipelineError;
pub use report::{LoadReport, LoadStatus};
pub use store::pool::{connect, create_pool, DatabaseConfig};
