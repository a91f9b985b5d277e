//! Ingestion complète : flux → features → EWKB → COPY

use deadpool_postgres::Pool;
use medfac::{EncodedRecord, FeedError};
use tracing::{info, warn};

use crate::config::{AppConfig, RecordPolicy};
use crate::report::LoadReport;
use crate::source;
use crate::store::{loader, schema};
use crate::PipelineError;

/// Ingère le flux configuré dans la table configurée
///
/// Le flux est entièrement parsé et transcodé avant toute écriture : un document
/// mal formé (`MalformedFeed`), ou une feature invalide avec la politique `abort`,
/// laisse la table dans son dernier état commité.
pub async fn ingest(pool: &Pool, config: &AppConfig) -> Result<LoadReport, PipelineError> {
    let document = source::fetch(&config.source).await?;
    let features = document.features()?;
    info!(features = features.len(), "Feed parsed");

    let mut records = tokio::task::spawn_blocking(move || medfac::transcode_all(features)).await?;

    let result = match abort_before_load(&config.load.table, &mut records, config.load.on_invalid) {
        Some(aborted) => Err(aborted),
        None => {
            schema::provision(pool, &config.load.table, config.load.drop_existing).await?;
            loader::load(
                pool,
                &config.load.table,
                records,
                config.load.on_invalid,
                config.load.timeout(),
            )
            .await
        }
    };

    match result {
        Ok(mut report) => {
            report.source = Some(document.location);
            report.source_checksum = Some(document.checksum);
            Ok(report)
        }
        Err(PipelineError::LoadAborted { mut report, cause }) => {
            report.source = Some(document.location);
            report.source_checksum = Some(document.checksum);
            Err(PipelineError::LoadAborted { report, cause })
        }
        Err(e) => Err(e),
    }
}

/// Avec la politique `abort`, la première feature invalide rend l'échec certain :
/// on l'annonce sans toucher à la base
fn abort_before_load(
    table: &str,
    records: &mut Vec<Result<EncodedRecord, FeedError>>,
    policy: RecordPolicy,
) -> Option<PipelineError> {
    if policy != RecordPolicy::Abort {
        return None;
    }

    let position = records.iter().position(Result::is_err)?;
    let cause = match records.swap_remove(position) {
        Err(cause) => cause,
        Ok(_) => return None,
    };

    warn!(
        table = table,
        feature = ?cause.feature_index(),
        error = %cause,
        "Invalid feature, table left untouched"
    );

    let mut report = LoadReport::new(table);
    report.finalize_rolled_back(cause.feature_index(), &cause.to_string());
    Some(PipelineError::LoadAborted {
        report: Box::new(report),
        cause,
    })
}
