//! Bulk loader : COPY streaming dans une transaction unique
//!
//! Les features transcodées sont sérialisées en CSV et envoyées par `COPY ... FROM STDIN`.
//! Avec la politique `abort`, la première feature invalide annule tout le chargement ;
//! avec `skip`, elle est consignée dans le rapport et le chargement continue.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use deadpool_postgres::Pool;
use futures::SinkExt;
use medfac::{EncodedRecord, FeedError};
use tracing::{debug, info, warn};

use crate::config::RecordPolicy;
use crate::report::LoadReport;
use crate::store::schema::{copy_columns, validate_identifier};
use crate::store::transaction::LoadTransaction;
use crate::PipelineError;

/// Taille des blocs envoyés au serveur
const CHUNK_SIZE: usize = 256 * 1024;

/// Commande COPY pour une table
pub fn copy_statement(table: &str) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        table,
        copy_columns().join(", ")
    )
}

/// Ajoute une valeur CSV : vide (NULL) si absente, sinon entre guillemets
fn push_field(buf: &mut BytesMut, value: Option<&str>) {
    if let Some(value) = value {
        buf.put_u8(b'"');
        for part in value.split('"').enumerate() {
            if part.0 > 0 {
                buf.put_slice(b"\"\"");
            }
            buf.put_slice(part.1.as_bytes());
        }
        buf.put_u8(b'"');
    }
}

/// Sérialise un établissement en une ligne CSV, dans l'ordre de [`copy_columns`]
pub fn encode_copy_row(record: &EncodedRecord, buf: &mut BytesMut) {
    buf.put_slice(record.geom_hex.as_bytes());
    for (_, value) in record.attributes.iter() {
        buf.put_u8(b',');
        push_field(buf, value);
    }
    buf.put_u8(b'\n');
}

/// Charge les features dans `table` en une seule transaction
///
/// La table doit exister (voir [`crate::store::schema::provision`]).
///
/// # Errors
///
/// - `LoadAborted` si une feature est invalide avec la politique `abort` (rollback effectué)
/// - `Timeout` si le chargement dépasse `timeout` (la transaction est abandonnée)
/// - `Storage` / `Pool` pour les erreurs PostgreSQL ; rien n'est alors commité
pub async fn load<I>(
    pool: &Pool,
    table: &str,
    records: I,
    policy: RecordPolicy,
    timeout: Duration,
) -> Result<LoadReport, PipelineError>
where
    I: IntoIterator<Item = Result<EncodedRecord, FeedError>>,
{
    validate_identifier(table)?;

    match tokio::time::timeout(timeout, load_inner(pool, table, records, policy)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(table = table, ?timeout, "Bulk load timed out, transaction abandoned");
            Err(PipelineError::Timeout {
                operation: "bulk load",
                timeout,
            })
        }
    }
}

async fn load_inner<I>(
    pool: &Pool,
    table: &str,
    records: I,
    policy: RecordPolicy,
) -> Result<LoadReport, PipelineError>
where
    I: IntoIterator<Item = Result<EncodedRecord, FeedError>>,
{
    let mut client = pool.get().await?;
    let mut ltx = LoadTransaction::begin(&mut client, table).await?;

    let statement = copy_statement(table);
    debug!(statement = %statement, "Opening COPY stream");
    let mut sink = Box::pin(ltx.transaction().copy_in(&statement).await?);

    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);

    for result in records {
        match result {
            Ok(record) => {
                encode_copy_row(&record, &mut buf);
                ltx.record_accepted();
                if buf.len() >= CHUNK_SIZE {
                    sink.send(buf.split().freeze()).await?;
                }
            }
            Err(cause) => match policy {
                RecordPolicy::Abort => {
                    // Sans `finish`, le COPY est annulé côté serveur.
                    drop(sink);
                    let report = ltx.rollback(cause.feature_index(), &cause.to_string()).await;
                    return Err(PipelineError::LoadAborted {
                        report: Box::new(report),
                        cause,
                    });
                }
                RecordPolicy::Skip => {
                    warn!(
                        table = table,
                        index = cause.feature_index(),
                        error = %cause,
                        "Skipping invalid feature"
                    );
                    ltx.record_rejection(cause.feature_index(), cause.to_string());
                }
            },
        }
    }

    if !buf.is_empty() {
        sink.send(buf.split().freeze()).await?;
    }
    let copied = sink.as_mut().finish().await?;

    if copied as usize != ltx.accepted() {
        warn!(
            copied = copied,
            accepted = ltx.accepted(),
            "COPY row count differs from accepted features"
        );
    }

    let report = ltx.commit().await?;
    info!("{}", report.summary());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medfac::{Attribute, FacilityAttributes, ATTRIBUTE_COUNT};

    fn record(pairs: &[(Attribute, &str)]) -> EncodedRecord {
        let mut values: [Option<String>; ATTRIBUTE_COUNT] = Default::default();
        for (attribute, value) in pairs {
            values[attribute.position()] = Some(value.to_string());
        }
        EncodedRecord {
            index: 0,
            geom_hex: "0101000020E6100000A835CD3B4ED1024076E09C11A56D4840".to_string(),
            attributes: FacilityAttributes::new(0, values).unwrap(),
        }
    }

    fn row(record: &EncodedRecord) -> String {
        let mut buf = BytesMut::new();
        encode_copy_row(record, &mut buf);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    fn base() -> Vec<(Attribute, &'static str)> {
        vec![
            (Attribute::Country, "FR"),
            (Attribute::City, "Paris"),
            (Attribute::Emergency, "yes"),
        ]
    }

    #[test]
    fn test_copy_statement() {
        let sql = copy_statement("public.medical_facilities");
        assert!(sql.starts_with("COPY public.medical_facilities (geom, country, city, cap_beds,"));
        assert!(sql.ends_with("geo_qual) FROM STDIN WITH (FORMAT csv)"));
    }

    #[test]
    fn test_row_layout() {
        let line = row(&record(&base()));
        assert!(line.ends_with('\n'));

        let fields: Vec<&str> = line.trim_end().split(',').collect();
        assert_eq!(fields.len(), 1 + ATTRIBUTE_COUNT);
        assert_eq!(fields[0], "0101000020E6100000A835CD3B4ED1024076E09C11A56D4840");
        assert_eq!(fields[1], "\"FR\"");
        assert_eq!(fields[2], "\"Paris\"");
        // cap_beds absent : champ vide, donc NULL
        assert_eq!(fields[3], "");
        assert_eq!(fields[4], "\"yes\"");
    }

    #[test]
    fn test_empty_string_is_not_null() {
        let mut pairs = base();
        pairs.push((Attribute::Email, ""));
        let line = row(&record(&pairs));
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        assert_eq!(fields[1 + Attribute::Email.position()], "\"\"");
    }

    #[test]
    fn test_quotes_commas_and_newlines_are_escaped() {
        let mut pairs = base();
        pairs.push((Attribute::HospitalName, "Hôpital \"Saint-Louis\", Paris"));
        pairs.push((Attribute::Comments, "line 1\nline 2"));
        let line = row(&record(&pairs));

        assert!(line.contains(r#""Hôpital ""Saint-Louis"", Paris""#));
        assert!(line.contains("\"line 1\nline 2\""));
    }

    #[test]
    fn test_multiple_rows_share_buffer() {
        let mut buf = BytesMut::new();
        encode_copy_row(&record(&base()), &mut buf);
        encode_copy_row(&record(&base()), &mut buf);
        let text = String::from_utf8(buf.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_table_name_rejected_before_connecting() {
        let config = crate::DatabaseConfig {
            port: 1,
            ..Default::default()
        };
        let pool = crate::create_pool(&config).unwrap();
        let result = load(
            &pool,
            "bad; name",
            Vec::new(),
            RecordPolicy::Abort,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
