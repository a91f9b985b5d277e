//! Provisioning de la table PostGIS des établissements

use std::sync::OnceLock;

use deadpool_postgres::Pool;
use medfac::Attribute;
use regex::Regex;
use tracing::{info, warn};

use crate::PipelineError;

/// Nom de table par défaut
pub const DEFAULT_TABLE: &str = "medical_facilities";

/// Colonne géométrique
pub const GEOM_COLUMN: &str = "geom";

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62})?$")
            .expect("identifier regex is valid")
    })
}

/// Vérifie qu'un nom de table (éventuellement `schema.table`) peut être
/// interpolé tel quel dans du SQL
pub fn validate_identifier(name: &str) -> Result<(), PipelineError> {
    if identifier_regex().is_match(name) {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "invalid table name {:?}: expected [schema.]table with letters, digits and underscores",
            name
        )))
    }
}

/// Colonnes alimentées par le COPY, dans l'ordre des valeurs de chaque ligne
pub fn copy_columns() -> Vec<&'static str> {
    std::iter::once(GEOM_COLUMN)
        .chain(Attribute::ALL.iter().map(|a| a.column()))
        .collect()
}

/// DDL de la table
pub fn create_table_sql(table: &str) -> String {
    let attribute_columns: Vec<String> = Attribute::ALL
        .iter()
        .map(|a| {
            if a.is_required() {
                format!("{} TEXT NOT NULL", a.column())
            } else {
                format!("{} TEXT", a.column())
            }
        })
        .collect();

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            {} geometry(POINT, 4326) NOT NULL,
            {}
        )
        "#,
        table,
        GEOM_COLUMN,
        attribute_columns.join(",\n            ")
    )
}

fn index_name(table: &str) -> String {
    let bare = table.rsplit('.').next().unwrap_or(table);
    format!("idx_{}_{}", bare, GEOM_COLUMN)
}

/// Prépare la table : extension PostGIS, suppression éventuelle, création, index spatial
pub async fn provision(pool: &Pool, table: &str, drop_existing: bool) -> Result<(), PipelineError> {
    validate_identifier(table)?;
    let client = pool.get().await?;

    // Peut nécessiter des droits superuser ; si l'extension existe déjà, on continue.
    if let Err(e) = client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
        let exists = client
            .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
            .await?
            .is_some();
        if !exists {
            return Err(e.into());
        }
    }

    if drop_existing {
        client
            .execute(&format!("DROP TABLE IF EXISTS {}", table), &[])
            .await?;
        info!(table = table, "Dropped existing table");
    }

    client.execute(&create_table_sql(table), &[]).await?;

    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING GIST ({})",
                index_name(table),
                table,
                GEOM_COLUMN
            ),
            &[],
        )
        .await?;

    info!(table = table, "Table ready");
    Ok(())
}

/// Nombre de lignes de la table
pub async fn row_count(pool: &Pool, table: &str) -> Result<i64, PipelineError> {
    validate_identifier(table)?;
    let client = pool.get().await?;
    let row = client
        .query_one(&format!("SELECT count(*) FROM {}", table), &[])
        .await?;
    Ok(row.try_get(0)?)
}
