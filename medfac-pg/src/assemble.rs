//! Assemblage de la FeatureCollection servie par `GET /all-facilities`

use deadpool_postgres::Pool;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use medfac::{axis, ewkb, Attribute};
use tokio_postgres::{Client, Row};
use tracing::debug;

use crate::store::schema::{validate_identifier, GEOM_COLUMN};
use crate::PipelineError;

/// Ligne lue en base
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: i64,
    /// EWKB de la géométrie (`ST_AsEWKB`)
    pub geom: Vec<u8>,
    /// Valeurs dans l'ordre de [`Attribute::ALL`]
    pub values: Vec<Option<String>>,
}

impl StoredRow {
    /// Lit une ligne produite par [`select_statement`]
    pub fn from_row(row: &Row) -> Result<Self, PipelineError> {
        let id: i64 = row.try_get(0)?;
        let geom: Vec<u8> = row.try_get(1)?;
        let values = (0..Attribute::ALL.len())
            .map(|i| row.try_get::<_, Option<String>>(i + 2))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { id, geom, values })
    }
}

/// Requête de lecture, dans l'ordre d'insertion
pub fn select_statement(table: &str) -> String {
    let columns: Vec<&str> = Attribute::ALL.iter().map(|a| a.column()).collect();
    format!(
        "SELECT id, ST_AsEWKB({}), {} FROM {} ORDER BY id",
        GEOM_COLUMN,
        columns.join(", "),
        table
    )
}

pub async fn fetch_rows(client: &Client, table: &str) -> Result<Vec<StoredRow>, PipelineError> {
    validate_identifier(table)?;
    let rows = client.query(&select_statement(table), &[]).await?;
    rows.iter().map(StoredRow::from_row).collect()
}

fn to_feature(row: StoredRow) -> Result<Feature, PipelineError> {
    let location = ewkb::decode(&row.geom).map_err(|source| PipelineError::RowDecode {
        row_id: row.id,
        source,
    })?;

    let mut properties = JsonObject::new();
    for (attribute, value) in Attribute::ALL.iter().zip(row.values) {
        properties.insert(
            attribute.output_key().to_string(),
            value.map(JsonValue::String).unwrap_or(JsonValue::Null),
        );
    }

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::Point(axis::to_position(location)))),
        id: Some(Id::Number(row.id.into())),
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Construit la collection, une feature par ligne, dans l'ordre des lignes
///
/// # Errors
///
/// `RowDecode` dès qu'une géométrie est illisible : aucune collection partielle.
pub fn assemble(rows: Vec<StoredRow>) -> Result<FeatureCollection, PipelineError> {
    let features = rows
        .into_iter()
        .map(to_feature)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Lit toute la table et l'assemble en FeatureCollection
pub async fn all_facilities(pool: &Pool, table: &str) -> Result<FeatureCollection, PipelineError> {
    let client = pool.get().await?;
    let rows = fetch_rows(&client, table).await?;
    debug!(table = table, rows = rows.len(), "Assembling feature collection");
    assemble(rows)
}
