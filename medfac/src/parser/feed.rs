//! Parser du document FeatureCollection

use serde_json::Value;
use tracing::debug;

use crate::error::json_type_name;
use crate::types::RawFeature;
use crate::FeedError;

/// Parse un document FeatureCollection et retourne ses features brutes
///
/// Seule la structure est vérifiée : objet racine avec une liste `features`
/// dont chaque entrée est un objet. Le contenu des features est validé plus
/// tard, feature par feature.
pub fn parse(data: &[u8]) -> Result<Vec<RawFeature>, FeedError> {
    let document: Value = serde_json::from_slice(data)
        .map_err(|e| FeedError::malformed(format!("invalid JSON: {e}")))?;

    let mut root = match document {
        Value::Object(root) => root,
        other => {
            return Err(FeedError::malformed(format!(
                "top-level value is {}, expected an object",
                json_type_name(&other)
            )))
        }
    };

    let features = match root.remove("features") {
        Some(Value::Array(features)) => features,
        Some(other) => {
            return Err(FeedError::malformed(format!(
                "`features` is {}, expected an array",
                json_type_name(&other)
            )))
        }
        None => return Err(FeedError::malformed("missing `features` list")),
    };

    debug!(features = features.len(), "Feed document parsed");

    features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| raw_feature(index, feature))
        .collect()
}

fn raw_feature(index: usize, feature: Value) -> Result<RawFeature, FeedError> {
    let mut object = match feature {
        Value::Object(object) => object,
        other => {
            return Err(FeedError::malformed(format!(
                "feature #{index} is {}, expected an object",
                json_type_name(&other)
            )))
        }
    };

    Ok(RawFeature {
        index,
        geometry: object.remove("geometry").unwrap_or(Value::Null),
        properties: object.remove("properties").unwrap_or(Value::Null),
    })
}
