//! Parsing strict d'une feature brute en établissement typé
//!
//! Toute propriété présente mais d'un type inattendu échoue immédiatement en
//! `FieldTypeMismatch` ; `null` et clé absente valent « pas de valeur ».

use serde_json::{Map, Value};

use crate::types::{
    Attribute, FacilityAttributes, FacilityRecord, FieldKind, LonLat, RawFeature, ATTRIBUTE_COUNT,
};
use crate::FeedError;

impl FacilityRecord {
    /// Voir [`parse`]
    pub fn from_raw(raw: RawFeature) -> Result<Self, FeedError> {
        parse(raw)
    }
}

/// Convertit une feature brute en [`FacilityRecord`]
pub fn parse(raw: RawFeature) -> Result<FacilityRecord, FeedError> {
    let index = raw.index;

    let properties = match raw.properties {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(FeedError::type_mismatch(index, "properties", "object", &other)),
    };

    let location = parse_location(index, &raw.geometry, &properties)?;

    let mut values: [Option<String>; ATTRIBUTE_COUNT] = Default::default();
    for attribute in Attribute::ALL {
        values[attribute.position()] = text_field(index, &properties, attribute)?;
    }

    Ok(FacilityRecord {
        index,
        location,
        attributes: FacilityAttributes::new(index, values)?,
    })
}

/// Extrait les coordonnées : `geometry.coordinates` d'un Point en priorité,
/// sinon les champs plats `properties.lon` / `properties.lat`
fn parse_location(
    index: usize,
    geometry: &Value,
    properties: &Map<String, Value>,
) -> Result<LonLat, FeedError> {
    match geometry {
        Value::Null => {}
        Value::Object(object) => {
            return match object.get("type") {
                Some(Value::String(kind)) if kind == "Point" => {
                    point_coordinates(index, object.get("coordinates"))
                }
                Some(other) => Err(FeedError::type_mismatch(
                    index,
                    "geometry.type",
                    "\"Point\"",
                    other,
                )),
                None => Err(FeedError::missing(index, "geometry.type")),
            };
        }
        other => return Err(FeedError::type_mismatch(index, "geometry", "object", other)),
    }

    let lon = number_field(index, properties, "lon")?;
    let lat = number_field(index, properties, "lat")?;
    match (lon, lat) {
        (Some(lon), Some(lat)) => Ok(LonLat { lon, lat }),
        (None, _) => Err(FeedError::missing(index, "lon")),
        (_, None) => Err(FeedError::missing(index, "lat")),
    }
}

/// Position GeoJSON : `[lon, lat]` (une éventuelle altitude est ignorée)
fn point_coordinates(index: usize, coordinates: Option<&Value>) -> Result<LonLat, FeedError> {
    const FIELD: &str = "geometry.coordinates";

    let position = match coordinates {
        Some(Value::Array(position)) => position,
        Some(Value::Null) | None => return Err(FeedError::missing(index, FIELD)),
        Some(other) => return Err(FeedError::type_mismatch(index, FIELD, "[lon, lat]", other)),
    };

    match position.as_slice() {
        [lon, lat, ..] => match (lon.as_f64(), lat.as_f64()) {
            (Some(lon), Some(lat)) => Ok(LonLat { lon, lat }),
            (None, _) => Err(FeedError::type_mismatch(index, FIELD, "number", lon)),
            (_, None) => Err(FeedError::type_mismatch(index, FIELD, "number", lat)),
        },
        _ => Err(FeedError::missing(index, FIELD)),
    }
}

/// Champ numérique ; une chaîne contenant un nombre est convertie
fn number_field(
    index: usize,
    properties: &Map<String, Value>,
    key: &str,
) -> Result<Option<f64>, FeedError> {
    match properties.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(value @ Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| FeedError::type_mismatch(index, key, "number", value)),
        Some(other) => Err(FeedError::type_mismatch(index, key, "number", other)),
    }
}

fn text_field(
    index: usize,
    properties: &Map<String, Value>,
    attribute: Attribute,
) -> Result<Option<String>, FeedError> {
    let key = attribute.feed_key();
    match (properties.get(key), attribute.kind()) {
        (None | Some(Value::Null), _) => Ok(None),
        // PostgreSQL refuse U+0000 dans un TEXT
        (Some(Value::String(s)), _) if s.contains('\0') => Err(FeedError::InvalidText {
            index,
            field: key.to_string(),
        }),
        (Some(Value::String(s)), _) => Ok(Some(s.clone())),
        (Some(Value::Number(n)), FieldKind::TextOrNumber) => Ok(Some(n.to_string())),
        (Some(other), kind) => Err(FeedError::type_mismatch(index, key, kind.expected(), other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(geometry: Value, properties: Value) -> RawFeature {
        RawFeature {
            index: 0,
            geometry,
            properties,
        }
    }

    fn base_properties() -> Value {
        json!({
            "country": "FR",
            "city": "Paris",
            "emergency": "yes",
            "id": "FR-0001",
            "hospital_name": "Hôtel-Dieu",
            "cap_beds": 350,
            "tel": null,
        })
    }

    #[test]
    fn test_parse_point_geometry() {
        let record = parse(raw(
            json!({"type": "Point", "coordinates": [2.3522, 48.8566]}),
            base_properties(),
        ))
        .unwrap();

        assert_eq!(record.location, LonLat::new(2.3522, 48.8566));
        assert_eq!(record.attributes.country(), "FR");
        assert_eq!(record.attributes.city(), "Paris");
        assert_eq!(record.attributes.ref_id(), Some("FR-0001"));
        assert_eq!(record.attributes.get(Attribute::HospitalName), Some("Hôtel-Dieu"));
        assert_eq!(record.attributes.get(Attribute::CapBeds), Some("350"));
        assert_eq!(record.attributes.get(Attribute::Tel), None);
        assert_eq!(record.attributes.get(Attribute::Street), None);
    }

    #[test]
    fn test_flat_lat_lon_fields_map_to_correct_axes() {
        let mut properties = base_properties();
        properties["lat"] = json!(48.8566);
        properties["lon"] = json!(2.3522);

        let record = parse(raw(Value::Null, properties)).unwrap();
        assert_eq!(record.location.lon, 2.3522);
        assert_eq!(record.location.lat, 48.8566);
    }

    #[test]
    fn test_numeric_string_coordinates_are_coerced() {
        let mut properties = base_properties();
        properties["lat"] = json!("45.1885");
        properties["lon"] = json!(" 5.7245 ");

        let record = parse(raw(Value::Null, properties)).unwrap();
        assert_eq!(record.location, LonLat::new(5.7245, 45.1885));
    }

    #[test]
    fn test_geometry_takes_precedence_over_flat_fields() {
        let mut properties = base_properties();
        properties["lat"] = json!(0.0);
        properties["lon"] = json!(0.0);

        let record = parse(raw(
            json!({"type": "Point", "coordinates": [2.3522, 48.8566, 35.0]}),
            properties,
        ))
        .unwrap();
        assert_eq!(record.location, LonLat::new(2.3522, 48.8566));
    }

    #[test]
    fn test_missing_coordinates() {
        let err = parse(raw(Value::Null, base_properties())).unwrap_err();
        assert!(matches!(err, FeedError::MissingField { ref field, .. } if field == "lon"));
    }

    #[test]
    fn test_non_point_geometry_is_type_mismatch() {
        let err = parse(raw(
            json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}),
            base_properties(),
        ))
        .unwrap_err();
        assert!(matches!(err, FeedError::FieldTypeMismatch { ref field, .. } if field == "geometry.type"));
    }

    #[test]
    fn test_coordinate_not_number() {
        let err = parse(raw(
            json!({"type": "Point", "coordinates": ["a", 1.0]}),
            base_properties(),
        ))
        .unwrap_err();
        assert!(matches!(err, FeedError::FieldTypeMismatch { found: "string", .. }));
    }

    #[test]
    fn test_text_field_with_number_is_mismatch() {
        let mut properties = base_properties();
        properties["city"] = json!(75);
        properties["lat"] = json!(1.0);
        properties["lon"] = json!(1.0);

        let err = parse(raw(Value::Null, properties)).unwrap_err();
        match err {
            FeedError::FieldTypeMismatch {
                field,
                expected,
                found,
                ..
            } => {
                assert_eq!(field, "city");
                assert_eq!(expected, "string");
                assert_eq!(found, "number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_boolean_in_optional_field_is_mismatch() {
        let mut properties = base_properties();
        properties["email"] = json!(false);
        properties["lat"] = json!(1.0);
        properties["lon"] = json!(1.0);

        assert!(matches!(
            parse(raw(Value::Null, properties)),
            Err(FeedError::FieldTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_nul_character_rejected_per_record() {
        let mut properties = base_properties();
        properties["street"] = json!("Rue\u{0000} de la Paix");
        let err = FacilityRecord::from_raw(raw(
            json!({"type": "Point", "coordinates": [2.3522, 48.8566]}),
            properties,
        ))
        .unwrap_err();

        assert!(matches!(&err, FeedError::InvalidText { field, .. } if field == "street"));
        assert_eq!(err.feature_index(), Some(0));
    }

    #[test]
    fn test_missing_required_emergency() {
        let mut properties = base_properties();
        properties.as_object_mut().unwrap().remove("emergency");
        properties["lat"] = json!(1.0);
        properties["lon"] = json!(1.0);

        let err = parse(raw(Value::Null, properties)).unwrap_err();
        assert!(matches!(err, FeedError::MissingField { ref field, .. } if field == "emergency"));
    }

    #[test]
    fn test_properties_not_object() {
        let err = parse(raw(Value::Null, json!([1, 2]))).unwrap_err();
        assert!(matches!(err, FeedError::FieldTypeMismatch { ref field, .. } if field == "properties"));
    }

    #[test]
    fn test_empty_optional_string_is_kept() {
        let mut properties = base_properties();
        properties["comments"] = json!("");
        properties["lat"] = json!(1.0);
        properties["lon"] = json!(1.0);

        let record = parse(raw(Value::Null, properties)).unwrap();
        assert_eq!(record.attributes.get(Attribute::Comments), Some(""));
    }
}
