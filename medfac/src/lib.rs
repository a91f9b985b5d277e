//! # medfac
//!
//! Parser et transcodeur géométrique pour les flux GeoJSON d'établissements de santé
//! (flux GISCO « healthcare » de la Commission européenne).
//!
//! ## Features
//!
//! - Parsing strict et typé des features (`FieldTypeMismatch` au plus tôt)
//! - Correspondance lon/lat → x/y centralisée dans [`axis`]
//! - Encodage/décodage EWKB Point SRID 4326, compatible PostGIS
//! - Transcodage parallèle (`rayon`), ordre du flux préservé
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! let features = medfac::parse_file(Path::new("all.geojson"))?;
//! for result in medfac::transcode_all(features) {
//!     let encoded = result?;
//!     println!("{} {}", encoded.attributes.city(), encoded.geom_hex);
//! }
//! ```

pub mod axis;
pub mod error;
pub mod ewkb;
pub mod parser;
pub mod types;

pub use error::FeedError;
pub use types::{
    Attribute, EncodedRecord, FacilityAttributes, FacilityRecord, LonLat, RawFeature,
    ATTRIBUTE_COUNT, SRID_WGS84,
};

use std::path::Path;

use rayon::prelude::*;

/// Parse un document FeatureCollection en mémoire
///
/// # Errors
///
/// `MalformedFeed` si le document n'est pas un objet JSON avec une liste `features`.
pub fn parse(data: &[u8]) -> Result<Vec<RawFeature>, FeedError> {
    parser::feed::parse(data)
}

/// Lit et parse un fichier FeatureCollection
pub fn parse_file(path: &Path) -> Result<Vec<RawFeature>, FeedError> {
    let data = std::fs::read(path)?;
    parse(&data)
}

/// Parsing strict puis encodage EWKB d'une feature
pub fn transcode(raw: RawFeature) -> Result<EncodedRecord, FeedError> {
    let record = FacilityRecord::from_raw(raw)?;
    ewkb::encode_record(record)
}

/// Transcode toutes les features en parallèle
///
/// Le résultat a la même longueur et le même ordre que l'entrée : une erreur
/// sur une feature n'interrompt pas le transcodage des autres, c'est à
/// l'appelant de décider de la politique (abandon ou rejet).
pub fn transcode_all(features: Vec<RawFeature>) -> Vec<Result<EncodedRecord, FeedError>> {
    features.into_par_iter().map(transcode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &[u8] = br#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": null,
             "properties": {"country": "FR", "city": "Paris", "emergency": "yes", "lat": 48.8566, "lon": 2.3522}},
            {"type": "Feature", "geometry": null,
             "properties": {"country": "FR", "city": 12, "emergency": "yes", "lat": 45.0, "lon": 5.0}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
             "properties": {"country": "DE", "city": "Berlin", "emergency": "no"}}
        ]
    }"#;

    #[test]
    fn test_transcode_all_preserves_order() {
        let results = transcode_all(parse(FEED).unwrap());
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.geom_hex, "0101000020E6100000A835CD3B4ED1024076E09C11A56D4840");

        assert!(matches!(
            results[1],
            Err(FeedError::FieldTypeMismatch { index: 1, .. })
        ));

        let third = results[2].as_ref().unwrap();
        assert_eq!(third.index, 2);
        assert_eq!(third.attributes.city(), "Berlin");
        assert_eq!(
            ewkb::decode_hex(&third.geom_hex).unwrap(),
            LonLat::new(13.4, 52.5)
        );
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/nonexistent/feed.geojson")).unwrap_err();
        assert!(matches!(err, FeedError::Io(_)));
    }
}
