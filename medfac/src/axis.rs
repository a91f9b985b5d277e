//! Correspondance entre coordonnées géographiques et axes de géométrie
//!
//! Seul endroit du code qui décide de l'ordre des axes : la longitude est
//! l'axe x, la latitude l'axe y (ordre EPSG:4326 « traditionnel GIS » utilisé
//! par PostGIS et GeoJSON). Le flux source nomme ses champs `lat`/`lon`, dans
//! l'ordre inverse : ne jamais passer par un tuple positionnel.

use geo::Point;

use crate::types::LonLat;

/// Longitude → x, latitude → y
pub fn to_point(coord: LonLat) -> Point<f64> {
    Point::new(coord.lon, coord.lat)
}

/// x → longitude, y → latitude
pub fn from_point(point: Point<f64>) -> LonLat {
    LonLat {
        lon: point.x(),
        lat: point.y(),
    }
}

/// Position GeoJSON `[lon, lat]`
pub fn to_position(coord: LonLat) -> Vec<f64> {
    let point = to_point(coord);
    vec![point.x(), point.y()]
}
