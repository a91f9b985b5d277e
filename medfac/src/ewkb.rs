//! Transcodage des points en EWKB (Extended Well-Known Binary, format PostGIS)
//!
//! L'encodage produit toujours du little-endian (NDR) avec SRID 4326 :
//!
//! ```text
//! 01           byte order NDR
//! 01 00 00 20  type Point (1) | flag SRID (0x20000000)
//! E6 10 00 00  SRID 4326
//! x (f64 LE) = longitude, y (f64 LE) = latitude
//! ```
//!
//! Le décodage accepte NDR et XDR, avec ou sans SRID (absent = 4326).

use geo::Geometry;
use geozero::wkb::Ewkb;
use geozero::ToGeo;
use wkb::geom_to_wkb;

use crate::axis;
use crate::types::{EncodedRecord, FacilityRecord, LonLat, SRID_WGS84};
use crate::FeedError;

const BYTE_ORDER_XDR: u8 = 0;
const BYTE_ORDER_NDR: u8 = 1;

const WKB_POINT: u32 = 1;
const EWKB_Z_FLAG: u32 = 0x8000_0000;
const EWKB_M_FLAG: u32 = 0x4000_0000;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;
const EWKB_FLAGS: u32 = EWKB_Z_FLAG | EWKB_M_FLAG | EWKB_SRID_FLAG;

/// En-tête EWKB décodé
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    little_endian: bool,
    geometry_type: u32,
    has_z: bool,
    has_m: bool,
    srid: Option<u32>,
}

impl Header {
    fn len(&self) -> usize {
        if self.srid.is_some() {
            9
        } else {
            5
        }
    }
}

/// Encode un couple lon/lat en EWKB Point SRID 4326
///
/// Les coordonnées hors domaine (|lon| > 180, |lat| > 90) sont encodées telles
/// quelles ; seules les valeurs non finies sont refusées.
pub fn encode(coord: LonLat) -> Result<Vec<u8>, FeedError> {
    if !coord.lon.is_finite() || !coord.lat.is_finite() {
        return Err(FeedError::GeometryEncode(format!(
            "non-finite coordinate (lon={}, lat={})",
            coord.lon, coord.lat
        )));
    }

    let wkb = geom_to_wkb(&Geometry::Point(axis::to_point(coord)))
        .map_err(|e| FeedError::GeometryEncode(format!("{:?}", e)))?;

    add_srid_to_wkb(&wkb, SRID_WGS84)
}

/// Encode en EWKB hexadécimal majuscule (format d'entrée texte de `geometry`)
pub fn encode_hex(coord: LonLat) -> Result<String, FeedError> {
    encode(coord).map(hex::encode_upper)
}

/// Encode la géométrie d'un établissement, en lui transférant ses attributs
pub fn encode_record(record: FacilityRecord) -> Result<EncodedRecord, FeedError> {
    let geom_hex = encode_hex(record.location)?;
    Ok(EncodedRecord {
        index: record.index,
        geom_hex,
        attributes: record.attributes,
    })
}

/// Ajoute le SRID au WKB pour créer du EWKB
fn add_srid_to_wkb(wkb: &[u8], srid: u32) -> Result<Vec<u8>, FeedError> {
    if wkb.len() < 5 {
        return Err(FeedError::GeometryEncode(format!(
            "WKB too short: {} bytes",
            wkb.len()
        )));
    }

    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);

    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    match wkb[0] {
        BYTE_ORDER_NDR => {
            let geom_type = u32::from_le_bytes(type_bytes) | EWKB_SRID_FLAG;
            ewkb.extend_from_slice(&geom_type.to_le_bytes());
            ewkb.extend_from_slice(&srid.to_le_bytes());
        }
        BYTE_ORDER_XDR => {
            let geom_type = u32::from_be_bytes(type_bytes) | EWKB_SRID_FLAG;
            ewkb.extend_from_slice(&geom_type.to_be_bytes());
            ewkb.extend_from_slice(&srid.to_be_bytes());
        }
        other => {
            return Err(FeedError::GeometryEncode(format!(
                "unknown byte order {other:#04x}"
            )))
        }
    }

    ewkb.extend_from_slice(&wkb[5..]);
    Ok(ewkb)
}

/// Lit l'en-tête (byte order, type, flags, SRID)
fn read_header(ewkb: &[u8]) -> Result<Header, FeedError> {
    if ewkb.len() < 5 {
        return Err(FeedError::decode(format!(
            "EWKB too short: {} bytes",
            ewkb.len()
        )));
    }

    let little_endian = match ewkb[0] {
        BYTE_ORDER_NDR => true,
        BYTE_ORDER_XDR => false,
        other => return Err(FeedError::decode(format!("unknown byte order {other:#04x}"))),
    };

    let read_u32 = |bytes: [u8; 4]| {
        if little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        }
    };

    let raw_type = read_u32([ewkb[1], ewkb[2], ewkb[3], ewkb[4]]);

    let srid = if raw_type & EWKB_SRID_FLAG != 0 {
        if ewkb.len() < 9 {
            return Err(FeedError::decode("EWKB truncated inside SRID"));
        }
        Some(read_u32([ewkb[5], ewkb[6], ewkb[7], ewkb[8]]))
    } else {
        None
    };

    Ok(Header {
        little_endian,
        geometry_type: raw_type & !EWKB_FLAGS,
        has_z: raw_type & EWKB_Z_FLAG != 0,
        has_m: raw_type & EWKB_M_FLAG != 0,
        srid,
    })
}

/// Décode un EWKB Point 2D en couple lon/lat
pub fn decode(ewkb: &[u8]) -> Result<LonLat, FeedError> {
    let header = read_header(ewkb)?;

    if header.geometry_type != WKB_POINT {
        return Err(FeedError::decode(format!(
            "expected Point (type 1), found type {}",
            header.geometry_type
        )));
    }
    if header.has_z || header.has_m {
        return Err(FeedError::decode("only 2D points are supported"));
    }
    match header.srid {
        None | Some(SRID_WGS84) => {}
        Some(other) => {
            return Err(FeedError::decode(format!(
                "expected SRID {SRID_WGS84}, found {other}"
            )))
        }
    }

    let expected_len = header.len() + 16;
    if ewkb.len() != expected_len {
        return Err(FeedError::decode(format!(
            "expected {} bytes for a point, found {}",
            expected_len,
            ewkb.len()
        )));
    }

    let geometry = Ewkb(ewkb.to_vec())
        .to_geo()
        .map_err(|e| FeedError::decode(e.to_string()))?;

    let coord = match geometry {
        Geometry::Point(point) => axis::from_point(point),
        other => {
            return Err(FeedError::decode(format!(
                "decoded geometry is not a point: {:?}",
                other
            )))
        }
    };

    if !coord.lon.is_finite() || !coord.lat.is_finite() {
        return Err(FeedError::decode("empty point"));
    }

    Ok(coord)
}

/// Décode un EWKB hexadécimal (préfixe bytea `\x` toléré)
pub fn decode_hex(ewkb_hex: &str) -> Result<LonLat, FeedError> {
    let trimmed = ewkb_hex.trim();
    let digits = trimmed.strip_prefix("\\x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|e| FeedError::decode(format!("invalid hex: {e}")))?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // SELECT ST_AsEWKB('SRID=4326;POINT(2.3522 48.8566)'::geometry)
    const PARIS_EWKB_NDR: &str = "0101000020E6100000A835CD3B4ED1024076E09C11A56D4840";
    const PARIS_EWKB_XDR: &str = "0020000001000010E64002D14E3BCD35A840486DA5119CE076";
    const PARIS_WKB_NO_SRID: &str = "0101000000A835CD3B4ED1024076E09C11A56D4840";

    fn paris() -> LonLat {
        LonLat::new(2.3522, 48.8566)
    }

    #[test]
    fn test_encode_paris_matches_postgis() {
        assert_eq!(encode_hex(paris()).unwrap(), PARIS_EWKB_NDR);
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(paris()).unwrap();
        assert_eq!(bytes.len(), 25);
        assert_eq!(bytes[0], BYTE_ORDER_NDR);
        assert_eq!(&bytes[1..5], &(WKB_POINT | EWKB_SRID_FLAG).to_le_bytes());
        assert_eq!(&bytes[5..9], &4326u32.to_le_bytes());
        assert_eq!(&bytes[9..17], &2.3522f64.to_le_bytes());
        assert_eq!(&bytes[17..25], &48.8566f64.to_le_bytes());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode_hex(LonLat::new(-0.1276, 51.5072)).unwrap();
        let b = encode_hex(LonLat::new(-0.1276, 51.5072)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_out_of_range_is_not_clamped() {
        let coord = LonLat::new(200.0, -95.5);
        let bytes = encode(coord).unwrap();
        assert_eq!(decode(&bytes).unwrap(), coord);
    }

    #[test]
    fn test_encode_rejects_nan() {
        let err = encode(LonLat::new(f64::NAN, 10.0)).unwrap_err();
        assert!(matches!(err, FeedError::GeometryEncode(_)));
        assert!(encode(LonLat::new(1.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn test_round_trip_is_exact() {
        let samples = [
            LonLat::new(2.3522, 48.8566),
            LonLat::new(-180.0, -90.0),
            LonLat::new(180.0, 90.0),
            LonLat::new(0.0, 0.0),
            LonLat::new(-0.0, 0.0),
            LonLat::new(13.404954, 52.520008),
            LonLat::new(-73.935242, 40.730610),
            LonLat::new(1.0 / 3.0, std::f64::consts::PI),
            LonLat::new(f64::MIN_POSITIVE, -f64::EPSILON),
        ];
        for coord in samples {
            let decoded = decode(&encode(coord).unwrap()).unwrap();
            assert_eq!(decoded.lon.to_bits(), coord.lon.to_bits(), "lon of {:?}", coord);
            assert_eq!(decoded.lat.to_bits(), coord.lat.to_bits(), "lat of {:?}", coord);
        }
    }

    #[test]
    fn test_decode_big_endian() {
        assert_eq!(decode_hex(PARIS_EWKB_XDR).unwrap(), paris());
    }

    #[test]
    fn test_decode_without_srid() {
        assert_eq!(decode_hex(PARIS_WKB_NO_SRID).unwrap(), paris());
    }

    #[test]
    fn test_decode_bytea_prefix_and_lowercase() {
        let text = format!("\\x{}", PARIS_EWKB_NDR.to_lowercase());
        assert_eq!(decode_hex(&text).unwrap(), paris());
    }

    #[test]
    fn test_decode_rejects_other_srid() {
        let err = decode_hex("0101000020110F0000A835CD3B4ED1024076E09C11A56D4840").unwrap_err();
        assert!(err.to_string().contains("3857"));
    }

    #[test]
    fn test_decode_rejects_linestring() {
        let err = decode_hex("0102000020E610000000000000").unwrap_err();
        assert!(matches!(err, FeedError::GeometryDecode(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_and_trailing() {
        let bytes = encode(paris()).unwrap();
        assert!(decode(&bytes[..20]).is_err());
        assert!(decode(&bytes[..3]).is_err());
        assert!(decode(&[]).is_err());

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(decode(&longer).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_byte_order_and_hex() {
        let mut bytes = encode(paris()).unwrap();
        bytes[0] = 7;
        assert!(decode(&bytes).is_err());
        assert!(decode_hex("not hex").is_err());
    }

    #[test]
    fn test_encode_record_moves_attributes() {
        let attributes = crate::FacilityAttributes::default();
        let record = FacilityRecord {
            index: 4,
            location: paris(),
            attributes: attributes.clone(),
        };
        let encoded = encode_record(record).unwrap();
        assert_eq!(encoded.index, 4);
        assert_eq!(encoded.geom_hex, PARIS_EWKB_NDR);
        assert_eq!(encoded.attributes, attributes);
    }
}
