//! Parsers du flux d'établissements
//!
//! - `feed` : document GeoJSON → features brutes
//! - `record` : feature brute → établissement typé (parsing strict)

pub mod feed;
pub mod record;
