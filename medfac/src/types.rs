//! Types de données pour le crate medfac

use serde_json::Value;

use crate::FeedError;

/// Système de référence des géométries stockées (WGS84)
pub const SRID_WGS84: u32 = 4326;

/// Nombre d'attributs d'un établissement
pub const ATTRIBUTE_COUNT: usize = 21;

/// Couple de coordonnées géographiques, en degrés
///
/// Les champs sont nommés pour ne jamais dépendre d'une convention positionnelle :
/// la correspondance avec les axes x/y est faite uniquement dans [`crate::axis`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Nature attendue d'une propriété du flux
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Chaîne uniquement
    Text,
    /// Chaîne, ou nombre converti en texte
    TextOrNumber,
}

impl FieldKind {
    pub fn expected(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::TextOrNumber => "string or number",
        }
    }
}

/// Attributs descriptifs d'un établissement
///
/// L'ordre de [`Attribute::ALL`] est celui des colonnes SQL et des valeurs
/// de [`FacilityAttributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Country,
    City,
    CapBeds,
    Emergency,
    RefDate,
    HouseNumber,
    PubDate,
    Street,
    Tel,
    RefId,
    FacilityType,
    ListSpecs,
    Email,
    HospitalName,
    Cc,
    PublicPrivate,
    Comments,
    Postcode,
    Url,
    SiteName,
    GeoQual,
}

impl Attribute {
    pub const ALL: [Attribute; ATTRIBUTE_COUNT] = [
        Attribute::Country,
        Attribute::City,
        Attribute::CapBeds,
        Attribute::Emergency,
        Attribute::RefDate,
        Attribute::HouseNumber,
        Attribute::PubDate,
        Attribute::Street,
        Attribute::Tel,
        Attribute::RefId,
        Attribute::FacilityType,
        Attribute::ListSpecs,
        Attribute::Email,
        Attribute::HospitalName,
        Attribute::Cc,
        Attribute::PublicPrivate,
        Attribute::Comments,
        Attribute::Postcode,
        Attribute::Url,
        Attribute::SiteName,
        Attribute::GeoQual,
    ];

    /// Position dans [`Attribute::ALL`]
    pub fn position(self) -> usize {
        self as usize
    }

    /// Clé de la propriété dans le flux source
    pub fn feed_key(self) -> &'static str {
        match self {
            Attribute::Country => "country",
            Attribute::City => "city",
            Attribute::CapBeds => "cap_beds",
            Attribute::Emergency => "emergency",
            Attribute::RefDate => "ref_date",
            Attribute::HouseNumber => "house_number",
            Attribute::PubDate => "pub_date",
            Attribute::Street => "street",
            Attribute::Tel => "tel",
            Attribute::RefId => "id",
            Attribute::FacilityType => "facility_type",
            Attribute::ListSpecs => "list_specs",
            Attribute::Email => "email",
            Attribute::HospitalName => "hospital_name",
            Attribute::Cc => "cc",
            Attribute::PublicPrivate => "public_private",
            Attribute::Comments => "comments",
            Attribute::Postcode => "postcode",
            Attribute::Url => "url",
            Attribute::SiteName => "site_name",
            Attribute::GeoQual => "geo_qual",
        }
    }

    /// Nom de la colonne SQL
    pub fn column(self) -> &'static str {
        match self {
            Attribute::RefId => "ref_id",
            other => other.feed_key(),
        }
    }

    /// Clé de la propriété dans la FeatureCollection servie
    pub fn output_key(self) -> &'static str {
        match self {
            Attribute::Country => "Country",
            Attribute::City => "City",
            Attribute::CapBeds => "CapBeds",
            Attribute::Emergency => "Emergency",
            Attribute::RefDate => "RefDate",
            Attribute::HouseNumber => "HouseNumber",
            Attribute::PubDate => "PubDate",
            Attribute::Street => "Street",
            Attribute::Tel => "Tel",
            Attribute::RefId => "RefID",
            Attribute::FacilityType => "FacilityType",
            Attribute::ListSpecs => "ListSpecs",
            Attribute::Email => "Email",
            Attribute::HospitalName => "HospitalName",
            Attribute::Cc => "Cc",
            Attribute::PublicPrivate => "PublicPrivate",
            Attribute::Comments => "Comments",
            Attribute::Postcode => "Postcode",
            Attribute::Url => "URL",
            Attribute::SiteName => "SiteName",
            Attribute::GeoQual => "GeoQual",
        }
    }

    /// Champ obligatoire et non vide
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Attribute::Country | Attribute::City | Attribute::Emergency
        )
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Attribute::CapBeds | Attribute::RefId | Attribute::Postcode | Attribute::GeoQual => {
                FieldKind::TextOrNumber
            }
            _ => FieldKind::Text,
        }
    }
}

/// Valeurs des attributs d'un établissement, dans l'ordre de [`Attribute::ALL`]
///
/// Les attributs obligatoires sont toujours renseignés et non vides.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FacilityAttributes {
    values: [Option<String>; ATTRIBUTE_COUNT],
}

impl FacilityAttributes {
    /// Construit les attributs en vérifiant la présence des champs obligatoires
    ///
    /// `index` est la position de la feature dans le flux (pour les messages d'erreur).
    pub fn new(index: usize, values: [Option<String>; ATTRIBUTE_COUNT]) -> Result<Self, FeedError> {
        for attribute in Attribute::ALL {
            if attribute.is_required() {
                match &values[attribute.position()] {
                    Some(v) if !v.is_empty() => {}
                    _ => return Err(FeedError::missing(index, attribute.feed_key())),
                }
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        self.values[attribute.position()].as_deref()
    }

    pub fn country(&self) -> &str {
        self.get(Attribute::Country).unwrap_or_default()
    }

    pub fn city(&self) -> &str {
        self.get(Attribute::City).unwrap_or_default()
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.get(Attribute::RefId)
    }

    /// Itère sur les couples (attribut, valeur) dans l'ordre des colonnes
    pub fn iter(&self) -> impl Iterator<Item = (Attribute, Option<&str>)> + '_ {
        Attribute::ALL
            .iter()
            .map(move |&attribute| (attribute, self.get(attribute)))
    }
}

/// Feature brute extraite du flux, non validée
///
/// Seule la structure englobante est garantie ; le contenu de `geometry` et
/// `properties` est vérifié par [`crate::parser::record::parse`].
#[derive(Debug, Clone)]
pub struct RawFeature {
    /// Position dans la liste `features` du flux
    pub index: usize,
    /// Membre `geometry` (Null si absent)
    pub geometry: Value,
    /// Membre `properties` (Null si absent)
    pub properties: Value,
}

/// Établissement typé, issu du parsing strict d'une [`RawFeature`]
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityRecord {
    pub index: usize,
    pub location: LonLat,
    pub attributes: FacilityAttributes,
}

/// Établissement prêt pour le COPY : géométrie déjà encodée en EWKB hex
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub index: usize,
    /// EWKB (NDR, SRID 4326) en hexadécimal majuscule
    pub geom_hex: String,
    pub attributes: FacilityAttributes,
}
