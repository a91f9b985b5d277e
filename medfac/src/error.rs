//! Types d'erreurs pour le crate medfac

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture du flux ou du transcodage
#[derive(Debug, Error)]
pub enum FeedError {
    /// Erreur d'I/O lors de la lecture d'un fichier source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document illisible ou sans liste `features`
    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    /// Propriété présente mais d'un type inattendu
    #[error("Feature #{index}: field `{field}` expected {expected}, found {found}")]
    FieldTypeMismatch {
        index: usize,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Champ obligatoire absent, nul ou vide
    #[error("Feature #{index}: missing required field `{field}`")]
    MissingField { index: usize, field: String },

    /// Texte non stockable (caractère NUL)
    #[error("Feature #{index}: field `{field}` contains a NUL character")]
    InvalidText { index: usize, field: String },

    /// Impossible d'encoder la géométrie en EWKB
    #[error("Geometry encode error: {0}")]
    GeometryEncode(String),

    /// EWKB stocké illisible
    #[error("Geometry decode error: {0}")]
    GeometryDecode(String),
}

impl FeedError {
    /// Crée une erreur de flux mal formé
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFeed(reason.into())
    }

    /// Crée une erreur de type de champ
    pub fn type_mismatch(
        index: usize,
        field: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::FieldTypeMismatch {
            index,
            field: field.into(),
            expected,
            found: json_type_name(found),
        }
    }

    /// Crée une erreur de champ manquant
    pub fn missing(index: usize, field: impl Into<String>) -> Self {
        Self::MissingField {
            index,
            field: field.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::GeometryDecode(reason.into())
    }

    /// Position de la feature fautive dans le flux, si l'erreur porte sur une feature
    pub fn feature_index(&self) -> Option<usize> {
        match self {
            Self::FieldTypeMismatch { index, .. }
            | Self::MissingField { index, .. }
            | Self::InvalidText { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Nom lisible du type d'une valeur JSON
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_mismatch_message() {
        let err = FeedError::type_mismatch(3, "city", "string", &json!(true));
        assert_eq!(
            err.to_string(),
            "Feature #3: field `city` expected string, found boolean"
        );
        assert_eq!(err.feature_index(), Some(3));
    }

    #[test]
    fn test_feature_index_absent_for_document_errors() {
        assert_eq!(FeedError::malformed("no features").feature_index(), None);
        assert_eq!(FeedError::decode("short").feature_index(), None);
    }
}
