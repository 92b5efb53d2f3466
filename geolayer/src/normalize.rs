//! Normalisation des enregistrements bruts en features canoniques
//!
//! Deux responsabilités : la validation par schéma des objets géométrie
//! (désérialisation fermée vers les types GeoJSON connus) et la coercition
//! des valeurs de propriétés en scalaires. Les structures imbriquées sont
//! sérialisées en chaîne plutôt que perdues. L'ordre des enregistrements
//! n'est jamais modifié.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{CanonicalFeature, PropertyValue, RawRecord};
use crate::LayerError;

/// Les types de géométrie GeoJSON représentables
const GEOMETRY_KINDS: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Normalise une séquence d'enregistrements, dans l'ordre
pub fn normalize(records: Vec<RawRecord>) -> Result<Vec<CanonicalFeature>, LayerError> {
    records.into_iter().map(normalize_record).collect()
}

fn normalize_record(record: RawRecord) -> Result<CanonicalFeature, LayerError> {
    let raw_geometry = record
        .geometry
        .ok_or_else(|| LayerError::unsupported_geometry("record without geometry"))?;

    let geometry = validate_geometry(raw_geometry)?;

    let mut properties = BTreeMap::new();
    for (key, value) in record.properties {
        properties.insert(key, coerce_value(value));
    }

    Ok(CanonicalFeature {
        geometry,
        properties,
    })
}

/// Désérialisation fermée d'un objet géométrie GeoJSON.
///
/// Un type hors du jeu connu est `UnsupportedGeometry` ; une structure
/// cassée pour un type connu est `Malformed`.
fn validate_geometry(raw: Value) -> Result<geojson::Geometry, LayerError> {
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    if !GEOMETRY_KINDS.contains(&kind.as_str()) {
        if kind.is_empty() {
            return Err(LayerError::unsupported_geometry("missing geometry type"));
        }
        return Err(LayerError::unsupported_geometry(kind));
    }

    serde_json::from_value(raw).map_err(|e| LayerError::malformed("geometry", e.to_string()))
}

/// Coerce une valeur JSON arbitraire en scalaire canonique
fn coerce_value(value: Value) -> PropertyValue {
    match value {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Bool(b),
        Value::Number(n) => n
            .as_f64()
            .map(PropertyValue::Number)
            .unwrap_or(PropertyValue::Null),
        Value::String(s) => PropertyValue::Text(s),
        nested @ (Value::Array(_) | Value::Object(_)) => PropertyValue::Text(nested.to_string()),
    }
}
