//! Parser GeoJSON (FeatureCollection, Feature, ou géométrie nue)
//!
//! Les trois formes d'entrée acceptées sont repliées vers la même forme
//! d'enregistrement. L'enveloppe est déstructurée ici ; la validation de la
//! géométrie elle-même revient à la normalisation.

use serde_json::{Map, Value};

use crate::types::RawRecord;
use crate::LayerError;

/// Parse un document GeoJSON en enregistrements bruts
pub fn parse(content: &str) -> Result<Vec<RawRecord>, LayerError> {
    let document: Value = serde_json::from_str(content)
        .map_err(|e| LayerError::malformed("geojson", e.to_string()))?;

    let Value::Object(mut root) = document else {
        return Err(LayerError::malformed(
            "geojson",
            "top-level value must be an object",
        ));
    };

    let kind = root
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| LayerError::malformed("geojson", "missing \"type\" member"))?
        .to_string();

    match kind.as_str() {
        "FeatureCollection" => {
            let features = match root.remove("features") {
                Some(Value::Array(features)) => features,
                _ => {
                    return Err(LayerError::malformed(
                        "geojson",
                        "FeatureCollection without a \"features\" array",
                    ))
                }
            };
            features.into_iter().map(feature_to_record).collect()
        }
        "Feature" => Ok(vec![feature_to_record(Value::Object(root))?]),
        // Géométrie nue ; un "type" inconnu sera rejeté à la normalisation
        _ => Ok(vec![RawRecord {
            geometry: Some(Value::Object(root)),
            properties: Map::new(),
        }]),
    }
}

/// Déstructure un objet Feature en enregistrement brut
fn feature_to_record(feature: Value) -> Result<RawRecord, LayerError> {
    let Value::Object(mut members) = feature else {
        return Err(LayerError::malformed(
            "geojson",
            "features must be objects",
        ));
    };

    if members.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err(LayerError::malformed(
            "geojson",
            "feature without \"type\": \"Feature\"",
        ));
    }

    let geometry = match members.remove("geometry") {
        Some(Value::Null) | None => None,
        Some(geometry) => Some(geometry),
    };

    let properties = match members.remove("properties") {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => Map::new(),
        Some(_) => {
            return Err(LayerError::malformed(
                "geojson",
                "\"properties\" must be an object or null",
            ))
        }
    };

    Ok(RawRecord {
        geometry,
        properties,
    })
}
