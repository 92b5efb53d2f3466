//! Types de données pour le crate geolayer

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Enregistrement brut produit par un parser de format.
///
/// La géométrie est un objet GeoJSON non encore validé (les parsers KML et
/// Shapefile la construisent, le parser GeoJSON la recopie telle quelle).
/// `None` signifie que la source ne portait pas de géométrie (shape Null
/// d'un `.shp`, placemark non ancré) : c'est la normalisation qui tranche.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Objet géométrie GeoJSON brut
    pub geometry: Option<Value>,

    /// Attributs bruts (valeurs JSON arbitraires)
    pub properties: Map<String, Value>,
}

/// Valeur scalaire d'une propriété canonique
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Convertit en valeur JSON
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropertyValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Une feature canonique : géométrie GeoJSON valide + propriétés scalaires.
///
/// C'est la monnaie d'échange unique vers laquelle tous les parsers
/// convergent. Invariants : la géométrie est l'un des types GeoJSON
/// (Point, LineString, Polygon, Multi*, GeometryCollection), les clés de
/// propriétés sont uniques et les valeurs sont des scalaires.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalFeature {
    /// Géométrie GeoJSON validée
    pub geometry: geojson::Geometry,

    /// Propriétés scalaires (clé -> valeur), ordre de clés stable
    pub properties: BTreeMap<String, PropertyValue>,
}

impl CanonicalFeature {
    /// Convertit en `geojson::Feature` pour la sérialisation de sortie
    pub fn to_feature(&self) -> geojson::Feature {
        let mut properties = Map::with_capacity(self.properties.len());
        for (key, value) in &self.properties {
            properties.insert(key.clone(), value.to_json());
        }

        geojson::Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}
