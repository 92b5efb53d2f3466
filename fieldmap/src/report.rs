//! Rapport d'ingestion
//!
//! Collecte et affiche le résultat d'une ingestion : comptes par type de
//! géométrie et warnings non fatals (une erreur, elle, abandonne le lot).

use std::collections::HashMap;
use std::time::Duration;

use geolayer::CanonicalFeature;
use serde::Serialize;

/// Rapport d'une ingestion de couche
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Nom de la couche
    pub layer_name: String,

    /// Durée de l'ingestion
    pub duration_secs: f64,

    /// Nombre total de features produites
    pub features: usize,

    /// Comptes par type de géométrie
    pub by_geometry: HashMap<String, usize>,

    /// Warnings non fatals
    pub warnings: Vec<String>,
}

impl IngestReport {
    pub fn new(layer_name: &str) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            ..Default::default()
        }
    }

    /// Enregistre les features produites
    pub fn record_features(&mut self, features: &[CanonicalFeature]) {
        self.features += features.len();
        for feature in features {
            *self
                .by_geometry
                .entry(geometry_kind(&feature.geometry.value).to_string())
                .or_default() += 1;
        }
    }

    /// Enregistre un warning
    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("INGEST REPORT - {}", self.layer_name);
        println!("{}", "=".repeat(60));

        println!("\nFeatures: {}", self.features);
        println!("Duration: {:.2}s", self.duration_secs);

        if !self.by_geometry.is_empty() {
            println!("\n--- BY GEOMETRY ---");
            let mut kinds: Vec<_> = self.by_geometry.iter().collect();
            kinds.sort_by_key(|(k, _)| k.as_str());
            for (kind, count) in kinds {
                println!("  {}: {}", kind, count);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for warning in &self.warnings {
                println!("  {}", warning);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        format!(
            "{}: {} features, {} warnings",
            self.layer_name,
            self.features,
            self.warnings.len()
        )
    }
}

/// Nom du type d'une géométrie GeoJSON
fn geometry_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
