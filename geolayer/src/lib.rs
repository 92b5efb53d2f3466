//! # geolayer
//!
//! Parser de couches vectorielles (KML, GeoJSON, Shapefile) vers une
//! représentation canonique : géométrie GeoJSON + propriétés scalaires.
//!
//! ## Features
//!
//! - Détection de format par contenu (magic number, racine XML, structure
//!   JSON), l'extension ne servant que d'indice
//! - Trois parsers atomiques sur contenu bufferisé : GeoJSON, KML,
//!   Shapefile binaire (`.shp` + `.dbf`)
//! - Réassemblage des bundles Shapefile multi-fichiers avec sélection
//!   explicite du membre d'entrée
//! - Normalisation fermée : géométries validées par schéma, propriétés
//!   ramenées à des scalaires
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geolayer::parse_file;
//!
//! let features = parse_file("sites.geojson", &content)?;
//! for feature in &features {
//!     println!("{:?}", feature.geometry.value);
//! }
//! ```

pub mod bundle;
pub mod detect;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod types;

pub use bundle::ShapefileBundle;
pub use detect::{detect, detect_batch, DetectedFormat, ShapefilePart};
pub use error::LayerError;
pub use types::{CanonicalFeature, PropertyValue, RawRecord};

/// Parse un fichier unique en features canoniques.
///
/// Le format est détecté depuis le contenu et le nom. Un contenu reconnu
/// comme Shapefile est parsé en géométries seules : un fichier unique ne
/// peut pas porter de `.dbf`, les propriétés sortent vides.
///
/// # Errors
///
/// `UnsupportedFormat` si aucun loader ne correspond, puis les erreurs du
/// parser retenu (`Malformed`, `UnsupportedGeometry`, ...).
pub fn parse_file(filename: &str, content: &[u8]) -> Result<Vec<CanonicalFeature>, LayerError> {
    let format = detect::detect(filename, content)?;

    let records = match format {
        DetectedFormat::Kml => {
            let text = std::str::from_utf8(content)
                .map_err(|e| LayerError::malformed("kml", e.to_string()))?;
            parser::kml::parse(text)?
        }
        DetectedFormat::GeoJson => {
            let text = std::str::from_utf8(content)
                .map_err(|e| LayerError::malformed("geojson", e.to_string()))?;
            parser::geojson::parse(text)?
        }
        DetectedFormat::Shapefile { .. } => parser::shp::parse(content)?
            .into_iter()
            .map(|geometry| RawRecord {
                geometry,
                properties: serde_json::Map::new(),
            })
            .collect(),
    };

    normalize::normalize(records)
}

/// Parse un bundle Shapefile multi-fichiers en features canoniques
pub fn parse_bundle(files: Vec<(String, Vec<u8>)>) -> Result<Vec<CanonicalFeature>, LayerError> {
    let records = ShapefileBundle::new(files).parse()?;
    normalize::normalize(records)
}
