//! Détection du format d'un fichier vectoriel
//!
//! La détection privilégie le contenu (magic number Shapefile, élément
//! racine XML, structure JSON) sur l'extension : les noms des fichiers
//! uploadés ne sont pas fiables. L'extension ne sert que d'indice de
//! départage entre les candidats texte ambigus.

use std::collections::BTreeSet;
use std::path::Path;

use memchr::memmem;

use crate::LayerError;

/// Magic number d'un fichier .shp (big-endian, offset 0)
const SHP_FILE_CODE: u32 = 9994;

/// Fenêtre de recherche pour les signatures texte
const SNIFF_WINDOW: usize = 1024;

/// Format détecté pour un fichier (ou un lot de fichiers)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedFormat {
    Kml,
    GeoJson,
    /// Document Shapefile avec les rôles de membres observés dans le lot
    Shapefile {
        required_parts: BTreeSet<ShapefilePart>,
    },
}

/// Rôle d'un fichier membre d'un bundle Shapefile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShapefilePart {
    /// Géométries binaires (obligatoire)
    Shp,
    /// Index des enregistrements
    Shx,
    /// Attributs dBASE
    Dbf,
    /// Projection
    Prj,
    /// Tout autre sidecar (.cpg, .sbn, ...)
    Other,
}

impl ShapefilePart {
    /// Classe un nom de fichier selon son extension
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension.to_ascii_lowercase().as_str() {
            "shp" => Self::Shp,
            "shx" => Self::Shx,
            "dbf" => Self::Dbf,
            "prj" => Self::Prj,
            _ => Self::Other,
        }
    }
}

/// Détecte le format d'un fichier unique depuis son contenu et son nom.
///
/// # Errors
///
/// Retourne `UnsupportedFormat` si ni une signature de contenu ni
/// l'extension ne désignent un loader connu.
pub fn detect(filename: &str, content: &[u8]) -> Result<DetectedFormat, LayerError> {
    if is_shapefile(content) {
        return Ok(DetectedFormat::Shapefile {
            required_parts: BTreeSet::from([ShapefilePart::Shp]),
        });
    }

    // Les candidats texte exigent de l'UTF-8 valide
    if simdutf8::basic::from_utf8(content).is_ok() {
        if sniff_kml(content) {
            return Ok(DetectedFormat::Kml);
        }
        if sniff_geojson(content) {
            return Ok(DetectedFormat::GeoJson);
        }

        // Signatures muettes : l'extension tranche
        if let Some(format) = extension_hint(filename) {
            return Ok(format);
        }
    }

    Err(LayerError::UnsupportedFormat(filename.to_string()))
}

/// Classe un lot de fichiers uploadés ensemble.
///
/// Le lot forme un document Shapefile dès qu'un membre se résout en `.shp` ;
/// sinon il n'a pas de membre d'entrée exploitable.
pub fn detect_batch<'a, I>(filenames: I) -> Result<DetectedFormat, LayerError>
where
    I: IntoIterator<Item = &'a str>,
{
    let parts: BTreeSet<ShapefilePart> = filenames
        .into_iter()
        .map(ShapefilePart::from_filename)
        .collect();

    if parts.contains(&ShapefilePart::Shp) {
        Ok(DetectedFormat::Shapefile {
            required_parts: parts,
        })
    } else {
        Err(LayerError::MissingShapefilePart("shp"))
    }
}

/// Vérifie le magic number Shapefile (9994 big-endian)
fn is_shapefile(content: &[u8]) -> bool {
    content.len() >= 4 && u32::from_be_bytes([content[0], content[1], content[2], content[3]]) == SHP_FILE_CODE
}

/// Un document KML : du XML dont la racine (ou un élément proche) est `<kml>`
fn sniff_kml(content: &[u8]) -> bool {
    let window = &content[..content.len().min(SNIFF_WINDOW)];

    if first_meaningful_byte(window) != Some(b'<') {
        return false;
    }

    memmem::find(window, b"<kml").is_some() || memmem::find(window, b"<Placemark").is_some()
}

/// Un document GeoJSON : un objet JSON top-level portant un membre "type"
fn sniff_geojson(content: &[u8]) -> bool {
    let window = &content[..content.len().min(SNIFF_WINDOW)];

    first_meaningful_byte(window) == Some(b'{') && memmem::find(window, b"\"type\"").is_some()
}

/// Premier octet significatif (hors espaces et BOM UTF-8)
fn first_meaningful_byte(content: &[u8]) -> Option<u8> {
    let content = content.strip_prefix(b"\xef\xbb\xbf").unwrap_or(content);
    content
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace())
}

/// Indice d'extension pour les contenus texte sans signature claire
fn extension_hint(filename: &str) -> Option<DetectedFormat> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();

    match extension.as_str() {
        "kml" => Some(DetectedFormat::Kml),
        "geojson" | "json" => Some(DetectedFormat::GeoJson),
        _ => None,
    }
}
