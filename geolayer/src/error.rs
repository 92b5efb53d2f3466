//! Types d'erreurs pour le crate geolayer

use thiserror::Error;

/// Erreurs pouvant survenir lors du parsing d'une couche vectorielle
#[derive(Debug, Error)]
pub enum LayerError {
    /// Aucun loader ne reconnaît le fichier
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Le contenu correspond à un format mais sa structure est invalide
    #[error("Malformed {format} input: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },

    /// Type de géométrie non représentable dans le modèle canonique
    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    /// Membre obligatoire absent d'un bundle Shapefile
    #[error("Missing shapefile part: no .{0} member in bundle")]
    MissingShapefilePart(&'static str),

    /// Plusieurs membres candidats pour le même rôle dans un bundle
    #[error("Ambiguous shapefile bundle: {0}")]
    AmbiguousBundle(String),
}

impl LayerError {
    /// Crée une erreur de structure invalide avec contexte
    pub fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie non supportée
    pub fn unsupported_geometry(kind: impl Into<String>) -> Self {
        Self::UnsupportedGeometry(kind.into())
    }
}
