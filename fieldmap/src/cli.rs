//! Définition et implémentation des commandes CLI
//!
//! `ingest` : fichiers de couche -> payload de création de couche, sans
//! record store. Par défaut les fichiers sont lus et parsés localement ;
//! avec `--remote`, les bundles passent par le endpoint d'upload comme en
//! production.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use crate::ingest::storage::{HttpStorage, StorageConfig};
use crate::ingest::{self, RawUploadFile};
use crate::ingest::draft::LayerDraft;
use crate::report::IngestReport;

#[derive(Subcommand)]
pub enum Commands {
    /// Parse layer files into a layer-create payload (no record store required)
    Ingest {
        /// Input files: a single KML/GeoJSON file, or a shapefile sidecar set
        #[arg(short, long, num_args = 1.., required = true)]
        files: Vec<PathBuf>,

        /// Layer name
        #[arg(short, long)]
        name: String,

        /// Label field (optional)
        #[arg(long)]
        field: Option<String>,

        /// Default survey id (optional)
        #[arg(long)]
        survey: Option<String>,

        /// Write the payload to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stage bundle members through the upload endpoint (env: LAYER_UPLOAD_URL)
        #[arg(long)]
        remote: bool,
    },
}

/// Exécute la commande ingest
pub async fn cmd_ingest(
    files: &[PathBuf],
    name: String,
    field: Option<String>,
    survey: Option<String>,
    output: Option<&Path>,
    remote: bool,
) -> Result<()> {
    let started_at = Instant::now();

    let uploads = read_files(files)?;
    info!(files = uploads.len(), name = name.as_str(), "Starting ingest");

    let features = if remote {
        let config = StorageConfig::from_env();
        info!(upload_url = config.upload_url.as_str(), "Staging through upload endpoint");
        let storage = HttpStorage::new(config)?;
        ingest::ingest(&storage, uploads).await?
    } else {
        ingest_local(uploads)?
    };

    let draft = LayerDraft {
        features,
        name,
        label_field: field,
        default_survey_id: survey,
    };

    let mut report = IngestReport::new(&draft.name);
    report.record_features(&draft.features);
    if let Some(field) = draft.missing_label_field() {
        report.record_warning(format!(
            "label field '{}' not present in any feature",
            field
        ));
    }

    let payload = draft.to_payload()?;
    let json = serde_json::to_string_pretty(&payload)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .context(format!("Failed to write payload to {}", path.display()))?;
            info!(path = %path.display(), "Payload written");
        }
        None => println!("{json}"),
    }

    report.set_duration(started_at.elapsed());
    report.display();

    Ok(())
}

/// Chemin local : mêmes parsers, sans aller-retour stockage
fn ingest_local(uploads: Vec<RawUploadFile>) -> Result<Vec<geolayer::CanonicalFeature>> {
    let features = match uploads.len() {
        0 => anyhow::bail!("No input files"),
        1 => geolayer::parse_file(&uploads[0].filename, &uploads[0].content)?,
        _ => geolayer::parse_bundle(
            uploads
                .into_iter()
                .map(|u| (u.filename, u.content))
                .collect(),
        )?,
    };

    Ok(features)
}

fn read_files(paths: &[PathBuf]) -> Result<Vec<RawUploadFile>> {
    paths
        .iter()
        .map(|path| {
            let content = std::fs::read(path)
                .context(format!("Cannot read {}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("upload")
                .to_string();
            Ok(RawUploadFile::new(filename, content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_local_single_geojson() {
        let content = br#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {"n": "a"}}
        ]}"#;

        let uploads = vec![RawUploadFile::new("layer.geojson", content.to_vec())];
        let features = ingest_local(uploads).unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn test_ingest_local_empty() {
        assert!(ingest_local(Vec::new()).is_err());
    }
}
