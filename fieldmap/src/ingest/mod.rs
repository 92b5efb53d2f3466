//! Orchestration de l'ingestion d'une couche
//!
//! Le comportement bifurque sur le nombre de fichiers d'une action
//! d'upload. Un seul fichier : détection et parsing immédiats, depuis ses
//! propres octets. Plusieurs fichiers : bundle Shapefile, chaque membre
//! est stagé séquentiellement vers le stockage durable (dans l'ordre de
//! soumission), puis les membres d'entrée sont relus depuis leurs URLs
//! stables avant parsing.
//!
//! Tout échec d'ingestion abandonne l'upload entier : aucun brouillon
//! partiel ne sort d'ici. Les objets déjà stockés au moment d'un échec ne
//! sont pas nettoyés ; ce nettoyage appartient au collaborateur stockage.

pub mod draft;
pub mod storage;

use std::path::Path;

use geolayer::{CanonicalFeature, LayerError};
use thiserror::Error;
use tracing::info;

use storage::{BlobStore, StorageError};

/// Fichier brut reçu d'une action d'upload
#[derive(Debug, Clone)]
pub struct RawUploadFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl RawUploadFile {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// Erreurs du pipeline d'ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// L'aller-retour stockage a échoué pour un membre du lot
    #[error("Upload failed for {filename}: {source}")]
    UploadFailed {
        filename: String,
        source: StorageError,
    },
}

/// Ingère un lot de fichiers uploadés en une liste canonique de features.
///
/// # Errors
///
/// Toute erreur abandonne le lot entier ; voir [`IngestError`].
pub async fn ingest<S: BlobStore>(
    store: &S,
    files: Vec<RawUploadFile>,
) -> Result<Vec<CanonicalFeature>, IngestError> {
    match files.len() {
        0 => Err(LayerError::UnsupportedFormat("empty upload".into()).into()),
        1 => ingest_single(&files[0]),
        _ => ingest_bundle(store, files).await,
    }
}

/// Un seul fichier : parsing immédiat depuis ses propres octets
fn ingest_single(file: &RawUploadFile) -> Result<Vec<CanonicalFeature>, IngestError> {
    info!(
        filename = file.filename.as_str(),
        bytes = file.content.len(),
        "Ingesting single file"
    );

    Ok(geolayer::parse_file(&file.filename, &file.content)?)
}

/// Plusieurs fichiers : staging séquentiel puis relecture depuis le stockage
async fn ingest_bundle<S: BlobStore>(
    store: &S,
    files: Vec<RawUploadFile>,
) -> Result<Vec<CanonicalFeature>, IngestError> {
    // Classification préalable du lot : sans membre .shp, inutile de stager
    geolayer::detect_batch(files.iter().map(|f| f.filename.as_str()))?;

    let mut stored_urls = Vec::with_capacity(files.len());
    for file in files {
        let url = store
            .store(&file.filename, file.content)
            .await
            .map_err(|source| IngestError::UploadFailed {
                filename: file.filename.clone(),
                source,
            })?;
        info!(filename = file.filename.as_str(), url = %url, "Staged bundle member");
        stored_urls.push(url);
    }

    // Repli explicite sur le lot stocké : l'unique URL en .shp est l'entrée
    // canonique, l'unique URL en .dbf (si présente) porte les attributs
    let shp_url = unique_url_by_extension(&stored_urls, "shp")?
        .ok_or(LayerError::MissingShapefilePart("shp"))?;
    let dbf_url = unique_url_by_extension(&stored_urls, "dbf")?;

    let mut members = vec![(url_filename(shp_url), fetch_member(store, shp_url).await?)];
    if let Some(dbf_url) = dbf_url {
        members.push((url_filename(dbf_url), fetch_member(store, dbf_url).await?));
    }

    let features = geolayer::parse_bundle(members)?;
    info!(features = features.len(), "Parsed shapefile bundle from storage");
    Ok(features)
}

async fn fetch_member<S: BlobStore>(store: &S, url: &str) -> Result<Vec<u8>, IngestError> {
    store
        .fetch(url)
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|source| IngestError::UploadFailed {
            filename: url.to_string(),
            source,
        })
}

/// Sélectionne l'unique URL du lot portant l'extension donnée.
///
/// Zéro candidat rend `None` ; plusieurs candidats est un lot ambigu,
/// jamais un « dernier gagne ».
fn unique_url_by_extension<'a>(
    urls: &'a [String],
    extension: &str,
) -> Result<Option<&'a str>, LayerError> {
    let mut candidates = urls
        .iter()
        .filter(|url| url_extension(url).as_deref() == Some(extension));

    match (candidates.next(), candidates.next()) {
        (None, _) => Ok(None),
        (Some(url), None) => Ok(Some(url)),
        (Some(first), Some(second)) => Err(LayerError::AmbiguousBundle(format!(
            "both {first} and {second} end in .{extension}"
        ))),
    }
}

/// Extension (minuscule) du dernier segment de chemin d'une URL
fn url_extension(url: &str) -> Option<String> {
    Path::new(url_filename(url).as_str())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Dernier segment de chemin d'une URL, sans query string ni fragment
fn url_filename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}
