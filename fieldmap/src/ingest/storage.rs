//! Client du stockage durable des uploads
//!
//! Le collaborateur externe accepte un fichier par appel (champ multipart
//! `layer`) et répond par un littéral JSON string donnant l'URL durable de
//! l'objet stocké. C'est cette URL, et non les octets d'origine, qui sert
//! ensuite d'entrée au parsing des bundles.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart;
use thiserror::Error;
use tracing::debug;

/// Erreurs de l'aller-retour stockage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected upload response: {0}")]
    UnexpectedResponse(String),
}

/// Configuration du endpoint d'upload
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_url: String,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_url: "http://localhost:3000/actions/layer-upload".into(),
            timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_url: std::env::var("LAYER_UPLOAD_URL").unwrap_or(defaults.upload_url),
            timeout_secs: std::env::var("LAYER_UPLOAD_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Stockage durable des membres d'un bundle.
///
/// `store` persiste un fichier et retourne son URL stable ; `fetch` relit
/// un objet stocké par URL.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    async fn store(&self, filename: &str, content: Vec<u8>) -> Result<String, StorageError>;

    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError>;
}

/// Client HTTP du endpoint d'upload
pub struct HttpStorage {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpStorage {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

impl BlobStore for HttpStorage {
    async fn store(&self, filename: &str, content: Vec<u8>) -> Result<String, StorageError> {
        let part = multipart::Part::bytes(content).file_name(filename.to_string());
        let form = multipart::Form::new().part("layer", part);

        let response = self
            .client
            .post(&self.config.upload_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        // La réponse est un littéral JSON string : "https://..."
        let url: String = response.json().await?;
        if url.is_empty() {
            return Err(StorageError::UnexpectedResponse(
                "empty storage URL".into(),
            ));
        }

        debug!(filename = filename, url = %url, "Stored upload");
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}
