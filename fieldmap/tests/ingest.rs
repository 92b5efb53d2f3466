//! Tests d'intégration de l'orchestration d'ingestion, sur un stockage factice

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use fieldmap::ingest::storage::{BlobStore, StorageError};
use fieldmap::ingest::{ingest, IngestError, RawUploadFile};
use geolayer::LayerError;

/// Stockage en mémoire, avec panne optionnelle sur un nom de fichier
#[derive(Default)]
struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    store_log: Mutex<Vec<String>>,
    fetch_log: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl MockStorage {
    fn failing_on(filename: &str) -> Self {
        Self {
            fail_on: Some(filename.to_string()),
            ..Default::default()
        }
    }

    fn stored(&self) -> Vec<String> {
        self.store_log.lock().unwrap().clone()
    }

    fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }
}

impl BlobStore for MockStorage {
    async fn store(&self, filename: &str, content: Vec<u8>) -> Result<String, StorageError> {
        if self.fail_on.as_deref() == Some(filename) {
            return Err(StorageError::UnexpectedResponse(format!(
                "storage rejected {filename}"
            )));
        }

        let url = format!("https://cdn.example.com/uploads/{filename}");
        self.objects.lock().unwrap().insert(url.clone(), content);
        self.store_log.lock().unwrap().push(filename.to_string());
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError> {
        self.fetch_log.lock().unwrap().push(url.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .map(|content| Bytes::from(content.clone()))
            .ok_or_else(|| StorageError::UnexpectedResponse(format!("no object at {url}")))
    }
}

/// Construit un .shp synthétique de points
fn shp_points(coordinates: &[(f64, f64)]) -> Vec<u8> {
    let mut file = vec![0u8; 100];
    file[..4].copy_from_slice(&9994i32.to_be_bytes());
    file[28..32].copy_from_slice(&1000i32.to_le_bytes());

    for (index, (x, y)) in coordinates.iter().enumerate() {
        file.extend_from_slice(&(index as i32 + 1).to_be_bytes());
        file.extend_from_slice(&10i32.to_be_bytes());
        file.extend_from_slice(&1i32.to_le_bytes());
        file.extend_from_slice(&x.to_le_bytes());
        file.extend_from_slice(&y.to_le_bytes());
    }

    file
}

/// Construit un .dbf synthétique à un champ texte
fn dbf_names(values: &[&str]) -> Vec<u8> {
    const WIDTH: usize = 16;
    let mut file = vec![0u8; 32];
    file[0] = 0x03;
    file[4..8].copy_from_slice(&(values.len() as u32).to_le_bytes());
    file[8..10].copy_from_slice(&65u16.to_le_bytes());
    file[10..12].copy_from_slice(&((1 + WIDTH) as u16).to_le_bytes());

    let mut descriptor = [0u8; 32];
    descriptor[..4].copy_from_slice(b"NAME");
    descriptor[11] = b'C';
    descriptor[16] = WIDTH as u8;
    file.extend_from_slice(&descriptor);
    file.push(0x0D);

    for value in values {
        file.push(b' ');
        let mut cell = vec![b' '; WIDTH];
        cell[..value.len()].copy_from_slice(value.as_bytes());
        file.extend_from_slice(&cell);
    }

    file
}

#[tokio::test]
async fn test_single_file_never_touches_storage() {
    let storage = MockStorage::default();
    let content = br#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {"n": "a"}}
    ]}"#;

    let files = vec![RawUploadFile::new("layer.geojson", content.to_vec())];
    let features = ingest(&storage, files).await.unwrap();

    assert_eq!(features.len(), 1);
    assert!(storage.stored().is_empty());
    assert!(storage.fetched().is_empty());
}

#[tokio::test]
async fn test_bundle_staged_in_order_then_fetched() {
    let storage = MockStorage::default();
    let files = vec![
        RawUploadFile::new("parcels.shx", vec![0u8; 8]),
        RawUploadFile::new("parcels.shp", shp_points(&[(0.0, 0.0), (1.0, 1.0)])),
        RawUploadFile::new("parcels.dbf", dbf_names(&["north", "south"])),
    ];

    let features = ingest(&storage, files).await.unwrap();

    // Tous les membres sont stagés, dans l'ordre de soumission
    assert_eq!(
        storage.stored(),
        vec!["parcels.shx", "parcels.shp", "parcels.dbf"]
    );

    // L'entrée canonique et les attributs sont relus depuis le stockage
    assert_eq!(
        storage.fetched(),
        vec![
            "https://cdn.example.com/uploads/parcels.shp",
            "https://cdn.example.com/uploads/parcels.dbf"
        ]
    );

    assert_eq!(features.len(), 2);
    assert_eq!(
        features[0].properties.get("NAME"),
        Some(&geolayer::PropertyValue::Text("north".into()))
    );
    assert_eq!(
        features[1].properties.get("NAME"),
        Some(&geolayer::PropertyValue::Text("south".into()))
    );
}

#[tokio::test]
async fn test_storage_failure_aborts_without_rollback() {
    let storage = MockStorage::failing_on("parcels.dbf");
    let files = vec![
        RawUploadFile::new("parcels.shp", shp_points(&[(0.0, 0.0)])),
        RawUploadFile::new("parcels.dbf", dbf_names(&["x"])),
        RawUploadFile::new("parcels.shx", vec![0u8; 8]),
    ];

    let result = ingest(&storage, files).await;
    assert!(matches!(
        result,
        Err(IngestError::UploadFailed { ref filename, .. }) if filename == "parcels.dbf"
    ));

    // Le membre déjà stocké reste en place ; rien n'a été relu ni parsé
    assert_eq!(storage.stored(), vec!["parcels.shp"]);
    assert!(storage.fetched().is_empty());
}

#[tokio::test]
async fn test_batch_without_shp_fails_before_staging() {
    let storage = MockStorage::default();
    let files = vec![
        RawUploadFile::new("parcels.dbf", dbf_names(&["x"])),
        RawUploadFile::new("parcels.shx", vec![0u8; 8]),
    ];

    let result = ingest(&storage, files).await;
    assert!(matches!(
        result,
        Err(IngestError::Layer(LayerError::MissingShapefilePart("shp")))
    ));
    assert!(storage.stored().is_empty());
}

#[tokio::test]
async fn test_ambiguous_bundle_rejected() {
    let storage = MockStorage::default();
    let files = vec![
        RawUploadFile::new("north.shp", shp_points(&[(0.0, 0.0)])),
        RawUploadFile::new("south.shp", shp_points(&[(1.0, 1.0)])),
    ];

    let result = ingest(&storage, files).await;
    assert!(matches!(
        result,
        Err(IngestError::Layer(LayerError::AmbiguousBundle(_)))
    ));
}

#[tokio::test]
async fn test_bundle_count_mismatch_surfaces_malformed() {
    let storage = MockStorage::default();
    let files = vec![
        RawUploadFile::new("parcels.shp", shp_points(&[(0.0, 0.0), (1.0, 1.0)])),
        RawUploadFile::new("parcels.dbf", dbf_names(&["only one"])),
    ];

    let result = ingest(&storage, files).await;
    assert!(matches!(
        result,
        Err(IngestError::Layer(LayerError::Malformed { .. }))
    ));
}

#[tokio::test]
async fn test_empty_upload_is_unsupported() {
    let storage = MockStorage::default();
    let result = ingest(&storage, Vec::new()).await;
    assert!(matches!(
        result,
        Err(IngestError::Layer(LayerError::UnsupportedFormat(_)))
    ));
}
