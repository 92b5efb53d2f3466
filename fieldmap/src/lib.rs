//! # fieldmap
//!
//! Ingestion de couches géospatiales pour les relevés terrain, et machine
//! à états de complétion des assignments de survey.
//!
//! ## Features
//!
//! - Orchestration des uploads mono- et multi-fichiers (bundles Shapefile
//!   stagés vers un stockage durable)
//! - Construction du payload de création de couche remis à la persistance
//! - Complétion conditionnelle et idempotente des assignments
//! - CLI d'ingestion locale
//!
//! ## Usage CLI
//!
//! ```bash
//! # Fichier unique
//! fieldmap ingest --files sites.geojson --name "Sites" --survey survey-7
//!
//! # Bundle Shapefile
//! fieldmap ingest --files parcels.shp parcels.dbf parcels.shx --name "Parcels"
//! ```

pub mod assign;
pub mod cli;
pub mod ingest;
pub mod report;

pub use assign::{AssignmentCompletionService, CompletionError, CompletionEvent};
pub use ingest::draft::LayerDraft;
pub use ingest::{IngestError, RawUploadFile};
pub use report::IngestReport;
