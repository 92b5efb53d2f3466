//! Parsers par format source
//!
//! Chaque parser convertit un contenu entièrement bufferisé en une séquence
//! ordonnée d'enregistrements bruts ([`crate::types::RawRecord`]). Le
//! parsing est atomique : tout le fichier passe, ou l'opération échoue.

pub mod dbf;
pub mod geojson;
pub mod kml;
pub mod shp;
