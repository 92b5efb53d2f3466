//! Assemblage d'un document Shapefile multi-fichiers
//!
//! Un document Shapefile est un ensemble de fichiers co-dépendants
//! (`.shp`, `.dbf`, `.shx`, ...). Seuls le `.shp` (géométries, obligatoire)
//! et le `.dbf` (attributs, optionnel) participent au parsing ; les autres
//! membres sont conservés mais inertes.

use serde_json::Map;
use tracing::debug;

use crate::detect::ShapefilePart;
use crate::parser;
use crate::types::RawRecord;
use crate::LayerError;

/// Un fichier membre d'un bundle, classé par rôle
#[derive(Debug)]
pub struct BundleMember {
    pub filename: String,
    pub part: ShapefilePart,
    pub content: Vec<u8>,
}

/// L'ensemble des fichiers stagés d'un document Shapefile
#[derive(Debug)]
pub struct ShapefileBundle {
    members: Vec<BundleMember>,
}

impl ShapefileBundle {
    /// Construit un bundle depuis des fichiers stagés (nom, contenu)
    pub fn new(files: Vec<(String, Vec<u8>)>) -> Self {
        let members = files
            .into_iter()
            .map(|(filename, content)| {
                let part = ShapefilePart::from_filename(&filename);
                BundleMember {
                    filename,
                    part,
                    content,
                }
            })
            .collect();

        Self { members }
    }

    /// Sélectionne l'unique membre `.shp`.
    ///
    /// Repli explicite sur tout le lot : zéro candidat est une erreur,
    /// plusieurs candidats aussi (pas de « dernier gagne »).
    pub fn shp(&self) -> Result<&BundleMember, LayerError> {
        self.unique_member(ShapefilePart::Shp)?
            .ok_or(LayerError::MissingShapefilePart("shp"))
    }

    /// Sélectionne l'unique membre `.dbf`, s'il existe
    pub fn dbf(&self) -> Result<Option<&BundleMember>, LayerError> {
        self.unique_member(ShapefilePart::Dbf)
    }

    fn unique_member(&self, part: ShapefilePart) -> Result<Option<&BundleMember>, LayerError> {
        let mut candidates = self.members.iter().filter(|m| m.part == part);

        match (candidates.next(), candidates.next()) {
            (None, _) => Ok(None),
            (Some(member), None) => Ok(Some(member)),
            (Some(first), Some(second)) => Err(LayerError::AmbiguousBundle(format!(
                "both {} and {} claim the same role",
                first.filename, second.filename
            ))),
        }
    }

    /// Parse le bundle : géométries du `.shp` appariées positionnellement
    /// aux attributs du `.dbf`.
    ///
    /// # Errors
    ///
    /// `MissingShapefilePart` sans membre `.shp` ; `Malformed` si les
    /// comptes d'enregistrements géométrie/attributs divergent.
    pub fn parse(&self) -> Result<Vec<RawRecord>, LayerError> {
        let shp = self.shp()?;
        let geometries = parser::shp::parse(&shp.content)?;

        let attributes = match self.dbf()? {
            Some(member) => Some(parser::dbf::parse(&member.content)?),
            // Les attributs sont optionnels, la géométrie non
            None => None,
        };

        debug!(
            shp = shp.filename.as_str(),
            geometries = geometries.len(),
            attributes = attributes.as_ref().map(|a| a.len()),
            "Parsed shapefile bundle"
        );

        let records = match attributes {
            Some(rows) => {
                if rows.len() != geometries.len() {
                    return Err(LayerError::malformed(
                        "shapefile",
                        format!(
                            "{} geometry records but {} attribute records",
                            geometries.len(),
                            rows.len()
                        ),
                    ));
                }
                geometries
                    .into_iter()
                    .zip(rows)
                    .map(|(geometry, properties)| RawRecord {
                        geometry,
                        properties,
                    })
                    .collect()
            }
            None => geometries
                .into_iter()
                .map(|geometry| RawRecord {
                    geometry,
                    properties: Map::new(),
                })
                .collect(),
        };

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dbf::test_support as dbf_fixture;
    use crate::parser::shp::test_support as shp_fixture;

    fn point_shp(count: usize) -> Vec<u8> {
        let contents: Vec<Vec<u8>> = (0..count)
            .map(|i| shp_fixture::point_content(i as f64, i as f64))
            .collect();
        shp_fixture::file(&contents)
    }

    #[test]
    fn test_parse_with_attributes() {
        let shp = point_shp(2);
        let dbf = dbf_fixture::file(
            &[("NAME", b'C', 8)],
            &[vec!["first"], vec!["second"]],
        );

        let bundle = ShapefileBundle::new(vec![
            ("sites.shp".to_string(), shp),
            ("sites.dbf".to_string(), dbf),
        ]);

        let records = bundle.parse().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].properties.get("NAME").unwrap(), "first");
        assert_eq!(records[1].properties.get("NAME").unwrap(), "second");
    }

    #[test]
    fn test_parse_geometry_only() {
        let bundle = ShapefileBundle::new(vec![("sites.shp".to_string(), point_shp(3))]);

        let records = bundle.parse().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.properties.is_empty()));
    }

    #[test]
    fn test_count_mismatch() {
        let shp = point_shp(2);
        let dbf = dbf_fixture::file(&[("NAME", b'C', 8)], &[vec!["only one"]]);

        let bundle = ShapefileBundle::new(vec![
            ("sites.shp".to_string(), shp),
            ("sites.dbf".to_string(), dbf),
        ]);

        assert!(matches!(
            bundle.parse(),
            Err(LayerError::Malformed {
                format: "shapefile",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_shp() {
        let dbf = dbf_fixture::file(&[("NAME", b'C', 8)], &[vec!["x"]]);
        let bundle = ShapefileBundle::new(vec![("sites.dbf".to_string(), dbf)]);

        assert!(matches!(
            bundle.parse(),
            Err(LayerError::MissingShapefilePart("shp"))
        ));
    }

    #[test]
    fn test_ambiguous_shp() {
        let bundle = ShapefileBundle::new(vec![
            ("a.shp".to_string(), point_shp(1)),
            ("b.shp".to_string(), point_shp(1)),
        ]);

        assert!(matches!(bundle.parse(), Err(LayerError::AmbiguousBundle(_))));
    }

    #[test]
    fn test_sidecars_are_inert() {
        let bundle = ShapefileBundle::new(vec![
            ("sites.shp".to_string(), point_shp(1)),
            ("sites.prj".to_string(), b"PROJCS[...]".to_vec()),
            ("sites.cpg".to_string(), b"UTF-8".to_vec()),
        ]);

        assert_eq!(bundle.parse().unwrap().len(), 1);
    }
}
