//! Brouillon de couche et forme de handoff vers la persistance
//!
//! Le collaborateur de persistance matérialise un Layer + N Features à
//! partir d'un payload dont la forme est figée : `features` est un tableau
//! JSON *stringifié* d'objets `{ "geojson": <Feature> }`, accompagné de
//! `name`, `field` (champ d'étiquette optionnel) et `surveyId` (survey par
//! défaut optionnel).

use geolayer::CanonicalFeature;
use serde::Serialize;

/// Brouillon de couche construit par l'ingestion.
///
/// L'ordre des features est celui du parsing et n'est jamais réordonné.
#[derive(Debug, Clone)]
pub struct LayerDraft {
    pub features: Vec<CanonicalFeature>,
    pub name: String,
    pub label_field: Option<String>,
    pub default_survey_id: Option<String>,
}

/// Payload exact de l'action de création de couche
#[derive(Debug, Serialize)]
pub struct LayerCreatePayload {
    /// Tableau JSON stringifié de `{ "geojson": <Feature> }`
    pub features: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(rename = "surveyId", skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,
}

#[derive(Serialize)]
struct WrappedFeature {
    geojson: geojson::Feature,
}

impl LayerDraft {
    pub fn new(features: Vec<CanonicalFeature>, name: impl Into<String>) -> Self {
        Self {
            features,
            name: name.into(),
            label_field: None,
            default_survey_id: None,
        }
    }

    /// Sérialise le handoff de création de couche
    pub fn to_payload(&self) -> Result<LayerCreatePayload, serde_json::Error> {
        let wrapped: Vec<WrappedFeature> = self
            .features
            .iter()
            .map(|feature| WrappedFeature {
                geojson: feature.to_feature(),
            })
            .collect();

        Ok(LayerCreatePayload {
            features: serde_json::to_string(&wrapped)?,
            name: self.name.clone(),
            field: self.label_field.clone(),
            survey_id: self.default_survey_id.clone(),
        })
    }

    /// Champ d'étiquette déclaré mais absent de toutes les features
    pub fn missing_label_field(&self) -> Option<&str> {
        match self.label_field {
            Some(ref field)
                if !self
                    .features
                    .iter()
                    .any(|f| f.properties.contains_key(field)) =>
            {
                Some(field.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolayer::PropertyValue;
    use serde_json::Value;

    fn point_feature(name: &str) -> CanonicalFeature {
        CanonicalFeature {
            geometry: geojson::Geometry::new(geojson::Value::Point(vec![1.0, 2.0])),
            properties: [(
                "name".to_string(),
                PropertyValue::Text(name.to_string()),
            )]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_payload_shape() {
        let mut draft = LayerDraft::new(vec![point_feature("a"), point_feature("b")], "Sites");
        draft.default_survey_id = Some("survey-7".into());

        let payload = draft.to_payload().unwrap();
        assert_eq!(payload.name, "Sites");

        // `features` est bien du JSON stringifié
        let features: Value = serde_json::from_str(&payload.features).unwrap();
        let features = features.as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geojson"]["type"], "Feature");
        assert_eq!(features[0]["geojson"]["geometry"]["type"], "Point");
        assert_eq!(features[0]["geojson"]["properties"]["name"], "a");

        let serialized = serde_json::to_value(&payload).unwrap();
        assert_eq!(serialized["surveyId"], "survey-7");
        assert!(serialized.get("field").is_none());
    }

    #[test]
    fn test_feature_order_preserved() {
        let draft = LayerDraft::new(
            vec![point_feature("first"), point_feature("second"), point_feature("third")],
            "Ordered",
        );

        let payload = draft.to_payload().unwrap();
        let features: Value = serde_json::from_str(&payload.features).unwrap();
        let names: Vec<&str> = features
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["geojson"]["properties"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_missing_label_field() {
        let mut draft = LayerDraft::new(vec![point_feature("a")], "Sites");
        assert_eq!(draft.missing_label_field(), None);

        draft.label_field = Some("name".into());
        assert_eq!(draft.missing_label_field(), None);

        draft.label_field = Some("code".into());
        assert_eq!(draft.missing_label_field(), Some("code"));
    }
}
