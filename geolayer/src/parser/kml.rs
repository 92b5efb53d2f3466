//! Parser KML (un enregistrement par placemark)
//!
//! Lecture en pull sur le document bufferisé. Les géométries supportées
//! sont Point, LineString, LinearRing, Polygon (avec trous) et
//! MultiGeometry. Les champs ExtendedData (`<Data>`/`<SimpleData>`)
//! deviennent les propriétés ; les éléments de style et de présentation
//! sont ignorés.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{json, Map, Value};

use crate::types::RawRecord;
use crate::LayerError;

/// Parse un document KML en enregistrements bruts
pub fn parse(content: &str) -> Result<Vec<RawRecord>, LayerError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut records = Vec::new();
    let mut placemark: Option<Placemark> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                if let Some(ref mut current) = placemark {
                    current.open_element(&element)?;
                } else if element.local_name().as_ref() == b"Placemark" {
                    placemark = Some(Placemark::default());
                }
            }
            Ok(Event::Empty(element)) => {
                if placemark.is_some() && element.local_name().as_ref() == b"Model" {
                    return Err(LayerError::unsupported_geometry("kml Model"));
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(ref mut current) = placemark {
                    let text = text
                        .unescape()
                        .map_err(|e| LayerError::malformed("kml", e.to_string()))?;
                    current.text(&text)?;
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(ref mut current) = placemark {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    current.text(&text)?;
                }
            }
            Ok(Event::End(element)) => {
                if element.local_name().as_ref() == b"Placemark" {
                    if let Some(done) = placemark.take() {
                        records.push(done.into_record());
                    }
                } else if let Some(ref mut current) = placemark {
                    current.close_element(element.local_name().as_ref());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(LayerError::malformed("kml", e.to_string())),
        }
    }

    Ok(records)
}

/// Cible du prochain bloc `<coordinates>`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum CoordTarget {
    #[default]
    None,
    Point,
    LineString,
    Ring,
}

/// État de construction d'un placemark
#[derive(Default)]
struct Placemark {
    /// Géométries terminées (plusieurs sous `<MultiGeometry>`)
    geometries: Vec<Value>,

    /// Anneaux du `<Polygon>` en cours, dans l'ordre du document
    /// (extérieur d'abord : `<outerBoundaryIs>` précède les trous)
    polygon_rings: Option<Vec<Value>>,

    target: CoordTarget,
    in_coordinates: bool,

    /// Attributs ExtendedData
    properties: Map<String, Value>,

    /// Nom du `<Data>`/`<SimpleData>` courant
    data_name: Option<String>,
    in_data_value: bool,
}

impl Placemark {
    fn open_element(&mut self, element: &BytesStart) -> Result<(), LayerError> {
        match element.local_name().as_ref() {
            b"Point" => self.target = CoordTarget::Point,
            b"LineString" => self.target = CoordTarget::LineString,
            b"LinearRing" => self.target = CoordTarget::Ring,
            b"Polygon" => self.polygon_rings = Some(Vec::new()),
            b"coordinates" => self.in_coordinates = true,
            b"Model" => return Err(LayerError::unsupported_geometry("kml Model")),
            b"Data" => self.data_name = name_attribute(element)?,
            b"SimpleData" => {
                self.data_name = name_attribute(element)?;
                self.in_data_value = true;
            }
            b"value" => {
                if self.data_name.is_some() {
                    self.in_data_value = true;
                }
            }
            // MultiGeometry, styles, name, description, ... : rien à ouvrir
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), LayerError> {
        if self.in_coordinates {
            let coordinates = parse_coordinates(text)?;
            match self.target {
                CoordTarget::Point => {
                    let first = coordinates.into_iter().next().ok_or_else(|| {
                        LayerError::malformed("kml", "empty <coordinates> in Point")
                    })?;
                    self.geometries
                        .push(json!({"type": "Point", "coordinates": first}));
                }
                CoordTarget::LineString => {
                    self.geometries
                        .push(json!({"type": "LineString", "coordinates": coordinates}));
                }
                CoordTarget::Ring => match self.polygon_rings {
                    Some(ref mut rings) => rings.push(json!(coordinates)),
                    // Anneau nu : polygone à un seul anneau
                    None => self
                        .geometries
                        .push(json!({"type": "Polygon", "coordinates": [coordinates]})),
                },
                // Coordonnées hors géométrie connue (gx:*, LookAt, ...)
                CoordTarget::None => {}
            }
        } else if self.in_data_value {
            if let Some(name) = self.data_name.clone() {
                self.properties.insert(name, Value::String(text.to_string()));
            }
        }
        Ok(())
    }

    fn close_element(&mut self, name: &[u8]) {
        match name {
            b"coordinates" => self.in_coordinates = false,
            b"Point" | b"LineString" | b"LinearRing" => self.target = CoordTarget::None,
            b"Polygon" => {
                if let Some(rings) = self.polygon_rings.take() {
                    self.geometries
                        .push(json!({"type": "Polygon", "coordinates": rings}));
                }
            }
            b"Data" | b"SimpleData" => {
                self.data_name = None;
                self.in_data_value = false;
            }
            b"value" => self.in_data_value = false,
            _ => {}
        }
    }

    fn into_record(self) -> RawRecord {
        let mut geometries = self.geometries;
        let geometry = match geometries.len() {
            0 => None,
            1 => geometries.pop(),
            _ => Some(combine(geometries)),
        };

        RawRecord {
            geometry,
            properties: self.properties,
        }
    }
}

/// Extrait l'attribut `name` d'un élément ExtendedData
fn name_attribute(element: &BytesStart) -> Result<Option<String>, LayerError> {
    let attribute = element
        .try_get_attribute("name")
        .map_err(|e| LayerError::malformed("kml", e.to_string()))?;

    match attribute {
        Some(attribute) => {
            let value = attribute
                .unescape_value()
                .map_err(|e| LayerError::malformed("kml", e.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// Replie les membres d'un `<MultiGeometry>` : homogène -> Multi*,
/// hétérogène -> GeometryCollection
fn combine(geometries: Vec<Value>) -> Value {
    let homogeneous = |kind: &str| {
        geometries
            .iter()
            .all(|g| g.get("type").and_then(Value::as_str) == Some(kind))
    };

    let collect_coordinates = |geometries: Vec<Value>| -> Vec<Value> {
        geometries
            .into_iter()
            .map(|mut g| g["coordinates"].take())
            .collect()
    };

    if homogeneous("Point") {
        json!({"type": "MultiPoint", "coordinates": collect_coordinates(geometries)})
    } else if homogeneous("LineString") {
        json!({"type": "MultiLineString", "coordinates": collect_coordinates(geometries)})
    } else if homogeneous("Polygon") {
        json!({"type": "MultiPolygon", "coordinates": collect_coordinates(geometries)})
    } else {
        json!({"type": "GeometryCollection", "geometries": geometries})
    }
}

/// Parse un bloc `<coordinates>` : tuples "lon,lat[,alt]" séparés par des
/// blancs. L'altitude éventuelle est ignorée.
fn parse_coordinates(text: &str) -> Result<Vec<Vec<f64>>, LayerError> {
    let mut coordinates = Vec::new();

    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        let lon = parts.next().and_then(|p| fast_float::parse::<f64, _>(p.trim()).ok());
        let lat = parts.next().and_then(|p| fast_float::parse::<f64, _>(p.trim()).ok());

        match (lon, lat) {
            (Some(lon), Some(lat)) => coordinates.push(vec![lon, lat]),
            _ => {
                return Err(LayerError::malformed(
                    "kml",
                    format!("invalid coordinate tuple: {tuple}"),
                ))
            }
        }
    }

    Ok(coordinates)
}
