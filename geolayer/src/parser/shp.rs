//! Parser pour les fichiers .shp (géométries binaires)
//!
//! Le format intercale des champs big-endian (en-têtes) et little-endian
//! (contenu des enregistrements). Les types de formes supportés sont
//! Point, PolyLine, Polygon et MultiPoint, ainsi que leurs variantes Z/M
//! dont les ordonnées supplémentaires sont ignorées. Une forme Null
//! produit un enregistrement sans géométrie.

use serde_json::{json, Value};

use crate::LayerError;

/// Magic number du format (big-endian, offset 0)
const FILE_CODE: i32 = 9994;

/// Taille de l'en-tête de fichier
const HEADER_LEN: usize = 100;

const NULL_SHAPE: i32 = 0;
const POINT: i32 = 1;
const POLYLINE: i32 = 3;
const POLYGON: i32 = 5;
const MULTIPOINT: i32 = 8;
const POINT_Z: i32 = 11;
const POLYLINE_Z: i32 = 13;
const POLYGON_Z: i32 = 15;
const MULTIPOINT_Z: i32 = 18;
const POINT_M: i32 = 21;
const POLYLINE_M: i32 = 23;
const POLYGON_M: i32 = 25;
const MULTIPOINT_M: i32 = 28;

/// Parse un fichier .shp complet.
///
/// Retourne une géométrie GeoJSON par enregistrement, dans l'ordre du
/// fichier ; `None` pour les formes Null.
pub fn parse(data: &[u8]) -> Result<Vec<Option<Value>>, LayerError> {
    if data.len() < HEADER_LEN {
        return Err(LayerError::malformed(
            "shp",
            "file shorter than the 100-byte header",
        ));
    }

    let file_code = read_i32_be(data, 0)?;
    if file_code != FILE_CODE {
        return Err(LayerError::malformed(
            "shp",
            format!("bad file code {file_code}, expected {FILE_CODE}"),
        ));
    }

    let mut geometries = Vec::new();
    let mut offset = HEADER_LEN;

    while offset < data.len() {
        // En-tête d'enregistrement : numéro puis longueur du contenu,
        // big-endian, longueur en mots de 16 bits
        let content_len = read_i32_be(data, offset + 4)? as usize * 2;
        offset += 8;

        let record = data.get(offset..offset + content_len).ok_or_else(|| {
            LayerError::malformed("shp", format!("record {} truncated", geometries.len() + 1))
        })?;

        geometries.push(parse_record(record)?);
        offset += content_len;
    }

    Ok(geometries)
}

/// Parse le contenu d'un enregistrement
fn parse_record(record: &[u8]) -> Result<Option<Value>, LayerError> {
    let shape_type = read_i32_le(record, 0)?;

    match shape_type {
        NULL_SHAPE => Ok(None),
        POINT | POINT_Z | POINT_M => parse_point(record).map(Some),
        MULTIPOINT | MULTIPOINT_Z | MULTIPOINT_M => parse_multipoint(record).map(Some),
        POLYLINE | POLYLINE_Z | POLYLINE_M => {
            let parts = parse_parts(record)?;
            Ok(Some(lines_to_geometry(parts)))
        }
        POLYGON | POLYGON_Z | POLYGON_M => {
            let rings = parse_parts(record)?;
            Ok(Some(rings_to_geometry(rings)))
        }
        other => Err(LayerError::unsupported_geometry(format!(
            "shp shape type {other}"
        ))),
    }
}

fn parse_point(record: &[u8]) -> Result<Value, LayerError> {
    let x = read_f64_le(record, 4)?;
    let y = read_f64_le(record, 12)?;
    Ok(json!({"type": "Point", "coordinates": [x, y]}))
}

fn parse_multipoint(record: &[u8]) -> Result<Value, LayerError> {
    // bbox (4 doubles) puis numPoints
    let point_count = read_i32_le(record, 36)? as usize;

    let mut coordinates = Vec::with_capacity(point_count);
    for index in 0..point_count {
        let base = 40 + index * 16;
        coordinates.push(vec![read_f64_le(record, base)?, read_f64_le(record, base + 8)?]);
    }

    Ok(json!({"type": "MultiPoint", "coordinates": coordinates}))
}

/// Lit la structure commune PolyLine/Polygon : bbox, parts, points.
/// Retourne une liste de points par partie.
fn parse_parts(record: &[u8]) -> Result<Vec<Vec<Vec<f64>>>, LayerError> {
    let part_count = read_i32_le(record, 36)? as usize;
    let point_count = read_i32_le(record, 40)? as usize;

    let mut starts = Vec::with_capacity(part_count);
    for index in 0..part_count {
        let start = read_i32_le(record, 44 + index * 4)? as usize;
        if start > point_count {
            return Err(LayerError::malformed(
                "shp",
                format!("part index {start} beyond {point_count} points"),
            ));
        }
        if let Some(&previous) = starts.last() {
            if start < previous {
                return Err(LayerError::malformed("shp", "part indexes not ascending"));
            }
        }
        starts.push(start);
    }

    let points_offset = 44 + part_count * 4;
    let mut parts = Vec::with_capacity(part_count);

    for (index, &start) in starts.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(point_count);
        let mut points = Vec::with_capacity(end - start);
        for point in start..end {
            let base = points_offset + point * 16;
            points.push(vec![read_f64_le(record, base)?, read_f64_le(record, base + 8)?]);
        }
        parts.push(points);
    }

    Ok(parts)
}

/// PolyLine : une partie -> LineString, plusieurs -> MultiLineString
fn lines_to_geometry(mut parts: Vec<Vec<Vec<f64>>>) -> Value {
    if parts.len() == 1 {
        json!({"type": "LineString", "coordinates": parts.pop()})
    } else {
        json!({"type": "MultiLineString", "coordinates": parts})
    }
}

/// Polygon : regroupe les anneaux en polygones avec trous.
///
/// Dans un .shp les anneaux extérieurs tournent dans le sens horaire
/// (aire signée négative) et les trous dans le sens anti-horaire. Un trou
/// orphelin en tête de liste est toléré comme anneau extérieur.
fn rings_to_geometry(rings: Vec<Vec<Vec<f64>>>) -> Value {
    let mut polygons: Vec<Vec<Vec<Vec<f64>>>> = Vec::new();

    for ring in rings {
        if signed_area(&ring) <= 0.0 || polygons.is_empty() {
            polygons.push(vec![ring]);
        } else if let Some(current) = polygons.last_mut() {
            current.push(ring);
        }
    }

    if polygons.len() == 1 {
        json!({"type": "Polygon", "coordinates": polygons[0]})
    } else {
        json!({"type": "MultiPolygon", "coordinates": polygons})
    }
}

/// Aire signée d'un anneau (formule du lacet) ; positive = anti-horaire
fn signed_area(ring: &[Vec<f64>]) -> f64 {
    let mut sum = 0.0;
    for window in ring.windows(2) {
        sum += window[0][0] * window[1][1] - window[1][0] * window[0][1];
    }
    sum / 2.0
}

fn read_i32_be(data: &[u8], offset: usize) -> Result<i32, LayerError> {
    data.get(offset..offset + 4)
        .map(|bytes| i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .ok_or_else(|| LayerError::malformed("shp", "unexpected end of file"))
}

fn read_i32_le(data: &[u8], offset: usize) -> Result<i32, LayerError> {
    data.get(offset..offset + 4)
        .map(|bytes| i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .ok_or_else(|| LayerError::malformed("shp", "unexpected end of file"))
}

fn read_f64_le(data: &[u8], offset: usize) -> Result<f64, LayerError> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or_else(|| LayerError::malformed("shp", "unexpected end of file"))?;
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(buffer))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Construction de fichiers .shp synthétiques pour les tests

    /// En-tête de fichier minimal valide
    pub fn file_header() -> Vec<u8> {
        let mut header = vec![0u8; 100];
        header[..4].copy_from_slice(&9994i32.to_be_bytes());
        header[28..32].copy_from_slice(&1000i32.to_le_bytes());
        header
    }

    /// Enregistrement complet (en-tête + contenu)
    pub fn record(number: i32, content: &[u8]) -> Vec<u8> {
        assert!(content.len() % 2 == 0);
        let mut record = Vec::with_capacity(8 + content.len());
        record.extend_from_slice(&number.to_be_bytes());
        record.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
        record.extend_from_slice(content);
        record
    }

    /// Contenu d'une forme Point
    pub fn point_content(x: f64, y: f64) -> Vec<u8> {
        let mut content = Vec::with_capacity(20);
        content.extend_from_slice(&1i32.to_le_bytes());
        content.extend_from_slice(&x.to_le_bytes());
        content.extend_from_slice(&y.to_le_bytes());
        content
    }

    /// Contenu d'une forme Polygon à plusieurs anneaux
    pub fn polygon_content(rings: &[&[(f64, f64)]]) -> Vec<u8> {
        let point_count: usize = rings.iter().map(|r| r.len()).sum();
        let mut content = Vec::new();
        content.extend_from_slice(&5i32.to_le_bytes());
        content.extend_from_slice(&[0u8; 32]); // bbox, non vérifiée
        content.extend_from_slice(&(rings.len() as i32).to_le_bytes());
        content.extend_from_slice(&(point_count as i32).to_le_bytes());
        let mut start = 0i32;
        for ring in rings {
            content.extend_from_slice(&start.to_le_bytes());
            start += ring.len() as i32;
        }
        for ring in rings {
            for (x, y) in *ring {
                content.extend_from_slice(&x.to_le_bytes());
                content.extend_from_slice(&y.to_le_bytes());
            }
        }
        content
    }

    /// Fichier .shp complet à partir de contenus d'enregistrements
    pub fn file(contents: &[Vec<u8>]) -> Vec<u8> {
        let mut file = file_header();
        for (index, content) in contents.iter().enumerate() {
            file.extend_from_slice(&record(index as i32 + 1, content));
        }
        file
    }
}
