//! Parser pour les fichiers .dbf (attributs dBASE III)
//!
//! Chaque enregistrement du .dbf correspond positionnellement à un
//! enregistrement du .shp : les lignes sont lues dans l'ordre du fichier
//! et le drapeau de suppression est ignoré pour ne jamais décaler
//! l'appariement.

use encoding_rs::Encoding;
use serde_json::{Map, Value};

use crate::LayerError;

/// Taille d'un descripteur de champ
const DESCRIPTOR_LEN: usize = 32;

/// Terminateur de la zone des descripteurs
const HEADER_TERMINATOR: u8 = 0x0D;

/// Descripteur d'un champ dBASE
#[derive(Debug)]
struct FieldDescriptor {
    name: String,
    kind: u8,
    length: usize,
}

/// Parse un fichier .dbf complet en une map d'attributs par enregistrement
pub fn parse(data: &[u8]) -> Result<Vec<Map<String, Value>>, LayerError> {
    if data.len() < 32 {
        return Err(LayerError::malformed(
            "dbf",
            "file shorter than the 32-byte header",
        ));
    }

    let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;
    let encoding = ldid_to_encoding(data[29]);

    if header_len > data.len() || header_len < 33 {
        return Err(LayerError::malformed(
            "dbf",
            format!("invalid header length {header_len}"),
        ));
    }

    let fields = parse_descriptors(&data[..header_len], encoding)?;

    // La longueur d'enregistrement inclut le drapeau de suppression
    let expected_len = 1 + fields.iter().map(|f| f.length).sum::<usize>();
    if record_len != expected_len {
        return Err(LayerError::malformed(
            "dbf",
            format!("record length {record_len} does not match field descriptors ({expected_len})"),
        ));
    }

    // Vérifier la cohérence avant d'allouer quoi que ce soit
    if header_len + record_count * record_len > data.len() {
        return Err(LayerError::malformed(
            "dbf",
            format!("file too short for {record_count} declared records"),
        ));
    }

    let mut records = Vec::with_capacity(record_count);

    for index in 0..record_count {
        let start = header_len + index * record_len;
        let record = data.get(start..start + record_len).ok_or_else(|| {
            LayerError::malformed("dbf", format!("record {} truncated", index + 1))
        })?;

        let mut properties = Map::with_capacity(fields.len());
        let mut offset = 1;
        for field in &fields {
            let raw = &record[offset..offset + field.length];
            offset += field.length;
            properties.insert(field.name.clone(), decode_value(field.kind, raw, encoding));
        }

        records.push(properties);
    }

    Ok(records)
}

/// Parse la zone des descripteurs de champs (à partir de l'octet 32)
fn parse_descriptors(
    header: &[u8],
    encoding: &'static Encoding,
) -> Result<Vec<FieldDescriptor>, LayerError> {
    let mut fields = Vec::new();
    let mut pos = 32;

    while pos < header.len() && header[pos] != HEADER_TERMINATOR {
        let descriptor = header.get(pos..pos + DESCRIPTOR_LEN).ok_or_else(|| {
            LayerError::malformed("dbf", "field descriptor area truncated")
        })?;

        // Nom : 11 octets terminés par des NUL
        let name_raw = &descriptor[..11];
        let name_end = name_raw.iter().position(|&b| b == 0).unwrap_or(11);
        let (name, _, _) = encoding.decode(&name_raw[..name_end]);

        fields.push(FieldDescriptor {
            name: name.trim().to_string(),
            kind: descriptor[11],
            length: descriptor[16] as usize,
        });

        pos += DESCRIPTOR_LEN;
    }

    if fields.is_empty() {
        return Err(LayerError::malformed("dbf", "no field descriptors"));
    }

    Ok(fields)
}

/// Décode la valeur d'un champ selon son type dBASE
fn decode_value(kind: u8, raw: &[u8], encoding: &'static Encoding) -> Value {
    match kind {
        b'N' | b'F' => {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim();
            if text.is_empty() {
                Value::Null
            } else {
                fast_float::parse::<f64, _>(text)
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        b'L' => match raw.first() {
            Some(b'Y' | b'y' | b'T' | b't') => Value::Bool(true),
            Some(b'N' | b'n' | b'F' | b'f') => Value::Bool(false),
            _ => Value::Null,
        },
        // Dates AAAAMMJJ conservées telles quelles
        b'D' => {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim();
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        }
        // 'C' et types inconnus : texte décodé
        _ => {
            let (text, _, _) = encoding.decode(raw);
            Value::String(text.trim().to_string())
        }
    }
}

/// Mappe le language driver ID vers un encodage
fn ldid_to_encoding(ldid: u8) -> &'static Encoding {
    match ldid {
        0xC8 => encoding_rs::WINDOWS_1250,
        0xC9 => encoding_rs::WINDOWS_1251,
        0xCA => encoding_rs::WINDOWS_1254,
        0xCB => encoding_rs::WINDOWS_1253,
        0xCC => encoding_rs::WINDOWS_1257,
        0x13 => encoding_rs::SHIFT_JIS,
        // 0x03, 0x57 et absent : ANSI
        _ => encoding_rs::WINDOWS_1252,
    }
}
