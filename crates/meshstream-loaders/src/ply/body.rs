//! PLY body decoding: scalar/list property dispatch (spec §4.2 "Body
//! decoding"), in both ASCII and binary storage modes.
//!
//! Follows the design note "PLY dispatch": each property is a tagged
//! variant (name, kind, valueType[, lenType]); decoding switches on
//! `valueType` in one small function rather than per-property
//! "read-from-buffer" listener objects.

use smallvec::SmallVec;

use meshstream_core::{ByteReader, Endian, Error, Result};

use super::header::{PlyElement, PropertyKind, ScalarType, StorageMode};

/// Most PLY face lists are triangles or quads; inlining up to 4 values
/// avoids a heap allocation for the overwhelming majority of records
/// in the hot per-record decode loop.
type ValueList = SmallVec<[PlyValue; 4]>;

/// A single decoded scalar value, widened enough to hold any
/// [`ScalarType`] without loss for the ranges PLY actually uses.
#[derive(Debug, Clone, Copy)]
pub enum PlyValue {
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
}

impl PlyValue {
    pub fn as_f64(self) -> f64 {
        match self {
            PlyValue::Int(v) => v as f64,
            PlyValue::UInt(v) => v as f64,
            PlyValue::Float(v) => v as f64,
            PlyValue::Double(v) => v,
        }
    }

    pub fn as_f32(self) -> f32 {
        self.as_f64() as f32
    }

    pub fn as_i64(self) -> i64 {
        match self {
            PlyValue::Int(v) => v,
            PlyValue::UInt(v) => v as i64,
            PlyValue::Float(v) => v as i64,
            PlyValue::Double(v) => v as i64,
        }
    }

    pub fn as_u8(self) -> u8 {
        self.as_i64().clamp(0, 255) as u8
    }
}

/// One decoded property value: a scalar, or a list of scalars.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Scalar(PlyValue),
    List(ValueList),
}

impl PropertyValue {
    pub fn as_scalar(&self) -> Option<PlyValue> {
        match self {
            PropertyValue::Scalar(v) => Some(*v),
            PropertyValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PlyValue]> {
        match self {
            PropertyValue::List(v) => Some(v),
            PropertyValue::Scalar(_) => None,
        }
    }
}

/// A decoded record: the properties of one element instance, in
/// declared order, keyed by property name for semantic lookup.
pub type Record = Vec<(String, PropertyValue)>;

fn endian_of(mode: StorageMode) -> Option<Endian> {
    match mode {
        StorageMode::BinaryLittleEndian => Some(Endian::Little),
        StorageMode::BinaryBigEndian => Some(Endian::Big),
        StorageMode::Ascii => None,
    }
}

fn read_binary_scalar(reader: &mut dyn ByteReader, ty: ScalarType, endian: Endian) -> Result<PlyValue> {
    Ok(match ty {
        ScalarType::Int8 => PlyValue::Int(reader.read_i8()? as i64),
        ScalarType::UInt8 => PlyValue::UInt(reader.read_u8()? as u64),
        ScalarType::Int16 => PlyValue::Int(reader.read_i16(endian)? as i64),
        ScalarType::UInt16 => PlyValue::UInt(reader.read_u16(endian)? as u64),
        ScalarType::Int32 => PlyValue::Int(reader.read_i32(endian)? as i64),
        ScalarType::UInt32 => PlyValue::UInt(reader.read_u32(endian)? as u64),
        ScalarType::Float32 => PlyValue::Float(reader.read_f32(endian)?),
        ScalarType::Float64 => PlyValue::Double(reader.read_f64(endian)?),
    })
}

fn parse_ascii_scalar(token: &str, ty: ScalarType) -> Result<PlyValue> {
    Ok(match ty {
        ScalarType::Int8 | ScalarType::Int16 | ScalarType::Int32 => PlyValue::Int(
            token
                .parse::<i64>()
                .map_err(|_| Error::parse(format!("expected integer token, found '{token}'")))?,
        ),
        ScalarType::UInt8 | ScalarType::UInt16 | ScalarType::UInt32 => PlyValue::UInt(
            token
                .parse::<u64>()
                .map_err(|_| Error::parse(format!("expected unsigned token, found '{token}'")))?,
        ),
        ScalarType::Float32 => PlyValue::Float(
            token
                .parse::<f32>()
                .map_err(|_| Error::parse(format!("expected float token, found '{token}'")))?,
        ),
        ScalarType::Float64 => PlyValue::Double(
            token
                .parse::<f64>()
                .map_err(|_| Error::parse(format!("expected double token, found '{token}'")))?,
        ),
    })
}

/// Decodes `element.count` records of `element` from `reader` in the
/// given storage `mode`.
pub fn decode_element(
    reader: &mut dyn ByteReader,
    mode: StorageMode,
    element: &PlyElement,
) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(element.count as usize);
    match mode {
        StorageMode::Ascii => {
            for _ in 0..element.count {
                let line = reader
                    .read_line()?
                    .ok_or_else(|| Error::parse("truncated PLY body: expected element record"))?;
                let mut tokens = line.split_whitespace();
                let mut record = Record::with_capacity(element.properties.len());
                for prop in &element.properties {
                    match &prop.kind {
                        PropertyKind::Scalar(ty) => {
                            let token = tokens.next().ok_or_else(|| {
                                Error::parse(format!(
                                    "missing token for scalar property '{}'",
                                    prop.name
                                ))
                            })?;
                            record.push((
                                prop.name.clone(),
                                PropertyValue::Scalar(parse_ascii_scalar(token, *ty)?),
                            ));
                        }
                        PropertyKind::List { len_type, value_type } => {
                            let len_token = tokens.next().ok_or_else(|| {
                                Error::parse(format!(
                                    "missing length token for list property '{}'",
                                    prop.name
                                ))
                            })?;
                            let len = parse_ascii_scalar(len_token, *len_type)?.as_i64();
                            let mut values: ValueList = SmallVec::with_capacity(len.max(0) as usize);
                            for _ in 0..len {
                                let token = tokens.next().ok_or_else(|| {
                                    Error::parse(format!(
                                        "truncated list for property '{}'",
                                        prop.name
                                    ))
                                })?;
                                values.push(parse_ascii_scalar(token, *value_type)?);
                            }
                            record.push((prop.name.clone(), PropertyValue::List(values)));
                        }
                    }
                }
                // Excess tokens are tolerated and ignored (spec §4.2).
                records.push(record);
            }
        }
        StorageMode::BinaryLittleEndian | StorageMode::BinaryBigEndian => {
            let endian = endian_of(mode).expect("binary mode always has an endian");
            for _ in 0..element.count {
                let mut record = Record::with_capacity(element.properties.len());
                for prop in &element.properties {
                    match &prop.kind {
                        PropertyKind::Scalar(ty) => {
                            record.push((
                                prop.name.clone(),
                                PropertyValue::Scalar(read_binary_scalar(reader, *ty, endian)?),
                            ));
                        }
                        PropertyKind::List { len_type, value_type } => {
                            let len = read_binary_scalar(reader, *len_type, endian)?.as_i64();
                            let mut values: ValueList = SmallVec::with_capacity(len.max(0) as usize);
                            for _ in 0..len {
                                values.push(read_binary_scalar(reader, *value_type, endian)?);
                            }
                            record.push((prop.name.clone(), PropertyValue::List(values)));
                        }
                    }
                }
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Looks up a named scalar property value within a decoded record.
pub fn field(record: &Record, name: &str) -> Option<PlyValue> {
    record
        .iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, v)| v.as_scalar())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ply::header::{PlyProperty, PropertyKind};
    use meshstream_core::MmapReader;
    use std::fs::File;
    use std::io::Write;

    fn reader_for(bytes: &[u8]) -> MmapReader {
        let path = std::env::temp_dir().join(format!(
            "meshstream-ply-body-test-{}-{}.bin",
            std::process::id(),
            bytes.len()
        ));
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        drop(f);
        let reader = MmapReader::open(&path).unwrap();
        std::fs::remove_file(&path).ok();
        reader
    }

    #[test]
    fn decodes_ascii_scalar_record() {
        let element = PlyElement {
            name: "vertex".into(),
            count: 1,
            properties: vec![
                PlyProperty {
                    name: "x".into(),
                    kind: PropertyKind::Scalar(ScalarType::Float32),
                },
                PlyProperty {
                    name: "y".into(),
                    kind: PropertyKind::Scalar(ScalarType::Float32),
                },
            ],
        };
        let mut reader = reader_for(b"1.5 2.5 extra_ignored_token\n");
        let records = decode_element(&mut reader, StorageMode::Ascii, &element).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(field(&records[0], "x").unwrap().as_f32(), 1.5);
        assert_eq!(field(&records[0], "y").unwrap().as_f32(), 2.5);
    }

    #[test]
    fn ascii_insufficient_tokens_fail() {
        let element = PlyElement {
            name: "vertex".into(),
            count: 1,
            properties: vec![
                PlyProperty {
                    name: "x".into(),
                    kind: PropertyKind::Scalar(ScalarType::Float32),
                },
                PlyProperty {
                    name: "y".into(),
                    kind: PropertyKind::Scalar(ScalarType::Float32),
                },
            ],
        };
        let mut reader = reader_for(b"1.5\n");
        assert!(decode_element(&mut reader, StorageMode::Ascii, &element).is_err());
    }

    #[test]
    fn decodes_binary_list_record() {
        let element = PlyElement {
            name: "face".into(),
            count: 1,
            properties: vec![PlyProperty {
                name: "vertex_indices".into(),
                kind: PropertyKind::List {
                    len_type: ScalarType::UInt8,
                    value_type: ScalarType::Int32,
                },
            }],
        };
        let mut bytes = vec![3u8]; // list length
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        let mut reader = reader_for(&bytes);
        let records =
            decode_element(&mut reader, StorageMode::BinaryLittleEndian, &element).unwrap();
        let list = records[0][0].1.as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[2].as_i64(), 2);
    }
}
