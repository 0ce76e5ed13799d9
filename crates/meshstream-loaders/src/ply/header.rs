//! PLY header grammar (spec §4.2 "Header grammar").
//!
//! The header is always ASCII text, line-oriented, regardless of the
//! body's storage mode.

use meshstream_core::{ByteReader, Error, Result};

/// A PLY scalar data type, with its classical C-style aliases folded
/// in at parse time (spec §3 `PropertyPLY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    pub fn parse(token: &str) -> Result<Self> {
        Ok(match token {
            "int8" | "char" => ScalarType::Int8,
            "uint8" | "uchar" => ScalarType::UInt8,
            "int16" | "short" => ScalarType::Int16,
            "uint16" | "ushort" => ScalarType::UInt16,
            "int32" | "int" => ScalarType::Int32,
            "uint32" | "uint" => ScalarType::UInt32,
            "float32" | "float" => ScalarType::Float32,
            "float64" | "double" => ScalarType::Float64,
            other => return Err(Error::parse(format!("unknown PLY data type: {other}"))),
        })
    }

    /// Byte width table (spec §4.2 "Binary modes").
    pub fn width(self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }
}

/// A single PLY property: either a scalar value or a variable-length
/// list (length prefix of one type, values of another).
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List {
        len_type: ScalarType,
        value_type: ScalarType,
    },
}

#[derive(Debug, Clone)]
pub struct PlyProperty {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone)]
pub struct PlyElement {
    pub name: String,
    pub count: u64,
    pub properties: Vec<PlyProperty>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone)]
pub struct PlyHeader {
    pub mode: StorageMode,
    pub elements: Vec<PlyElement>,
    pub comments: Vec<String>,
    pub obj_info: Vec<String>,
}

impl PlyHeader {
    pub fn element(&self, name: &str) -> Option<&PlyElement> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Parses the ASCII header through `end_header`, leaving `reader`
/// positioned at the first byte of body data.
pub fn parse_header(reader: &mut dyn ByteReader) -> Result<PlyHeader> {
    let magic = reader
        .read_line()?
        .ok_or_else(|| Error::parse("empty PLY file: missing magic line"))?;
    if magic.trim() != "ply" {
        return Err(Error::parse(format!("expected 'ply' magic, found '{magic}'")));
    }

    let mut mode = None;
    let mut elements: Vec<PlyElement> = Vec::new();
    let mut comments = Vec::new();
    let mut obj_info = Vec::new();

    loop {
        let line = reader
            .read_line()?
            .ok_or_else(|| Error::parse("truncated PLY header: missing end_header"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let directive = tokens.next().unwrap_or("");

        match directive {
            "format" => {
                let kind = tokens
                    .next()
                    .ok_or_else(|| Error::parse("'format' line missing storage mode"))?;
                mode = Some(match kind {
                    "ascii" => StorageMode::Ascii,
                    "binary_little_endian" => StorageMode::BinaryLittleEndian,
                    "binary_big_endian" => StorageMode::BinaryBigEndian,
                    other => {
                        return Err(Error::parse(format!("unknown PLY format: {other}")))
                    }
                });
            }
            "comment" => {
                comments.push(tokens.collect::<Vec<_>>().join(" "));
            }
            "obj_info" => {
                obj_info.push(tokens.collect::<Vec<_>>().join(" "));
            }
            "element" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| Error::parse("'element' line missing name"))?
                    .to_string();
                let count: u64 = tokens
                    .next()
                    .ok_or_else(|| Error::parse("'element' line missing count"))?
                    .parse()
                    .map_err(|_| Error::parse("'element' count is not a valid u64"))?;
                elements.push(PlyElement {
                    name,
                    count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::parse("'property' line before any 'element'"))?;
                let first = tokens
                    .next()
                    .ok_or_else(|| Error::parse("'property' line missing type"))?;
                if first == "list" {
                    let len_type = ScalarType::parse(
                        tokens
                            .next()
                            .ok_or_else(|| Error::parse("'property list' missing length type"))?,
                    )?;
                    let value_type = ScalarType::parse(
                        tokens
                            .next()
                            .ok_or_else(|| Error::parse("'property list' missing value type"))?,
                    )?;
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::parse("'property list' missing name"))?
                        .to_string();
                    element.properties.push(PlyProperty {
                        name,
                        kind: PropertyKind::List { len_type, value_type },
                    });
                } else {
                    let value_type = ScalarType::parse(first)?;
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::parse("'property' missing name"))?
                        .to_string();
                    element.properties.push(PlyProperty {
                        name,
                        kind: PropertyKind::Scalar(value_type),
                    });
                }
            }
            "end_header" => break,
            _ => {
                // Unknown lines are ignored per spec §4.2.
                tracing::debug!(line = %line, "ignoring unrecognised PLY header line");
            }
        }
    }

    let mode = mode.ok_or_else(|| Error::parse("PLY header missing 'format' line"))?;
    Ok(PlyHeader {
        mode,
        elements,
        comments,
        obj_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstream_core::MmapReader;
    use std::fs::File;
    use std::io::Write;

    fn reader_for(text: &str) -> MmapReader {
        let path = std::env::temp_dir().join(format!(
            "meshstream-ply-header-test-{}-{}.ply",
            std::process::id(),
            text.len()
        ));
        let mut f = File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        drop(f);
        let reader = MmapReader::open(&path).unwrap();
        std::fs::remove_file(&path).ok();
        reader
    }

    #[test]
    fn parses_ascii_cube_header() {
        let text = "ply\nformat ascii 1.0\ncomment test\nelement vertex 8\nproperty float x\nproperty float y\nproperty float z\nelement face 12\nproperty list uchar int vertex_indices\nend_header\n";
        let mut reader = reader_for(text);
        let header = parse_header(&mut reader).unwrap();
        assert_eq!(header.mode, StorageMode::Ascii);
        assert_eq!(header.comments, vec!["test".to_string()]);
        let vertex = header.element("vertex").unwrap();
        assert_eq!(vertex.count, 8);
        assert_eq!(vertex.properties.len(), 3);
        let face = header.element("face").unwrap();
        assert_eq!(face.count, 12);
        matches!(face.properties[0].kind, PropertyKind::List { .. });
    }

    #[test]
    fn rejects_missing_magic() {
        let mut reader = reader_for("format ascii 1.0\nend_header\n");
        assert!(parse_header(&mut reader).is_err());
    }

    #[test]
    fn rejects_unknown_scalar_type() {
        assert!(ScalarType::parse("nonsense").is_err());
    }

    #[test]
    fn scalar_type_aliases_share_width() {
        assert_eq!(ScalarType::parse("uchar").unwrap().width(), 1);
        assert_eq!(ScalarType::parse("uint8").unwrap().width(), 1);
        assert_eq!(ScalarType::parse("double").unwrap().width(), 8);
    }

    #[test]
    fn ignores_unknown_header_lines() {
        let text = "ply\nformat ascii 1.0\nsome_unknown_directive foo\nelement vertex 0\nend_header\n";
        let mut reader = reader_for(text);
        assert!(parse_header(&mut reader).is_ok());
    }
}
