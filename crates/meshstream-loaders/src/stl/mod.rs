//! STL parser (spec §4.6): ASCII/binary detection, then a dedicated
//! decoder for each encoding. STL carries no shared-vertex concept, so
//! every triangle contributes three fresh vertices (no interning).

use std::path::Path;

use meshstream_core::{
    open_reader, ByteReader, DataChunk, Endian, Error, LoadOptions, LoaderListener, Result,
};

use crate::traits::{AsMutReader, LoadedMesh, LockState, MeshIterator, VecMeshIterator};

const BINARY_HEADER_LEN: u64 = 80;

/// Heuristic from spec §4.6/§9 open question (c): a file whose first
/// non-whitespace bytes are `solid` (case-insensitive) is *probably*
/// ASCII, but the binary header is free-form 80 bytes and may itself
/// start with `solid` by coincidence. The tie-break is structural: if
/// declared `solid`, peek for whether the expected binary triangle
/// count matches the remaining file size; if it doesn't, treat it as
/// ASCII after all.
fn looks_ascii(reader: &mut dyn ByteReader) -> Result<bool> {
    if reader.remaining() < BINARY_HEADER_LEN {
        return Ok(true);
    }
    let header = reader.read_exact_bytes(BINARY_HEADER_LEN as usize)?;
    let starts_with_solid = header
        .iter()
        .take(5)
        .map(|b| b.to_ascii_lowercase())
        .eq(b"solid".iter().copied());

    if !starts_with_solid {
        reader.seek_to(0)?;
        return Ok(false);
    }

    // Binary layout after the header: u32 triangle count, then 50
    // bytes per triangle. If the remaining byte count matches exactly,
    // this is binary despite the "solid" header; otherwise ASCII.
    if reader.remaining() < 4 {
        reader.seek_to(0)?;
        return Ok(true);
    }
    let count = reader.read_u32(Endian::Little)? as u64;
    let remaining_after_count = reader.remaining();
    let expected = count * 50;
    reader.seek_to(0)?;
    Ok(remaining_after_count != expected)
}

fn parse_binary(reader: &mut dyn ByteReader) -> Result<Vec<DataChunk>> {
    reader.seek_to(BINARY_HEADER_LEN)?;
    let count = reader.read_u32(Endian::Little)? as usize;

    let mut chunk = DataChunk::new();
    chunk.coords.reserve(count * 9);
    chunk.indices.reserve(count * 3);

    for i in 0..count {
        let _nx = reader.read_f32(Endian::Little)?;
        let _ny = reader.read_f32(Endian::Little)?;
        let _nz = reader.read_f32(Endian::Little)?;
        for _ in 0..3 {
            let x = reader.read_f32(Endian::Little)?;
            let y = reader.read_f32(Endian::Little)?;
            let z = reader.read_f32(Endian::Little)?;
            chunk.coords.extend_from_slice(&[x, y, z]);
        }
        let _attribute_byte_count = reader.read_u16(Endian::Little)?;
        let base = (i * 3) as u32;
        chunk.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    chunk.recompute_bounds();
    if chunk.vertex_count() == 0 {
        Ok(Vec::new())
    } else {
        Ok(vec![chunk])
    }
}

fn parse_ascii(text: &str) -> Result<Vec<DataChunk>> {
    let mut chunk = DataChunk::new();
    let mut pending: Vec<[f32; 3]> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let x = parse_f32(tokens.next(), line_no)?;
                let y = parse_f32(tokens.next(), line_no)?;
                let z = parse_f32(tokens.next(), line_no)?;
                pending.push([x, y, z]);
                if pending.len() == 3 {
                    let base = chunk.vertex_count() as u32;
                    for v in pending.drain(..) {
                        chunk.coords.extend_from_slice(&v);
                    }
                    chunk.indices.extend_from_slice(&[base, base + 1, base + 2]);
                }
            }
            Some("solid") | Some("facet") | Some("outer") | Some("endloop") | Some("endfacet")
            | Some("endsolid") | None => {}
            Some(other) => {
                return Err(Error::parse_at(
                    format!("unrecognised STL ASCII token '{other}'"),
                    line_no as u64,
                ))
            }
        }
    }

    if pending.len() % 3 != 0 && !pending.is_empty() {
        return Err(Error::parse(format!(
            "facet with {} vertices, minimum is 3",
            pending.len()
        )));
    }

    chunk.recompute_bounds();
    if chunk.vertex_count() == 0 {
        Ok(Vec::new())
    } else {
        Ok(vec![chunk])
    }
}

fn parse_f32(token: Option<&str>, line_no: usize) -> Result<f32> {
    token
        .ok_or_else(|| Error::parse_at("'vertex' missing component", line_no as u64))?
        .parse::<f32>()
        .map_err(|_| Error::parse_at("'vertex' component is not a float", line_no as u64))
}

pub struct StlLoader {
    options: LoadOptions,
    lock: LockState,
}

impl StlLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            lock: LockState::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn load(&mut self, path: &Path, listener: &LoaderListener) -> Result<LoadedMesh> {
        self.lock.check_unlocked()?;
        self.lock.lock();
        listener.fire_start();
        let _span = tracing::info_span!("parse", format = "stl", path = %path.display()).entered();
        let start = std::time::Instant::now();
        crate::log_parse_start!("stl", path);
        let result = self.load_inner(path);
        match &result {
            Ok(mesh) => {
                crate::log_parse_complete!("stl", start.elapsed(), mesh.iterator.size_hint().unwrap_or(0))
            }
            Err(err) => crate::log_parse_error!("stl", err),
        }
        listener.fire_end();
        self.lock.unlock();
        result
    }

    fn load_inner(&mut self, path: &Path) -> Result<LoadedMesh> {
        let mut boxed_reader = open_reader(path, self.options.mmap_threshold_bytes)?;
        let reader = boxed_reader.as_mut();

        let chunks = if looks_ascii(reader)? {
            let bytes = reader.read_exact_bytes(reader.remaining() as usize)?;
            let text = std::str::from_utf8(&bytes)?;
            parse_ascii(text)?
        } else {
            parse_binary(reader)?
        };

        Ok(LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(chunks)),
            materials: Vec::new(),
            textures: Vec::new(),
        })
    }
}
