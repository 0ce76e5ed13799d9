//! PLY parser and iterator (spec §4.2).
//!
//! Parses the header, decodes the `vertex` and `face` elements, maps
//! canonical property names onto [`DataChunk`] fields, fan-triangulates
//! faces, and emits budget-capped chunks through [`ChunkBuilder`].

pub mod body;
pub mod header;

use std::path::Path;

use meshstream_core::{open_reader, DataChunk, Error, LoadOptions, LoaderListener, Result};

use crate::chunk_builder::{ChunkBuilder, VertexAttrs};
use crate::traits::{AsMutReader, LoadedMesh, LockState, MeshIterator, VecMeshIterator};

use body::{decode_element, field, Record};
use header::{PlyElement, PlyHeader, PropertyKind};

/// Per-vertex attributes pulled out of the decoded `vertex` records,
/// ready for [`ChunkBuilder::intern_vertex`].
struct VertexTable {
    coords: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    texcoords: Option<Vec<[f32; 2]>>,
    colors: Option<Vec<Vec<u8>>>,
    color_components: u8,
}

fn build_vertex_table(records: &[Record]) -> Result<VertexTable> {
    let has_alpha = records
        .first()
        .map(|r| {
            r.iter()
                .any(|(n, _)| n == "alpha" || n == "a")
        })
        .unwrap_or(false);
    let color_components: u8 = if has_alpha { 4 } else { 3 };

    let mut coords = Vec::with_capacity(records.len());
    let mut normals: Option<Vec<[f32; 3]>> = None;
    let mut texcoords: Option<Vec<[f32; 2]>> = None;
    let mut colors: Option<Vec<Vec<u8>>> = None;

    for record in records {
        let x = field(record, "x").map(|v| v.as_f32()).unwrap_or(0.0);
        let y = field(record, "y").map(|v| v.as_f32()).unwrap_or(0.0);
        let z = field(record, "z").map(|v| v.as_f32()).unwrap_or(0.0);
        coords.push([x, y, z]);

        if let (Some(nx), Some(ny), Some(nz)) = (
            field(record, "nx"),
            field(record, "ny"),
            field(record, "nz"),
        ) {
            normals
                .get_or_insert_with(Vec::new)
                .push([nx.as_f32(), ny.as_f32(), nz.as_f32()]);
        }

        let u = field(record, "u").or_else(|| field(record, "s"));
        let v = field(record, "v").or_else(|| field(record, "t"));
        if let (Some(u), Some(v)) = (u, v) {
            texcoords
                .get_or_insert_with(Vec::new)
                .push([u.as_f32(), v.as_f32()]);
        }

        let r = field(record, "red").or_else(|| field(record, "r"));
        let g = field(record, "green").or_else(|| field(record, "g"));
        let b = field(record, "blue").or_else(|| field(record, "b"));
        if let (Some(r), Some(g), Some(b)) = (r, g, b) {
            let mut c = vec![r.as_u8(), g.as_u8(), b.as_u8()];
            if color_components == 4 {
                let a = field(record, "alpha").or_else(|| field(record, "a"));
                c.push(a.map(|v| v.as_u8()).unwrap_or(255));
            }
            colors.get_or_insert_with(Vec::new).push(c);
        }
    }

    Ok(VertexTable {
        coords,
        normals,
        texcoords,
        colors,
        color_components,
    })
}

/// Finds the list property in the `face` element that carries vertex
/// indices (typically named `vertex_indices` or `vertex_index`; falls
/// back to the first list property present, since some producers use
/// other names for the same role).
fn find_index_list_property(element: &PlyElement) -> Option<&str> {
    element
        .properties
        .iter()
        .find(|p| p.name == "vertex_indices" || p.name == "vertex_index")
        .or_else(|| {
            element
                .properties
                .iter()
                .find(|p| matches!(p.kind, PropertyKind::List { .. }))
        })
        .map(|p| p.name.as_str())
}

fn emit_faces(
    builder: &mut ChunkBuilder<u32>,
    vertices: &VertexTable,
    face_records: &[Record],
    index_property: &str,
) -> Result<()> {
    for record in face_records {
        let (_, value) = record
            .iter()
            .find(|(n, _)| n == index_property)
            .ok_or_else(|| Error::parse(format!("face record missing '{index_property}'")))?;
        let indices = value
            .as_list()
            .ok_or_else(|| Error::parse(format!("'{index_property}' is not a list property")))?;
        if indices.len() < 3 {
            return Err(Error::parse(format!(
                "face with {} vertices, minimum is 3",
                indices.len()
            )));
        }

        let global: Vec<u32> = indices.iter().map(|v| v.as_i64() as u32).collect();
        let mut local = Vec::with_capacity(global.len());
        for &g in &global {
            let coord = *vertices
                .coords
                .get(g as usize)
                .ok_or_else(|| Error::parse(format!("face references out-of-range vertex {g}")))?;
            let attrs = VertexAttrs {
                coord,
                normal: vertices.normals.as_ref().and_then(|n| n.get(g as usize)).copied(),
                texcoord: vertices.texcoords.as_ref().and_then(|t| t.get(g as usize)).copied(),
                color: vertices.colors.as_ref().and_then(|c| c.get(g as usize)).cloned(),
            };
            local.push(builder.intern_vertex(g, attrs));
        }

        // Fan triangulation (spec §4.2/GLOSSARY).
        for i in 1..local.len() - 1 {
            builder.push_triangle(local[0], local[i], local[i + 1]);
        }
        builder.flush_if_over_budget();
    }
    Ok(())
}

/// Loads `path` as a PLY file, returning its chunks as a
/// [`MeshIterator`].
pub struct PlyLoader {
    options: LoadOptions,
    lock: LockState,
}

impl PlyLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            lock: LockState::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Cheap sniff: does this file start with the PLY magic line?
    pub fn is_valid_file(&self, path: &Path) -> Result<bool> {
        self.lock.lock();
        let result = (|| {
            let mut reader = open_reader(path, self.options.mmap_threshold_bytes)?;
            Ok(matches!(reader.read_line()?, Some(line) if line.trim() == "ply"))
        })();
        self.lock.unlock();
        result
    }

    pub fn load(&mut self, path: &Path, listener: &LoaderListener) -> Result<LoadedMesh> {
        self.lock.check_unlocked()?;
        self.lock.lock();
        listener.fire_start();
        let _span = tracing::info_span!("parse", format = "ply", path = %path.display()).entered();
        let start = std::time::Instant::now();
        crate::log_parse_start!("ply", path);
        let result = self.load_inner(path);
        match &result {
            Ok(mesh) => {
                crate::log_parse_complete!("ply", start.elapsed(), mesh.iterator.size_hint().unwrap_or(0))
            }
            Err(err) => crate::log_parse_error!("ply", err),
        }
        listener.fire_end();
        self.lock.unlock();
        result
    }

    fn load_inner(&mut self, path: &Path) -> Result<LoadedMesh> {
        let mut reader = open_reader(path, self.options.mmap_threshold_bytes)?;
        let header: PlyHeader = header::parse_header(reader.as_mut())?;

        let vertex_element = header
            .element("vertex")
            .ok_or_else(|| Error::parse("PLY file has no 'vertex' element"))?
            .clone();
        let vertex_records = decode_element(reader.as_mut(), header.mode, &vertex_element)?;
        let vertices = build_vertex_table(&vertex_records)?;

        let mut builder: ChunkBuilder<u32> =
            ChunkBuilder::new(self.options.vertex_budget).with_color_components(vertices.color_components);

        if let Some(face_element) = header.element("face") {
            let face_element = face_element.clone();
            let face_records = decode_element(reader.as_mut(), header.mode, &face_element)?;
            let index_property = find_index_list_property(&face_element)
                .ok_or_else(|| Error::parse("PLY 'face' element has no list property"))?
                .to_string();
            emit_faces(&mut builder, &vertices, &face_records, &index_property)?;
        }

        let chunks: Vec<DataChunk> = builder.finish();
        Ok(LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(chunks)),
            materials: Vec::new(),
            textures: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_ply(text: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "meshstream-ply-loader-test-{}-{}.ply",
            std::process::id(),
            text.len()
        ));
        let mut f = File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    /// Scenario 1 from spec §8: PLY ASCII cube, 8 vertices, 12
    /// triangular faces, no colors.
    #[test]
    fn ascii_cube_yields_one_chunk() {
        let mut text = String::from(
            "ply\nformat ascii 1.0\nelement vertex 8\nproperty float x\nproperty float y\nproperty float z\nelement face 12\nproperty list uchar int vertex_indices\nend_header\n",
        );
        let verts = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        for v in verts {
            text.push_str(&format!("{} {} {}\n", v[0], v[1], v[2]));
        }
        let faces = [
            [0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7],
            [0, 1, 5], [0, 5, 4], [1, 2, 6], [1, 6, 5],
            [2, 3, 7], [2, 7, 6], [3, 0, 4], [3, 4, 7],
        ];
        for f in faces {
            text.push_str(&format!("3 {} {} {}\n", f[0], f[1], f[2]));
        }
        let path = write_ply(&text);

        let mut loader = PlyLoader::new(LoadOptions::default());
        let listener = LoaderListener::new();
        let mut iter = loader.load(&path, &listener).unwrap().iterator;
        std::fs::remove_file(&path).ok();

        assert!(iter.has_next());
        let chunk = iter.next().unwrap();
        assert!(!iter.has_next());

        assert_eq!(chunk.coords.len(), 24);
        assert_eq!(chunk.indices.len(), 36);
        assert_eq!(chunk.bounds.min, [-1.0, -1.0, -1.0]);
        assert_eq!(chunk.bounds.max, [1.0, 1.0, 1.0]);
        chunk.validate().unwrap();
    }

    #[test]
    fn degenerate_face_fails() {
        let text = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 1 1\n1 0\n";
        let path = write_ply(text);
        let mut loader = PlyLoader::new(LoadOptions::default());
        let listener = LoaderListener::new();
        assert!(loader.load(&path, &listener).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn is_valid_file_detects_magic() {
        let path = write_ply("ply\nformat ascii 1.0\nelement vertex 0\nend_header\n");
        let loader = PlyLoader::new(LoadOptions::default());
        assert!(loader.is_valid_file(&path).unwrap());
        std::fs::remove_file(&path).ok();
    }
}
