//! 3DS parser (spec §4.5): a recursive tagged-chunk tree walker that
//! recognises the material and mesh-object chunks and bounded-skips
//! everything else, always landing exactly on `start + length`.

pub mod ids;

use std::collections::HashMap;
use std::path::Path;

use meshstream_core::{
    open_reader, ByteReader, DataChunk, Endian, Error, LoadOptions, LoaderListener,
    MaterialCallbacks, Material, Result, Texture,
};

use crate::chunk_builder::{ChunkBuilder, VertexAttrs};
use crate::mtl::new_texture;
use crate::traits::{AsMutReader, LoadedMesh, LockState, MeshIterator, VecMeshIterator};

/// A chunk header: id, the position its payload starts at, and the
/// absolute position its payload (and any nested chunks) must end at.
struct ChunkHeader {
    id: u16,
    end: u64,
}

fn read_chunk_header(reader: &mut dyn ByteReader) -> Result<ChunkHeader> {
    let start = reader.position();
    let id = reader.read_u16(Endian::Little)?;
    let length = reader.read_u32(Endian::Little)? as u64;
    if length < 6 {
        return Err(Error::parse_at(
            format!("3DS chunk {id:#06x} has length {length} shorter than its own header"),
            start,
        ));
    }
    Ok(ChunkHeader {
        id,
        end: start + length,
    })
}

/// Lands the reader exactly on `end` regardless of how much of the
/// chunk's body a handler actually consumed (the bounded-skip
/// invariant, spec §4.5/P6).
fn land(reader: &mut dyn ByteReader, end: u64) -> Result<()> {
    reader.seek_to(end)
}

fn read_cstring(reader: &mut dyn ByteReader) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = reader.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(std::str::from_utf8(&bytes)?.to_string())
}

fn read_color_subchunk(reader: &mut dyn ByteReader, end: u64) -> Result<[u8; 3]> {
    let header = read_chunk_header(reader)?;
    let color = match header.id {
        ids::COLOR_24 => {
            let b = reader.read_exact_bytes(3)?;
            [b[0], b[1], b[2]]
        }
        ids::COLOR_F => {
            let r = reader.read_f32(Endian::Little)?;
            let g = reader.read_f32(Endian::Little)?;
            let b = reader.read_f32(Endian::Little)?;
            meshstream_core::scale_unit_floats_to_bytes(r, g, b)
        }
        other => {
            return Err(Error::parse(format!(
                "expected a colour chunk, found {other:#06x}"
            )))
        }
    };
    land(reader, end)?;
    Ok(color)
}

fn read_percentage_subchunk(reader: &mut dyn ByteReader, end: u64) -> Result<u8> {
    let header = read_chunk_header(reader)?;
    let value = match header.id {
        ids::INT_PERCENTAGE => reader.read_u16(Endian::Little)?.min(100) as u8,
        ids::FLOAT_PERCENTAGE => reader.read_f32(Endian::Little)?.clamp(0.0, 100.0).round() as u8,
        other => {
            return Err(Error::parse(format!(
                "expected a percentage chunk, found {other:#06x}"
            )))
        }
    };
    land(reader, end)?;
    Ok(value)
}

fn parse_texmap(
    reader: &mut dyn ByteReader,
    end: u64,
    textures: &mut Vec<Texture>,
    next_texture_id: &mut u32,
    material_callbacks: &MaterialCallbacks,
) -> Result<Option<u32>> {
    let mut texture_id = None;
    while reader.position() < end {
        let header = read_chunk_header(reader)?;
        if header.id == ids::MAT_MAPNAME {
            let filename = read_cstring(reader)?;
            texture_id = Some(new_texture(
                textures,
                next_texture_id,
                &filename,
                material_callbacks,
            )?);
        }
        land(reader, header.end)?;
    }
    Ok(texture_id)
}

fn parse_mat_entry(
    reader: &mut dyn ByteReader,
    end: u64,
    next_material_id: &mut u32,
    next_texture_id: &mut u32,
    textures: &mut Vec<Texture>,
    material_callbacks: &MaterialCallbacks,
) -> Result<(String, Material)> {
    let mut name = String::new();
    let id = *next_material_id;
    *next_material_id += 1;
    let mut material = Material::new(id);

    while reader.position() < end {
        let header = read_chunk_header(reader)?;
        match header.id {
            ids::MAT_NAME => name = read_cstring(reader)?,
            ids::MAT_AMBIENT => material.ambient = Some(read_color_subchunk(reader, header.end)?),
            ids::MAT_DIFFUSE => material.diffuse = Some(read_color_subchunk(reader, header.end)?),
            ids::MAT_SPECULAR => material.specular = Some(read_color_subchunk(reader, header.end)?),
            ids::MAT_SHININESS => {
                material.specular_coefficient = Some(read_percentage_subchunk(reader, header.end)? as f32)
            }
            ids::MAT_TRANSPARENCY => {
                material.transparency = Some(read_percentage_subchunk(reader, header.end)?)
            }
            ids::MAT_TEXMAP => {
                material.diffuse_texture = parse_texmap(
                    reader,
                    header.end,
                    textures,
                    next_texture_id,
                    material_callbacks,
                )?
            }
            _ => {}
        }
        land(reader, header.end)?;
    }

    Ok((name, material))
}

/// A `MESH_MATRIX` chunk's 12 floats, read as 4 row vectors: the local
/// X/Y/Z axes expressed in world space, then the translation.
type MeshMatrix = [[f32; 3]; 4];

fn apply_mesh_matrix(matrix: &MeshMatrix, p: [f32; 3]) -> [f32; 3] {
    let [x_axis, y_axis, z_axis, translation] = *matrix;
    let mut out = translation;
    for k in 0..3 {
        out[k] += p[0] * x_axis[k] + p[1] * y_axis[k] + p[2] * z_axis[k];
    }
    out
}

/// Parses a `N_TRI_OBJECT` sub-tree into the [`DataChunk`]s it produces
/// (more than one when `MSH_MAT_GROUP` assigns more than one material).
fn parse_tri_object(
    reader: &mut dyn ByteReader,
    end: u64,
    material_name_to_id: &HashMap<String, u32>,
    vertex_budget: u32,
) -> Result<Vec<DataChunk>> {
    let mut points: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Option<Vec<[f32; 2]>> = None;
    let mut faces: Vec<[u32; 3]> = Vec::new();
    let mut face_material: Vec<Option<u32>> = Vec::new();
    let mut matrix: Option<MeshMatrix> = None;

    while reader.position() < end {
        let header = read_chunk_header(reader)?;
        match header.id {
            ids::POINT_ARRAY => {
                let count = reader.read_u16(Endian::Little)? as usize;
                points.reserve(count);
                for _ in 0..count {
                    let x = reader.read_f32(Endian::Little)?;
                    let y = reader.read_f32(Endian::Little)?;
                    let z = reader.read_f32(Endian::Little)?;
                    points.push([x, y, z]);
                }
            }
            ids::MESH_MATRIX => {
                let mut rows = [[0f32; 3]; 4];
                for row in rows.iter_mut() {
                    for component in row.iter_mut() {
                        *component = reader.read_f32(Endian::Little)?;
                    }
                }
                matrix = Some(rows);
            }
            ids::TEX_VERTS => {
                let count = reader.read_u16(Endian::Little)? as usize;
                let mut table = Vec::with_capacity(count);
                for _ in 0..count {
                    let u = reader.read_f32(Endian::Little)?;
                    let v = reader.read_f32(Endian::Little)?;
                    table.push([u, v]);
                }
                texcoords = Some(table);
            }
            ids::FACE_ARRAY => {
                let count = reader.read_u16(Endian::Little)? as usize;
                faces.reserve(count);
                for _ in 0..count {
                    let a = reader.read_u16(Endian::Little)? as u32;
                    let b = reader.read_u16(Endian::Little)? as u32;
                    let c = reader.read_u16(Endian::Little)? as u32;
                    let _flags = reader.read_u16(Endian::Little)?;
                    faces.push([a, b, c]);
                }
                face_material = vec![None; faces.len()];
                while reader.position() < header.end {
                    let group_header = read_chunk_header(reader)?;
                    if group_header.id == ids::MSH_MAT_GROUP {
                        let name = read_cstring(reader)?;
                        let material = material_name_to_id.get(&name).copied();
                        let n = reader.read_u16(Endian::Little)? as usize;
                        for _ in 0..n {
                            let face_idx = reader.read_u16(Endian::Little)? as usize;
                            if let Some(slot) = face_material.get_mut(face_idx) {
                                *slot = material;
                            }
                        }
                    }
                    land(reader, group_header.end)?;
                }
            }
            _ => {}
        }
        land(reader, header.end)?;
    }

    if let Some(matrix) = &matrix {
        for point in points.iter_mut() {
            *point = apply_mesh_matrix(matrix, *point);
        }
    }

    let mut builder: ChunkBuilder<u32> = ChunkBuilder::new(vertex_budget);
    for (i, face) in faces.iter().enumerate() {
        builder.set_material(face_material.get(i).copied().flatten());
        let mut locals = [0u32; 3];
        for (slot, &point_idx) in locals.iter_mut().zip(face.iter()) {
            let coord = *points
                .get(point_idx as usize)
                .ok_or_else(|| Error::parse(format!("face references out-of-range point {point_idx}")))?;
            let attrs = VertexAttrs {
                coord,
                normal: None,
                texcoord: texcoords.as_ref().and_then(|t| t.get(point_idx as usize)).copied(),
                color: None,
            };
            *slot = builder.intern_vertex(point_idx, attrs);
        }
        builder.push_triangle(locals[0], locals[1], locals[2]);
        builder.flush_if_over_budget();
    }
    Ok(builder.finish())
}

pub struct TdsLoader {
    options: LoadOptions,
    lock: LockState,
}

impl TdsLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            lock: LockState::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn load(
        &mut self,
        path: &Path,
        listener: &LoaderListener,
        material_callbacks: &MaterialCallbacks,
    ) -> Result<LoadedMesh> {
        self.lock.check_unlocked()?;
        self.lock.lock();
        listener.fire_start();
        let _span = tracing::info_span!("parse", format = "3ds", path = %path.display()).entered();
        let start = std::time::Instant::now();
        crate::log_parse_start!("3ds", path);
        let result = self.load_inner(path, material_callbacks);
        match &result {
            Ok(mesh) => {
                crate::log_parse_complete!("3ds", start.elapsed(), mesh.iterator.size_hint().unwrap_or(0))
            }
            Err(err) => crate::log_parse_error!("3ds", err),
        }
        listener.fire_end();
        self.lock.unlock();
        result
    }

    fn load_inner(&mut self, path: &Path, material_callbacks: &MaterialCallbacks) -> Result<LoadedMesh> {
        let mut boxed_reader = open_reader(path, self.options.mmap_threshold_bytes)?;
        let reader = boxed_reader.as_mut();

        let root = read_chunk_header(reader)?;
        if root.id != ids::M3D_MAGIC {
            return Err(Error::UnsupportedFormat {
                format: format!("not a 3DS file (root chunk {:#06x})", root.id),
            });
        }

        let mut materials = Vec::new();
        let mut material_names = Vec::new();
        let mut textures = Vec::new();
        let mut next_material_id = 0u32;
        let mut next_texture_id = 0u32;
        let mut object_spans: Vec<(u64, u64)> = Vec::new();

        while reader.position() < root.end {
            let header = read_chunk_header(reader)?;
            if header.id == ids::MDATA {
                while reader.position() < header.end {
                    let inner = read_chunk_header(reader)?;
                    match inner.id {
                        ids::MAT_ENTRY => {
                            let (name, material) = parse_mat_entry(
                                reader,
                                inner.end,
                                &mut next_material_id,
                                &mut next_texture_id,
                                &mut textures,
                                material_callbacks,
                            )?;
                            material_names.push(name);
                            materials.push(material);
                        }
                        ids::NAMED_OBJECT => {
                            object_spans.push((reader.position(), inner.end));
                        }
                        _ => {}
                    }
                    land(reader, inner.end)?;
                }
            }
            land(reader, header.end)?;
        }

        let material_name_to_id: HashMap<String, u32> = material_names
            .iter()
            .cloned()
            .zip(materials.iter().map(|m| m.id))
            .collect();

        let mut chunks = Vec::new();
        for (start, end) in object_spans {
            reader.seek_to(start)?;
            let _name = read_cstring(reader)?;
            while reader.position() < end {
                let header = read_chunk_header(reader)?;
                if header.id == ids::N_TRI_OBJECT {
                    chunks.extend(parse_tri_object(
                        reader,
                        header.end,
                        &material_name_to_id,
                        self.options.vertex_budget,
                    )?);
                }
                land(reader, header.end)?;
            }
        }

        Ok(LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(chunks)),
            materials,
            textures,
        })
    }
}
