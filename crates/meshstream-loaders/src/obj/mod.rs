//! Wavefront OBJ parser and iterator (spec §4.3), bridged to the MTL
//! resolver (spec §4.4) via `mtllib`/`usemtl`.

use std::collections::HashMap;
use std::path::Path;

use meshstream_core::{
    DataChunk, Error, LoadOptions, LoaderListener, MaterialCallbacks, ObjCallbacks, Result,
};

use crate::chunk_builder::{ChunkBuilder, VertexAttrs};
use crate::mtl::parse_mtl;
use crate::traits::{LoadedMesh, LockState, MeshIterator, VecMeshIterator};

/// Resolves a possibly-negative, 1-based OBJ index against the current
/// pool length. `0` means "absent" (OBJ never emits index 0; this
/// implementation reuses it as the chunk-builder's sentinel for "no
/// texcoord"/"no normal" on a face corner, spec §9 open question (b)).
fn resolve_index(raw: i64, pool_len: usize) -> Result<i64> {
    if raw > 0 {
        Ok(raw)
    } else if raw < 0 {
        let resolved = pool_len as i64 + raw + 1;
        if resolved < 1 {
            return Err(Error::parse(format!(
                "negative OBJ index {raw} out of range for pool of length {pool_len}"
            )));
        }
        Ok(resolved)
    } else {
        Err(Error::parse("OBJ index 0 is invalid (1-based indexing)"))
    }
}

/// One parsed face-corner specifier: `pos[/tex[/norm]]` or `pos//norm`.
fn parse_corner(token: &str, pos_len: usize, tex_len: usize, norm_len: usize) -> Result<(i64, i64, i64)> {
    let mut parts = token.split('/');
    let pos_raw: i64 = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::parse("face corner missing position index"))?
        .parse()
        .map_err(|_| Error::parse(format!("invalid position index in '{token}'")))?;
    let pos = resolve_index(pos_raw, pos_len)?;

    let tex = match parts.next() {
        Some("") | None => 0,
        Some(tex_token) => {
            let raw: i64 = tex_token
                .parse()
                .map_err(|_| Error::parse(format!("invalid texcoord index in '{token}'")))?;
            resolve_index(raw, tex_len)?
        }
    };

    let norm = match parts.next() {
        Some("") | None => 0,
        Some(norm_token) => {
            let raw: i64 = norm_token
                .parse()
                .map_err(|_| Error::parse(format!("invalid normal index in '{token}'")))?;
            resolve_index(raw, norm_len)?
        }
    };

    Ok((pos, tex, norm))
}

pub struct ObjLoader {
    options: LoadOptions,
    lock: LockState,
}

impl ObjLoader {
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
        text: &str,
        listener: &LoaderListener,
        obj_callbacks: &ObjCallbacks,
        material_callbacks: &MaterialCallbacks,
    ) -> Result<LoadedMesh> {
        self.lock.check_unlocked()?;
        self.lock.lock();
        listener.fire_start();
        let result = self.load_inner(path, text, obj_callbacks, material_callbacks);
        listener.fire_end();
        self.lock.unlock();
        result
    }

    fn load_inner(
        &mut self,
        path: &Path,
        text: &str,
        obj_callbacks: &ObjCallbacks,
        material_callbacks: &MaterialCallbacks,
    ) -> Result<LoadedMesh> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut texcoords: Vec<[f32; 2]> = Vec::new();

        let mut materials = Vec::new();
        let mut textures = Vec::new();
        let mut material_by_name: HashMap<String, u32> = HashMap::new();
        let mut next_material_id = 0u32;
        let mut next_texture_id = 0u32;
        let mut active_material: Option<u32> = None;

        let mut builder: ChunkBuilder<(i64, i64, i64)> =
            ChunkBuilder::new(self.options.vertex_budget);

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let directive = tokens.next().unwrap_or("");

            match directive {
                "v" => {
                    let x = parse_f32(tokens.next(), "v", line_no)?;
                    let y = parse_f32(tokens.next(), "v", line_no)?;
                    let z = parse_f32(tokens.next(), "v", line_no)?;
                    positions.push([x, y, z]);
                }
                "vn" => {
                    let x = parse_f32(tokens.next(), "vn", line_no)?;
                    let y = parse_f32(tokens.next(), "vn", line_no)?;
                    let z = parse_f32(tokens.next(), "vn", line_no)?;
                    normals.push([x, y, z]);
                }
                "vt" => {
                    let u = parse_f32(tokens.next(), "vt", line_no)?;
                    let v = parse_f32(tokens.next(), "vt", line_no)?;
                    texcoords.push([u, v]);
                }
                "f" => {
                    let corner_tokens: Vec<&str> = tokens.collect();
                    if corner_tokens.len() < 3 {
                        return Err(Error::parse_at(
                            format!("face with {} vertices, minimum is 3", corner_tokens.len()),
                            line_no as u64,
                        ));
                    }
                    let mut locals = Vec::with_capacity(corner_tokens.len());
                    for token in &corner_tokens {
                        let (pos, tex, norm) =
                            parse_corner(token, positions.len(), texcoords.len(), normals.len())?;
                        let coord = *positions
                            .get((pos - 1) as usize)
                            .ok_or_else(|| Error::parse(format!("face references out-of-range position {pos}")))?;
                        let attrs = VertexAttrs {
                            coord,
                            normal: if norm > 0 {
                                normals.get((norm - 1) as usize).copied()
                            } else {
                                None
                            },
                            texcoord: if tex > 0 {
                                texcoords.get((tex - 1) as usize).copied()
                            } else {
                                None
                            },
                            color: None,
                        };
                        locals.push(builder.intern_vertex((pos, tex, norm), attrs));
                    }
                    for i in 1..locals.len() - 1 {
                        builder.push_triangle(locals[0], locals[i], locals[i + 1]);
                    }
                    builder.flush_if_over_budget();
                }
                "mtllib" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::parse("'mtllib' missing filename"))?;
                    let resolved_path = path
                        .parent()
                        .map(|p| p.join(name))
                        .unwrap_or_else(|| Path::new(name).to_path_buf());
                    if let Some(bytes) = obj_callbacks
                        .on_material_loader_requested
                        .as_ref()
                        .and_then(|f| f(&resolved_path))
                    {
                        let mtl_text = std::str::from_utf8(&bytes)?;
                        let library = parse_mtl(
                            mtl_text,
                            &mut next_material_id,
                            &mut next_texture_id,
                            material_callbacks,
                        )?;
                        for (name, material) in library.names.into_iter().zip(library.materials.into_iter()) {
                            material_by_name.insert(name, material.id);
                            materials.push(material);
                        }
                        textures.extend(library.textures);
                    } else {
                        tracing::debug!(name = %name, "mtllib callback declined to provide material file");
                    }
                }
                "usemtl" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::parse("'usemtl' missing material name"))?;
                    active_material = material_by_name.get(name).copied();
                    builder.set_material(active_material);
                }
                "g" | "o" | "s" => {
                    // Grouping/smoothing directives are ignored (spec §4.3).
                }
                _ => {
                    tracing::debug!(directive = %directive, "ignoring unrecognised OBJ directive");
                }
            }
        }

        let chunks: Vec<DataChunk> = builder.finish();
        Ok(LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(chunks)),
            materials,
            textures,
        })
    }
}

fn parse_f32(token: Option<&str>, directive: &str, line_no: usize) -> Result<f32> {
    token
        .ok_or_else(|| Error::parse_at(format!("'{directive}' missing component"), line_no as u64))?
        .parse::<f32>()
        .map_err(|_| Error::parse_at(format!("'{directive}' component is not a float"), line_no as u64))
}
