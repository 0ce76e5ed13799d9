//! JSON-like writer (spec §4.9): a single object with `textures` and
//! `chunks` arrays plus an overall `minCorner`/`maxCorner`, grounded on
//! the teacher's `JsonExporter` (`serde_json::json!` object
//! construction, writing through a `BufWriter`).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};

use meshstream_core::{
    BoundingBox, DataChunk, Error, JsonWriterOptions, Material, MeshWriterCallbacks, Result,
    Texture,
};
use meshstream_loaders::{LoadedMesh, MeshIterator, ProgressTracker};

/// Transcodes a [`LoadedMesh`] into the JSON-like schema described in
/// spec §4.9. Textures are written before any chunk is read from the
/// iterator; once the texture array is closed the spec disables
/// further texture validation, which is a no-op here since this writer
/// never validates textures itself (image decoding is out of scope).
pub struct JsonWriter<'a> {
    options: JsonWriterOptions,
    callbacks: &'a MeshWriterCallbacks,
}

impl<'a> JsonWriter<'a> {
    pub fn new(options: JsonWriterOptions, callbacks: &'a MeshWriterCallbacks) -> Self {
        Self { options, callbacks }
    }

    /// Builds the output document as a [`serde_json::Value`].
    pub fn write(&self, mesh: &mut LoadedMesh) -> Result<Value> {
        self.callbacks.fire_start();
        let result = self.write_inner(mesh);
        self.callbacks.fire_end();
        result
    }

    /// Convenience wrapper that serialises [`Self::write`]'s result
    /// straight to a stream (pretty-printed when `pretty` is set).
    pub fn write_to<W: std::io::Write>(
        &self,
        mesh: &mut LoadedMesh,
        out: W,
        pretty: bool,
    ) -> Result<()> {
        let value = self.write(mesh)?;
        if pretty {
            serde_json::to_writer_pretty(out, &value)
        } else {
            serde_json::to_writer(out, &value)
        }
        .map_err(|e| Error::parse(format!("JSON serialisation failed: {e}")))
    }

    fn write_inner(&self, mesh: &mut LoadedMesh) -> Result<Value> {
        let _span = tracing::info_span!("write", format = "json").entered();
        let textures = self.write_textures(&mesh.textures);

        let mut chunks = Vec::new();
        let mut overall = BoundingBox::EMPTY;
        let mut tracker = mesh.iterator.size_hint().map(|t| ProgressTracker::new(t as u64));
        while mesh.iterator.has_next() {
            let chunk = mesh.iterator.next()?;
            self.callbacks.fire_chunk_available(&chunk);
            if !chunk.bounds.is_empty() {
                overall.expand(chunk.bounds.min);
                overall.expand(chunk.bounds.max);
            }
            chunks.push(write_chunk(&chunk, &mesh.materials));
            if let Some(tracker) = tracker.as_mut() {
                if let Some(progress) = tracker.advance(1) {
                    self.callbacks.fire_progress(progress);
                }
            }
        }
        tracing::debug!(chunks = chunks.len(), textures = textures.len(), "json write complete");

        let mut out = Map::new();
        out.insert("textures".to_string(), Value::Array(textures));
        out.insert("chunks".to_string(), Value::Array(chunks));
        out.insert("minCorner".to_string(), json_floats(&overall.min));
        out.insert("maxCorner".to_string(), json_floats(&overall.max));
        Ok(Value::Object(out))
    }

    fn write_textures(&self, textures: &[Texture]) -> Vec<Value> {
        textures
            .iter()
            .map(|texture| {
                let mut obj = Map::new();
                obj.insert("id".to_string(), json!(texture.id));
                obj.insert("width".to_string(), json!(texture.width));
                obj.insert("height".to_string(), json!(texture.height));
                if self.options.remote_texture_url_enabled {
                    if let Some(path) = &texture.resolved_path {
                        obj.insert("remoteUrl".to_string(), json!(path.display().to_string()));
                    }
                }
                if self.options.remote_texture_id_enabled {
                    obj.insert("remoteId".to_string(), json!(texture.id));
                }
                if self.options.embed_textures {
                    if let Some(bytes) = self.callbacks.texture_bytes(texture) {
                        // Spec §4.9: BASE64 with `/` escaped as `\/`,
                        // matching the teacher's texture-conversion
                        // callback pipeline in spirit (bytes in, a
                        // caller-recognisable encoded form out).
                        let encoded = STANDARD.encode(bytes).replace('/', "\\/");
                        obj.insert("data".to_string(), json!(encoded));
                    }
                }
                Value::Object(obj)
            })
            .collect()
    }
}

fn write_chunk(chunk: &DataChunk, materials: &[Material]) -> Value {
    let mut obj = Map::new();
    if let Some(material_id) = chunk.material {
        if let Some(material) = materials.iter().find(|m| m.id == material_id) {
            obj.insert("material".to_string(), write_material(material));
        }
    }
    if !chunk.indices.is_empty() {
        obj.insert("indices".to_string(), json!(chunk.indices));
    }
    if !chunk.normals.is_empty() {
        obj.insert("vertexNormals".to_string(), json_floats(&chunk.normals));
    }
    if !chunk.coords.is_empty() {
        obj.insert("vertexPositions".to_string(), json_floats(&chunk.coords));
    }
    if !chunk.texture_coords.is_empty() {
        obj.insert(
            "vertexTextureCoords".to_string(),
            json_floats(&chunk.texture_coords),
        );
    }
    if !chunk.bounds.is_empty() {
        obj.insert("minCorner".to_string(), json_floats(&chunk.bounds.min));
        obj.insert("maxCorner".to_string(), json_floats(&chunk.bounds.max));
    }
    if !chunk.colors.is_empty() {
        obj.insert("vertexColors".to_string(), json!(chunk.colors));
        obj.insert("colorComponents".to_string(), json!(chunk.color_components));
    }
    Value::Object(obj)
}

fn write_material(material: &Material) -> Value {
    let mut obj = Map::new();
    obj.insert("id".to_string(), json!(material.id));
    if let Some(rgb) = material.ambient {
        obj.insert("ambient".to_string(), json!(rgb));
    }
    if let Some(rgb) = material.diffuse {
        obj.insert("diffuse".to_string(), json!(rgb));
    }
    if let Some(rgb) = material.specular {
        obj.insert("specular".to_string(), json!(rgb));
    }
    if let Some(v) = material.specular_coefficient {
        obj.insert("specularCoefficient".to_string(), json!(sanitize_f32(v)));
    }
    if let Some(v) = material.transparency {
        obj.insert("transparency".to_string(), json!(v));
    }
    if let Some(model) = material.illumination_model {
        obj.insert("illum".to_string(), json!(model as u8));
    }
    if let Some(t) = material.ambient_texture {
        obj.insert("ambientTexture".to_string(), json!(t));
    }
    if let Some(t) = material.diffuse_texture {
        obj.insert("diffuseTexture".to_string(), json!(t));
    }
    if let Some(t) = material.specular_texture {
        obj.insert("specularTexture".to_string(), json!(t));
    }
    if let Some(t) = material.alpha_texture {
        obj.insert("alphaTexture".to_string(), json!(t));
    }
    if let Some(t) = material.bump_texture {
        obj.insert("bumpTexture".to_string(), json!(t));
    }
    Value::Object(obj)
}

/// Sanitises a float for JSON emission (spec §4.9/P9): `serde_json`
/// refuses to serialise non-finite floats as a bare number at all, so a
/// raw NaN/Infinity would otherwise panic the writer rather than merely
/// produce an invalid document; substituting binary32's positive max
/// keeps the value finite and the document parseable.
fn sanitize_f32(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        f32::MAX
    }
}

fn json_floats(values: &[f32]) -> Value {
    Value::Array(values.iter().map(|v| json!(sanitize_f32(*v))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstream_loaders::VecMeshIterator;

    fn cube_chunk() -> DataChunk {
        let mut chunk = DataChunk::new();
        chunk.coords = vec![
            -1.0, -1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0, -1.0, -1.0, 1.0,
            1.0, -1.0, 1.0, 1.0, 1.0, 1.0, -1.0, 1.0, 1.0,
        ];
        chunk.indices = vec![
            0, 1, 2, 0, 2, 3, 4, 6, 5, 4, 7, 6, 0, 4, 5, 0, 5, 1, 1, 5, 6, 1, 6, 2, 2, 6, 7, 2, 7,
            3, 3, 7, 4, 3, 4, 0,
        ];
        chunk.recompute_bounds();
        chunk
    }

    /// Scenario 6: `embedTextures=false`, no textures present ⇒ empty
    /// `"textures":[]` and no `colorComponents` field (the cube chunk
    /// carries no colors).
    #[test]
    fn scenario_six_empty_textures_and_absent_color_components() {
        let mut mesh = LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(vec![cube_chunk()])),
            materials: Vec::new(),
            textures: Vec::new(),
        };
        let mut options = JsonWriterOptions::default();
        options.embed_textures = false;
        let callbacks = MeshWriterCallbacks::new();
        let writer = JsonWriter::new(options, &callbacks);

        let value = writer.write(&mut mesh).unwrap();
        assert_eq!(value["textures"], json!([]));
        assert!(value["chunks"][0].get("colorComponents").is_none());
        assert_eq!(value["minCorner"], json!([-1.0, -1.0, -1.0]));
        assert_eq!(value["maxCorner"], json!([1.0, 1.0, 1.0]));
    }

    /// P9: non-finite floats never reach the document as raw tokens,
    /// and the result remains parseable.
    #[test]
    fn non_finite_floats_are_sanitized_and_json_stays_parseable() {
        let mut chunk = DataChunk::new();
        chunk.coords = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY];
        chunk.recompute_bounds();

        let mut mesh = LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(vec![chunk])),
            materials: Vec::new(),
            textures: Vec::new(),
        };
        let callbacks = MeshWriterCallbacks::new();
        let writer = JsonWriter::new(JsonWriterOptions::default(), &callbacks);

        let mut bytes = Vec::new();
        writer.write_to(&mut mesh, &mut bytes, false).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("NaN"));
        assert!(!text.contains("Infinity"));
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        let positions = reparsed["chunks"][0]["vertexPositions"].as_array().unwrap();
        assert_eq!(positions[0], json!(f32::MAX));
        assert_eq!(positions[1], json!(f32::MAX));
        assert_eq!(positions[2], json!(f32::MAX));
    }

    #[test]
    fn embedded_texture_bytes_are_base64_with_slash_escaped() {
        let texture = Texture::new(0, "brick.png");
        let mut mesh = LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(Vec::new())),
            materials: Vec::new(),
            textures: vec![texture],
        };
        let mut callbacks = MeshWriterCallbacks::new();
        // Three 0xFF bytes BASE64-encode to "////" unescaped; the
        // writer must emit "\/\/\/\/" instead.
        callbacks.on_texture_bytes_requested = Some(Box::new(|_| Some(vec![0xFF, 0xFF, 0xFF])));
        let writer = JsonWriter::new(JsonWriterOptions::default(), &callbacks);

        let value = writer.write(&mut mesh).unwrap();
        let data = value["textures"][0]["data"].as_str().unwrap();
        assert_eq!(data, "\\/\\/\\/\\/");
    }

    #[test]
    fn material_is_embedded_inline_on_its_chunk() {
        let mut material = Material::new(0);
        material.diffuse = Some([204, 204, 204]);

        let mut chunk = cube_chunk();
        chunk.material = Some(0);

        let mut mesh = LoadedMesh {
            iterator: Box::new(VecMeshIterator::new(vec![chunk])),
            materials: vec![material],
            textures: Vec::new(),
        };
        let callbacks = MeshWriterCallbacks::new();
        let writer = JsonWriter::new(JsonWriterOptions::default(), &callbacks);

        let value = writer.write(&mut mesh).unwrap();
        assert_eq!(value["chunks"][0]["material"]["diffuse"], json!([204, 204, 204]));
    }
}
