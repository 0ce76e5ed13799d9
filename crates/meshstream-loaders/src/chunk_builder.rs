//! Shared chunk-assembly helper used by every format loader.
//!
//! Each format has its own notion of "vertex identity" (PLY: position
//! in the vertex element; OBJ: the (pos,tex,norm) triple; 3DS: position
//! in the point array) but all of them need the same budget-triggered
//! flush-and-remap behaviour described in spec §4.2/§9 "Cross-chunk
//! vertex remapping" and exercised by P5/I7. This module factors that
//! behaviour out so each parser only supplies the vertex key type and
//! attribute values.

use std::collections::HashMap;
use std::hash::Hash;

use meshstream_core::DataChunk;

/// Per-vertex attribute bundle a loader supplies when interning a
/// vertex into the chunk currently being built.
#[derive(Debug, Clone)]
pub struct VertexAttrs {
    pub coord: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub texcoord: Option<[f32; 2]>,
    pub color: Option<Vec<u8>>,
}

impl VertexAttrs {
    pub fn position(coord: [f32; 3]) -> Self {
        Self {
            coord,
            normal: None,
            texcoord: None,
            color: None,
        }
    }
}

/// Assembles a sequence of [`DataChunk`]s from a stream of
/// (possibly-repeated) vertex keys and triangle references, enforcing
/// the configured vertex budget and performing cross-chunk remapping
/// on flush.
pub struct ChunkBuilder<G: Eq + Hash + Copy> {
    budget: u32,
    color_components: u8,
    current: DataChunk,
    index_of: HashMap<G, u32>,
    finished: Vec<DataChunk>,
}

impl<G: Eq + Hash + Copy> ChunkBuilder<G> {
    pub fn new(budget: u32) -> Self {
        Self {
            budget: budget.max(1),
            color_components: 3,
            current: DataChunk::new(),
            index_of: HashMap::new(),
            finished: Vec::new(),
        }
    }

    pub fn with_color_components(mut self, components: u8) -> Self {
        self.color_components = components;
        self.current.color_components = components;
        self
    }

    pub fn vertex_count(&self) -> u32 {
        self.current.vertex_count() as u32
    }

    /// Sets the material on the chunk currently being built. If a
    /// different material was already set and the chunk has content,
    /// this forces a flush first (spec §4.3 "a material change forces
    /// a chunk boundary").
    pub fn set_material(&mut self, material: Option<u32>) {
        if self.current.material.is_some()
            && self.current.material != material
            && !self.index_of.is_empty()
        {
            self.flush();
        }
        self.current.material = material;
    }

    /// Interns `key`, returning its local index within the chunk
    /// currently being built. Interning the same key twice (P5) is a
    /// no-op beyond the first call and returns the same local index.
    pub fn intern_vertex(&mut self, key: G, attrs: VertexAttrs) -> u32 {
        if let Some(&idx) = self.index_of.get(&key) {
            return idx;
        }
        let idx = self.current.vertex_count() as u32;
        self.current.coords.extend_from_slice(&attrs.coord);
        if let Some(n) = attrs.normal {
            self.current.normals.extend_from_slice(&n);
        }
        if let Some(t) = attrs.texcoord {
            self.current.texture_coords.extend_from_slice(&t);
        }
        if let Some(c) = attrs.color {
            self.current.colors.extend_from_slice(&c);
        }
        self.index_of.insert(key, idx);
        idx
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.current.indices.push(a);
        self.current.indices.push(b);
        self.current.indices.push(c);
    }

    /// Call after each complete face/triangle is pushed. Flushes the
    /// current chunk if its vertex table has reached the configured
    /// budget, so any future reference to an already-seen vertex must
    /// re-intern it in the new chunk (the spec's remap behaviour).
    pub fn flush_if_over_budget(&mut self) {
        if self.vertex_count() >= self.budget {
            self.flush();
        }
    }

    /// Finalises the chunk currently being built (recomputing its
    /// bounding box per I6/P3) and starts a fresh one, carrying over
    /// the active material.
    pub fn flush(&mut self) {
        if self.index_of.is_empty() && self.current.indices.is_empty() {
            return;
        }
        let material = self.current.material;
        let mut finished = std::mem::replace(&mut self.current, DataChunk::new());
        finished.color_components = self.color_components;
        finished.recompute_bounds();
        self.finished.push(finished);
        self.current.material = material;
        self.current.color_components = self.color_components;
        self.index_of.clear();
    }

    /// Flushes any remaining in-progress chunk and returns every
    /// chunk produced, in emission order.
    pub fn finish(mut self) -> Vec<DataChunk> {
        self.flush();
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_key_twice_does_not_duplicate() {
        let mut builder: ChunkBuilder<u32> = ChunkBuilder::new(100);
        let a = builder.intern_vertex(0, VertexAttrs::position([0.0, 0.0, 0.0]));
        let b = builder.intern_vertex(0, VertexAttrs::position([0.0, 0.0, 0.0]));
        assert_eq!(a, b);
        assert_eq!(builder.vertex_count(), 1);
    }

    #[test]
    fn budget_triggers_flush_and_remap() {
        let mut builder: ChunkBuilder<u32> = ChunkBuilder::new(2);
        let v0 = builder.intern_vertex(0, VertexAttrs::position([0.0, 0.0, 0.0]));
        let v1 = builder.intern_vertex(1, VertexAttrs::position([1.0, 0.0, 0.0]));
        let v2 = builder.intern_vertex(2, VertexAttrs::position([0.0, 1.0, 0.0]));
        builder.push_triangle(v0, v1, v2);
        builder.flush_if_over_budget(); // 3 vertices >= budget(2): flush
        // Vertex 0 is referenced again in the next face; it must be
        // re-interned into the new chunk rather than reusing the old
        // local index.
        let v0_again = builder.intern_vertex(0, VertexAttrs::position([0.0, 0.0, 0.0]));
        assert_eq!(v0_again, 0); // first vertex of the new chunk
        let chunks = builder.finish();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].vertex_count(), 3);
        assert_eq!(chunks[1].vertex_count(), 1);
    }

    #[test]
    fn material_change_forces_chunk_boundary() {
        let mut builder: ChunkBuilder<u32> = ChunkBuilder::new(1000);
        builder.set_material(Some(1));
        let v0 = builder.intern_vertex(0, VertexAttrs::position([0.0, 0.0, 0.0]));
        let v1 = builder.intern_vertex(1, VertexAttrs::position([1.0, 0.0, 0.0]));
        let v2 = builder.intern_vertex(2, VertexAttrs::position([0.0, 1.0, 0.0]));
        builder.push_triangle(v0, v1, v2);
        builder.set_material(Some(2));
        let chunks = builder.finish();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].material, Some(1));
    }

    #[test]
    fn empty_builder_produces_no_chunks() {
        let builder: ChunkBuilder<u32> = ChunkBuilder::new(10);
        assert!(builder.finish().is_empty());
    }
}
