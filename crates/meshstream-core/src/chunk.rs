//! The format-agnostic data model shared by every loader and writer:
//! [`DataChunk`], [`BoundingBox`], and the invariant checks described in
//! the data model and testable-properties sections of the spec.

use crate::error::{Error, Result};

/// Axis-aligned bounding box over a chunk's coordinates.
///
/// Initialised to the "empty" state (`+inf`/`-inf`) so that the first
/// call to [`BoundingBox::expand`] sets both corners to that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    pub fn expand(&mut self, point: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(point[i]);
            self.max[i] = self.max[i].max(point[i]);
        }
    }

    /// Recompute tightly over `coords` (x,y,z triples). Used after a
    /// chunk's full vertex table is known (I6/P3).
    pub fn from_coords(coords: &[f32]) -> Self {
        let mut bbox = Self::EMPTY;
        for v in coords.chunks_exact(3) {
            bbox.expand([v[0], v[1], v[2]]);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A self-contained slice of geometry: the lingua franca between
/// readers and writers (spec §3).
#[derive(Debug, Clone, Default)]
pub struct DataChunk {
    pub coords: Vec<f32>,
    pub indices: Vec<u32>,
    pub colors: Vec<u8>,
    pub color_components: u8,
    pub texture_coords: Vec<f32>,
    pub normals: Vec<f32>,
    pub bounds: BoundingBox,
    pub material: Option<u32>,
}

impl DataChunk {
    pub fn new() -> Self {
        Self {
            color_components: 3,
            bounds: BoundingBox::EMPTY,
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.coords.len() / 3
    }

    /// Recompute `bounds` tightly over `coords` (I6/P3).
    pub fn recompute_bounds(&mut self) {
        self.bounds = BoundingBox::from_coords(&self.coords);
    }

    /// Validate (I1)-(I5): divisibility invariants (P1) and index
    /// bounds (P2). Does not check (I6)/(I7); those are structural
    /// properties of the producing iterator, not of a chunk in
    /// isolation.
    pub fn validate(&self) -> Result<()> {
        if self.coords.len() % 3 != 0 {
            return Err(Error::parse(format!(
                "chunk coords length {} not divisible by 3",
                self.coords.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::parse(format!(
                "chunk indices length {} not divisible by 3",
                self.indices.len()
            )));
        }
        if self.texture_coords.len() % 2 != 0 {
            return Err(Error::parse(format!(
                "chunk textureCoords length {} not divisible by 2",
                self.texture_coords.len()
            )));
        }
        if self.color_components > 0 && self.colors.len() % self.color_components as usize != 0 {
            return Err(Error::parse(format!(
                "chunk colors length {} not divisible by colorComponents {}",
                self.colors.len(),
                self.color_components
            )));
        }
        let vertex_count = self.vertex_count() as u32;
        for &i in &self.indices {
            if i >= vertex_count {
                return Err(Error::parse(format!(
                    "index {i} out of bounds for {vertex_count} vertices"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_expand_tracks_min_max() {
        let mut bbox = BoundingBox::EMPTY;
        bbox.expand([1.0, 2.0, 3.0]);
        bbox.expand([-1.0, 5.0, 0.0]);
        assert_eq!(bbox.min, [-1.0, 2.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 5.0, 3.0]);
    }

    #[test]
    fn from_coords_matches_manual_expand() {
        let coords = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let bbox = BoundingBox::from_coords(&coords);
        assert_eq!(bbox.min, [0.0, 0.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn validate_rejects_misaligned_coords() {
        let mut chunk = DataChunk::new();
        chunk.coords = vec![0.0, 0.0];
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_bounds_index() {
        let mut chunk = DataChunk::new();
        chunk.coords = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        chunk.indices = vec![0, 1, 5];
        assert!(chunk.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_triangle() {
        let mut chunk = DataChunk::new();
        chunk.coords = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        chunk.indices = vec![0, 1, 2];
        chunk.recompute_bounds();
        assert!(chunk.validate().is_ok());
        assert_eq!(chunk.bounds.max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn validate_rejects_misaligned_colors() {
        let mut chunk = DataChunk::new();
        chunk.coords = vec![0.0, 0.0, 0.0];
        chunk.color_components = 3;
        chunk.colors = vec![255, 0]; // not a multiple of 3
        assert!(chunk.validate().is_err());
    }

    // P1/P2/P3 (spec §8): generated over synthetic vertex/index sets
    // small enough that proptest's shrinker stays useful.
    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn vertex_triples(max_count: usize) -> impl Strategy<Value = Vec<f32>> {
            (0..=max_count).prop_flat_map(|n| {
                proptest::collection::vec(-1000.0f32..1000.0, n * 3)
            })
        }

        proptest! {
            #[test]
            fn p1_p2_well_formed_chunk_always_validates(coords in vertex_triples(20)) {
                let vertex_count = coords.len() / 3;
                let mut chunk = DataChunk::new();
                chunk.coords = coords;
                if vertex_count > 0 {
                    // Every index is a valid offset into the vertex table (P2);
                    // a fan over vertex 0 keeps |indices| % 3 == 0 (P1).
                    let mut indices = Vec::new();
                    for i in 0..vertex_count as u32 {
                        indices.push(0);
                        indices.push(i);
                        indices.push((i + 1) % vertex_count as u32);
                    }
                    chunk.indices = indices;
                }
                chunk.recompute_bounds();
                prop_assert!(chunk.validate().is_ok());
                prop_assert_eq!(chunk.coords.len() % 3, 0);
                prop_assert_eq!(chunk.indices.len() % 3, 0);
            }

            #[test]
            fn p3_bounding_box_is_tight_over_coords(coords in vertex_triples(30)) {
                let mut chunk = DataChunk::new();
                chunk.coords = coords.clone();
                chunk.recompute_bounds();

                if coords.is_empty() {
                    prop_assert!(chunk.bounds.is_empty());
                } else {
                    let mut expected = BoundingBox::EMPTY;
                    for v in coords.chunks_exact(3) {
                        expected.expand([v[0], v[1], v[2]]);
                    }
                    prop_assert_eq!(chunk.bounds, expected);
                }
            }
        }
    }
}
