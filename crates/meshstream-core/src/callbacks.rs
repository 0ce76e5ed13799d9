//! Callback bundles for the loader/writer programmable boundary
//! (spec §6, design note "Callbacks over inheritance").
//!
//! Several listener roles compose in this system. Rather than a class
//! hierarchy, each role is a set of function-valued fields on a plain
//! struct, mirroring the boxed-closure `ProgressCallback` pattern the
//! loader traits already use.

use std::path::Path;

use crate::chunk::DataChunk;
use crate::material::Texture;

/// `Box<dyn Fn(...) + Send + Sync>`, the shape every callback field in
/// this module shares.
pub type Callback<Args, Out> = Box<dyn Fn(Args) -> Out + Send + Sync>;

/// Notifications a [`crate::Loader`]-shaped type fires over its
/// lifetime (spec §6 "Loader listener").
#[derive(Default)]
pub struct LoaderListener {
    pub on_load_start: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_load_end: Option<Box<dyn Fn() + Send + Sync>>,
    /// `progress` in `[0, 1]`; fired whenever the cumulative delta
    /// exceeds the 1% threshold (spec §4.7).
    pub on_load_progress_change: Option<Box<dyn Fn(f32) + Send + Sync>>,
}

impl LoaderListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire_start(&self) {
        if let Some(f) = &self.on_load_start {
            f();
        }
    }

    pub fn fire_end(&self) {
        if let Some(f) = &self.on_load_end {
            f();
        }
    }

    pub fn fire_progress(&self, progress: f32) {
        if let Some(f) = &self.on_load_progress_change {
            f(progress);
        }
    }
}

/// OBJ-specific callback: resolving `mtllib <name>` to an MTL source
/// (spec §4.3, §6 "OBJ loader").
pub struct ObjCallbacks {
    pub on_material_loader_requested:
        Option<Box<dyn Fn(&Path) -> Option<Vec<u8>> + Send + Sync>>,
}

impl Default for ObjCallbacks {
    fn default() -> Self {
        Self {
            on_material_loader_requested: None,
        }
    }
}

/// Material-loader callback: externally asserting texture validity
/// (spec §6 "Material loader").
pub struct MaterialCallbacks {
    pub on_validate_texture: Option<Box<dyn Fn(&Texture) -> bool + Send + Sync>>,
    pub validate_textures: bool,
}

impl Default for MaterialCallbacks {
    fn default() -> Self {
        Self {
            on_validate_texture: None,
            validate_textures: true,
        }
    }
}

impl MaterialCallbacks {
    /// Applies the configured validation policy to `texture`. Returns
    /// `true` when validation is disabled or no callback is set (the
    /// spec treats an absent callback as "nothing to assert").
    pub fn validate(&self, texture: &Texture) -> bool {
        if !self.validate_textures {
            return true;
        }
        match &self.on_validate_texture {
            Some(f) => f(texture),
            None => true,
        }
    }
}

/// The mesh writer's full callback surface (spec §6 "Mesh writer"),
/// covering progress notification, chunk delivery, and the
/// texture-file lifecycle around the binary/JSON writers.
#[derive(Default)]
pub struct MeshWriterCallbacks {
    pub on_write_start: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_write_end: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_write_progress_change: Option<Box<dyn Fn(f32) + Send + Sync>>,
    pub on_chunk_available: Option<Box<dyn Fn(&DataChunk) + Send + Sync>>,
    pub on_texture_received: Option<Box<dyn Fn(u32, i32, i32) + Send + Sync>>,
    pub on_texture_data_available: Option<Box<dyn Fn(&Texture) + Send + Sync>>,
    pub on_texture_data_processed: Option<Box<dyn Fn(&Texture) + Send + Sync>>,
    /// Supplies the raw encoded bytes for a texture to embed (custom
    /// binary v2's texture section, the JSON writer's BASE64 `data`
    /// field). Mirrors `ObjCallbacks::on_material_loader_requested`'s
    /// "callback returns bytes or declines" shape rather than the
    /// source's file-handle juggling, since image decoding itself is
    /// out of scope (spec §1 "Out of scope").
    pub on_texture_bytes_requested: Option<Box<dyn Fn(&Texture) -> Option<Vec<u8>> + Send + Sync>>,
}

impl MeshWriterCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire_start(&self) {
        if let Some(f) = &self.on_write_start {
            f();
        }
    }

    pub fn fire_end(&self) {
        if let Some(f) = &self.on_write_end {
            f();
        }
    }

    pub fn fire_progress(&self, progress: f32) {
        if let Some(f) = &self.on_write_progress_change {
            f(progress);
        }
    }

    pub fn fire_chunk_available(&self, chunk: &DataChunk) {
        if let Some(f) = &self.on_chunk_available {
            f(chunk);
        }
    }

    /// Requests a texture's encoded bytes; `None` if no callback is
    /// registered or it declines to provide them (the writer then omits
    /// the texture's embedded data rather than failing the whole write).
    pub fn texture_bytes(&self, texture: &Texture) -> Option<Vec<u8>> {
        self.on_texture_bytes_requested.as_ref().and_then(|f| f(texture))
    }
}
