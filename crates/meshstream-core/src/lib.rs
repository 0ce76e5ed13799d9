//! Shared data model, byte reader, callbacks, and error types for the
//! meshstream mesh-format loaders and writers.
//!
//! This crate has no knowledge of any specific file format; it defines
//! the vocabulary (`DataChunk`, `Material`, `Texture`, `ByteReader`,
//! `Error`) that `meshstream-loaders` and `meshstream-export` share.

pub mod callbacks;
pub mod chunk;
pub mod error;
pub mod material;
pub mod options;
pub mod reader;

pub use callbacks::{LoaderListener, MaterialCallbacks, MeshWriterCallbacks, ObjCallbacks};
pub use chunk::{BoundingBox, DataChunk};
pub use error::{Error, Result, ResultExt};
pub use material::{
    scale_unit_float_to_byte, scale_unit_float_to_percent, scale_unit_floats_to_bytes,
    IlluminationModel, Material, Texture,
};
pub use options::{Charset, JsonWriterOptions, LoadOptions};
pub use reader::{open_reader, ByteReader, Endian, MmapReader, StreamReader};
