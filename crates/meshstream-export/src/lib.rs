//! Writers that transcode a `meshstream_loaders` chunk stream into one
//! of the two target formats: custom binary v2 (spec §4.8) and the
//! JSON-like textual format (spec §4.9).
//!
//! This crate has no knowledge of PLY/OBJ/3DS/STL; it only consumes the
//! [`meshstream_loaders::LoadedMesh`] shape any loader produces.

pub mod binary;
pub mod json;

pub use binary::{read_binary, BinaryDocument, BinaryWriter, FORMAT_VERSION};
pub use json::JsonWriter;
