//! Format-specific mesh loaders: PLY, OBJ+MTL, 3DS, and STL, each
//! producing the shared [`traits::LoadedMesh`] shape.
//!
//! This crate has no writer logic (see `meshstream-export`) and no CLI
//! (see the root binary); it is purely "bytes in, chunks out".

pub mod chunk_builder;
pub mod logging;
pub mod mtl;
pub mod obj;
pub mod ply;
pub mod stl;
pub mod tds;
pub mod traits;

pub use mtl::{parse_mtl, MtlLibrary};
pub use obj::ObjLoader;
pub use ply::PlyLoader;
pub use stl::StlLoader;
pub use tds::TdsLoader;
pub use traits::{LoadedMesh, LockState, MeshIterator, ProgressTracker, VecMeshIterator};

use std::path::Path;

use meshstream_core::{Error, Result};

/// File extensions recognised by [`sniff_format`], matched
/// case-insensitively (spec §4.1 "format sniffing by extension,
/// falling back to content").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Ply,
    Obj,
    Tds,
    Stl,
}

/// Picks a format purely from `path`'s extension. Loaders that need a
/// content-based fallback (STL's ASCII/binary split, PLY's magic-line
/// sniff) still do that sniffing themselves once a format is chosen.
pub fn sniff_format(path: &Path) -> Result<MeshFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| Error::UnsupportedFormat {
            format: "no file extension".to_string(),
        })?;
    match ext.as_str() {
        "ply" => Ok(MeshFormat::Ply),
        "obj" => Ok(MeshFormat::Obj),
        "3ds" => Ok(MeshFormat::Tds),
        "stl" => Ok(MeshFormat::Stl),
        other => Err(Error::UnsupportedFormat {
            format: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_format_matches_known_extensions() {
        assert_eq!(sniff_format(Path::new("mesh.PLY")).unwrap(), MeshFormat::Ply);
        assert_eq!(sniff_format(Path::new("mesh.obj")).unwrap(), MeshFormat::Obj);
        assert_eq!(sniff_format(Path::new("mesh.3ds")).unwrap(), MeshFormat::Tds);
        assert_eq!(sniff_format(Path::new("mesh.stl")).unwrap(), MeshFormat::Stl);
    }

    #[test]
    fn sniff_format_rejects_unknown_extension() {
        assert!(sniff_format(Path::new("mesh.fbx")).is_err());
    }

    #[test]
    fn sniff_format_rejects_no_extension() {
        assert!(sniff_format(Path::new("mesh")).is_err());
    }
}
