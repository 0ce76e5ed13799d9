//! Caller-facing configuration structs (SPEC_FULL.md §10.3).
//!
//! These are plain data with `Default` impls, mirroring the teacher's
//! `ParseOptions`/`TracingConfig` shape: no config-file or environment
//! layer, since the spec names these as API parameters rather than
//! deployment configuration.

/// Options governing how a [`crate::Loader`] opens and streams a file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Files strictly below this size are memory-mapped; at or above
    /// it, the loader uses buffered seek-and-read (spec §4.1/§6).
    pub mmap_threshold_bytes: u64,
    /// Whether materials should assert texture validity through the
    /// `onValidateTexture` callback (spec §6).
    pub validate_textures: bool,
    /// Maximum vertex-table size per emitted chunk before a flush is
    /// forced (spec §4.2 "Chunked emission", default 65 535 so output
    /// indices fit a 16-bit field).
    pub vertex_budget: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mmap_threshold_bytes: 50 * 1024 * 1024,
            validate_textures: true,
            vertex_budget: 65_535,
        }
    }
}

/// The only charset this implementation offers for text formats
/// (spec §4.1/§6 name UTF-8 as the default; no other encoding is
/// exercised anywhere in the format set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
}

/// Options governing the JSON-like writer (spec §4.9/§6).
#[derive(Debug, Clone)]
pub struct JsonWriterOptions {
    pub charset: Charset,
    pub embed_textures: bool,
    pub remote_texture_url_enabled: bool,
    pub remote_texture_id_enabled: bool,
}

impl Default for JsonWriterOptions {
    fn default() -> Self {
        Self {
            charset: Charset::Utf8,
            embed_textures: true,
            remote_texture_url_enabled: false,
            remote_texture_id_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_options_defaults_match_spec() {
        let opts = LoadOptions::default();
        assert_eq!(opts.mmap_threshold_bytes, 50 * 1024 * 1024);
        assert!(opts.validate_textures);
        assert_eq!(opts.vertex_budget, 65_535);
    }

    #[test]
    fn json_writer_options_defaults_match_spec() {
        let opts = JsonWriterOptions::default();
        assert_eq!(opts.charset, Charset::Utf8);
        assert!(opts.embed_textures);
        assert!(!opts.remote_texture_url_enabled);
        assert!(!opts.remote_texture_id_enabled);
    }
}
