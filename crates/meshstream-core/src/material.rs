//! [`Material`] and [`Texture`] records (spec §3).
//!
//! Both are immutable after publish into the parse-global material
//! table: once a parser hands a `Material` an identifier and inserts
//! it, the identifier and published fields never change, only shared
//! by reference from chunks.

/// Classical OBJ `illum` illumination model taxonomy (0..10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IlluminationModel {
    ColorOnNoAmbient = 0,
    ColorOnAmbientOn = 1,
    HighlightOn = 2,
    ReflectionOnRaytraceOn = 3,
    TransparencyGlassOnReflectionRaytraceOn = 4,
    ReflectionFresnelOnRaytraceOn = 5,
    TransparencyRefractionOnReflectionFresnelOffRaytraceOn = 6,
    TransparencyRefractionOnReflectionFresnelOnRaytraceOn = 7,
    ReflectionOnRaytraceOff = 8,
    TransparencyGlassOnReflectionRaytraceOff = 9,
    CastsShadowsOntoInvisibleSurfaces = 10,
}

impl IlluminationModel {
    pub fn from_index(value: u32) -> Option<Self> {
        use IlluminationModel::*;
        Some(match value {
            0 => ColorOnNoAmbient,
            1 => ColorOnAmbientOn,
            2 => HighlightOn,
            3 => ReflectionOnRaytraceOn,
            4 => TransparencyGlassOnReflectionRaytraceOn,
            5 => ReflectionFresnelOnRaytraceOn,
            6 => TransparencyRefractionOnReflectionFresnelOffRaytraceOn,
            7 => TransparencyRefractionOnReflectionFresnelOnRaytraceOn,
            8 => ReflectionOnRaytraceOff,
            9 => TransparencyGlassOnReflectionRaytraceOff,
            10 => CastsShadowsOntoInvisibleSurfaces,
            _ => return None,
        })
    }
}

/// A reference to an image file, validity asserted externally via the
/// material loader's `onValidateTexture` callback.
#[derive(Debug, Clone)]
pub struct Texture {
    pub id: u32,
    pub file_name: String,
    pub resolved_path: Option<std::path::PathBuf>,
    /// Negative signals "unknown"; callers populate this only once the
    /// image has actually been opened/decoded (out of scope here).
    pub width: i32,
    pub height: i32,
    pub valid: bool,
}

impl Texture {
    pub fn new(id: u32, file_name: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            resolved_path: None,
            width: -1,
            height: -1,
            valid: false,
        }
    }
}

/// RGB triple with byte components; "unset" is represented as `None`
/// rather than the source's negative-sentinel convention, since the
/// option type makes the "unset" state unrepresentable-by-accident.
pub type Rgb = Option<[u8; 3]>;

/// An immutable-after-publish shading record (spec §3).
#[derive(Debug, Clone)]
pub struct Material {
    pub id: u32,
    pub ambient: Rgb,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub specular_coefficient: Option<f32>,
    /// 0..100, 0 = opaque.
    pub transparency: Option<u8>,
    pub illumination_model: Option<IlluminationModel>,
    pub ambient_texture: Option<u32>,
    pub diffuse_texture: Option<u32>,
    pub specular_texture: Option<u32>,
    pub alpha_texture: Option<u32>,
    pub bump_texture: Option<u32>,
}

impl Material {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ambient: None,
            diffuse: None,
            specular: None,
            specular_coefficient: None,
            transparency: None,
            illumination_model: None,
            ambient_texture: None,
            diffuse_texture: None,
            specular_texture: None,
            alpha_texture: None,
            bump_texture: None,
        }
    }
}

/// Scales a `[0.0, 1.0]` float triple (MTL `Ka`/`Kd`/`Ks` style) into a
/// byte RGB triple.
pub fn scale_unit_floats_to_bytes(r: f32, g: f32, b: f32) -> [u8; 3] {
    [scale_unit_float_to_byte(r), scale_unit_float_to_byte(g), scale_unit_float_to_byte(b)]
}

pub fn scale_unit_float_to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Scales a `[0.0, 1.0]` transparency float (MTL `d`/`Tr`) into the
/// 0..100 byte range used by [`Material::transparency`].
pub fn scale_unit_float_to_percent(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illumination_model_round_trips_known_values() {
        assert_eq!(
            IlluminationModel::from_index(2),
            Some(IlluminationModel::HighlightOn)
        );
        assert_eq!(IlluminationModel::from_index(11), None);
    }

    #[test]
    fn scale_unit_floats_to_bytes_clamps() {
        assert_eq!(scale_unit_floats_to_bytes(1.5, -0.2, 0.5), [255, 0, 128]);
    }

    #[test]
    fn scale_unit_float_to_percent_rounds() {
        assert_eq!(scale_unit_float_to_percent(0.0), 0);
        assert_eq!(scale_unit_float_to_percent(1.0), 100);
    }

    #[test]
    fn material_new_has_no_set_fields() {
        let m = Material::new(3);
        assert_eq!(m.id, 3);
        assert!(m.diffuse.is_none());
        assert!(m.diffuse_texture.is_none());
    }
}
