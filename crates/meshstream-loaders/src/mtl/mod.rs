//! MTL material-library parser (spec §4.4), invoked by the OBJ parser
//! via `mtllib`.

use meshstream_core::{
    scale_unit_float_to_percent, scale_unit_floats_to_bytes, Error, IlluminationModel, Material,
    MaterialCallbacks, Result, Texture,
};

/// The result of parsing one `.mtl` source: every material it defined,
/// in declaration order, plus every texture it referenced.
#[derive(Debug, Default)]
pub struct MtlLibrary {
    pub materials: Vec<Material>,
    /// `newmtl` names, in the same order as `materials` (so
    /// `names[i]` names `materials[i]`).
    pub names: Vec<String>,
    pub textures: Vec<Texture>,
}

fn parse_f32(token: Option<&str>, directive: &str) -> Result<f32> {
    token
        .ok_or_else(|| Error::parse(format!("'{directive}' missing value")))?
        .parse::<f32>()
        .map_err(|_| Error::parse(format!("'{directive}' value is not a float")))
}

pub(crate) fn new_texture(
    textures: &mut Vec<Texture>,
    next_texture_id: &mut u32,
    filename: &str,
    callbacks: &MaterialCallbacks,
) -> Result<u32> {
    let id = *next_texture_id;
    *next_texture_id += 1;
    let texture = Texture::new(id, filename);
    if !callbacks.validate(&texture) {
        return Err(Error::InvalidTexture {
            path: filename.to_string(),
        });
    }
    textures.push(texture);
    Ok(id)
}

/// Parses MTL source text, assigning sequential texture ids starting
/// at `next_texture_id` (the caller tracks this across multiple MTL
/// files sharing one material table).
pub fn parse_mtl(
    text: &str,
    next_material_id: &mut u32,
    next_texture_id: &mut u32,
    callbacks: &MaterialCallbacks,
) -> Result<MtlLibrary> {
    let mut library = MtlLibrary::default();
    let mut current: Option<Material> = None;
    let mut current_name: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let directive = tokens.next().unwrap_or("");
        let directive_lower = directive.to_ascii_lowercase();

        match directive_lower.as_str() {
            "newmtl" => {
                if let Some(prev) = current.take() {
                    library.materials.push(prev);
                    library.names.push(current_name.take().unwrap_or_default());
                }
                let name = tokens
                    .next()
                    .ok_or_else(|| Error::parse("'newmtl' missing name"))?;
                current_name = Some(name.to_string());
                let id = *next_material_id;
                *next_material_id += 1;
                current = Some(Material::new(id));
            }
            "ka" | "kd" | "ks" => {
                let r = parse_f32(tokens.next(), directive)?;
                let g = parse_f32(tokens.next(), directive)?;
                let b = parse_f32(tokens.next(), directive)?;
                let rgb = scale_unit_floats_to_bytes(r, g, b);
                let material = current
                    .as_mut()
                    .ok_or_else(|| Error::parse(format!("'{directive}' before any 'newmtl'")))?;
                match directive_lower.as_str() {
                    "ka" => material.ambient = Some(rgb),
                    "kd" => material.diffuse = Some(rgb),
                    "ks" => material.specular = Some(rgb),
                    _ => unreachable!(),
                }
            }
            "ns" | "ni" => {
                let value = parse_f32(tokens.next(), directive)?;
                if directive_lower == "ns" {
                    let material = current.as_mut().ok_or_else(|| {
                        Error::parse(format!("'{directive}' before any 'newmtl'"))
                    })?;
                    material.specular_coefficient = Some(value);
                }
                // 'Ni' (index of refraction) has no DataModel slot per spec §3; parsed and discarded.
            }
            "d" | "tr" => {
                // 'd' and 'Tr' are alternative spellings of the same
                // transparency value, scaled identically (spec §4.4).
                let value = parse_f32(tokens.next(), directive)?;
                let material = current
                    .as_mut()
                    .ok_or_else(|| Error::parse(format!("'{directive}' before any 'newmtl'")))?;
                material.transparency = Some(scale_unit_float_to_percent(value));
            }
            "illum" => {
                let value: u32 = tokens
                    .next()
                    .ok_or_else(|| Error::parse("'illum' missing value"))?
                    .parse()
                    .map_err(|_| Error::parse("'illum' value is not an integer"))?;
                let model = IlluminationModel::from_index(value)
                    .ok_or_else(|| Error::parse(format!("illum value {value} out of range 0..10")))?;
                let material = current
                    .as_mut()
                    .ok_or_else(|| Error::parse("'illum' before any 'newmtl'"))?;
                material.illumination_model = Some(model);
            }
            "map_ka" | "map_kd" | "map_ks" | "map_d" | "map_bump" | "bump" => {
                let filename = tokens
                    .next()
                    .ok_or_else(|| Error::parse(format!("'{directive}' missing filename")))?;
                let id = new_texture(&mut library.textures, next_texture_id, filename, callbacks)?;
                let material = current
                    .as_mut()
                    .ok_or_else(|| Error::parse(format!("'{directive}' before any 'newmtl'")))?;
                match directive_lower.as_str() {
                    "map_ka" => material.ambient_texture = Some(id),
                    "map_kd" => material.diffuse_texture = Some(id),
                    "map_ks" => material.specular_texture = Some(id),
                    "map_d" => material.alpha_texture = Some(id),
                    "map_bump" | "bump" => material.bump_texture = Some(id),
                    _ => unreachable!(),
                }
            }
            _ => {
                tracing::debug!(directive = %directive, "ignoring unrecognised MTL directive");
            }
        }
    }

    if let Some(last) = current.take() {
        library.materials.push(last);
        library.names.push(current_name.take().unwrap_or_default());
    }

    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_materials() {
        let text = "newmtl A\nKd 1.0 0.0 0.0\nd 1.0\nillum 2\n\nnewmtl B\nKd 0.0 1.0 0.0\n";
        let mut next_mat = 0;
        let mut next_tex = 0;
        let callbacks = MaterialCallbacks::default();
        let lib = parse_mtl(text, &mut next_mat, &mut next_tex, &callbacks).unwrap();
        assert_eq!(lib.materials.len(), 2);
        assert_eq!(lib.materials[0].diffuse, Some([255, 0, 0]));
        assert_eq!(lib.materials[0].transparency, Some(100));
        assert_eq!(lib.materials[1].diffuse, Some([0, 255, 0]));
    }

    #[test]
    fn tr_and_d_scale_identically() {
        let text = "newmtl A\nTr 0.25\nnewmtl B\nd 0.25\n";
        let mut next_mat = 0;
        let mut next_tex = 0;
        let callbacks = MaterialCallbacks::default();
        let lib = parse_mtl(text, &mut next_mat, &mut next_tex, &callbacks).unwrap();
        assert_eq!(lib.materials[0].transparency, lib.materials[1].transparency);
    }

    #[test]
    fn map_kd_creates_sequential_texture_id() {
        let text = "newmtl A\nmap_Kd diffuse.png\n";
        let mut next_mat = 0;
        let mut next_tex = 5;
        let callbacks = MaterialCallbacks::default();
        let lib = parse_mtl(text, &mut next_mat, &mut next_tex, &callbacks).unwrap();
        assert_eq!(lib.textures[0].id, 5);
        assert_eq!(lib.materials[0].diffuse_texture, Some(5));
        assert_eq!(next_tex, 6);
    }

    #[test]
    fn rejected_texture_fails_with_invalid_texture_error() {
        let text = "newmtl A\nmap_Kd bad.tga\n";
        let mut next_mat = 0;
        let mut next_tex = 0;
        let mut callbacks = MaterialCallbacks::default();
        callbacks.on_validate_texture = Some(Box::new(|_| false));
        let err = parse_mtl(text, &mut next_mat, &mut next_tex, &callbacks).unwrap_err();
        assert!(matches!(err, Error::InvalidTexture { .. }));
    }

    #[test]
    fn directive_before_newmtl_fails() {
        let text = "Kd 1.0 1.0 1.0\n";
        let mut next_mat = 0;
        let mut next_tex = 0;
        let callbacks = MaterialCallbacks::default();
        assert!(parse_mtl(text, &mut next_mat, &mut next_tex, &callbacks).is_err());
    }
}
