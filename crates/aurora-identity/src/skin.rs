//! Default skin descriptor embedded in the user token (§4.G step 5).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};

const SKIN_WIDTH: u32 = 64;
const SKIN_HEIGHT: u32 = 64;
const DEFAULT_SKIN_COLOR: [u8; 4] = [0x7f, 0x7f, 0x7f, 0xff];

fn default_geometry() -> Value {
    json!({
        "geometry": {
            "default": "geometry.humanoid.custom"
        }
    })
}

fn default_resource_patch() -> Value {
    json!({
        "geometry": {
            "default": "geometry.humanoid.custom"
        }
    })
}

fn flat_rgba_image(color: [u8; 4]) -> String {
    let mut pixels = Vec::with_capacity((SKIN_WIDTH * SKIN_HEIGHT * 4) as usize);
    for _ in 0..(SKIN_WIDTH * SKIN_HEIGHT) {
        pixels.extend_from_slice(&color);
    }
    STANDARD.encode(pixels)
}

/// Builds the default skin fields of the user token, then lets
/// caller-supplied overrides win field-by-field.
pub fn build_skin_fields(overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("SkinId".into(), json!(format!("aurora-{}", uuid::Uuid::new_v4())));
    fields.insert(
        "SkinResourcePatch".into(),
        json!(STANDARD.encode(default_resource_patch().to_string())),
    );
    fields.insert("SkinImageWidth".into(), json!(SKIN_WIDTH));
    fields.insert("SkinImageHeight".into(), json!(SKIN_HEIGHT));
    fields.insert("SkinData".into(), json!(flat_rgba_image(DEFAULT_SKIN_COLOR)));
    fields.insert(
        "SkinGeometryData".into(),
        json!(STANDARD.encode(default_geometry().to_string())),
    );
    fields.insert("CapeImageWidth".into(), json!(0));
    fields.insert("CapeImageHeight".into(), json!(0));
    fields.insert("CapeData".into(), json!(""));
    fields.insert("CapeId".into(), json!(""));
    fields.insert("CapeOnClassicSkin".into(), json!(false));
    fields.insert("ArmSize".into(), json!("wide"));
    fields.insert("SkinColor".into(), json!("#0"));
    fields.insert("PremiumSkin".into(), json!(false));
    fields.insert("PersonaSkin".into(), json!(false));
    fields.insert("PersonaPieces".into(), json!([]));
    fields.insert("PieceTintColors".into(), json!([]));
    fields.insert("TrustedSkin".into(), json!(false));

    for (key, value) in overrides {
        fields.insert(key.clone(), value.clone());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skin_image_is_correct_size_when_decoded() {
        let fields = build_skin_fields(&Map::new());
        let encoded = fields.get("SkinData").unwrap().as_str().unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded.len(), (SKIN_WIDTH * SKIN_HEIGHT * 4) as usize);
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut overrides = Map::new();
        overrides.insert("ArmSize".into(), json!("slim"));
        let fields = build_skin_fields(&overrides);
        assert_eq!(fields.get("ArmSize").unwrap(), "slim");
    }
}
