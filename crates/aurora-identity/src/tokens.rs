//! Identity chain / user chain token construction (§4.G steps 4-5).

use crate::error::Result;
use crate::keys::EphemeralKeyPair;
use crate::profile::Profile;
use crate::skin::build_skin_fields;
use jsonwebtoken::{Algorithm, Header};
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Mojang's identity-chain-verifying public key, used as a fallback when the
/// server's online-mode token doesn't carry one of its own.
pub const MOJANG_PUBLIC_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

fn base_header(keys: &EphemeralKeyPair, typ: Option<&str>) -> Header {
    let mut header = Header::new(Algorithm::ES384);
    header.x5u = Some(keys.x5u().to_string());
    header.typ = typ.map(|t| t.to_string());
    header
}

/// Offline self-signed identity token: `extraData` carries the derived
/// profile directly, since there's no Mojang-issued chain behind it.
pub fn build_offline_identity_token(keys: &EphemeralKeyPair, profile: &Profile) -> Result<String> {
    let header = base_header(keys, None);
    let claims = json!({
        "extraData": {
            "displayName": profile.name,
            "identity": profile.uuid.to_string(),
            "titleId": "89692877",
            "XUID": profile.xuid,
        },
        "certificateAuthority": true,
        "identityPublicKey": keys.x5u(),
        "nbf": 0,
        "iss": "self",
        "exp": now_secs() + 3600,
    });
    Ok(jsonwebtoken::encode(&header, &claims, &keys.encoding_key()?)?)
}

/// Online-mode identity token: attests this session's ephemeral key under
/// the chain the external provider returned, naming the server-chosen (or
/// Mojang fallback) key as the next certificate authority.
pub fn build_online_identity_token(keys: &EphemeralKeyPair, chain_public_key: &str) -> Result<String> {
    let header = base_header(keys, None);
    let claims = json!({
        "identityPublicKey": chain_public_key,
        "certificateAuthority": true,
    });
    Ok(jsonwebtoken::encode(&header, &claims, &keys.encoding_key()?)?)
}

#[derive(Debug, Clone, Default)]
pub struct UserTokenOptions {
    pub game_version: String,
    pub language_code: String,
    pub server_address: String,
    pub device_os: i32,
    pub third_party_name: String,
    pub skin_overrides: Map<String, Value>,
}

/// Device identity (DeviceId/SelfSignedId/PlayFabId) plus client/session
/// fields enumerated in device/session properties (§4.G step 5), with skin
/// fields merged in from [`build_skin_fields`].
pub fn build_user_token(keys: &EphemeralKeyPair, options: &UserTokenOptions) -> Result<String> {
    let header = base_header(keys, Some("JWT"));

    let mut claims = Map::new();
    claims.insert("DeviceId".into(), json!(Uuid::new_v4().to_string()));
    claims.insert("SelfSignedId".into(), json!(Uuid::new_v4().to_string()));
    let play_fab_id = Uuid::new_v4().simple().to_string();
    claims.insert("PlayFabId".into(), json!(play_fab_id[..16]));
    claims.insert("ClientRandomId".into(), json!(rand::random::<i64>()));
    claims.insert("DeviceOS".into(), json!(options.device_os));
    claims.insert("GameVersion".into(), json!(options.game_version));
    claims.insert("LanguageCode".into(), json!(options.language_code));
    claims.insert("ServerAddress".into(), json!(options.server_address));
    claims.insert("ThirdPartyName".into(), json!(options.third_party_name));
    claims.insert("CurrentInputMode".into(), json!(1));
    claims.insert("DefaultInputMode".into(), json!(1));
    claims.insert("UIProfile".into(), json!(0));
    claims.insert("GuiScale".into(), json!(0));

    for (key, value) in build_skin_fields(&options.skin_overrides) {
        claims.insert(key, value);
    }

    Ok(jsonwebtoken::encode(&header, &Value::Object(claims), &keys.encoding_key()?)?)
}
