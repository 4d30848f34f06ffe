//! Component G: the identity assembler. Generates an ephemeral key pair and
//! produces the identity-chain and user-chain tokens presented in the Login
//! packet, either self-signed (offline) or backed by an external identity
//! provider (online).

pub mod error;
pub mod keys;
pub mod profile;
pub mod provider;
pub mod skin;
pub mod tokens;

pub use error::{IdentityError, Result};
pub use keys::EphemeralKeyPair;
pub use profile::Profile;
pub use provider::{IdentityProvider, UnconfiguredProvider};
pub use tokens::{UserTokenOptions, MOJANG_PUBLIC_KEY};

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::debug;
use serde_json::Value;
use uuid::Uuid;

/// The assembled, immutable result of `connect()`'s identity step (§3).
#[derive(Debug, Clone)]
pub struct IdentityArtifact {
    pub profile: Profile,
    pub identity_chain_token: String,
    pub user_chain_token: String,
    pub external_chain_tokens: Vec<String>,
}

/// Reads a JWT's claims without verifying its signature — used only to pull
/// `displayName`/`identity`/`XUID` out of a token this client did not issue
/// and has no standing to verify; the server re-verifies the whole chain.
fn unverified_claims(token: &str) -> Result<Value> {
    let mut validation = Validation::new(Algorithm::ES384);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    let data = jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

pub async fn assemble(
    username: &str,
    offline: bool,
    provider: &dyn IdentityProvider,
    user_options: &UserTokenOptions,
) -> Result<IdentityArtifact> {
    let keys = EphemeralKeyPair::generate()?;

    if offline {
        let profile = Profile::offline(username);
        let identity_chain_token = tokens::build_offline_identity_token(&keys, &profile)?;
        let user_chain_token = tokens::build_user_token(&keys, user_options)?;
        debug!("assembled offline identity for {username} (uuid={})", profile.uuid);
        return Ok(IdentityArtifact {
            profile,
            identity_chain_token,
            user_chain_token,
            external_chain_tokens: Vec::new(),
        });
    }

    let external_chain_tokens = provider.get_bedrock_token(keys.x5u(), username).await?;
    let last_token = external_chain_tokens
        .last()
        .ok_or_else(|| IdentityError::ExternalProvider("provider returned an empty token chain".into()))?;
    let claims = unverified_claims(last_token)?;

    let extra_data = claims.get("extraData").cloned().unwrap_or(Value::Null);
    let display_name = extra_data
        .get("displayName")
        .and_then(Value::as_str)
        .ok_or_else(|| IdentityError::ExternalProvider("missing displayName in identity token".into()))?
        .to_string();
    let identity = extra_data
        .get("identity")
        .and_then(Value::as_str)
        .ok_or_else(|| IdentityError::ExternalProvider("missing identity uuid in identity token".into()))?;
    let uuid = Uuid::parse_str(identity)
        .map_err(|e| IdentityError::ExternalProvider(format!("invalid identity uuid: {e}")))?;
    let xuid = extra_data.get("XUID").and_then(Value::as_str).unwrap_or("0").to_string();

    let first_header = jsonwebtoken::decode_header(&external_chain_tokens[0])?;
    let chain_public_key = first_header.x5u.unwrap_or_else(|| MOJANG_PUBLIC_KEY.to_string());

    let profile = Profile { name: display_name, uuid, xuid };
    let identity_chain_token = tokens::build_online_identity_token(&keys, &chain_public_key)?;
    let user_chain_token = tokens::build_user_token(&keys, user_options)?;
    debug!("assembled online identity for {} (uuid={})", profile.name, profile.uuid);

    Ok(IdentityArtifact { profile, identity_chain_token, user_chain_token, external_chain_tokens })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_assembly_is_deterministic_by_username() {
        let options = UserTokenOptions::default();
        let a = assemble("Bot", true, &UnconfiguredProvider, &options).await.unwrap();
        let b = assemble("Bot", true, &UnconfiguredProvider, &options).await.unwrap();
        assert_eq!(a.profile.uuid, b.profile.uuid);
        assert_eq!(a.profile.xuid, "0");
        assert!(a.external_chain_tokens.is_empty());
    }

    #[tokio::test]
    async fn online_mode_without_provider_fails() {
        let options = UserTokenOptions::default();
        let result = assemble("Bot", false, &UnconfiguredProvider, &options).await;
        assert!(result.is_err());
    }
}
