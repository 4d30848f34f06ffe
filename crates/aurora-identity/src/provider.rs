//! The external identity provider collaborator (§6): given this session's
//! ephemeral public key and a username, returns an ordered chain of signed
//! tokens. The actual Xbox Live OAuth flow behind it is explicitly out of
//! scope (§1) — callers plug in their own provider for online mode.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_bedrock_token(&self, x5u_base64: &str, username: &str) -> Result<Vec<String>>;
}

/// Placeholder used when a caller enables online mode without wiring a
/// real provider; always fails rather than silently falling back to
/// self-signed tokens.
pub struct UnconfiguredProvider;

#[async_trait]
impl IdentityProvider for UnconfiguredProvider {
    async fn get_bedrock_token(&self, _x5u_base64: &str, _username: &str) -> Result<Vec<String>> {
        Err(crate::error::IdentityError::ExternalProvider(
            "online mode requires an IdentityProvider implementation".into(),
        ))
    }
}
