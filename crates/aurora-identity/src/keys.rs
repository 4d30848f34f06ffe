//! Ephemeral EC key pair generation (§4.G step 1).

use crate::error::{IdentityError, Result};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use p384::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use p384::SecretKey;

/// A fresh secp384r1 key pair, live for the duration of one session. Its
/// public half, DER-SPKI-then-base64 encoded, is the `x5u` carried in every
/// token header this client signs.
pub struct EphemeralKeyPair {
    secret: SecretKey,
    x5u: String,
}

impl EphemeralKeyPair {
    pub fn generate() -> Result<Self> {
        let secret = SecretKey::random(&mut rand_core::OsRng);
        let public_der = secret
            .public_key()
            .to_public_key_der()
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        let x5u = STANDARD_NO_PAD.encode(public_der.as_bytes());
        Ok(Self { secret, x5u })
    }

    pub fn x5u(&self) -> &str {
        &self.x5u
    }

    /// A `jsonwebtoken` encoding key over this pair's private half, suitable
    /// for ES384 signing.
    pub fn encoding_key(&self) -> Result<EncodingKey> {
        let pem = self
            .secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        EncodingKey::from_ec_pem(pem.as_bytes()).map_err(IdentityError::Signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_keys_with_nonempty_x5u() {
        let a = EphemeralKeyPair::generate().unwrap();
        let b = EphemeralKeyPair::generate().unwrap();
        assert!(!a.x5u().is_empty());
        assert_ne!(a.x5u(), b.x5u());
        assert!(a.encoding_key().is_ok());
    }
}
