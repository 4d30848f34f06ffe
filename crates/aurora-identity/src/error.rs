use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("external identity provider error: {0}")]
    ExternalProvider(String),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
