use aurora_binary::BinaryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RakNetError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Framing(#[from] BinaryError),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("session not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, RakNetError>;
