use aurora_binary::BinaryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Framing(#[from] BinaryError),
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
    #[error("unknown compression algorithm byte {0:#04x}")]
    UnknownAlgorithm(u8),
    #[error("packet {id} failed to deserialize: {reason}")]
    Deserialize { id: u32, reason: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
