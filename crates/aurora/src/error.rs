use aurora_binary::BinaryError;
use aurora_identity::IdentityError;
use aurora_protocol::ProtocolError;
use aurora_raknet::RakNetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("raknet error: {0}")]
    RakNet(#[from] RakNetError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("binary codec error: {0}")]
    Binary(#[from] BinaryError),
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
    #[error("login failed with status {0:?}")]
    LoginFailed(aurora_protocol::packets::PlayStatusCode),
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),
    #[error("disconnected: {0}")]
    Disconnected(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
