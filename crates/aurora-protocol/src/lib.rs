//! Game-batch codec and the minimal typed-packet set the session
//! controller needs to drive login, spawn, and steady-state play.

pub mod batch;
pub mod error;
pub mod ids;
pub mod packets;

pub use batch::{Algorithm, CompressionState};
pub use error::{ProtocolError, Result};
