//! RakNet reliability layer: handshake, framing, acknowledgement and
//! retransmission over a single UDP peer connection.

pub mod ack;
pub mod consts;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod inbound;
pub mod outbound;
pub mod reliability;
pub mod session;
pub mod transport;

pub use error::{RakNetError, Result};
pub use reliability::{Priority, Reliability};
pub use session::{RakNetEvent, RakNetSession};
