//! Aurora: a Minecraft Bedrock Edition client core.
//!
//! [`client::connect`] drives identity assembly, the RakNet handshake, and
//! login/spawn negotiation, then hands back a [`client::Client`] handle and
//! a background task that carries the session through steady-state play.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
mod session;
pub mod world;

pub use client::{connect, connect_with_provider, Client};
pub use config::ClientOptions;
pub use error::{ClientError, Result};
pub use events::{Event, PacketSelector, Subscription};
pub use session::Phase;
