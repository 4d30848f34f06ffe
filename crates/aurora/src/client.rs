//! The public, cloneable handle onto a running [`crate::session::Session`].
//!
//! `Client` never touches session state directly — every method sends a
//! [`Command`] down an unbounded channel the session's `select!` loop drains
//! on its own turn, so the phase machine stays single-owner no matter how
//! many clones of `Client` exist or what task they're called from.

use crate::config::ClientOptions;
use crate::error::{ClientError, Result};
use crate::events::{Event, PacketSelector, Subscription};
use crate::session::{Command, Session};
use aurora_identity::{IdentityProvider, UnconfiguredProvider};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
}

/// Connects to the configured server and returns a [`Client`] handle
/// alongside the [`JoinHandle`] driving the session to completion. The
/// handle resolves once the RakNet handshake and identity assembly succeed
/// (§5 suspension point 1) and the session has started negotiating network
/// settings — callers don't need to wait for `Spawned` before registering
/// event handlers.
pub async fn connect(options: ClientOptions) -> Result<(Client, JoinHandle<Result<()>>)> {
    connect_with_provider(options, Arc::new(UnconfiguredProvider)).await
}

/// As [`connect`], but with an explicit [`IdentityProvider`] for online-mode
/// authentication.
pub async fn connect_with_provider(
    options: ClientOptions,
    provider: Arc<dyn IdentityProvider>,
) -> Result<(Client, JoinHandle<Result<()>>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Client { commands: tx };
    let mut session = Session::new(options, rx);

    let handle = tokio::spawn(async move {
        let result = session.run(provider.as_ref()).await;
        if let Err(e) = &result {
            log::error!("session ended with error: {e}");
        }
        result
    });

    Ok((client, handle))
}

impl Client {
    pub fn chat(&self, message: impl Into<String>) -> Result<()> {
        self.send(Command::Chat(message.into()))
    }

    pub fn send_command(&self, command: impl Into<String>) -> Result<()> {
        self.send(Command::SendCommand(command.into()))
    }

    pub fn respond_to_form(&self, form_id: u32, response: Option<String>) -> Result<()> {
        self.send(Command::RespondToForm { form_id, response })
    }

    pub fn set_initialized(&self) -> Result<()> {
        self.send(Command::SetInitialized)
    }

    /// Equivalent to `disconnect_with("client requested disconnect", true)`.
    pub fn disconnect(&self) -> Result<()> {
        self.disconnect_with("client requested disconnect", true)
    }

    /// `notify_server` controls whether a RakNet disconnect notification
    /// (opcode `0x15`) is sent before tearing down, or the session is
    /// simply abandoned locally (§4.H).
    pub fn disconnect_with(&self, reason: impl Into<String>, notify_server: bool) -> Result<()> {
        self.send(Command::Disconnect { reason: reason.into(), notify_server })
    }

    /// Registers `callback` for every event named `event_name` (§4 event
    /// names: `raknet_connect`, `login`, `start_game`, `spawn`, `tick`,
    /// `packet`, `text`, `kick`, `disconnect`, `reconnect`, `error`).
    pub async fn on(&self, event_name: impl Into<String>, callback: impl FnMut(&Event) + Send + 'static) -> Result<Subscription> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::On { name: event_name.into(), callback: Box::new(callback), reply })?;
        rx.await.map_err(|_| ClientError::Disconnected("session ended before registering handler".to_string()))
    }

    pub async fn on_packet(
        &self,
        selector: PacketSelector,
        callback: impl FnMut(&Event) + Send + 'static,
    ) -> Result<Subscription> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::OnPacket { selector, callback: Box::new(callback), reply })?;
        rx.await.map_err(|_| ClientError::Disconnected("session ended before registering handler".to_string()))
    }

    pub fn unregister(&self, subscription: Subscription) -> Result<()> {
        self.send(Command::Unregister(subscription))
    }

    /// Resolves with the next packet event matching `selector`, failing if
    /// the session ends first or, when `timeout_ms` is given, if no match
    /// arrives within that window (§4.H).
    pub async fn wait_for_packet(&self, selector: PacketSelector, timeout_ms: Option<u64>) -> Result<Event> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::WaitForPacket { selector, reply })?;
        let waiter = rx.await.map_err(|_| ClientError::Disconnected("session ended before registering waiter".to_string()))?;

        match timeout_ms {
            Some(millis) => tokio::time::timeout(std::time::Duration::from_millis(millis), waiter)
                .await
                .map_err(|_| ClientError::Timeout("packet".to_string()))?
                .map_err(|_| ClientError::Disconnected("session ended while waiting for packet".to_string())),
            None => waiter.await.map_err(|_| ClientError::Disconnected("session ended while waiting for packet".to_string())),
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::Disconnected("session has already ended".to_string()))
    }
}
