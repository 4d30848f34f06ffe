//! Component E: the RakNet session FSM (§4.E).
//!
//! Drives the four-message offline handshake, answers connected pings, and
//! thereafter shuttles game-batch payloads between the transport and the
//! layer above.

use crate::ack::{decode_records, encode_records};
use crate::consts::*;
use crate::error::{RakNetError, Result};
use crate::handshake::*;
use crate::inbound::InboundReassembler;
use crate::outbound::OutboundQueue;
use crate::reliability::{Priority, Reliability};
use crate::transport::Transport;
use aurora_binary::{BinaryReader, BinaryWriter};
use bytes::Bytes;
use log::{debug, warn};
use rand::Rng;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{timeout, Duration};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_BUFFER_SIZE: usize = 2048;

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

#[derive(Debug)]
pub enum RakNetEvent {
    /// A decoded, de-fragmented, in-order payload for the game batch codec.
    GamePayload(Bytes),
    /// The server closed the connection.
    Disconnected,
}

pub struct RakNetSession {
    transport: Transport,
    outbound: OutboundQueue,
    inbound: InboundReassembler,
    guid: u64,
    mtu: u16,
    recv_buf: Box<[u8; RECV_BUFFER_SIZE]>,
    /// A single frame set can carry several ready payloads at once (e.g. a
    /// ping alongside a game batch, or more than one ordered frame draining
    /// out of the reassembler together); only one can be returned per
    /// `recv_event` call, so the rest wait here instead of being dropped.
    pending_events: std::collections::VecDeque<RakNetEvent>,
}

impl RakNetSession {
    /// Runs the offline handshake to completion against `remote` and returns
    /// a session ready to carry game traffic.
    pub async fn connect(remote: SocketAddr) -> Result<Self> {
        let transport = Transport::connect(remote).await?;
        let guid: u64 = rand::rng().random();

        Self::send_raw(&transport, &OpenConnectionRequest1 {
            protocol_version: RAKNET_PROTOCOL_VERSION,
            mtu_padding: MTU,
        })
        .await?;

        let mut recv_buf = [0u8; RECV_BUFFER_SIZE];
        let reply1 = Self::await_control(&transport, &mut recv_buf, ID_OPEN_CONNECTION_REPLY_1, |r| {
            OpenConnectionReply1::read(r)
        })
        .await?;

        let local_addr = transport.local_addr()?;
        let request2 = OpenConnectionRequest2 { server_address: remote, mtu: reply1.mtu_size, client_guid: guid };
        Self::send_raw(&transport, &request2).await?;

        let reply2 = Self::await_control(&transport, &mut recv_buf, ID_OPEN_CONNECTION_REPLY_2, |r| {
            OpenConnectionReply2::read(r)
        })
        .await?;

        let mut outbound = OutboundQueue::new();
        let request = ConnectionRequest { client_guid: guid, time: now_millis() };
        let mut writer = BinaryWriter::new();
        request.write(&mut writer)?;
        Self::send_frames(&transport, &mut outbound, writer.freeze(), Reliability::ReliableOrdered, 0, Priority::Immediate).await?;

        let accepted = Self::await_frame_payload(&transport, &mut recv_buf, ID_CONNECTION_REQUEST_ACCEPTED, |r| {
            ConnectionRequestAccepted::read(r)
        })
        .await?;

        let incoming = NewIncomingConnection {
            server_address: remote,
            request_time: accepted.time,
            time: now_millis(),
        };
        let mut writer = BinaryWriter::new();
        incoming.write(&mut writer)?;
        Self::send_frames(&transport, &mut outbound, writer.freeze(), Reliability::ReliableOrdered, 0, Priority::Immediate).await?;

        let _ = local_addr;
        debug!("raknet handshake complete, guid={guid:#018x}");

        Ok(Self {
            transport,
            outbound,
            inbound: InboundReassembler::new(),
            guid,
            mtu: reply2.mtu,
            recv_buf: Box::new([0u8; RECV_BUFFER_SIZE]),
            pending_events: std::collections::VecDeque::new(),
        })
    }

    async fn send_raw<T>(transport: &Transport, packet: &T) -> Result<()>
    where
        T: RawEncode,
    {
        let mut writer = BinaryWriter::new();
        packet.write_raw(&mut writer)?;
        transport.send(writer.as_slice()).await
    }

    async fn send_frames(
        transport: &Transport,
        outbound: &mut OutboundQueue,
        payload: Bytes,
        reliability: Reliability,
        channel: u8,
        priority: Priority,
    ) -> Result<()> {
        let sets = outbound.enqueue(payload, reliability, channel, priority)?;
        for set in sets {
            transport.send(&set).await?;
        }
        Ok(())
    }

    async fn await_control<T>(
        transport: &Transport,
        buf: &mut [u8],
        expected_id: u8,
        parse: impl Fn(&mut BinaryReader) -> Result<T>,
    ) -> Result<T> {
        timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                let (bytes, _) = transport.recv(buf).await?;
                if bytes.first() != Some(&expected_id) {
                    continue;
                }
                let mut reader = BinaryReader::new(bytes.slice(1..));
                return parse(&mut reader);
            }
        })
        .await
        .map_err(|_| RakNetError::Handshake(format!("timed out waiting for {expected_id:#04x}")))?
    }

    async fn await_frame_payload<T>(
        transport: &Transport,
        buf: &mut [u8],
        expected_id: u8,
        parse: impl Fn(&mut BinaryReader) -> Result<T>,
    ) -> Result<T> {
        timeout(HANDSHAKE_TIMEOUT, async {
            let mut reassembler = InboundReassembler::new();
            loop {
                let (bytes, _) = transport.recv(buf).await?;
                if bytes.first().map(|b| FRAME_SET_RANGE.contains(b)).unwrap_or(false) {
                    for payload in reassembler.on_datagram(bytes)? {
                        if payload.first() == Some(&expected_id) {
                            let mut reader = BinaryReader::new(payload.slice(1..));
                            return parse(&mut reader);
                        }
                    }
                }
            }
        })
        .await
        .map_err(|_| RakNetError::Handshake(format!("timed out waiting for framed {expected_id:#04x}")))?
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Sends a higher-layer payload (typically a game batch) reliably.
    pub async fn send_payload(&mut self, payload: Bytes, reliability: Reliability, channel: u8, priority: Priority) -> Result<()> {
        Self::send_frames(&self.transport, &mut self.outbound, payload, reliability, channel, priority).await
    }

    /// Flushes whatever is pending in the outbound queue (game tick cadence).
    pub async fn flush_tick(&mut self) -> Result<()> {
        if let Some(set) = self.outbound.flush()? {
            self.transport.send(&set).await?;
        }
        Ok(())
    }

    /// ACK/NACK flush cadence (10 ms, §5).
    pub async fn flush_ack_nack(&mut self) -> Result<()> {
        if !self.inbound.has_pending() {
            return Ok(());
        }
        let (ack, nack) = self.inbound.take_pending();
        if !ack.is_empty() {
            let mut writer = BinaryWriter::new();
            writer.write_u8(ACK_FLAG)?;
            encode_records(&mut writer, &ack)?;
            self.transport.send(&writer.freeze()).await?;
        }
        if !nack.is_empty() {
            let mut writer = BinaryWriter::new();
            writer.write_u8(NACK_FLAG)?;
            encode_records(&mut writer, &nack)?;
            self.transport.send(&writer.freeze()).await?;
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        let mut writer = BinaryWriter::new();
        if writer.write_u8(ID_DISCONNECTION_NOTIFICATION).is_ok() {
            let _ = self
                .send_payload(writer.freeze(), Reliability::Reliable, 0, Priority::Immediate)
                .await;
        }
    }

    /// Waits for and classifies the next datagram. Returns `None` for
    /// datagrams fully consumed internally (acks, control pings). A single
    /// incoming datagram can yield more than one event for the caller (a
    /// frame set batching, say, a `ConnectedPing` and a game payload, or
    /// several ordered frames draining out of the reassembler at once); the
    /// overflow is queued in `pending_events` and drained before the next
    /// `recv` call.
    pub async fn recv_event(&mut self) -> Result<Option<RakNetEvent>> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(Some(event));
        }

        let (bytes, _) = self.transport.recv(&mut self.recv_buf[..]).await?;
        let Some(&leading) = bytes.first() else {
            return Ok(None);
        };

        if leading == ACK_FLAG {
            let mut reader = BinaryReader::new(bytes.slice(1..));
            for sequence in decode_records(&mut reader)? {
                self.outbound.on_ack(sequence);
            }
            return Ok(None);
        }
        if leading == NACK_FLAG {
            let mut reader = BinaryReader::new(bytes.slice(1..));
            for sequence in decode_records(&mut reader)? {
                let sets = self.outbound.on_nack(sequence)?;
                for set in sets {
                    self.transport.send(&set).await?;
                }
            }
            return Ok(None);
        }
        if !FRAME_SET_RANGE.contains(&leading) {
            warn!("dropping unrecognised leading byte {leading:#04x}");
            return Ok(None);
        }

        for payload in self.inbound.on_datagram(bytes)? {
            match payload.first() {
                Some(&ID_CONNECTED_PING) => {
                    let mut reader = BinaryReader::new(payload.slice(1..));
                    let ping = ConnectedPing::read(&mut reader)?;
                    let pong = ConnectedPong { ping_time: ping.time, pong_time: now_millis() };
                    let mut writer = BinaryWriter::new();
                    pong.write(&mut writer)?;
                    self.send_payload(writer.freeze(), Reliability::Unreliable, 0, Priority::Immediate).await?;
                }
                Some(&ID_DISCONNECTION_NOTIFICATION) => {
                    self.pending_events.push_back(RakNetEvent::Disconnected);
                }
                _ => {
                    self.pending_events.push_back(RakNetEvent::GamePayload(payload));
                }
            }
        }
        Ok(self.pending_events.pop_front())
    }
}

/// Raw (unencapsulated) offline-handshake packets, sent directly on the
/// wire without a frame set wrapper.
trait RawEncode {
    fn write_raw(&self, writer: &mut BinaryWriter) -> Result<()>;
}

impl RawEncode for OpenConnectionRequest1 {
    fn write_raw(&self, writer: &mut BinaryWriter) -> Result<()> {
        self.write(writer)
    }
}

impl RawEncode for OpenConnectionRequest2 {
    fn write_raw(&self, writer: &mut BinaryWriter) -> Result<()> {
        self.write(writer)
    }
}
