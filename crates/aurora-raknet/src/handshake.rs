//! Offline/connected control packets for the four-message handshake (§4.E).

use crate::consts::*;
use crate::error::{RakNetError, Result};
use aurora_binary::{BinaryReader, BinaryWriter};
use std::net::SocketAddr;

/// RakNet pads "internal system addresses" onto a couple of handshake
/// packets; real clients ignore their contents.
pub const SYSTEM_ADDRESS_COUNT: usize = 20;

fn dummy_address() -> SocketAddr {
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0)
}

fn read_magic(reader: &mut BinaryReader) -> Result<()> {
    let mut bytes = [0u8; 16];
    reader.read_exact(&mut bytes)?;
    if bytes != MAGIC {
        return Err(RakNetError::Handshake("bad magic in offline message".into()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OpenConnectionRequest1 {
    pub protocol_version: u8,
    pub mtu_padding: u16,
}

impl OpenConnectionRequest1 {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(ID_OPEN_CONNECTION_REQUEST_1)?;
        writer.write_bytes(&MAGIC)?;
        writer.write_u8(self.protocol_version)?;
        // Pad the datagram out to the requested MTU so the server can infer it.
        let used = 1 + 16 + 1;
        let pad = (self.mtu_padding as usize).saturating_sub(used);
        writer.write_bytes(&vec![0u8; pad])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OpenConnectionReply1 {
    pub server_guid: u64,
    pub use_security: bool,
    pub mtu_size: u16,
}

impl OpenConnectionReply1 {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        read_magic(reader)?;
        let server_guid = reader.read_u64()?;
        let use_security = reader.read_bool()?;
        let mtu_size = reader.read_u16()?;
        Ok(Self { server_guid, use_security, mtu_size })
    }
}

#[derive(Debug, Clone)]
pub struct OpenConnectionRequest2 {
    pub server_address: SocketAddr,
    pub mtu: u16,
    pub client_guid: u64,
}

impl OpenConnectionRequest2 {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(ID_OPEN_CONNECTION_REQUEST_2)?;
        writer.write_bytes(&MAGIC)?;
        writer.write_socket_addr(&self.server_address)?;
        writer.write_u16(self.mtu)?;
        writer.write_u64(self.client_guid)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OpenConnectionReply2 {
    pub server_guid: u64,
    pub client_address: SocketAddr,
    pub mtu: u16,
    pub use_encryption: bool,
}

impl OpenConnectionReply2 {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        read_magic(reader)?;
        let server_guid = reader.read_u64()?;
        let client_address = reader.read_socket_addr()?;
        let mtu = reader.read_u16()?;
        let use_encryption = reader.read_bool()?;
        Ok(Self { server_guid, client_address, mtu, use_encryption })
    }
}

/// Sent reliable-ordered inside a frame set once the offline handshake
/// completes.
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub client_guid: u64,
    pub time: i64,
}

impl ConnectionRequest {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(ID_CONNECTION_REQUEST)?;
        writer.write_u64(self.client_guid)?;
        writer.write_i64(self.time)?;
        writer.write_bool(false)?; // use_security
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionRequestAccepted {
    pub client_address: SocketAddr,
    pub request_time: i64,
    pub time: i64,
}

impl ConnectionRequestAccepted {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let client_address = reader.read_socket_addr()?;
        let _system_index = reader.read_u16()?;
        for _ in 0..SYSTEM_ADDRESS_COUNT {
            if reader.feof() {
                break;
            }
            let _ = reader.read_socket_addr();
        }
        let request_time = reader.read_i64()?;
        let time = reader.read_i64()?;
        Ok(Self { client_address, request_time, time })
    }
}

#[derive(Debug, Clone)]
pub struct NewIncomingConnection {
    pub server_address: SocketAddr,
    pub request_time: i64,
    pub time: i64,
}

impl NewIncomingConnection {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(ID_NEW_INCOMING_CONNECTION)?;
        writer.write_socket_addr(&self.server_address)?;
        for _ in 0..SYSTEM_ADDRESS_COUNT {
            writer.write_socket_addr(&dummy_address())?;
        }
        writer.write_i64(self.request_time)?;
        writer.write_i64(self.time)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectedPing {
    pub time: i64,
}

impl ConnectedPing {
    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        Ok(Self { time: reader.read_i64()? })
    }
}

#[derive(Debug, Clone)]
pub struct ConnectedPong {
    pub ping_time: i64,
    pub pong_time: i64,
}

impl ConnectedPong {
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(ID_CONNECTED_PONG)?;
        writer.write_i64(self.ping_time)?;
        writer.write_i64(self.pong_time)?;
        Ok(())
    }
}
