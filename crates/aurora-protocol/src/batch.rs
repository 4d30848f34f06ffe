//! Component F: the `0xFE`-prefixed game batch codec (§4.F).

use crate::error::{ProtocolError, Result};
use aurora_binary::{BinaryReader, BinaryWriter};
use bytes::{Bytes, BytesMut};
use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use std::io::Write;

pub const BATCH_MAGIC: u8 = 0xfe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Zlib,
    Snappy,
    None,
}

impl Algorithm {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Zlib,
            0x01 => Self::Snappy,
            _ => Self::None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Zlib => 0x00,
            Self::Snappy => 0x01,
            Self::None => 0xff,
        }
    }
}

/// Mirrors `Session`'s compression state (§3): disabled until the first
/// `NetworkSettings` packet, then permanently enabled for the session.
#[derive(Debug, Clone, Copy)]
pub struct CompressionState {
    pub enabled: bool,
    pub algorithm: Algorithm,
    pub threshold: u32,
}

impl Default for CompressionState {
    fn default() -> Self {
        Self { enabled: false, algorithm: Algorithm::None, threshold: 0 }
    }
}

/// Concatenates framed packets and, if compression is active and the
/// result exceeds the threshold, deflates them.
pub fn encode(packets: &[Bytes], compression: &CompressionState) -> Result<Bytes> {
    let mut framed = BinaryWriter::new();
    for packet in packets {
        framed.write_var_u32(packet.len() as u32)?;
        framed.write_bytes(packet)?;
    }
    let framed = framed.freeze();

    let mut out = BytesMut::new();
    if !compression.enabled {
        out.extend_from_slice(&[BATCH_MAGIC]);
        out.extend_from_slice(&framed);
        return Ok(out.freeze());
    }

    if framed.len() as u32 > compression.threshold && compression.algorithm == Algorithm::Zlib {
        let compressed = deflate_raw(&framed)?;
        out.extend_from_slice(&[BATCH_MAGIC, Algorithm::Zlib.as_byte()]);
        out.extend_from_slice(&compressed);
    } else {
        out.extend_from_slice(&[BATCH_MAGIC, Algorithm::None.as_byte()]);
        out.extend_from_slice(&framed);
    }
    Ok(out.freeze())
}

/// Strips the batch envelope and splits the payload into individual packet
/// payloads. Unknown/Snappy-compressed bodies are passed through raw per
/// the documented quirk (§9).
pub fn decode(bytes: Bytes, compression: &CompressionState) -> Result<Vec<Bytes>> {
    let mut reader = BinaryReader::new(bytes);
    let magic = reader.read_u8()?;
    if magic != BATCH_MAGIC {
        return Err(ProtocolError::Deserialize { id: 0, reason: "missing 0xFE batch magic".into() });
    }

    let payload = if compression.enabled {
        let algorithm = Algorithm::from_byte(reader.read_u8()?);
        let remaining = reader.read_bytes(reader.remaining())?;
        match algorithm {
            Algorithm::Zlib => inflate_raw(&remaining)?,
            Algorithm::Snappy | Algorithm::None => remaining,
        }
    } else {
        reader.read_bytes(reader.remaining())?
    };

    let mut split = BinaryReader::new(payload);
    let mut packets = Vec::new();
    while !split.feof() {
        let len = split.read_var_u32()? as usize;
        packets.push(split.read_bytes(len)?);
    }
    Ok(packets)
}

fn deflate_raw(data: &[u8]) -> Result<Bytes> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(Bytes::from(encoder.finish()?))
}

fn inflate_raw(data: &[u8]) -> Result<Bytes> {
    let mut decoder = DeflateDecoder::new(Vec::new());
    decoder.write_all(data)?;
    Ok(Bytes::from(decoder.finish()?))
}

/// Masks off the sub-client bits, leaving the packet ID (low 10 bits).
pub fn packet_id(header: u32) -> u16 {
    (header & 0x3ff) as u16
}

/// Reads the leading varint header of a decoded packet payload and splits
/// it into `(packet_id, body)`.
pub fn split_header(payload: &Bytes) -> Result<(u16, Bytes)> {
    let mut reader = BinaryReader::new(payload.clone());
    let header = reader.read_var_u32()?;
    let remaining = reader.remaining();
    let body = reader.read_bytes(remaining)?;
    Ok((packet_id(header), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_round_trip() {
        let compression = CompressionState::default();
        let packets = vec![Bytes::from_static(b"abc"), Bytes::from_static(b"defgh")];
        let encoded = encode(&packets, &compression).unwrap();
        assert_eq!(encoded[0], BATCH_MAGIC);
        let decoded = decode(encoded, &compression).unwrap();
        assert_eq!(decoded, packets);
    }

    #[test]
    fn compressed_round_trip_above_threshold() {
        let compression = CompressionState { enabled: true, algorithm: Algorithm::Zlib, threshold: 8 };
        let packets = vec![Bytes::from(vec![7u8; 600])];
        let encoded = encode(&packets, &compression).unwrap();
        assert_eq!(encoded[0], BATCH_MAGIC);
        assert_eq!(encoded[1], Algorithm::Zlib.as_byte());
        let decoded = decode(encoded, &compression).unwrap();
        assert_eq!(decoded, packets);
    }

    #[test]
    fn small_payload_under_threshold_stays_raw() {
        let compression = CompressionState { enabled: true, algorithm: Algorithm::Zlib, threshold: 256 };
        let packets = vec![Bytes::from_static(b"tiny")];
        let encoded = encode(&packets, &compression).unwrap();
        assert_eq!(encoded[0], BATCH_MAGIC);
        assert_eq!(encoded[1], Algorithm::None.as_byte());
        let decoded = decode(encoded, &compression).unwrap();
        assert_eq!(decoded, packets);
    }

    #[test]
    fn packet_id_masks_subclient_bits() {
        let header: u32 = (3 << 10) | 144;
        assert_eq!(packet_id(header), 144);
    }
}
