use crate::error::{BinaryError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Cursor-style reader over an immutable byte buffer.
///
/// Mirrors the reference `BinaryStream`: fixed-width fields are big-endian
/// except the RakNet 24-bit reliability indices, which are little-endian.
#[derive(Debug, Clone)]
pub struct BinaryReader {
    buffer: Bytes,
}

impl BinaryReader {
    pub fn new(buffer: Bytes) -> Self {
        Self { buffer }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.remaining()
    }

    pub fn feof(&self) -> bool {
        self.buffer.remaining() == 0
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buffer.remaining() < n {
            Err(BinaryError::UnexpectedEOF)
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buffer.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.need(1)?;
        Ok(self.buffer.get_i8())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buffer.get_u16())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.buffer.get_i16())
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buffer.get_u16_le())
    }

    /// 24-bit unsigned integer, little-endian (RakNet reliability indices).
    pub fn read_u24_le(&mut self) -> Result<u32> {
        self.need(3)?;
        let mut bytes = [0u8; 4];
        bytes[0] = self.buffer.get_u8();
        bytes[1] = self.buffer.get_u8();
        bytes[2] = self.buffer.get_u8();
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buffer.get_u32())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buffer.get_i32())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buffer.get_u64())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.buffer.get_i64())
    }

    pub fn read_u128(&mut self) -> Result<u128> {
        self.need(16)?;
        Ok(self.buffer.get_u128())
    }

    pub fn read_i128(&mut self) -> Result<i128> {
        self.need(16)?;
        Ok(self.buffer.get_i128())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.buffer.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.buffer.get_f64())
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.buffer.get_f32_le())
    }

    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        self.need(out.len())?;
        self.buffer.copy_to_slice(out);
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.need(len)?;
        Ok(self.buffer.copy_to_bytes(len))
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.need(len)?;
        self.buffer.advance(len);
        Ok(())
    }

    /// Unsigned LEB128 varint, used throughout the Bedrock batch layer.
    pub fn read_var_u32(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            if shift >= 35 {
                return Err(BinaryError::VarintTooLarge);
            }
            value |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(BinaryError::VarintTooLarge)
    }

    pub fn read_var_u64(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = self.read_u8()?;
            if shift >= 70 {
                return Err(BinaryError::VarintTooLarge);
            }
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(BinaryError::VarintTooLarge)
    }

    /// Zig-zag encoded signed varint.
    pub fn read_var_i32(&mut self) -> Result<i32> {
        let raw = self.read_var_u32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    pub fn read_var_i64(&mut self) -> Result<i64> {
        let raw = self.read_var_u64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_var_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| BinaryError::InvalidData(format!("invalid UTF-8 string: {e}")))
    }

    /// RakNet-style IPv4/IPv6 socket address: version byte, then the address
    /// (IPv4 octets stored bitwise-complemented), then the port big-endian.
    pub fn read_socket_addr(&mut self) -> Result<SocketAddr> {
        let version = self.read_u8()?;
        match version {
            4 => {
                let mut octets = [0u8; 4];
                self.read_exact(&mut octets)?;
                for o in &mut octets {
                    *o = !*o;
                }
                let port = self.read_u16()?;
                Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(octets), port)))
            }
            6 => {
                self.skip(2)?; // address family, ignored
                let port = self.read_u16()?;
                self.skip(4)?; // flow info
                let mut octets = [0u8; 16];
                self.read_exact(&mut octets)?;
                self.skip(4)?; // scope id
                Ok(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    0,
                    0,
                )))
            }
            _ => Err(BinaryError::InvalidData(format!(
                "unsupported address version {version}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buffer: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.buffer.put_u8(value);
        Ok(())
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.buffer.put_i8(value);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(if value { 1 } else { 0 })
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.buffer.put_u16(value);
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.buffer.put_i16(value);
        Ok(())
    }

    pub fn write_u16_le(&mut self, value: u16) -> Result<()> {
        self.buffer.put_u16_le(value);
        Ok(())
    }

    pub fn write_u24_le(&mut self, value: u32) -> Result<()> {
        let bytes = value.to_le_bytes();
        self.buffer.put_slice(&bytes[..3]);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.buffer.put_u32(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.buffer.put_i32(value);
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.buffer.put_u64(value);
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.buffer.put_i64(value);
        Ok(())
    }

    pub fn write_u128(&mut self, value: u128) -> Result<()> {
        self.buffer.put_u128(value);
        Ok(())
    }

    pub fn write_i128(&mut self, value: i128) -> Result<()> {
        self.buffer.put_i128(value);
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.buffer.put_f32(value);
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.buffer.put_f64(value);
        Ok(())
    }

    pub fn write_f32_le(&mut self, value: f32) -> Result<()> {
        self.buffer.put_f32_le(value);
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.put_slice(data);
        Ok(())
    }

    pub fn write_var_u32(&mut self, mut value: u32) -> Result<()> {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.write_u8(byte)?;
                return Ok(());
            }
            self.write_u8(byte | 0x80)?;
        }
    }

    pub fn write_var_u64(&mut self, mut value: u64) -> Result<()> {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.write_u8(byte)?;
                return Ok(());
            }
            self.write_u8(byte | 0x80)?;
        }
    }

    pub fn write_var_i32(&mut self, value: i32) -> Result<()> {
        let zigzag = ((value << 1) ^ (value >> 31)) as u32;
        self.write_var_u32(zigzag)
    }

    pub fn write_var_i64(&mut self, value: i64) -> Result<()> {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_var_u64(zigzag)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_var_u32(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    pub fn write_socket_addr(&mut self, addr: &SocketAddr) -> Result<()> {
        match addr {
            SocketAddr::V4(v4) => {
                self.write_u8(4)?;
                let mut octets = v4.ip().octets();
                for o in &mut octets {
                    *o = !*o;
                }
                self.write_bytes(&octets)?;
                self.write_u16(v4.port())
            }
            SocketAddr::V6(v6) => {
                self.write_u8(6)?;
                self.write_u16_le(23)?; // AF_INET6 on most platforms
                self.write_u16(v6.port())?;
                self.write_u32(0)?; // flow info
                self.write_bytes(&v6.ip().octets())?;
                self.write_u32(v6.scope_id())
            }
        }
    }
}

impl From<BytesMut> for BinaryWriter {
    fn from(buffer: BytesMut) -> Self {
        Self { buffer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        for value in [0u32, 1, 127, 128, 300, 16384, u32::MAX] {
            let mut writer = BinaryWriter::new();
            writer.write_var_u32(value).unwrap();
            let mut reader = BinaryReader::new(writer.freeze());
            assert_eq!(reader.read_var_u32().unwrap(), value);
        }
    }

    #[test]
    fn signed_varint_round_trip() {
        for value in [0i32, -1, 1, -1000, i32::MIN, i32::MAX] {
            let mut writer = BinaryWriter::new();
            writer.write_var_i32(value).unwrap();
            let mut reader = BinaryReader::new(writer.freeze());
            assert_eq!(reader.read_var_i32().unwrap(), value);
        }
    }

    #[test]
    fn u24_round_trip() {
        let mut writer = BinaryWriter::new();
        writer.write_u24_le(0xabcdef).unwrap();
        let mut reader = BinaryReader::new(writer.freeze());
        assert_eq!(reader.read_u24_le().unwrap(), 0xabcdef);
    }

    #[test]
    fn string_round_trip() {
        let mut writer = BinaryWriter::new();
        writer.write_string("hello bedrock").unwrap();
        let mut reader = BinaryReader::new(writer.freeze());
        assert_eq!(reader.read_string().unwrap(), "hello bedrock");
    }

    #[test]
    fn ipv4_socket_addr_round_trip() {
        let addr: SocketAddr = "192.168.1.5:19132".parse().unwrap();
        let mut writer = BinaryWriter::new();
        writer.write_socket_addr(&addr).unwrap();
        let mut reader = BinaryReader::new(writer.freeze());
        assert_eq!(reader.read_socket_addr().unwrap(), addr);
    }
}
