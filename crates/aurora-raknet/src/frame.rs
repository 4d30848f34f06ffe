use crate::error::{RakNetError, Result};
use crate::reliability::Reliability;
use aurora_binary::{BinaryReader, BinaryWriter};
use bytes::Bytes;

/// Fragmentation metadata shared by every piece of a split payload (§3,
/// "fragment_id").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    pub id: u16,
    pub index: u32,
    pub count: u32,
}

impl FragmentInfo {
    pub const WIRE_LEN: usize = 4 + 2 + 4;

    fn read(reader: &mut BinaryReader) -> Result<Self> {
        let count = reader.read_u32()?;
        let id = reader.read_u16()?;
        let index = reader.read_u32()?;
        Ok(Self { id, index, count })
    }

    fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u32(self.count)?;
        writer.write_u16(self.id)?;
        writer.write_u32(self.index)?;
        Ok(())
    }
}

/// A single reliability-annotated payload inside a frame set (the
/// "Frame" of the glossary; RakNet calls this an encapsulated packet).
#[derive(Debug, Clone)]
pub struct Frame {
    pub reliability: Reliability,
    pub reliable_index: Option<u32>,
    pub sequence_index: Option<u32>,
    pub order_index: Option<u32>,
    pub order_channel: Option<u8>,
    pub fragment: Option<FragmentInfo>,
    pub payload: Bytes,
}

impl Frame {
    const SPLIT_FLAG: u8 = 0b0001_0000;
    const RELIABILITY_SHIFT: u8 = 5;

    pub fn new(reliability: Reliability, payload: Bytes) -> Self {
        Self {
            reliability,
            reliable_index: None,
            sequence_index: None,
            order_index: None,
            order_channel: None,
            fragment: None,
            payload,
        }
    }

    pub fn header_len(&self) -> usize {
        1 + 2
            + if self.reliability.is_reliable() { 3 } else { 0 }
            + if self.reliability.is_sequenced() { 3 } else { 0 }
            + if self.reliability.uses_ordering_channel() { 4 } else { 0 }
            + if self.fragment.is_some() { FragmentInfo::WIRE_LEN } else { 0 }
    }

    pub fn total_len(&self) -> usize {
        self.header_len() + self.payload.len()
    }

    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        let flags = (self.reliability.as_byte() << Self::RELIABILITY_SHIFT)
            | if self.fragment.is_some() { Self::SPLIT_FLAG } else { 0 };
        writer.write_u8(flags)?;
        writer.write_u16((self.payload.len() as u16).wrapping_mul(8))?;

        if self.reliability.is_reliable() {
            let index = self
                .reliable_index
                .ok_or_else(|| RakNetError::Handshake("reliable frame missing reliable index".into()))?;
            writer.write_u24_le(index)?;
        }
        if self.reliability.is_sequenced() {
            let index = self
                .sequence_index
                .ok_or_else(|| RakNetError::Handshake("sequenced frame missing sequence index".into()))?;
            writer.write_u24_le(index)?;
        }
        if self.reliability.uses_ordering_channel() {
            let index = self
                .order_index
                .ok_or_else(|| RakNetError::Handshake("ordered frame missing order index".into()))?;
            writer.write_u24_le(index)?;
            writer.write_u8(self.order_channel.unwrap_or(0))?;
        }
        if let Some(fragment) = &self.fragment {
            fragment.write(writer)?;
        }
        writer.write_bytes(&self.payload)?;
        Ok(())
    }

    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let flags = reader.read_u8()?;
        let reliability = Reliability::from_byte(flags >> Self::RELIABILITY_SHIFT)
            .ok_or_else(|| RakNetError::Handshake(format!("unknown reliability byte {flags:#04x}")))?;
        let has_fragment = flags & Self::SPLIT_FLAG != 0;

        let bit_length = reader.read_u16()?;
        let byte_length = (bit_length as usize + 7) / 8;

        let reliable_index = if reliability.is_reliable() {
            Some(reader.read_u24_le()?)
        } else {
            None
        };
        let sequence_index = if reliability.is_sequenced() {
            Some(reader.read_u24_le()?)
        } else {
            None
        };
        let (order_index, order_channel) = if reliability.uses_ordering_channel() {
            (Some(reader.read_u24_le()?), Some(reader.read_u8()?))
        } else {
            (None, None)
        };
        let fragment = if has_fragment {
            Some(FragmentInfo::read(reader)?)
        } else {
            None
        };

        let payload = reader.read_bytes(byte_length)?;

        Ok(Self {
            reliability,
            reliable_index,
            sequence_index,
            order_index,
            order_channel,
            fragment,
            payload,
        })
    }
}

/// A numbered bundle of frames sent as a single UDP datagram (§3,
/// `frame_set_sequence`).
#[derive(Debug, Clone)]
pub struct FrameSet {
    pub sequence: u32,
    pub frames: Vec<Frame>,
}

impl FrameSet {
    pub const HEADER_LEN: usize = 1 + 3;

    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_u8(crate::consts::FRAME_SET_VALID_FLAG)?;
        writer.write_u24_le(self.sequence)?;
        for frame in &self.frames {
            frame.write(writer)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut BinaryReader) -> Result<Self> {
        let flags = reader.read_u8()?;
        if flags & crate::consts::FRAME_SET_VALID_FLAG == 0 {
            return Err(RakNetError::Handshake("frame set missing VALID bit".into()));
        }
        let sequence = reader.read_u24_le()?;
        let mut frames = Vec::new();
        while !reader.feof() {
            frames.push(Frame::read(reader)?);
        }
        Ok(Self { sequence, frames })
    }

    pub fn encoded_len(&self) -> usize {
        Self::HEADER_LEN + self.frames.iter().map(Frame::total_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip_reliable_ordered() {
        let mut frame = Frame::new(Reliability::ReliableOrdered, Bytes::from_static(b"hello"));
        frame.reliable_index = Some(7);
        frame.order_index = Some(2);
        frame.order_channel = Some(0);

        let mut writer = BinaryWriter::new();
        frame.write(&mut writer).unwrap();
        let mut reader = BinaryReader::new(writer.freeze());
        let decoded = Frame::read(&mut reader).unwrap();

        assert_eq!(decoded.reliable_index, Some(7));
        assert_eq!(decoded.order_index, Some(2));
        assert_eq!(decoded.payload.as_ref(), b"hello");
    }

    #[test]
    fn frame_set_round_trip() {
        let mut a = Frame::new(Reliability::Unreliable, Bytes::from_static(b"a"));
        a.reliable_index = None;
        let mut b = Frame::new(Reliability::Reliable, Bytes::from_static(b"bb"));
        b.reliable_index = Some(1);

        let set = FrameSet { sequence: 42, frames: vec![a, b] };
        let mut writer = BinaryWriter::new();
        set.write(&mut writer).unwrap();
        let mut reader = BinaryReader::new(writer.freeze());
        let decoded = FrameSet::read(&mut reader).unwrap();

        assert_eq!(decoded.sequence, 42);
        assert_eq!(decoded.frames.len(), 2);
        assert_eq!(decoded.frames[1].payload.as_ref(), b"bb");
    }
}
