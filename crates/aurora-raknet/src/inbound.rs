//! Component D: the inbound reassembler (§4.D).

use crate::error::Result;
use crate::frame::{Frame, FrameSet};
use aurora_binary::BinaryReader;
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, HashSet};

const ORDER_CHANNELS: usize = crate::consts::MAX_ORDER_CHANNELS;

#[derive(Debug, Default)]
struct FragmentAssembly {
    count: u32,
    parts: HashMap<u32, Bytes>,
    template: Option<Frame>,
}

/// Deduplicates and reorders incoming frame sets, reassembles fragments,
/// enforces per-channel ordering, and tracks pending ACK/NACK sequences.
pub struct InboundReassembler {
    received_sequences: HashSet<u32>,
    lost_sequences: HashSet<u32>,
    last_sequence: i64,
    fragment_assembly: HashMap<u16, FragmentAssembly>,
    expected_order_index: [u32; ORDER_CHANNELS],
    ordering_queue: [HashMap<u32, Frame>; ORDER_CHANNELS],
    pending_ack: Vec<u32>,
    pending_nack: Vec<u32>,
}

impl Default for InboundReassembler {
    fn default() -> Self {
        Self {
            received_sequences: HashSet::new(),
            lost_sequences: HashSet::new(),
            last_sequence: -1,
            fragment_assembly: HashMap::new(),
            expected_order_index: [0; ORDER_CHANNELS],
            ordering_queue: std::array::from_fn(|_| HashMap::new()),
            pending_ack: Vec::new(),
            pending_nack: Vec::new(),
        }
    }
}

impl InboundReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and processes one incoming frame set, returning the ordered
    /// list of payloads now ready for the game batch codec.
    pub fn on_datagram(&mut self, bytes: Bytes) -> Result<Vec<Bytes>> {
        let mut reader = BinaryReader::new(bytes);
        let set = FrameSet::read(&mut reader)?;
        Ok(self.on_frame_set(set))
    }

    fn on_frame_set(&mut self, set: FrameSet) -> Vec<Bytes> {
        let sequence = set.sequence;
        if sequence as i64 <= self.last_sequence {
            return Vec::new();
        }

        self.received_sequences.insert(sequence);
        self.pending_ack.push(sequence);

        if self.last_sequence >= 0 {
            for missing in (self.last_sequence as u32 + 1)..sequence {
                if !self.received_sequences.contains(&missing) {
                    self.lost_sequences.insert(missing);
                    self.pending_nack.push(missing);
                }
            }
        }
        self.last_sequence = sequence as i64;

        let mut ready = Vec::new();
        for frame in set.frames {
            self.dispatch(frame, &mut ready);
        }
        ready
    }

    fn dispatch(&mut self, frame: Frame, ready: &mut Vec<Bytes>) {
        if let Some(fragment) = frame.fragment {
            let entry = self
                .fragment_assembly
                .entry(fragment.id)
                .or_insert_with(FragmentAssembly::default);
            entry.count = fragment.count;
            if entry.template.is_none() {
                let mut template = frame.clone();
                template.fragment = None;
                entry.template = Some(template);
            }
            entry.parts.insert(fragment.index, frame.payload.clone());

            if entry.parts.len() as u32 == entry.count {
                let assembly = self.fragment_assembly.remove(&fragment.id).unwrap();
                let mut combined = BytesMut::new();
                for index in 0..assembly.count {
                    if let Some(part) = assembly.parts.get(&index) {
                        combined.extend_from_slice(part);
                    }
                }
                let mut reassembled = assembly.template.unwrap();
                reassembled.payload = combined.freeze();
                self.dispatch(reassembled, ready);
            }
            return;
        }

        if frame.order_channel.is_some() {
            self.dispatch_ordered(frame, ready);
        } else {
            ready.push(frame.payload);
        }
    }

    fn dispatch_ordered(&mut self, frame: Frame, ready: &mut Vec<Bytes>) {
        let channel = frame.order_channel.unwrap_or(0) as usize % ORDER_CHANNELS;
        let order_index = match frame.order_index {
            Some(index) => index,
            None => {
                ready.push(frame.payload);
                return;
            }
        };
        let expected = self.expected_order_index[channel];

        if order_index < expected {
            return; // duplicate
        }
        if order_index > expected {
            self.ordering_queue[channel].insert(order_index, frame);
            return;
        }

        ready.push(frame.payload);
        self.expected_order_index[channel] = expected.wrapping_add(1);

        loop {
            let next = self.expected_order_index[channel];
            match self.ordering_queue[channel].remove(&next) {
                Some(queued) => {
                    ready.push(queued.payload);
                    self.expected_order_index[channel] = next.wrapping_add(1);
                }
                None => break,
            }
        }
    }

    /// Drains the pending ACK/NACK lists; called on the 10 ms flush timer.
    pub fn take_pending(&mut self) -> (Vec<u32>, Vec<u32>) {
        (std::mem::take(&mut self.pending_ack), std::mem::take(&mut self.pending_nack))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_ack.is_empty() || !self.pending_nack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FragmentInfo;
    use crate::reliability::Reliability;

    fn frame_set(sequence: u32, frames: Vec<Frame>) -> FrameSet {
        FrameSet { sequence, frames }
    }

    #[test]
    fn duplicate_and_missing_sequences_tracked() {
        let mut reassembler = InboundReassembler::new();
        reassembler.on_frame_set(frame_set(0, vec![]));
        reassembler.on_frame_set(frame_set(2, vec![]));
        let (ack, nack) = reassembler.take_pending();
        assert_eq!(ack, vec![0, 2]);
        assert_eq!(nack, vec![1]);
    }

    #[test]
    fn stale_sequence_discarded() {
        let mut reassembler = InboundReassembler::new();
        reassembler.on_frame_set(frame_set(5, vec![]));
        let out = reassembler.on_frame_set(frame_set(3, vec![]));
        assert!(out.is_empty());
    }

    #[test]
    fn ordering_buffers_out_of_order_frames() {
        let mut reassembler = InboundReassembler::new();
        let mk = |order_index: u32, payload: &'static [u8]| Frame {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(order_index),
            sequence_index: None,
            order_index: Some(order_index),
            order_channel: Some(0),
            fragment: None,
            payload: Bytes::from_static(payload),
        };

        let out = reassembler.on_frame_set(frame_set(0, vec![mk(0, b"a"), mk(2, b"c")]));
        assert_eq!(out, vec![Bytes::from_static(b"a")]);

        let out = reassembler.on_frame_set(frame_set(1, vec![mk(1, b"b")]));
        assert_eq!(out, vec![Bytes::from_static(b"b"), Bytes::from_static(b"c")]);
    }

    #[test]
    fn fragment_reassembly_out_of_order() {
        let mut reassembler = InboundReassembler::new();
        let total = b"hello bedrock world!".to_vec();
        let parts: Vec<Bytes> = total.chunks(5).map(Bytes::copy_from_slice).collect();
        let count = parts.len() as u32;
        let mk = |index: u32, payload: Bytes| Frame {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(index),
            sequence_index: None,
            order_index: Some(0),
            order_channel: Some(0),
            fragment: Some(FragmentInfo { id: 42, index, count }),
            payload,
        };

        let order = [2usize, 0, 3, 1];
        let mut out = Vec::new();
        for (seq, &i) in order.iter().enumerate() {
            let frame = mk(i as u32, parts[i].clone());
            out.extend(reassembler.on_frame_set(frame_set(seq as u32, vec![frame])));
        }
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], Bytes::from(total));
    }
}
