//! Component C: the outbound queue (§4.C).

use crate::consts::MTU;
use crate::error::Result;
use crate::frame::{Frame, FragmentInfo, FrameSet};
use crate::reliability::{Priority, Reliability};
use aurora_binary::BinaryWriter;
use bytes::Bytes;
use log::trace;
use std::collections::HashMap;

/// A payload over this size (MTU minus the worst-case frame header) must be
/// split before it can travel in a single frame.
const MAX_FRAME_PAYLOAD: usize = MTU as usize - 29;

/// Flush the current frame set once it would grow past this size.
const MAX_FRAME_SET_SIZE: usize = MTU as usize - 36;

pub const ORDER_CHANNELS: usize = crate::consts::MAX_ORDER_CHANNELS;

#[derive(Debug)]
pub struct OutboundQueue {
    reliable_index: u32,
    order_index: [u32; ORDER_CHANNELS],
    sequence_index: [u32; ORDER_CHANNELS],
    fragment_id: u16,
    frame_set_sequence: u32,
    current_set: Vec<Frame>,
    current_set_len: usize,
    backup: HashMap<u32, Vec<Frame>>,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self {
            reliable_index: 0,
            order_index: [0; ORDER_CHANNELS],
            sequence_index: [0; ORDER_CHANNELS],
            fragment_id: 0,
            frame_set_sequence: 0,
            current_set: Vec::new(),
            current_set_len: FrameSet::HEADER_LEN,
            backup: HashMap::new(),
        }
    }
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_fragment_id(&mut self) -> u16 {
        let id = self.fragment_id;
        self.fragment_id = self.fragment_id.wrapping_add(1);
        id
    }

    /// Assigns indices to `payload` per the reliability/channel rules,
    /// fragmenting if necessary, and appends the resulting frame(s) to the
    /// current set. Returns frame sets that had to be flushed to make room,
    /// ready to hand to the transport.
    pub fn enqueue(
        &mut self,
        payload: Bytes,
        reliability: Reliability,
        channel: u8,
        priority: Priority,
    ) -> Result<Vec<Bytes>> {
        let channel = channel as usize % ORDER_CHANNELS;
        let mut flushed = Vec::new();

        let (order_index, sequence_index) = if reliability.is_sequenced() {
            let order = self.order_index[channel];
            let seq = self.sequence_index[channel];
            self.sequence_index[channel] = seq.wrapping_add(1);
            (Some(order), Some(seq))
        } else if reliability.is_order_exclusive() {
            let order = self.order_index[channel];
            self.order_index[channel] = order.wrapping_add(1);
            self.sequence_index[channel] = 0;
            (Some(order), None)
        } else {
            (None, None)
        };

        let frames = if payload.len() > MAX_FRAME_PAYLOAD {
            self.split_fragments(payload, reliability, order_index, sequence_index, channel as u8)
        } else {
            let reliable_index = if reliability.is_reliable() {
                Some(self.next_reliable_index())
            } else {
                None
            };
            vec![Frame {
                reliability,
                reliable_index,
                sequence_index,
                order_index,
                order_channel: if order_index.is_some() { Some(channel as u8) } else { None },
                fragment: None,
                payload,
            }]
        };

        for frame in frames {
            if let Some(set) = self.push_frame(frame)? {
                flushed.push(set);
            }
        }

        if priority == Priority::Immediate {
            if let Some(set) = self.flush()? {
                flushed.push(set);
            }
        }

        Ok(flushed)
    }

    fn next_reliable_index(&mut self) -> u32 {
        let index = self.reliable_index;
        self.reliable_index = self.reliable_index.wrapping_add(1);
        index
    }

    /// Each fragment gets its own fresh frame record and its own reliable
    /// index; sharing one mutable frame across fragments is the bug the
    /// reference implementation has in at least one version.
    fn split_fragments(
        &mut self,
        payload: Bytes,
        reliability: Reliability,
        order_index: Option<u32>,
        sequence_index: Option<u32>,
        channel: u8,
    ) -> Vec<Frame> {
        let fragment_id = self.next_fragment_id();
        let chunks: Vec<Bytes> = payload
            .chunks(MAX_FRAME_PAYLOAD)
            .map(|c| Bytes::copy_from_slice(c))
            .collect();
        let count = chunks.len() as u32;

        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let reliable_index = if reliability.is_reliable() {
                    Some(self.next_reliable_index())
                } else {
                    None
                };
                Frame {
                    reliability,
                    reliable_index,
                    sequence_index,
                    order_index,
                    order_channel: if order_index.is_some() { Some(channel) } else { None },
                    fragment: Some(FragmentInfo { id: fragment_id, index: index as u32, count }),
                    payload: chunk,
                }
            })
            .collect()
    }

    /// Appends `frame` to the current set, flushing first if it would not
    /// otherwise fit.
    fn push_frame(&mut self, frame: Frame) -> Result<Option<Bytes>> {
        let frame_len = frame.total_len();
        let mut flushed = None;
        if self.current_set_len + frame_len > MAX_FRAME_SET_SIZE && !self.current_set.is_empty() {
            flushed = self.flush()?;
        }
        self.current_set_len += frame_len;
        self.current_set.push(frame);
        Ok(flushed)
    }

    /// Stamps and serializes the current set, stashing its reliable frames
    /// in the retransmission backup, and clears it. Returns `None` if there
    /// was nothing to send.
    pub fn flush(&mut self) -> Result<Option<Bytes>> {
        if self.current_set.is_empty() {
            return Ok(None);
        }
        let sequence = self.frame_set_sequence;
        self.frame_set_sequence = self.frame_set_sequence.wrapping_add(1);

        let frames = std::mem::take(&mut self.current_set);
        self.current_set_len = FrameSet::HEADER_LEN;

        let reliable_frames: Vec<Frame> = frames
            .iter()
            .filter(|f| f.reliable_index.is_some())
            .cloned()
            .collect();
        if !reliable_frames.is_empty() {
            self.backup.insert(sequence, reliable_frames);
        }

        let set = FrameSet { sequence, frames };
        let mut writer = BinaryWriter::new();
        set.write(&mut writer)?;
        trace!("flushed frame set {sequence}");
        Ok(Some(writer.freeze()))
    }

    /// A NACK for `sequence` re-enqueues the frames it carried at Immediate
    /// priority, keeping their original indices — the server dedups by
    /// reliable index.
    pub fn on_nack(&mut self, sequence: u32) -> Result<Vec<Bytes>> {
        let Some(frames) = self.backup.remove(&sequence) else {
            return Ok(Vec::new());
        };
        let mut flushed = Vec::new();
        for frame in frames {
            if let Some(set) = self.push_frame(frame)? {
                flushed.push(set);
            }
        }
        if let Some(set) = self.flush()? {
            flushed.push(set);
        }
        Ok(flushed)
    }

    pub fn on_ack(&mut self, sequence: u32) {
        self.backup.remove(&sequence);
    }

    pub fn backup_len(&self) -> usize {
        self.backup.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliable_indices_increase_without_gaps() {
        let mut queue = OutboundQueue::new();
        for _ in 0..5 {
            queue
                .enqueue(Bytes::from_static(b"x"), Reliability::Reliable, 0, Priority::Immediate)
                .unwrap();
        }
        assert_eq!(queue.reliable_index, 5);
    }

    #[test]
    fn order_exclusive_resets_sequence_counter() {
        let mut queue = OutboundQueue::new();
        queue
            .enqueue(Bytes::from_static(b"a"), Reliability::UnreliableSequenced, 0, Priority::Normal)
            .unwrap();
        queue
            .enqueue(Bytes::from_static(b"b"), Reliability::ReliableOrdered, 0, Priority::Normal)
            .unwrap();
        assert_eq!(queue.sequence_index[0], 0);
        assert_eq!(queue.order_index[0], 1);
    }

    #[test]
    fn large_payload_fragments_with_distinct_reliable_indices() {
        let mut queue = OutboundQueue::new();
        let payload = Bytes::from(vec![7u8; MAX_FRAME_PAYLOAD * 3 + 10]);
        queue
            .enqueue(payload, Reliability::ReliableOrdered, 0, Priority::Immediate)
            .unwrap();
        assert_eq!(queue.reliable_index, 4);
    }

    #[test]
    fn nack_requeues_backup_frames() {
        let mut queue = OutboundQueue::new();
        queue
            .enqueue(Bytes::from_static(b"x"), Reliability::Reliable, 0, Priority::Immediate)
            .unwrap();
        assert_eq!(queue.backup_len(), 1);
        let resent = queue.on_nack(0).unwrap();
        assert!(!resent.is_empty());
        assert!(queue.backup.get(&0).is_none());
        // the retransmit landed in a fresh frame set, which is itself backed up
        assert_eq!(queue.backup_len(), 1);
        queue.on_ack(1);
        assert_eq!(queue.backup_len(), 0);
    }
}
