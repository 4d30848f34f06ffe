use crate::error::Result;
use aurora_binary::{BinaryReader, BinaryWriter};

const RECORD_SINGLE: u8 = 1;
const RECORD_RANGE: u8 = 0;

/// Run-length encodes a sorted, deduplicated set of frame-set sequence
/// numbers into RakNet's ACK/NACK record format (§4.D flush cadence).
pub fn encode_records(writer: &mut BinaryWriter, sequences: &[u32]) -> Result<()> {
    let mut sorted = sequences.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut records: Vec<(u32, u32)> = Vec::new();
    let mut iter = sorted.into_iter();
    if let Some(first) = iter.next() {
        let mut start = first;
        let mut end = first;
        for value in iter {
            if value == end + 1 {
                end = value;
            } else {
                records.push((start, end));
                start = value;
                end = value;
            }
        }
        records.push((start, end));
    }

    writer.write_u16(records.len() as u16)?;
    for (start, end) in records {
        if start == end {
            writer.write_u8(RECORD_SINGLE)?;
            writer.write_u24_le(start)?;
        } else {
            writer.write_u8(RECORD_RANGE)?;
            writer.write_u24_le(start)?;
            writer.write_u24_le(end)?;
        }
    }
    Ok(())
}

pub fn decode_records(reader: &mut BinaryReader) -> Result<Vec<u32>> {
    let record_count = reader.read_u16()?;
    let mut sequences = Vec::new();
    for _ in 0..record_count {
        let kind = reader.read_u8()?;
        if kind == RECORD_SINGLE {
            sequences.push(reader.read_u24_le()?);
        } else {
            let start = reader.read_u24_le()?;
            let end = reader.read_u24_le()?;
            if end >= start {
                sequences.extend(start..=end);
            }
        }
    }
    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_contiguous_runs_as_ranges() {
        let mut writer = BinaryWriter::new();
        encode_records(&mut writer, &[5, 0, 1, 2, 7, 8]).unwrap();
        let mut reader = BinaryReader::new(writer.freeze());
        let decoded = decode_records(&mut reader).unwrap();
        assert_eq!(decoded, vec![0, 1, 2, 5, 7, 8]);
    }
}
