use bitstream::{BitBuffer, BitReader};
use codec::{BunchError, DataBunch, MergeReason, Reassembler};
use proptest::prelude::*;
use wire::{BunchHeader, ChannelType};

fn fragment(seq: u32, initial: bool, last: bool, bytes: &[u8], bits: usize) -> DataBunch {
    let header = BunchHeader {
        reliable: true,
        ch_index: 3,
        ch_type: ChannelType::Actor,
        partial: true,
        partial_initial: initial,
        partial_final: last,
        ..BunchHeader::default()
    };
    let mut reader = BitReader::with_bit_len(bytes, bits).unwrap();
    let payload = BitBuffer::read_from(&mut reader, bits).unwrap();
    DataBunch::new(header, seq, payload)
}

/// Splits `bits` of `data` into byte-aligned fragments at `cuts`, leaving
/// any odd tail to the final fragment.
fn fragments(data: &[u8], bits: usize, cuts: &[usize]) -> Vec<DataBunch> {
    let mut bounds: Vec<usize> = cuts
        .iter()
        .map(|cut| (cut % data.len()) * 8)
        .filter(|bound| *bound > 0 && *bound < bits)
        .collect();
    bounds.sort_unstable();
    bounds.dedup();
    bounds.insert(0, 0);
    bounds.push(bits);
    if bounds.len() < 3 {
        // always at least an initial and a final fragment
        bounds = vec![0, 0, bits];
    }

    let count = bounds.len() - 1;
    bounds
        .windows(2)
        .enumerate()
        .map(|(index, range)| {
            let mut reader = BitReader::with_bit_len(data, bits).unwrap();
            reader.skip_bits(range[0]).unwrap();
            let len = range[1] - range[0];
            let payload = BitBuffer::read_from(&mut reader, len).unwrap();
            let header = BunchHeader {
                reliable: true,
                ch_index: 3,
                ch_type: ChannelType::Actor,
                partial: true,
                partial_initial: index == 0,
                partial_final: index + 1 == count,
                ..BunchHeader::default()
            };
            DataBunch::new(header, index as u32 + 1, payload)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_fragments_merge_to_original(
        data in prop::collection::vec(any::<u8>(), 1..48),
        tail_bits in 0usize..8,
        cuts in prop::collection::vec(any::<usize>(), 0..6),
    ) {
        let bits = data.len() * 8 - tail_bits.min(data.len() * 8 - 1);
        let parts = fragments(&data, bits, &cuts);
        let count = parts.len();

        let mut reassembler = Reassembler::new();
        let mut merged = None;
        for (index, part) in parts.iter().cloned().enumerate() {
            let out = reassembler.accept(part).unwrap();
            if index + 1 < count {
                prop_assert!(out.is_none());
                prop_assert!(reassembler.has_partial());
            } else {
                merged = out;
            }
        }

        let merged = merged.unwrap();
        let original = BitBuffer::read_from(&mut BitReader::with_bit_len(&data, bits).unwrap(), bits).unwrap();
        prop_assert_eq!(merged.payload.bit_len(), bits);
        prop_assert_eq!(&merged.payload, &original);
        let unsplit = BunchHeader {
            reliable: true,
            ch_index: 3,
            ch_type: ChannelType::Actor,
            bunch_data_bits: bits as u32,
            ..BunchHeader::default()
        };
        prop_assert_eq!(&merged.header, &unsplit);
        prop_assert_eq!(merged.ch_sequence, count as u32);
        prop_assert!(!reassembler.has_partial());

        // resent fragments are stale and change nothing
        for part in parts {
            prop_assert!(reassembler.accept(part).unwrap().is_none());
        }
        prop_assert!(!reassembler.has_partial());
        prop_assert_eq!(reassembler.in_reliable(), count as u32);
    }

    #[test]
    fn prop_reliable_sequence_only_advances(seqs in prop::collection::vec(1u32..64, 1..32)) {
        let mut reassembler = Reassembler::new();
        let mut highest = 0;
        for seq in seqs {
            let bunch = DataBunch::new(
                BunchHeader {
                    reliable: true,
                    ch_index: 1,
                    ..BunchHeader::default()
                },
                seq,
                BitBuffer::default(),
            );
            let out = reassembler.accept(bunch).unwrap();
            if seq > highest {
                prop_assert!(out.is_some());
                highest = seq;
            } else {
                prop_assert!(out.is_none());
            }
            prop_assert_eq!(reassembler.in_reliable(), highest);
        }
    }
}

#[test]
fn skipped_fragment_discards_partial() {
    let data = [0xAA; 4];
    let mut reassembler = Reassembler::new();
    assert!(reassembler
        .accept(fragment(1, true, false, &data, 16))
        .unwrap()
        .is_none());
    let err = reassembler
        .accept(fragment(3, false, true, &data, 16))
        .unwrap_err();
    assert_eq!(
        err,
        BunchError::MergeMismatch {
            channel: 3,
            reason: MergeReason::Sequence {
                expected: 2,
                found: 3
            }
        }
    );
    assert!(!reassembler.has_partial());
}
