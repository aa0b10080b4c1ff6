use bitstream::{BitReader, BitWriter};
use proptest::prelude::*;
use wire::{
    packet_bit_length, terminate_packet, BunchHeader, ChannelCloseReason, ChannelType,
    EngineNetworkVersion, Limits, NetworkVersion, ReplayHeaderFlags, ReplayVersions,
};

fn header_strategy() -> impl Strategy<Value = BunchHeader> {
    (
        (any::<bool>(), any::<bool>(), any::<bool>(), 0u32..5),
        (any::<bool>(), any::<bool>(), 0u32..10_240),
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()),
        (prop::sample::select(vec![
            ChannelType::Actor,
            ChannelType::Control,
            ChannelType::Voice,
        ]), 0u32..2048 * 8),
    )
        .prop_map(
            |(
                (control, open, close, reason),
                (paused, reliable, ch_index),
                (exports, must_map, partial, initial, fin),
                (ch_type, bits),
            )| {
                let close = control && close;
                let close_reason = if close {
                    ChannelCloseReason::from_raw(reason)
                } else {
                    ChannelCloseReason::Destroyed
                };
                let open = control && open;
                let named = reliable || open;
                BunchHeader {
                    control,
                    open,
                    close,
                    dormant: close_reason == ChannelCloseReason::Dormancy,
                    close_reason,
                    replication_paused: paused,
                    reliable,
                    ch_index,
                    has_package_map_exports: exports,
                    has_must_be_mapped_guids: must_map,
                    partial,
                    partial_initial: partial && initial,
                    partial_final: partial && fin,
                    ch_type: if named { ch_type } else { ChannelType::None },
                    ch_name: if named {
                        ch_type.name().map(str::to_owned)
                    } else {
                        None
                    },
                    bunch_data_bits: bits,
                }
            },
        )
}

fn versions_strategy() -> impl Strategy<Value = ReplayVersions> {
    (EngineNetworkVersion::CHANNEL_CLOSE_REASON.raw()..=EngineNetworkVersion::LATEST.raw()).prop_map(
        |engine| {
            ReplayVersions::new(
                NetworkVersion::LATEST,
                EngineNetworkVersion::new(engine),
                ReplayHeaderFlags::default(),
            )
        },
    )
}

proptest! {
    #[test]
    fn headers_survive_a_packet(
        headers in prop::collection::vec(header_strategy(), 1..8),
        versions in versions_strategy(),
    ) {
        let limits = Limits::default();
        let mut writer = BitWriter::new();
        for header in &headers {
            header.write(&mut writer, &versions, &limits).unwrap();
        }
        let payload_bits = writer.bits_written();
        let packet = terminate_packet(writer);
        prop_assert_eq!(packet_bit_length(&packet).unwrap(), payload_bits);

        let mut reader = BitReader::with_bit_len(&packet, payload_bits).unwrap();
        for header in &headers {
            let read = BunchHeader::read(&mut reader, &versions, &limits).unwrap();
            prop_assert_eq!(&read, header);
        }
        prop_assert!(reader.is_at_end());
    }
}
