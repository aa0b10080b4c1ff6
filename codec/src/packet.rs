//! Packets: bunch headers, package map exports and channel dispatch.

use bitstream::{BitBuffer, BitReader};
use log::{error, trace, warn};
use wire::{packet_bit_length, BunchHeader, ChannelType, WireResult};

use crate::actor::receive_actor_bunch;
use crate::bunch::DataBunch;
use crate::error::{BunchError, ReplayResult};
use crate::exports::receive_net_guid_bunch;
use crate::observer::ReplayObserver;
use crate::session::ParseSession;

impl ParseSession<'_> {
    /// Decodes one packet as read from a demo frame.
    ///
    /// A packet without a terminator bit is fatal. A bunch that cannot be
    /// framed is logged and the rest of its packet discarded.
    pub fn receive_raw_packet(
        &mut self,
        packet: &[u8],
        observer: &mut dyn ReplayObserver,
    ) -> ReplayResult<()> {
        if packet.is_empty() {
            error!("received zero-size packet");
            return Ok(());
        }
        let bits = packet_bit_length(packet)?;
        self.stats.packets += 1;
        if bits == 0 {
            return Ok(());
        }

        let mut reader = BitReader::with_bit_len(packet, bits)?;
        self.in_packet_id = self.in_packet_id.wrapping_add(1);
        while !reader.is_at_end() {
            if let Err(err) = self.receive_raw_bunch(&mut reader, observer) {
                error!(
                    "packet {}: {err}, discarding {} remaining bits",
                    self.in_packet_id,
                    reader.bits_remaining()
                );
                break;
            }
        }
        Ok(())
    }

    /// Reads one bunch header and payload from a packet.
    ///
    /// Errors here leave the packet position unknown; errors from the bunch
    /// itself are logged and counted.
    fn receive_raw_bunch(
        &mut self,
        reader: &mut BitReader<'_>,
        observer: &mut dyn ReplayObserver,
    ) -> WireResult<()> {
        let config = self.config;
        let header = BunchHeader::read(reader, &config.versions, &config.limits)?;
        let ch_sequence = if header.reliable {
            self.reassembler.next_reliable()
        } else if header.partial {
            self.in_packet_id
        } else {
            0
        };

        let payload = {
            let mut window = reader.window(header.bunch_data_bits as usize)?;
            if header.has_package_map_exports {
                receive_net_guid_bunch(config, &mut self.guids, &mut window)?;
            }
            let bits = window.bits_remaining();
            BitBuffer::read_from(&mut window, bits)?
        };
        self.stats.bunches += 1;

        let bunch = DataBunch::new(header, ch_sequence, payload);
        if self.reassembler.is_stale(&bunch) {
            return Ok(());
        }

        let index = bunch.channel();
        if !self.channels.contains(index) && !bunch.header.reliable {
            let temporary = bunch.header.open && (bunch.header.close || bunch.header.partial);
            if !temporary {
                trace!("channel {index}: unreliable bunch for a closed channel");
                return Ok(());
            }
        }
        self.channels
            .open(index, bunch.header.ch_type, bunch.header.ch_name.clone());

        if let Err(err) = self.receive_next_bunch(bunch, observer) {
            error!("dropped bunch: {err}");
            self.stats.dropped_bunches += 1;
        }
        Ok(())
    }

    fn receive_next_bunch(
        &mut self,
        bunch: DataBunch,
        observer: &mut dyn ReplayObserver,
    ) -> Result<(), BunchError> {
        match self.reassembler.accept(bunch)? {
            Some(bunch) => self.receive_sequenced_bunch(&bunch, observer),
            None => Ok(()),
        }
    }

    /// Dispatches a complete logical bunch to its channel.
    ///
    /// A closing bunch clears the slot even when its content failed.
    fn receive_sequenced_bunch(
        &mut self,
        bunch: &DataBunch,
        observer: &mut dyn ReplayObserver,
    ) -> Result<(), BunchError> {
        let index = bunch.channel();
        let result = match self.channels.get_mut(index) {
            // control traffic carries nothing a replay needs
            Some(channel) if channel.ch_type == ChannelType::Control => Ok(()),
            Some(channel) => {
                receive_actor_bunch(self.config, &mut self.guids, channel, bunch, observer)
            }
            None => {
                warn!("channel {index}: logical bunch for an empty slot");
                Ok(())
            }
        };

        if bunch.header.close {
            self.channels.close(index);
            observer.on_channel_closed(index);
        }
        result
    }
}
