//! Logical bunches and partial-bunch reassembly.

use bitstream::{BitBuffer, BitWriter};
use log::{debug, trace};
use wire::BunchHeader;

use crate::error::{BunchError, MergeReason};

/// One bunch with its payload detached from the packet.
///
/// Package map exports have already been consumed; `payload` holds only the
/// channel content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBunch {
    pub header: BunchHeader,
    /// Reliable sequence, or the packet id for unreliable partials.
    pub ch_sequence: u32,
    pub payload: BitBuffer,
}

impl DataBunch {
    #[must_use]
    pub fn new(header: BunchHeader, ch_sequence: u32, payload: BitBuffer) -> Self {
        Self {
            header,
            ch_sequence,
            payload,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> u32 {
        self.header.ch_index
    }
}

#[derive(Debug)]
struct PartialBunch {
    header: BunchHeader,
    ch_sequence: u32,
    payload: BitWriter,
}

impl PartialBunch {
    /// Yields the logical bunch as if it had arrived unsplit.
    fn finish(mut self, last: &BunchHeader) -> DataBunch {
        let payload = self.payload.into_buffer();
        self.header.partial = false;
        self.header.partial_initial = false;
        self.header.partial_final = false;
        self.header.bunch_data_bits = u32::try_from(payload.bit_len()).unwrap_or(u32::MAX);
        self.header.close = last.close;
        self.header.dormant = last.dormant;
        self.header.close_reason = last.close_reason;
        self.header.replication_paused = last.replication_paused;
        self.header.has_must_be_mapped_guids = last.has_must_be_mapped_guids;
        DataBunch::new(self.header, self.ch_sequence, payload)
    }
}

/// Merges partial bunches and tracks the in-order reliable sequence.
///
/// Holds at most one partial bunch. Every failed merge discards it, except a
/// conflicting initial fragment, which is dropped in favour of the reliable
/// partial already in progress.
#[derive(Debug, Default)]
pub struct Reassembler {
    in_reliable: u32,
    partial: Option<PartialBunch>,
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last in-order reliable sequence accepted.
    #[must_use]
    pub const fn in_reliable(&self) -> u32 {
        self.in_reliable
    }

    /// Sequence the next reliable bunch will carry.
    #[must_use]
    pub const fn next_reliable(&self) -> u32 {
        self.in_reliable.wrapping_add(1)
    }

    /// Returns `true` if a reliable bunch was already processed.
    #[must_use]
    pub fn is_stale(&self, bunch: &DataBunch) -> bool {
        bunch.header.reliable && bunch.ch_sequence <= self.in_reliable
    }

    /// Returns `true` while a partial bunch is being accumulated.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        self.partial.is_some()
    }

    /// Feeds one bunch.
    ///
    /// Returns the logical bunch to dispatch, if this call completed one.
    /// Stale reliable bunches are dropped without touching any state.
    pub fn accept(&mut self, bunch: DataBunch) -> Result<Option<DataBunch>, BunchError> {
        if self.is_stale(&bunch) {
            trace!(
                "channel {}: dropping stale reliable bunch {}",
                bunch.channel(),
                bunch.ch_sequence
            );
            return Ok(None);
        }
        if bunch.header.reliable {
            self.in_reliable = bunch.ch_sequence;
        }
        if !bunch.header.partial {
            return Ok(Some(bunch));
        }
        if bunch.header.partial_initial {
            self.begin(bunch)?;
            return Ok(None);
        }
        self.merge(bunch)
    }

    fn begin(&mut self, bunch: DataBunch) -> Result<(), BunchError> {
        let channel = bunch.channel();
        if let Some(partial) = &self.partial {
            if partial.header.reliable {
                return Err(BunchError::PartialConflict { channel });
            }
            debug!(
                "channel {channel}: replacing unfinished unreliable partial from channel {}",
                partial.header.ch_index
            );
        }
        self.partial = None;

        let mut payload = BitWriter::new();
        let bits = bunch.payload.bit_len();
        // a partial carrying exports holds only guids
        if !bunch.header.has_package_map_exports && bits > 0 {
            if bits % 8 != 0 {
                return Err(BunchError::UnalignedPartial { channel, bits });
            }
            payload.append_buffer(&bunch.payload)?;
        }
        self.partial = Some(PartialBunch {
            header: bunch.header,
            ch_sequence: bunch.ch_sequence,
            payload,
        });
        Ok(())
    }

    fn merge(&mut self, bunch: DataBunch) -> Result<Option<DataBunch>, BunchError> {
        let channel = bunch.channel();
        let mismatch = |reason| BunchError::MergeMismatch { channel, reason };

        let Some(mut partial) = self.partial.take() else {
            return Err(mismatch(MergeReason::NoPartial));
        };
        if partial.header.reliable != bunch.header.reliable {
            return Err(mismatch(MergeReason::ReliabilityMismatch));
        }
        let next = partial.ch_sequence.wrapping_add(1);
        let in_sequence = if bunch.header.reliable {
            bunch.ch_sequence == next
        } else {
            // unreliable resends may repeat a packet id
            bunch.ch_sequence == partial.ch_sequence || bunch.ch_sequence == next
        };
        if !in_sequence {
            return Err(mismatch(MergeReason::Sequence {
                expected: next,
                found: bunch.ch_sequence,
            }));
        }

        let exports = bunch.header.has_package_map_exports;
        let bits = bunch.payload.bit_len();
        if !exports && bits > 0 {
            if !bunch.header.partial_final && bits % 8 != 0 {
                return Err(BunchError::UnalignedPartial { channel, bits });
            }
            partial.payload.append_buffer(&bunch.payload)?;
        }
        partial.ch_sequence = bunch.ch_sequence;

        if !bunch.header.partial_final {
            self.partial = Some(partial);
            return Ok(None);
        }
        if exports {
            return Err(BunchError::FinalPartialWithExports { channel });
        }
        Ok(Some(partial.finish(&bunch.header)))
    }
}
