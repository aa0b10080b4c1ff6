//! Per-parse state.

use std::collections::{BTreeMap, BTreeSet};

use bitstream::BitReader;
use log::debug;

use crate::bunch::Reassembler;
use crate::channel::ChannelTable;
use crate::config::DecoderConfig;
use crate::error::ReplayResult;
use crate::guid_cache::GuidCache;
use crate::observer::ReplayObserver;

/// Counters kept while a replay is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseStats {
    pub frames: u64,
    pub packets: u64,
    /// Bunch headers decoded, before reassembly.
    pub bunches: u64,
    /// Bunches dropped by a reassembly or processing error.
    pub dropped_bunches: u64,
    /// The observer asked to stop before the data was exhausted.
    pub stopped_early: bool,
}

/// What a finished parse learned about the replay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplaySummary {
    /// Path of every guid exported by the stream.
    pub guid_paths: BTreeMap<u32, String>,
    /// Declared field names per export group path.
    pub export_groups: BTreeMap<String, BTreeSet<String>>,
    pub stats: ParseStats,
}

/// State of one parse, created by [`ReplayReader::begin`].
///
/// Holds the channel table, the partial bunch in progress, the reliable and
/// packet counters and every guid and export group learned so far. Nothing
/// here outlives the session.
///
/// [`ReplayReader::begin`]: crate::ReplayReader::begin
#[derive(Debug)]
pub struct ParseSession<'r> {
    pub(crate) config: &'r DecoderConfig,
    pub(crate) guids: GuidCache,
    pub(crate) channels: ChannelTable,
    pub(crate) reassembler: Reassembler,
    pub(crate) in_packet_id: u32,
    pub(crate) stats: ParseStats,
}

impl<'r> ParseSession<'r> {
    pub(crate) fn new(config: &'r DecoderConfig) -> Self {
        Self {
            config,
            guids: GuidCache::new(),
            channels: ChannelTable::new(),
            reassembler: Reassembler::new(),
            in_packet_id: 0,
            stats: ParseStats::default(),
        }
    }

    /// Decodes a replay data chunk: demo frames until the data runs out.
    ///
    /// The observer is polled before every frame and may stop the parse.
    /// Errors inside a bunch or a field are logged and skipped; only framing
    /// errors end the parse.
    pub fn decode_replay_data(
        &mut self,
        data: &[u8],
        observer: &mut dyn ReplayObserver,
    ) -> ReplayResult<()> {
        let mut reader = BitReader::new(data);
        while !reader.is_at_end() {
            if !observer.should_continue() {
                debug!("observer stopped the parse after {} frames", self.stats.frames);
                self.stats.stopped_early = true;
                break;
            }
            self.read_demo_frame(&mut reader, observer)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn config(&self) -> &DecoderConfig {
        self.config
    }

    #[must_use]
    pub const fn guid_cache(&self) -> &GuidCache {
        &self.guids
    }

    #[must_use]
    pub const fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    #[must_use]
    pub const fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Ends the parse, keeping only its summary.
    #[must_use]
    pub fn finish(self) -> ReplaySummary {
        let guid_paths = self
            .guids
            .paths()
            .map(|(guid, path)| (guid.raw(), path.to_owned()))
            .collect();
        let mut export_groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for group in self.guids.groups() {
            export_groups
                .entry(group.path_name.clone())
                .or_default()
                .extend(group.field_names().map(str::to_owned));
        }
        ReplaySummary {
            guid_paths,
            export_groups,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;

    struct StopImmediately;

    impl ReplayObserver for StopImmediately {
        fn should_continue(&mut self) -> bool {
            false
        }
    }

    #[test]
    fn empty_data_is_an_empty_replay() {
        let config = DecoderConfig::default();
        let mut session = ParseSession::new(&config);
        session.decode_replay_data(&[], &mut NullObserver).unwrap();
        let summary = session.finish();
        assert_eq!(summary, ReplaySummary::default());
    }

    #[test]
    fn observer_can_stop_before_first_frame() {
        let config = DecoderConfig::default();
        let mut session = ParseSession::new(&config);
        // garbage that would fail to parse as a frame
        session
            .decode_replay_data(&[0xFF; 3], &mut StopImmediately)
            .unwrap();
        assert!(session.stats().stopped_early);
        assert_eq!(session.stats().frames, 0);
    }
}
