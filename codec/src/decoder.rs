//! The decoding entry point.

use log::debug;

use crate::config::DecoderConfig;
use crate::error::ReplayResult;
use crate::observer::ReplayObserver;
use crate::session::{ParseSession, ReplaySummary};

/// Decodes replays with one fixed configuration.
///
/// The reader holds configuration only. Each parse runs in a
/// [`ParseSession`] that borrows the reader exclusively, so one reader never
/// runs two parses at once.
#[derive(Debug)]
pub struct ReplayReader {
    config: DecoderConfig,
    parses: u64,
}

impl ReplayReader {
    /// Creates a reader, refusing versions it cannot decode.
    pub fn new(config: DecoderConfig) -> ReplayResult<Self> {
        config.validate()?;
        Ok(Self { config, parses: 0 })
    }

    #[must_use]
    pub const fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Number of parses started by this reader.
    #[must_use]
    pub const fn parses(&self) -> u64 {
        self.parses
    }

    /// Starts a parse with empty state.
    pub fn begin(&mut self) -> ParseSession<'_> {
        self.parses += 1;
        debug!("starting parse {}", self.parses);
        ParseSession::new(&self.config)
    }

    /// Decodes one replay data chunk in a fresh session.
    pub fn decode(
        &mut self,
        data: &[u8],
        observer: &mut dyn ReplayObserver,
    ) -> ReplayResult<ReplaySummary> {
        let mut session = self.begin();
        session.decode_replay_data(data, observer)?;
        Ok(session.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplayError;
    use crate::observer::NullObserver;
    use wire::{EngineNetworkVersion, NetworkVersion, ReplayHeaderFlags, ReplayVersions};

    #[test]
    fn unsupported_versions_refused() {
        let config = DecoderConfig {
            versions: ReplayVersions::new(
                NetworkVersion::EXTRA_VERSION,
                EngineNetworkVersion::LATEST,
                ReplayHeaderFlags::default(),
            ),
            ..DecoderConfig::default()
        };
        assert!(matches!(
            ReplayReader::new(config),
            Err(ReplayError::Wire(_))
        ));
    }

    #[test]
    fn sessions_start_empty() {
        let mut reader = ReplayReader::new(DecoderConfig::default()).unwrap();
        let summary = reader.decode(&[], &mut NullObserver).unwrap();
        assert!(summary.guid_paths.is_empty());
        let session = reader.begin();
        assert!(session.channels().is_empty());
        assert_eq!(session.guid_cache().group_count(), 0);
        drop(session);
        assert_eq!(reader.parses(), 2);
    }
}
