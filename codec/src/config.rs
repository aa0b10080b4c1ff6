//! Decoder configuration.

use std::sync::Arc;

use schema::ExportRegistry;
use wire::{Limits, ReplayVersions};

use crate::error::ReplayResult;

/// Read-only configuration shared by every parse of a [`ReplayReader`].
///
/// [`ReplayReader`]: crate::ReplayReader
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Protocol versions from the container header.
    pub versions: ReplayVersions,
    pub limits: Limits,
    /// Declared export types for the title being decoded.
    pub registry: Arc<ExportRegistry>,
}

impl DecoderConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(versions: ReplayVersions, registry: impl Into<Arc<ExportRegistry>>) -> Self {
        Self {
            versions,
            limits: Limits::default(),
            registry: registry.into(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Refuses versions this decoder cannot parse.
    pub fn validate(&self) -> ReplayResult<()> {
        self.versions.validate()?;
        Ok(())
    }
}
