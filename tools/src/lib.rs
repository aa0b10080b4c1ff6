//! Inspection tools for the rewind replay decoder.
//!
//! This crate provides utilities for looking inside a decompressed replay
//! data chunk without writing an observer:
//!
//! - Summarize guid paths, export groups and decode counters
//! - Record decode events in stream order as JSON-ready records
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Nothing hidden** - Every export group is decoded through the diagnostic
//!   registry, so unregistered types still show their raw fields.

use std::fmt::Write as _;

use codec::{
    Actor, DecoderConfig, ExportRead, ExternalData, NetDeltaUpdate, ReplayObserver, ReplayReader,
    ReplayResult, ReplaySummary,
};
use schema::{DebugExport, ExportObject, ExportRegistry};
use serde::Serialize;
use wire::ReplayVersions;

/// One raw field of an export decoded without a registered type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    pub handle: u32,
    pub name: Option<String>,
    pub bits: usize,
}

/// A decode event, flattened for printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRecord {
    Actor {
        channel: u32,
        guid: u32,
        archetype: Option<u32>,
        level: Option<u32>,
    },
    Export {
        channel: u32,
        group: String,
        actor: Option<u32>,
        fields: Vec<FieldRecord>,
        /// Debug rendering of a registered type.
        value: Option<String>,
    },
    Delta {
        channel: u32,
        group: String,
        element_group: String,
        element_index: i32,
        deleted: bool,
    },
    ChannelClosed {
        channel: u32,
    },
    ExternalData {
        guid: u32,
        time_seconds: f32,
        bytes: usize,
    },
    StreamingLevel {
        level_index: i32,
        time_seconds: f32,
        name: String,
    },
}

/// Observer that records events, stopping the parse after `limit` of them.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<EventRecord>,
    limit: Option<usize>,
}

impl EventLog {
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            events: Vec::new(),
            limit,
        }
    }

    fn push(&mut self, event: EventRecord) {
        if self.limit.map_or(true, |limit| self.events.len() < limit) {
            self.events.push(event);
        }
    }
}

fn export_fields(export: &dyn ExportObject) -> (Vec<FieldRecord>, Option<String>) {
    match export.downcast_ref::<DebugExport>() {
        Some(debug) => {
            let fields = debug
                .fields
                .iter()
                .map(|(handle, field)| FieldRecord {
                    handle: *handle,
                    name: field.name.clone(),
                    bits: field.bits.bit_len(),
                })
                .collect();
            (fields, None)
        }
        None => (Vec::new(), Some(format!("{export:?}"))),
    }
}

impl ReplayObserver for EventLog {
    fn on_actor(&mut self, channel: u32, actor: &Actor) {
        self.push(EventRecord::Actor {
            channel,
            guid: actor.guid.raw(),
            archetype: actor.archetype.map(|guid| guid.raw()),
            level: actor.level.map(|guid| guid.raw()),
        });
    }

    fn on_export_read(&mut self, read: ExportRead<'_>) {
        let (fields, value) = export_fields(read.export.as_ref());
        self.push(EventRecord::Export {
            channel: read.channel,
            group: read.group_path.to_owned(),
            actor: read.actor.map(|guid| guid.raw()),
            fields,
            value,
        });
    }

    fn on_net_delta(&mut self, update: NetDeltaUpdate<'_>) {
        self.push(EventRecord::Delta {
            channel: update.channel,
            group: update.owner_group.to_owned(),
            element_group: update.element_group.to_owned(),
            element_index: update.element_index,
            deleted: update.deleted,
        });
    }

    fn on_channel_closed(&mut self, channel: u32) {
        self.push(EventRecord::ChannelClosed { channel });
    }

    fn on_external_data(&mut self, data: ExternalData) {
        self.push(EventRecord::ExternalData {
            guid: data.guid.raw(),
            time_seconds: data.time_seconds,
            bytes: data.data.len(),
        });
    }

    fn on_streaming_level(&mut self, level_index: i32, time: f32, name: &str) {
        self.push(EventRecord::StreamingLevel {
            level_index,
            time_seconds: time,
            name: name.to_owned(),
        });
    }

    fn should_continue(&mut self) -> bool {
        self.limit.map_or(true, |limit| self.events.len() < limit)
    }
}

/// Configuration decoding every group through the diagnostic registry.
#[must_use]
pub fn diagnostic_config(versions: ReplayVersions) -> DecoderConfig {
    DecoderConfig::new(versions, ExportRegistry::diagnostic())
}

/// Decodes a replay data chunk, keeping only the summary.
pub fn summarize(data: &[u8], config: DecoderConfig) -> ReplayResult<ReplaySummary> {
    let mut reader = ReplayReader::new(config)?;
    reader.decode(data, &mut codec::NullObserver)
}

/// Decodes a replay data chunk, recording up to `limit` events.
pub fn collect_events(
    data: &[u8],
    config: DecoderConfig,
    limit: Option<usize>,
) -> ReplayResult<(Vec<EventRecord>, ReplaySummary)> {
    let mut reader = ReplayReader::new(config)?;
    let mut log = EventLog::new(limit);
    let summary = reader.decode(data, &mut log)?;
    Ok((log.events, summary))
}

/// Renders a summary for terminals.
#[must_use]
pub fn format_summary_pretty(summary: &ReplaySummary) -> String {
    let mut out = String::new();
    let stats = &summary.stats;
    let _ = writeln!(
        out,
        "frames: {} packets: {} bunches: {} dropped: {}{}",
        stats.frames,
        stats.packets,
        stats.bunches,
        stats.dropped_bunches,
        if stats.stopped_early { " (stopped early)" } else { "" }
    );
    let _ = writeln!(out, "guid paths: {}", summary.guid_paths.len());
    for (guid, path) in &summary.guid_paths {
        let _ = writeln!(out, "  {guid}: {path}");
    }
    let _ = writeln!(out, "export groups: {}", summary.export_groups.len());
    for (path, fields) in &summary.export_groups {
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  {path} [{}]", fields.join(", "));
    }
    out
}
