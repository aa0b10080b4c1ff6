//! Callbacks fired while a replay is decoded.

use schema::ExportObject;
use wire::NetworkGuid;

use crate::channel::Actor;

/// Header of one fast-array delta episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FastArrayHeader {
    pub array_replication_key: i32,
    pub base_replication_key: i32,
    pub num_deleted: i32,
    pub num_changed: i32,
}

/// A completed property pass for one replicated object.
#[derive(Debug)]
pub struct ExportRead<'a> {
    pub channel: u32,
    /// Path of the export group the properties were declared by.
    pub group_path: &'a str,
    /// Guid of the actor bound to the channel, if any.
    pub actor: Option<NetworkGuid>,
    pub export: Box<dyn ExportObject>,
}

/// One element of a delta episode.
#[derive(Debug)]
pub struct NetDeltaUpdate<'a> {
    pub channel: u32,
    pub element_index: i32,
    pub deleted: bool,
    /// Class net cache group the delta property belongs to.
    pub owner_group: &'a str,
    /// Export group of the array element type.
    pub element_group: &'a str,
    pub handle: u32,
    pub header: FastArrayHeader,
    /// Decoded element; `None` for deletions.
    pub export: Option<Box<dyn ExportObject>>,
}

/// An external data record attached to a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalData {
    pub guid: NetworkGuid,
    /// Time of the frame carrying the record.
    pub time_seconds: f32,
    pub data: Vec<u8>,
}

/// Receives decode events in stream order.
///
/// Every method has a no-op default so observers implement only what they
/// need.
pub trait ReplayObserver {
    /// A channel was bound to an actor.
    fn on_actor(&mut self, _channel: u32, _actor: &Actor) {}

    fn on_export_read(&mut self, _read: ExportRead<'_>) {}

    fn on_net_delta(&mut self, _update: NetDeltaUpdate<'_>) {}

    /// A channel slot was cleared by a closing bunch.
    fn on_channel_closed(&mut self, _channel: u32) {}

    fn on_external_data(&mut self, _data: ExternalData) {}

    /// A streaming level was loaded at `time` seconds.
    fn on_streaming_level(&mut self, _level_index: i32, _time: f32, _name: &str) {}

    /// Polled between frames; returning `false` stops the parse cleanly.
    fn should_continue(&mut self) -> bool {
        true
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ReplayObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_noops() {
        let mut observer = NullObserver;
        observer.on_actor(1, &Actor::stable(NetworkGuid::new(3)));
        observer.on_channel_closed(1);
        observer.on_streaming_level(0, 1.5, "/Game/Maps/Lobby");
        assert!(observer.should_continue());
    }
}
