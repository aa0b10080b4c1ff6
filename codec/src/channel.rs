//! Channel slots and the actors bound to them.

use std::collections::HashMap;

use schema::{Rotator, Vector3};
use wire::{ChannelType, NetworkGuid};

/// Whether property reads on a channel are still wanted.
///
/// `Ignored` is terminal for the lifetime of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IgnoreState {
    #[default]
    Unset,
    /// A property pass completed; the channel is explicitly not ignored.
    Read,
    Ignored,
}

/// Spawn transform read for a dynamic actor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpawnInfo {
    pub location: Vector3,
    pub rotation: Rotator,
    pub scale: Vector3,
    pub velocity: Vector3,
}

impl Default for SpawnInfo {
    fn default() -> Self {
        Self {
            location: Vector3::ZERO,
            rotation: Rotator::ZERO,
            scale: Vector3::ONE,
            velocity: Vector3::ZERO,
        }
    }
}

/// Identity of the object a channel replicates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actor {
    pub guid: NetworkGuid,
    /// Archetype (class) reference; dynamic actors only.
    pub archetype: Option<NetworkGuid>,
    /// Level override reference; dynamic actors on newer engines only.
    pub level: Option<NetworkGuid>,
    pub spawn: Option<SpawnInfo>,
}

impl Actor {
    /// A stably named actor that needs no spawn information.
    #[must_use]
    pub const fn stable(guid: NetworkGuid) -> Self {
        Self {
            guid,
            archetype: None,
            level: None,
            spawn: None,
        }
    }

    /// The object whose export group the actor's own properties use.
    #[must_use]
    pub fn replicated_object(&self) -> NetworkGuid {
        self.archetype.unwrap_or(self.guid)
    }
}

/// One occupied channel slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub index: u32,
    pub ch_type: ChannelType,
    pub name: Option<String>,
    pub actor: Option<Actor>,
    pub ignore: IgnoreState,
}

impl Channel {
    #[must_use]
    pub fn new(index: u32, ch_type: ChannelType, name: Option<String>) -> Self {
        Self {
            index,
            ch_type,
            name,
            actor: None,
            ignore: IgnoreState::Unset,
        }
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignore == IgnoreState::Ignored
    }

    /// Marks the channel ignored for the rest of its lifetime.
    pub fn ignore(&mut self) {
        self.ignore = IgnoreState::Ignored;
    }

    /// Records a completed property pass unless the state is already decided.
    pub fn mark_read(&mut self) {
        if self.ignore == IgnoreState::Unset {
            self.ignore = IgnoreState::Read;
        }
    }
}

/// Channel slots keyed by channel index.
///
/// Indices are bounded by `Limits::max_channels` when the bunch header is
/// read, so the table never grows past that.
#[derive(Debug, Default)]
pub struct ChannelTable {
    slots: HashMap<u32, Channel>,
}

impl ChannelTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.slots.contains_key(&index)
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&Channel> {
        self.slots.get(&index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Channel> {
        self.slots.get_mut(&index)
    }

    /// Occupies a slot. An occupied slot is returned untouched.
    pub fn open(&mut self, index: u32, ch_type: ChannelType, name: Option<String>) -> &mut Channel {
        self.slots
            .entry(index)
            .or_insert_with(|| Channel::new(index, ch_type, name))
    }

    /// Clears a slot, returning what it held.
    pub fn close(&mut self, index: u32) -> Option<Channel> {
        self.slots.remove(&index)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.slots.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_is_idempotent() {
        let mut table = ChannelTable::new();
        table.open(3, ChannelType::Actor, Some("Actor".to_owned()));
        table.get_mut(3).unwrap().actor = Some(Actor::stable(NetworkGuid::new(9)));

        let channel = table.open(3, ChannelType::Control, None);
        assert_eq!(channel.ch_type, ChannelType::Actor);
        assert!(channel.actor.is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn close_clears_slot() {
        let mut table = ChannelTable::new();
        table.open(1, ChannelType::Actor, None);
        assert!(table.contains(1));
        let closed = table.close(1).unwrap();
        assert_eq!(closed.index, 1);
        assert!(!table.contains(1));
        assert!(table.close(1).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn ignored_is_terminal() {
        let mut channel = Channel::new(0, ChannelType::Actor, None);
        assert_eq!(channel.ignore, IgnoreState::Unset);
        channel.mark_read();
        assert_eq!(channel.ignore, IgnoreState::Read);
        channel.ignore();
        channel.mark_read();
        assert!(channel.is_ignored());
    }

    #[test]
    fn replicated_object_prefers_archetype() {
        let mut actor = Actor::stable(NetworkGuid::new(7));
        assert_eq!(actor.replicated_object(), NetworkGuid::new(7));
        actor.archetype = Some(NetworkGuid::new(11));
        assert_eq!(actor.replicated_object(), NetworkGuid::new(11));
    }

    #[test]
    fn spawn_defaults() {
        let spawn = SpawnInfo::default();
        assert_eq!(spawn.scale, Vector3::ONE);
        assert_eq!(spawn.location, Vector3::ZERO);
    }
}
