//! Replicated object payloads: rep-layout properties followed by class net
//! cache fields.

use bitstream::BitReader;
use log::{debug, error, info, warn};
use schema::{ClassNetCacheField, NetFieldExportGroup, RpcKind};
use wire::{NetworkGuid, WireResult};

use crate::channel::Channel;
use crate::config::DecoderConfig;
use crate::delta::{receive_custom_delta_property, DeltaTarget};
use crate::error::FieldError;
use crate::guid_cache::GuidCache;
use crate::observer::ReplayObserver;
use crate::properties::{notify_export, receive_properties, PropertiesRead};

/// Decodes the payload of one content block addressed to `object`.
///
/// Returns `false` when the block was abandoned part way: properties were
/// skipped or failed, the class has no net cache, or an RPC or delta property
/// could not be decoded. Objects with no declared export group are left
/// unread and count as handled.
pub fn receive_replicator_bunch(
    config: &DecoderConfig,
    guids: &GuidCache,
    channel: &mut Channel,
    object: NetworkGuid,
    has_rep_layout: bool,
    reader: &mut BitReader<'_>,
    observer: &mut dyn ReplayObserver,
) -> WireResult<bool> {
    let Some(group) = guids.group_for_guid(object).map(|id| guids.group(id)) else {
        return Ok(true);
    };

    if has_rep_layout {
        match receive_properties(config, group, channel, reader, true, false)? {
            PropertiesRead::Read { export, has_data } => {
                if has_data {
                    notify_export(observer, channel, &group.path_name, export);
                }
            }
            PropertiesRead::Skipped | PropertiesRead::Failed => return Ok(false),
        }
    }

    if reader.is_at_end() {
        return Ok(true);
    }

    let Some(cache) = guids
        .class_net_cache_for(&group.path_name)
        .map(|id| guids.group(id))
    else {
        debug!(
            "channel {}: no class net cache for {}",
            channel.index, group.path_name
        );
        return Ok(false);
    };

    while !reader.is_at_end() {
        let Some((handle, bits)) = read_field_header(reader, cache) else {
            return Ok(true);
        };
        let mut window = reader.window(bits)?;

        let Some(export) = cache.export(handle) else {
            continue;
        };
        if export.incompatible {
            info!("{}: {} is incompatible", cache.path_name, export.name);
            continue;
        }
        if window.is_at_end() {
            continue;
        }
        let Some(field) = config
            .registry
            .class_net_cache_field(&cache.path_name, &export.name)
        else {
            continue;
        };
        if !config.registry.will_parse(field) {
            return Ok(true);
        }

        let target = guids.group_by_path(&field.type_path);
        match field.kind {
            RpcKind::Function => {
                let Some(function) = target else {
                    error!(
                        "channel {}: {}",
                        channel.index,
                        FieldError::MissingGroup {
                            path: field.type_path.clone(),
                        }
                    );
                    return Ok(false);
                };
                if let Err(err) = received_rpc(config, function, channel, &mut window, observer) {
                    error!(
                        "channel {}: rpc {} of {}: {err}",
                        channel.index, export.name, cache.path_name
                    );
                    return Ok(false);
                }
            }
            RpcKind::CustomStruct => {
                if let Err(err) = receive_custom_property(config, field, channel, &mut window, observer)
                {
                    error!(
                        "channel {}: custom property {} of {}: {err}",
                        channel.index, export.name, cache.path_name
                    );
                }
            }
            RpcKind::NetDelta { read_checksum_bit } => {
                let Some(element) = target else {
                    continue;
                };
                let target = DeltaTarget {
                    owner: cache,
                    handle,
                    element,
                    read_checksum_bit,
                };
                if !receive_custom_delta_property(config, target, channel, &mut window, observer) {
                    error!(
                        "channel {}: {}",
                        channel.index,
                        FieldError::Delta {
                            group: cache.path_name.clone(),
                            field: export.name.clone(),
                        }
                    );
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

/// Reads a class net cache field handle and payload length.
///
/// The handle is bounded by the cache's export count (at least 2). Returns
/// `None` once the header cannot be read or names no slot.
fn read_field_header(
    reader: &mut BitReader<'_>,
    cache: &NetFieldExportGroup,
) -> Option<(u32, usize)> {
    let max = u32::try_from(cache.len().max(2)).unwrap_or(u32::MAX);
    let handle = match reader.read_serialized_int(max) {
        Ok(handle) => handle,
        Err(err) => {
            error!("{}: field handle unreadable: {err}", cache.path_name);
            return None;
        }
    };
    if !cache.is_valid_index(handle) {
        error!(
            "{}",
            FieldError::HandleOutOfRange {
                group: cache.path_name.clone(),
                handle,
                len: cache.len(),
            }
        );
        return None;
    }
    match reader.read_packed_u32() {
        Ok(bits) => Some((handle, bits as usize)),
        Err(err) => {
            error!("{}: field length unreadable: {err}", cache.path_name);
            None
        }
    }
}

fn received_rpc(
    config: &DecoderConfig,
    function: &NetFieldExportGroup,
    channel: &mut Channel,
    reader: &mut BitReader<'_>,
    observer: &mut dyn ReplayObserver,
) -> WireResult<()> {
    if let PropertiesRead::Read {
        export,
        has_data: true,
    } = receive_properties(config, function, channel, reader, true, false)?
    {
        notify_export(observer, channel, &function.path_name, export);
    }
    Ok(())
}

fn receive_custom_property(
    config: &DecoderConfig,
    field: &ClassNetCacheField,
    channel: &Channel,
    reader: &mut BitReader<'_>,
    observer: &mut dyn ReplayObserver,
) -> WireResult<()> {
    let created = config
        .registry
        .resolve(&field.type_path)
        .and_then(|id| config.registry.create(id).map(|object| (id, object)));
    let Some((id, mut object)) = created else {
        warn!("no custom struct registered for {}", field.type_path);
        return Ok(());
    };
    config.registry.read_custom(id, object.as_mut(), reader)?;
    notify_export(observer, channel, &field.type_path, object);
    Ok(())
}
