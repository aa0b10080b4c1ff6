//! Field export registry and typed property values for the rewind decoder.
//!
//! This crate describes how replicated state is interpreted:
//! - Export groups declared inside a replay (path, handle-indexed fields)
//! - Declared field wire types and their decoded values
//! - The registry mapping class paths to Rust types and field setters
//! - Class-net-cache tables for RPCs, custom structs and delta arrays
//!
//! # Design Principles
//!
//! - **Explicit registry** - Types are declared with setters at configuration
//!   time; nothing is discovered by reflection while decoding.
//! - **Built once** - An [`ExportRegistry`] is immutable after `build()` and can
//!   be shared between parses.
//! - **Diagnostic fallback** - Groups without a registered type still decode
//!   into a [`DebugExport`] unless the fallback policy says otherwise.
//! - **Window-exact fields** - A value is applied only when it consumed its
//!   whole field window.

mod error;
mod export;
mod field;
mod object;
mod registry;

pub use error::{SchemaError, SchemaResult};
pub use export::{NetFieldExport, NetFieldExportGroup, CLASS_NET_CACHE_SUFFIX};
pub use field::{
    read_fixed_compressed_float, read_packed_vector, read_rotation_short, write_packed_vector,
    write_rotation_short, PropertyValue, RepLayoutCmd, Rotator, Vector3,
};
pub use object::{DebugExport, DebugField, ExportObject};
pub use registry::{
    clean_path_name, ClassNetCache, ClassNetCacheField, ExportRegistry, ExportRegistryBuilder,
    ExportType, ExportTypeId, FallbackPolicy, FieldRead, ReadPolicy, RpcKind,
};
