//! The field export registry.
//!
//! Maps replicated class paths to constructors and per-field handlers, and
//! class-net-cache paths to their RPC, custom-struct and delta properties.
//! Built once before a parse and read-only afterwards.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use bitstream::BitReader;
use wire::{Limits, ReplayVersions, WireResult};

use crate::error::{SchemaError, SchemaResult};
use crate::field::{PropertyValue, RepLayoutCmd};
use crate::object::ExportObject;

/// Index of a registered export type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExportTypeId(u32);

impl ExportTypeId {
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Whether a type's properties are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    #[default]
    Read,
    /// Properties are skipped; optionally the whole channel is ignored from
    /// then on.
    Skip { ignore_channel: bool },
}

impl ReadPolicy {
    #[must_use]
    pub const fn will_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

/// What to do with export groups that match no registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Decode into a [`DebugExport`](crate::DebugExport).
    #[default]
    Diagnose,
    Skip { ignore_channel: bool },
}

type Construct = fn() -> Box<dyn ExportObject>;
type Setter = Box<dyn Fn(&mut dyn ExportObject, PropertyValue) + Send + Sync>;
type Reader = Box<dyn Fn(&mut dyn ExportObject, &mut BitReader<'_>) -> WireResult<()> + Send + Sync>;

enum FieldHandler {
    Value { cmd: RepLayoutCmd, setter: Setter },
    Custom(Reader),
}

fn construct<T: ExportObject + Default>() -> Box<dyn ExportObject> {
    Box::new(T::default())
}

/// Declaration of one export type.
///
/// `T` is the Rust type the group decodes into; fields are bound to it with
/// setters so no reflection is needed at read time.
pub struct ExportType<T> {
    path: String,
    redirects: Vec<String>,
    policy: ReadPolicy,
    fields: Vec<(String, FieldHandler)>,
    whole: Option<Reader>,
    construct: Construct,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ExportObject + Default> ExportType<T> {
    /// Declares a property group type at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            redirects: Vec::new(),
            policy: ReadPolicy::Read,
            fields: Vec::new(),
            whole: None,
            construct: construct::<T>,
            _marker: PhantomData,
        }
    }

    /// Declares a custom struct that reads its whole property window itself.
    #[must_use]
    pub fn custom<F>(path: impl Into<String>, reader: F) -> Self
    where
        F: Fn(&mut T, &mut BitReader<'_>) -> WireResult<()> + Send + Sync + 'static,
    {
        let mut ty = Self::new(path);
        ty.whole = Some(erase_reader(reader));
        ty
    }

    /// Binds a field decoded as `cmd` to `setter`.
    #[must_use]
    pub fn field<F>(mut self, name: impl Into<String>, cmd: RepLayoutCmd, setter: F) -> Self
    where
        F: Fn(&mut T, PropertyValue) + Send + Sync + 'static,
    {
        let setter: Setter = Box::new(move |object: &mut dyn ExportObject, value: PropertyValue| {
            if let Some(target) = object.downcast_mut::<T>() {
                setter(target, value);
            }
        });
        self.fields
            .push((name.into(), FieldHandler::Value { cmd, setter }));
        self
    }

    /// Binds a field whose window is read by `reader`.
    #[must_use]
    pub fn custom_field<F>(mut self, name: impl Into<String>, reader: F) -> Self
    where
        F: Fn(&mut T, &mut BitReader<'_>) -> WireResult<()> + Send + Sync + 'static,
    {
        self.fields
            .push((name.into(), FieldHandler::Custom(erase_reader(reader))));
        self
    }

    /// Adds another path this type answers to.
    #[must_use]
    pub fn redirect(mut self, path: impl Into<String>) -> Self {
        self.redirects.push(path.into());
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<T> fmt::Debug for ExportType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportType")
            .field("path", &self.path)
            .field("redirects", &self.redirects)
            .field("policy", &self.policy)
            .field("fields", &self.fields.len())
            .field("custom", &self.whole.is_some())
            .finish()
    }
}

fn erase_reader<T, F>(reader: F) -> Reader
where
    T: ExportObject,
    F: Fn(&mut T, &mut BitReader<'_>) -> WireResult<()> + Send + Sync + 'static,
{
    Box::new(
        move |object: &mut dyn ExportObject, bits: &mut BitReader<'_>| {
            match object.downcast_mut::<T>() {
                Some(target) => reader(target, bits),
                None => Ok(()),
            }
        },
    )
}

/// How a class-net-cache property is replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcKind {
    /// A function call whose parameters form their own export group.
    Function,
    /// A struct with its own whole-window reader.
    CustomStruct,
    /// A fast-array delta-serialized collection.
    NetDelta { read_checksum_bit: bool },
}

/// One property of a class net cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNetCacheField {
    pub name: String,
    pub kind: RpcKind,
    /// Path of the export type the property decodes into.
    pub type_path: String,
}

/// The RPC table for one replicated class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNetCache {
    path: String,
    fields: Vec<ClassNetCacheField>,
}

impl ClassNetCache {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn function(self, field: impl Into<String>, type_path: impl Into<String>) -> Self {
        self.with(field.into(), RpcKind::Function, type_path.into())
    }

    #[must_use]
    pub fn custom_struct(self, field: impl Into<String>, type_path: impl Into<String>) -> Self {
        self.with(field.into(), RpcKind::CustomStruct, type_path.into())
    }

    #[must_use]
    pub fn delta(
        self,
        field: impl Into<String>,
        type_path: impl Into<String>,
        read_checksum_bit: bool,
    ) -> Self {
        self.with(
            field.into(),
            RpcKind::NetDelta { read_checksum_bit },
            type_path.into(),
        )
    }

    fn with(mut self, name: String, kind: RpcKind, type_path: String) -> Self {
        self.fields.push(ClassNetCacheField {
            name,
            kind,
            type_path,
        });
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Result of dispatching one field window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRead {
    Applied,
    /// The type declares no handler for this field name.
    Undeclared,
    /// Declared as [`RepLayoutCmd::Ignore`].
    Ignored,
    /// The handler left bits unread. Value fields are not applied.
    Residual { bits: usize },
}

struct TypeEntry {
    path: String,
    policy: ReadPolicy,
    construct: Construct,
    fields: HashMap<String, FieldHandler>,
    whole: Option<Reader>,
}

/// Returns the text after the last `/` and `.` of `path`, with any
/// `Default__` archetype prefix removed.
#[must_use]
pub fn clean_path_name(path: &str) -> &str {
    let tail = path.rsplit(|c: char| c == '/' || c == '.').next().unwrap_or(path);
    tail.strip_prefix("Default__").unwrap_or(tail)
}

fn strip_default_prefix(path: &str) -> Option<String> {
    let cut = path.rfind(|c: char| c == '/' || c == '.').map_or(0, |i| i + 1);
    let rest = path[cut..].strip_prefix("Default__")?;
    Some(format!("{}{}", &path[..cut], rest))
}

/// The immutable set of declared export types for one title.
pub struct ExportRegistry {
    types: Vec<TypeEntry>,
    by_path: HashMap<String, ExportTypeId>,
    by_clean: HashMap<String, ExportTypeId>,
    caches: Vec<ClassNetCache>,
    caches_by_path: HashMap<String, usize>,
    caches_by_clean: HashMap<String, usize>,
    player_controllers: HashSet<String>,
    fallback: FallbackPolicy,
}

impl ExportRegistry {
    #[must_use]
    pub fn builder() -> ExportRegistryBuilder {
        ExportRegistryBuilder::default()
    }

    /// A registry with no types, decoding everything diagnostically.
    #[must_use]
    pub fn diagnostic() -> Self {
        Self {
            types: Vec::new(),
            by_path: HashMap::new(),
            by_clean: HashMap::new(),
            caches: Vec::new(),
            caches_by_path: HashMap::new(),
            caches_by_clean: HashMap::new(),
            player_controllers: HashSet::new(),
            fallback: FallbackPolicy::Diagnose,
        }
    }

    /// Resolves a group path to a registered type: exact path or redirect,
    /// then with the `Default__` prefix stripped, then by clean name.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<ExportTypeId> {
        if let Some(id) = self.by_path.get(path) {
            return Some(*id);
        }
        if let Some(id) = strip_default_prefix(path).and_then(|p| self.by_path.get(&p)) {
            return Some(*id);
        }
        self.by_clean.get(clean_path_name(path)).copied()
    }

    /// Path a type was registered under.
    #[must_use]
    pub fn type_path(&self, id: ExportTypeId) -> Option<&str> {
        self.entry(id).map(|entry| entry.path.as_str())
    }

    /// Read policy for a resolved type, or the fallback for an unresolved
    /// group.
    #[must_use]
    pub fn read_policy(&self, id: Option<ExportTypeId>) -> ReadPolicy {
        match id.and_then(|id| self.entry(id)) {
            Some(entry) => entry.policy,
            None => match self.fallback {
                FallbackPolicy::Diagnose => ReadPolicy::Read,
                FallbackPolicy::Skip { ignore_channel } => ReadPolicy::Skip { ignore_channel },
            },
        }
    }

    #[must_use]
    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Returns `true` if properties at `path` would be decoded.
    #[must_use]
    pub fn will_read_path(&self, path: &str) -> bool {
        self.read_policy(self.resolve(path)).will_read()
    }

    /// Constructs an empty instance of a registered type.
    #[must_use]
    pub fn create(&self, id: ExportTypeId) -> Option<Box<dyn ExportObject>> {
        self.entry(id).map(|entry| (entry.construct)())
    }

    /// Returns `true` if the type reads its whole window itself.
    #[must_use]
    pub fn is_custom(&self, id: ExportTypeId) -> bool {
        self.entry(id).is_some_and(|entry| entry.whole.is_some())
    }

    /// Runs a custom struct's whole-window reader.
    ///
    /// Types without one leave the reader untouched.
    pub fn read_custom(
        &self,
        id: ExportTypeId,
        object: &mut dyn ExportObject,
        reader: &mut BitReader<'_>,
    ) -> WireResult<()> {
        match self.entry(id).and_then(|entry| entry.whole.as_ref()) {
            Some(read) => read(object, reader),
            None => Ok(()),
        }
    }

    /// Decodes one field window into `object`.
    ///
    /// Value fields are applied only when the decoded value consumed the whole
    /// window.
    pub fn read_field(
        &self,
        id: ExportTypeId,
        object: &mut dyn ExportObject,
        field: &str,
        reader: &mut BitReader<'_>,
        versions: &ReplayVersions,
        limits: &Limits,
    ) -> WireResult<FieldRead> {
        let Some(handler) = self.entry(id).and_then(|entry| entry.fields.get(field)) else {
            return Ok(FieldRead::Undeclared);
        };
        match handler {
            FieldHandler::Value { cmd, setter } => {
                let Some(value) = PropertyValue::read(*cmd, reader, versions, limits)? else {
                    return Ok(FieldRead::Ignored);
                };
                if !reader.is_at_end() {
                    return Ok(FieldRead::Residual {
                        bits: reader.bits_remaining(),
                    });
                }
                setter(object, value);
                Ok(FieldRead::Applied)
            }
            FieldHandler::Custom(read) => {
                read(object, reader)?;
                if reader.is_at_end() {
                    Ok(FieldRead::Applied)
                } else {
                    Ok(FieldRead::Residual {
                        bits: reader.bits_remaining(),
                    })
                }
            }
        }
    }

    /// Looks up a class-net-cache property, matching the cache path exactly
    /// or by clean name.
    #[must_use]
    pub fn class_net_cache_field(&self, cache_path: &str, field: &str) -> Option<&ClassNetCacheField> {
        let index = self
            .caches_by_path
            .get(cache_path)
            .or_else(|| self.caches_by_clean.get(clean_path_name(cache_path)))?;
        self.caches[*index]
            .fields
            .iter()
            .find(|candidate| candidate.name == field)
    }

    /// Returns `true` if a recognised class-net-cache property will be
    /// decoded. Delta properties defer to the element group's own policy.
    #[must_use]
    pub fn will_parse(&self, field: &ClassNetCacheField) -> bool {
        match field.kind {
            RpcKind::Function => self.will_read_path(&field.type_path),
            RpcKind::CustomStruct => self
                .resolve(&field.type_path)
                .is_some_and(|id| self.is_custom(id) && self.read_policy(Some(id)).will_read()),
            RpcKind::NetDelta { .. } => true,
        }
    }

    /// Returns `true` if actors spawned from `archetype_path` are player
    /// controllers.
    #[must_use]
    pub fn is_player_controller(&self, archetype_path: &str) -> bool {
        self.player_controllers.contains(archetype_path)
            || self
                .player_controllers
                .contains(clean_path_name(archetype_path))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn entry(&self, id: ExportTypeId) -> Option<&TypeEntry> {
        self.types.get(id.0 as usize)
    }
}

impl Default for ExportRegistry {
    fn default() -> Self {
        Self::diagnostic()
    }
}

impl fmt::Debug for ExportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportRegistry")
            .field(
                "types",
                &self.types.iter().map(|t| t.path.as_str()).collect::<Vec<_>>(),
            )
            .field("class_net_caches", &self.caches.len())
            .field("player_controllers", &self.player_controllers)
            .field("fallback", &self.fallback)
            .finish()
    }
}

struct PendingType {
    path: String,
    redirects: Vec<String>,
    policy: ReadPolicy,
    fields: Vec<(String, FieldHandler)>,
    whole: Option<Reader>,
    construct: Construct,
}

/// Builder for [`ExportRegistry`].
#[derive(Default)]
pub struct ExportRegistryBuilder {
    types: Vec<PendingType>,
    caches: Vec<ClassNetCache>,
    player_controllers: Vec<String>,
    fallback: FallbackPolicy,
}

impl ExportRegistryBuilder {
    /// Registers an export type.
    #[must_use]
    pub fn export<T: ExportObject + Default>(mut self, ty: ExportType<T>) -> Self {
        self.types.push(PendingType {
            path: ty.path,
            redirects: ty.redirects,
            policy: ty.policy,
            fields: ty.fields,
            whole: ty.whole,
            construct: ty.construct,
        });
        self
    }

    #[must_use]
    pub fn class_net_cache(mut self, cache: ClassNetCache) -> Self {
        self.caches.push(cache);
        self
    }

    /// Marks an archetype path as a player controller.
    #[must_use]
    pub fn player_controller(mut self, path: impl Into<String>) -> Self {
        self.player_controllers.push(path.into());
        self
    }

    #[must_use]
    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = policy;
        self
    }

    /// Builds the registry after validation.
    pub fn build(self) -> SchemaResult<ExportRegistry> {
        let mut registry = ExportRegistry::diagnostic();
        registry.fallback = self.fallback;

        for (index, pending) in self.types.into_iter().enumerate() {
            let id = ExportTypeId(index as u32);
            if pending.path.is_empty() {
                return Err(SchemaError::EmptyPath);
            }
            for path in std::iter::once(&pending.path).chain(&pending.redirects) {
                if registry.by_path.insert(path.clone(), id).is_some() {
                    return Err(SchemaError::DuplicateTypePath { path: path.clone() });
                }
                // first registration wins a clean-name collision
                registry
                    .by_clean
                    .entry(clean_path_name(path).to_owned())
                    .or_insert(id);
            }

            let mut fields = HashMap::with_capacity(pending.fields.len());
            for (name, handler) in pending.fields {
                if fields.contains_key(&name) {
                    return Err(SchemaError::DuplicateField {
                        path: pending.path,
                        field: name,
                    });
                }
                fields.insert(name, handler);
            }

            registry.types.push(TypeEntry {
                path: pending.path,
                policy: pending.policy,
                construct: pending.construct,
                fields,
                whole: pending.whole,
            });
        }

        for (index, cache) in self.caches.into_iter().enumerate() {
            if cache.path.is_empty() {
                return Err(SchemaError::EmptyPath);
            }
            let mut names = HashSet::new();
            for field in &cache.fields {
                if !names.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateClassNetCacheField {
                        path: cache.path.clone(),
                        field: field.name.clone(),
                    });
                }
            }
            if registry
                .caches_by_path
                .insert(cache.path.clone(), index)
                .is_some()
            {
                return Err(SchemaError::DuplicateClassNetCache { path: cache.path });
            }
            registry
                .caches_by_clean
                .entry(clean_path_name(&cache.path).to_owned())
                .or_insert(index);
            registry.caches.push(cache);
        }

        registry.player_controllers = self.player_controllers.into_iter().collect();
        Ok(registry)
    }
}

impl fmt::Debug for ExportRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportRegistryBuilder")
            .field("types", &self.types.len())
            .field("caches", &self.caches.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}
