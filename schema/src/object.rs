//! Decoded export objects handed to observers.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;

use bitstream::BitBuffer;

/// A decoded replicated object.
///
/// Implemented for every `'static + Debug + Send` type; registry factories
/// produce boxed instances and observers downcast them back.
pub trait ExportObject: Any + Debug + Send + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Debug + Send> ExportObject for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn ExportObject {
    /// Returns `true` if the object is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// One raw field captured by [`DebugExport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugField {
    /// Declared export name, when the group declared one.
    pub name: Option<String>,
    pub bits: BitBuffer,
}

/// Generic sink for groups with no registered type.
///
/// Records every field's raw window keyed by handle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DebugExport {
    pub group_path: String,
    pub fields: BTreeMap<u32, DebugField>,
}

impl DebugExport {
    #[must_use]
    pub fn new(group_path: impl Into<String>) -> Self {
        Self {
            group_path: group_path.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, handle: u32, name: Option<String>, bits: BitBuffer) {
        self.fields.insert(handle, DebugField { name, bits });
    }

    /// Looks up a captured field by declared name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&DebugField> {
        self.fields
            .values()
            .find(|field| field.name.as_deref() == Some(name))
    }
}
