//! Registry construction errors.

use thiserror::Error;

/// Result type for registry construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while building an [`ExportRegistry`](crate::ExportRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two export types claim the same path (or redirect).
    #[error("duplicate export type path {path:?}")]
    DuplicateTypePath { path: String },

    /// An export type declares the same field twice.
    #[error("duplicate field {field:?} on export type {path:?}")]
    DuplicateField { path: String, field: String },

    /// Two class net caches share a path.
    #[error("duplicate class net cache {path:?}")]
    DuplicateClassNetCache { path: String },

    /// A class net cache declares the same field twice.
    #[error("duplicate field {field:?} on class net cache {path:?}")]
    DuplicateClassNetCacheField { path: String, field: String },

    /// Export type paths must be non-empty.
    #[error("export type path is empty")]
    EmptyPath,
}
