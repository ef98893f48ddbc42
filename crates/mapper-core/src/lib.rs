//! Core data model for the OctoFHIR mapping engine.
//!
//! This crate defines the building blocks shared by the loader, validator,
//! and transformation engine:
//!
//! - [`FieldPath`] - dotted-path navigation with auto-materialisation over
//!   JSON document trees
//! - [`FieldMapping`] / [`ResourceMapping`] - the declarative mapping model
//! - [`CodeLookupTable`] - source/target code translation tables
//! - [`MappingRegistry`] - the immutable, indexed set of loaded mappings
//! - [`TransformationContext`] - per-request substitution values
//!
//! Documents are represented as `serde_json::Value` trees. The crate is
//! built with `serde_json`'s `preserve_order` feature so object keys keep
//! insertion order, which makes transformation output deterministic.

pub mod context;
pub mod lookup;
pub mod mapping;
pub mod path;
pub mod registry;
pub mod types;

pub use context::TransformationContext;
pub use lookup::{CodeLookupTable, CodeMapping, LookupError};
pub use mapping::{FieldMapping, MappingDirection, ResourceMapping};
pub use path::{FieldPath, PathError, PathSegment};
pub use registry::MappingRegistry;
