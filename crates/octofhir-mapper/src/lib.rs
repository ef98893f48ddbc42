//! Bidirectional, declarative JSON ↔ FHIR R4 transformation engine.
//!
//! This crate converts flat or nested application records into FHIR R4
//! resource documents and back. Transformations are driven by external
//! declarative mapping files and code lookup tables, so new integrations
//! ship as configuration, not code.
//!
//! # Components
//!
//! - [`MappingLoader`] - reads mapping and lookup files from disk and
//!   validates them against a FHIR structure catalog
//! - [`MappingValidator`] / [`ValidationReport`] - the load-time checks
//! - [`TransformationEngine`] - interprets a mapping against a source
//!   document and materialises the target document
//! - [`ReloadableRegistry`] - atomic hot reload of mapping generations
//! - [`StructureCatalog`] / [`R4Catalog`] - resource structure resolution
//!
//! The data model ([`ResourceMapping`], [`FieldMapping`],
//! [`CodeLookupTable`], [`MappingRegistry`], [`TransformationContext`])
//! lives in `mapper-core` and is re-exported here; the expression
//! sublanguage lives in `mapper-expr`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use octofhir_mapper::{
//!     FieldMapping, MappingDirection, MappingRegistry, ResourceMapping,
//!     TransformationContext, TransformationEngine,
//! };
//! use serde_json::json;
//!
//! let mapping = ResourceMapping::new(
//!     "patient-intake",
//!     "PatientRecord",
//!     "Patient",
//!     MappingDirection::JsonToFhir,
//! )
//! .with_field(
//!     FieldMapping::new("family-name", "name[0].family").with_source_path("lastName"),
//! );
//!
//! let registry = Arc::new(MappingRegistry::new("4.0.1", vec![mapping.clone()], vec![]));
//! let engine = TransformationEngine::new(registry);
//!
//! let fhir = engine
//!     .json_to_fhir(
//!         &json!({"lastName": "Doe"}),
//!         &mapping,
//!         &TransformationContext::new(),
//!     )
//!     .unwrap();
//! assert_eq!(fhir["name"][0]["family"], json!("Doe"));
//! ```
//!
//! # Concurrency
//!
//! The engine is strictly synchronous and holds no mutable state; loaded
//! registries are immutable. Any number of transformations may run in
//! parallel against the same registry, and hot reload installs a new
//! registry generation without disturbing in-flight work.

pub mod catalog;
pub mod engine;
pub mod loader;
pub mod reloadable;
pub mod rules;
pub mod validator;

pub use catalog::{R4Catalog, ResourceDefinition, StructureCatalog};
pub use engine::{FieldError, TransformError, TransformationEngine};
pub use loader::{LoaderError, MappingLoader};
pub use reloadable::ReloadableRegistry;
pub use rules::{FieldRule, RuleError};
pub use validator::{MappingValidator, ValidationIssue, ValidationReport};

pub use mapper_core::context::TransformationContext;
pub use mapper_core::lookup::{CodeLookupTable, CodeMapping, LookupError};
pub use mapper_core::mapping::{FieldMapping, MappingDirection, ResourceMapping};
pub use mapper_core::path::{FieldPath, PathError};
pub use mapper_core::registry::MappingRegistry;
pub use mapper_expr::{ExprError, Expression, ExpressionCache};
