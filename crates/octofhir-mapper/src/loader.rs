//! Filesystem loader for mappings and lookup tables.
//!
//! Expected directory layout under the base path:
//!
//! ```text
//! <base>/
//!   lookups/      *.json  -> CodeLookupTable
//!   resources/    *.json  -> ResourceMapping
//! ```
//!
//! Only top-level `.json` files are loaded, one level deep. A missing
//! `lookups/` directory is skipped; a missing `resources/` directory fails
//! the load. Files are read in name order so that first-match-wins
//! registry behaviour is deterministic.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use mapper_core::lookup::CodeLookupTable;
use mapper_core::mapping::ResourceMapping;
use mapper_core::registry::MappingRegistry;

use crate::catalog::{R4Catalog, StructureCatalog};
use crate::reloadable::ReloadableRegistry;
use crate::validator::{MappingValidator, ValidationReport};

/// Default FHIR version recorded on loaded registries.
const DEFAULT_FHIR_VERSION: &str = "4.0.1";

/// Errors raised while loading mapping configuration.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Filesystem access failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file did not parse as the expected schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The mandatory `resources/` directory is absent.
    #[error("resources directory not found: {0}")]
    MissingResourcesDir(PathBuf),

    /// Strict-mode validation failed.
    #[error("mapping validation failed: {0}")]
    Validation(ValidationReport),
}

/// Loads and validates mapping configuration from disk.
#[derive(Debug)]
pub struct MappingLoader {
    base_path: PathBuf,
    strict: bool,
    fhir_version: String,
    catalog: Arc<dyn StructureCatalog>,
}

impl MappingLoader {
    /// Create a strict loader over `base_path` with the built-in R4
    /// catalog.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            strict: true,
            fhir_version: DEFAULT_FHIR_VERSION.to_string(),
            catalog: Arc::new(R4Catalog::new()),
        }
    }

    /// Toggle strict validation. When off, validation errors are logged
    /// and the registry is still returned.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Use a custom structure catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn StructureCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Record a different FHIR version on loaded registries.
    pub fn with_fhir_version(mut self, version: impl Into<String>) -> Self {
        self.fhir_version = version.into();
        self
    }

    /// Load everything, validate, and build a registry.
    pub fn load_all(&self) -> Result<MappingRegistry, LoaderError> {
        info!(base = %self.base_path.display(), fhir_version = %self.fhir_version, "loading mappings");

        let lookups = self.load_lookup_tables()?;
        let mappings = self.load_resource_mappings()?;
        let registry = MappingRegistry::new(self.fhir_version.clone(), mappings, lookups);

        let report = MappingValidator::new(self.catalog.clone()).validate_registry(&registry);
        for warning in report.warnings() {
            warn!(context = %warning.context, "{}", warning.message);
        }
        if !report.is_valid() {
            if self.strict {
                return Err(LoaderError::Validation(report));
            }
            for issue in report.errors() {
                error!(context = %issue.context, "{}", issue.message);
            }
            warn!(
                errors = report.errors().len(),
                "validation errors found, continuing because strict mode is off"
            );
        }

        info!(
            mappings = registry.len(),
            lookups = registry.lookup_tables().count(),
            "mapping registry loaded"
        );
        Ok(registry)
    }

    /// Validate without installing anything (dry run).
    pub fn validate_only(&self) -> Result<ValidationReport, LoaderError> {
        let lookups = self.load_lookup_tables()?;
        let mappings = self.load_resource_mappings()?;
        let registry = MappingRegistry::new(self.fhir_version.clone(), mappings, lookups);
        Ok(MappingValidator::new(self.catalog.clone()).validate_registry(&registry))
    }

    /// Reload from disk and atomically install the new generation.
    pub fn reload(&self, handle: &ReloadableRegistry) -> Result<(), LoaderError> {
        let registry = self.load_all()?;
        handle.install(registry);
        info!("mapping registry reloaded");
        Ok(())
    }

    /// Load a single lookup table file from `lookups/`, indexed and ready
    /// for use.
    pub fn load_lookup_table(&self, file_name: &str) -> Result<CodeLookupTable, LoaderError> {
        let path = self.base_path.join("lookups").join(file_name);
        let table: CodeLookupTable = read_json(&path)?;
        Ok(table.index())
    }

    /// Load a single resource mapping file from `resources/`.
    pub fn load_resource_mapping(&self, file_name: &str) -> Result<ResourceMapping, LoaderError> {
        let path = self.base_path.join("resources").join(file_name);
        read_json(&path)
    }

    fn load_lookup_tables(&self) -> Result<Vec<CodeLookupTable>, LoaderError> {
        let dir = self.base_path.join("lookups");
        if !dir.exists() {
            info!(dir = %dir.display(), "no lookups directory, skipping lookup tables");
            return Ok(Vec::new());
        }

        let mut tables = Vec::new();
        for path in json_files(&dir)? {
            let table: CodeLookupTable = read_json(&path)?;
            debug!(id = %table.id, file = %path.display(), "loaded lookup table");
            tables.push(table);
        }
        info!(count = tables.len(), "loaded lookup tables");
        Ok(tables)
    }

    fn load_resource_mappings(&self) -> Result<Vec<ResourceMapping>, LoaderError> {
        let dir = self.base_path.join("resources");
        if !dir.exists() {
            return Err(LoaderError::MissingResourcesDir(dir));
        }

        let mut mappings = Vec::new();
        for path in json_files(&dir)? {
            let mapping: ResourceMapping = read_json(&path)?;
            debug!(
                id = %mapping.id,
                direction = ?mapping.direction,
                file = %path.display(),
                "loaded resource mapping"
            );
            mappings.push(mapping);
        }
        info!(count = mappings.len(), "loaded resource mappings");
        Ok(mappings)
    }
}

/// Top-level `*.json` files in a directory, sorted by name.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let entries = fs::read_dir(dir).map_err(|source| LoaderError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoaderError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoaderError> {
    let content = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoaderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
