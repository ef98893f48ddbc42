//! Registry of loaded mappings and lookup tables.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::lookup::CodeLookupTable;
use crate::mapping::{MappingDirection, ResourceMapping};

/// The immutable set of loaded resource mappings and lookup tables.
///
/// A registry is built once per configuration generation and then only
/// read; it is `Send + Sync` and safe to share across threads without
/// locking. Hot reload builds a fresh registry and swaps it in atomically
/// (see the engine crate's `ReloadableRegistry`), so in-flight
/// transformations keep their snapshot.
///
/// When several mappings share a `(source_type, direction)` pair the first
/// loaded one wins; the validator warns about the shadowed ones.
#[derive(Debug)]
pub struct MappingRegistry {
    fhir_version: String,
    loaded_at: DateTime<Utc>,
    resource_mappings: Vec<Arc<ResourceMapping>>,
    lookup_tables: HashMap<String, Arc<CodeLookupTable>>,
    by_source_direction: HashMap<(String, MappingDirection), usize>,
    by_id: HashMap<String, usize>,
}

impl MappingRegistry {
    /// Build a registry from parsed mappings and lookup tables.
    ///
    /// Lookup tables are indexed here, so tables obtained through the
    /// registry always have their forward/reverse maps built.
    pub fn new(
        fhir_version: impl Into<String>,
        resource_mappings: Vec<ResourceMapping>,
        lookup_tables: Vec<CodeLookupTable>,
    ) -> Self {
        let resource_mappings: Vec<Arc<ResourceMapping>> =
            resource_mappings.into_iter().map(Arc::new).collect();

        let mut by_source_direction = HashMap::new();
        let mut by_id = HashMap::new();
        for (position, mapping) in resource_mappings.iter().enumerate() {
            if let Some(direction) = mapping.direction {
                by_source_direction
                    .entry((mapping.source_type.clone(), direction))
                    .or_insert(position);
            }
            by_id.entry(mapping.id.clone()).or_insert(position);
        }

        let lookup_tables = lookup_tables
            .into_iter()
            .map(|table| {
                let table = table.index();
                (table.id.clone(), Arc::new(table))
            })
            .collect();

        Self {
            fhir_version: fhir_version.into(),
            loaded_at: Utc::now(),
            resource_mappings,
            lookup_tables,
            by_source_direction,
            by_id,
        }
    }

    /// FHIR version the registry was validated against (e.g. "4.0.1").
    pub fn fhir_version(&self) -> &str {
        &self.fhir_version
    }

    /// When this registry generation was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// All loaded resource mappings, in load order.
    pub fn resource_mappings(&self) -> &[Arc<ResourceMapping>] {
        &self.resource_mappings
    }

    /// All loaded lookup tables.
    pub fn lookup_tables(&self) -> impl Iterator<Item = &Arc<CodeLookupTable>> {
        self.lookup_tables.values()
    }

    /// Find the mapping registered for a source type and direction.
    pub fn find_by_source_and_direction(
        &self,
        source_type: &str,
        direction: MappingDirection,
    ) -> Option<&Arc<ResourceMapping>> {
        self.by_source_direction
            .get(&(source_type.to_string(), direction))
            .map(|&position| &self.resource_mappings[position])
    }

    /// Find a mapping by id.
    pub fn find_by_id(&self, id: &str) -> Option<&Arc<ResourceMapping>> {
        self.by_id.get(id).map(|&position| &self.resource_mappings[position])
    }

    /// Find a lookup table by id.
    pub fn lookup_table(&self, id: &str) -> Option<&Arc<CodeLookupTable>> {
        self.lookup_tables.get(id)
    }

    /// Number of loaded resource mappings.
    pub fn len(&self) -> usize {
        self.resource_mappings.len()
    }

    /// Whether the registry holds no resource mappings.
    pub fn is_empty(&self) -> bool {
        self.resource_mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldMapping;

    fn sample_registry() -> MappingRegistry {
        let forward = ResourceMapping::new(
            "patient-json-to-fhir",
            "PatientRecord",
            "Patient",
            MappingDirection::JsonToFhir,
        )
        .with_field(FieldMapping::new("f1", "gender").with_source_path("gender"));

        let reverse = ResourceMapping::new(
            "patient-fhir-to-json",
            "Patient",
            "PatientRecord",
            MappingDirection::FhirToJson,
        );

        let gender = CodeLookupTable::new("gender-lookup")
            .with_mapping("M", "male")
            .bidirectional();

        MappingRegistry::new("4.0.1", vec![forward, reverse], vec![gender])
    }

    #[test]
    fn test_find_by_source_and_direction() {
        let registry = sample_registry();

        let forward = registry
            .find_by_source_and_direction("PatientRecord", MappingDirection::JsonToFhir)
            .unwrap();
        assert_eq!(forward.id, "patient-json-to-fhir");

        let reverse = registry
            .find_by_source_and_direction("Patient", MappingDirection::FhirToJson)
            .unwrap();
        assert_eq!(reverse.id, "patient-fhir-to-json");

        assert!(registry
            .find_by_source_and_direction("PatientRecord", MappingDirection::FhirToJson)
            .is_none());
    }

    #[test]
    fn test_find_by_id() {
        let registry = sample_registry();
        assert!(registry.find_by_id("patient-json-to-fhir").is_some());
        assert!(registry.find_by_id("nope").is_none());
    }

    #[test]
    fn test_registry_indexes_lookup_tables() {
        let registry = sample_registry();
        let table = registry.lookup_table("gender-lookup").unwrap();
        // The registry must hand out usable (indexed) tables.
        assert_eq!(table.lookup_target("M"), Some("male"));
        assert_eq!(table.lookup_source("male").unwrap(), Some("M"));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MappingRegistry>();
        assert_send_sync::<Arc<ResourceMapping>>();
        assert_send_sync::<Arc<CodeLookupTable>>();
    }

    #[test]
    fn test_duplicate_source_direction_first_wins() {
        let first = ResourceMapping::new("first", "Rec", "Patient", MappingDirection::JsonToFhir);
        let second = ResourceMapping::new("second", "Rec", "Patient", MappingDirection::JsonToFhir);
        let registry = MappingRegistry::new("4.0.1", vec![first, second], vec![]);

        let found = registry
            .find_by_source_and_direction("Rec", MappingDirection::JsonToFhir)
            .unwrap();
        assert_eq!(found.id, "first");
        // Both stay reachable by id.
        assert!(registry.find_by_id("second").is_some());
        assert_eq!(registry.len(), 2);
    }
}
