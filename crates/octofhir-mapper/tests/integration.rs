//! End-to-end tests for the mapping engine.
//!
//! These cover the full flow: building (or loading) a registry, then
//! transforming documents in both directions with lookups, defaults,
//! conditions, and transforms in play.

use std::sync::Arc;

use octofhir_mapper::{
    CodeLookupTable, FieldMapping, MappingDirection, MappingLoader, MappingRegistry,
    ReloadableRegistry, ResourceMapping, TransformError, TransformationContext,
    TransformationEngine,
};
use serde_json::{Value, json};

const IDENTIFIER_SYSTEM: &str = "urn:oid:2.16.840.1.113883.4.1";

fn gender_lookup() -> CodeLookupTable {
    CodeLookupTable::new("gender-lookup")
        .with_mapping("M", "male")
        .with_mapping("F", "female")
        .bidirectional()
}

/// The patient intake mapping: flat registration record to FHIR Patient.
fn patient_forward_mapping() -> ResourceMapping {
    ResourceMapping::new(
        "patient-json-to-fhir",
        "PatientRecord",
        "Patient",
        MappingDirection::JsonToFhir,
    )
    .with_field(
        FieldMapping::new("patient-identifier", "identifier[0].value")
            .with_source_path("patientId")
            .with_data_type("string")
            .required(),
    )
    .with_field(
        FieldMapping::new("identifier-system", "identifier[0].system")
            .with_default("$ctx.settings['identifierSystem']"),
    )
    .with_field(
        FieldMapping::new("first-name", "name[0].given[0]").with_source_path("firstName"),
    )
    .with_field(FieldMapping::new("last-name", "name[0].family").with_source_path("lastName"))
    .with_field(
        FieldMapping::new("patient-gender", "gender")
            .with_source_path("gender")
            .with_data_type("code")
            .with_lookup("gender-lookup")
            .required(),
    )
}

/// The reverse mapping: FHIR Patient back to the flat record.
fn patient_reverse_mapping() -> ResourceMapping {
    ResourceMapping::new(
        "patient-fhir-to-json",
        "Patient",
        "PatientRecord",
        MappingDirection::FhirToJson,
    )
    .with_field(
        FieldMapping::new("patient-identifier", "patientId")
            .with_source_path("identifier[0].value")
            .required(),
    )
    .with_field(FieldMapping::new("first-name", "firstName").with_source_path("name[0].given[0]"))
    .with_field(FieldMapping::new("last-name", "lastName").with_source_path("name[0].family"))
    .with_field(
        FieldMapping::new("patient-gender", "gender")
            .with_source_path("gender")
            .with_lookup("gender-lookup")
            .required(),
    )
}

fn engine() -> TransformationEngine {
    let registry = MappingRegistry::new(
        "4.0.1",
        vec![patient_forward_mapping(), patient_reverse_mapping()],
        vec![gender_lookup()],
    );
    TransformationEngine::new(Arc::new(registry))
}

fn intake_context() -> TransformationContext {
    TransformationContext::new().with_setting("identifierSystem", IDENTIFIER_SYSTEM)
}

fn sample_record() -> Value {
    json!({
        "patientId": "P123",
        "firstName": "John",
        "lastName": "Doe",
        "gender": "M"
    })
}

// =============================================================================
// Forward and reverse transformation
// =============================================================================

#[test]
fn test_minimal_json_to_fhir() {
    let engine = engine();
    let mapping = patient_forward_mapping();

    let output = engine
        .json_to_fhir(&sample_record(), &mapping, &intake_context())
        .unwrap();

    assert_eq!(
        output,
        json!({
            "resourceType": "Patient",
            "identifier": [{"value": "P123", "system": IDENTIFIER_SYSTEM}],
            "name": [{"given": ["John"], "family": "Doe"}],
            "gender": "male"
        })
    );
}

#[test]
fn test_fhir_to_json_reverses_the_record() {
    let engine = engine();
    let fhir = engine
        .json_to_fhir(&sample_record(), &patient_forward_mapping(), &intake_context())
        .unwrap();

    let record = engine
        .fhir_to_json(&fhir, &patient_reverse_mapping(), &TransformationContext::new())
        .unwrap();

    // Key order is not part of the contract; compare by value.
    assert_eq!(record["patientId"], json!("P123"));
    assert_eq!(record["firstName"], json!("John"));
    assert_eq!(record["lastName"], json!("Doe"));
    assert_eq!(record["gender"], json!("M"));
    assert_eq!(record.as_object().unwrap().len(), 4);
}

#[test]
fn test_output_key_order_follows_declared_field_order() {
    let engine = engine();
    let output = engine
        .json_to_fhir(&sample_record(), &patient_forward_mapping(), &intake_context())
        .unwrap();

    let keys: Vec<&String> = output.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["resourceType", "identifier", "name", "gender"]);
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn test_required_field_missing() {
    let engine = engine();
    let mut record = sample_record();
    record.as_object_mut().unwrap().remove("patientId");

    let err = engine
        .json_to_fhir(&record, &patient_forward_mapping(), &intake_context())
        .unwrap_err();

    let TransformError::RequiredField { field_id, .. } = &err else {
        panic!("expected RequiredField, got {err:?}");
    };
    assert_eq!(field_id, "patient-identifier");
    assert!(err.to_string().contains("patient-identifier"));
}

#[test]
fn test_lookup_miss_without_default() {
    let engine = engine();
    let mut record = sample_record();
    record["gender"] = json!("X");

    let err = engine
        .json_to_fhir(&record, &patient_forward_mapping(), &intake_context())
        .unwrap_err();
    assert!(err.to_string().contains("no mapping found for code 'X'"));
}

#[test]
fn test_lookup_miss_falls_back_to_default_code() {
    let lookup = gender_lookup().with_default_target("unknown");
    let registry = MappingRegistry::new("4.0.1", vec![patient_forward_mapping()], vec![lookup]);
    let engine = TransformationEngine::new(Arc::new(registry));

    let mut record = sample_record();
    record["gender"] = json!("X");

    let output = engine
        .json_to_fhir(&record, &patient_forward_mapping(), &intake_context())
        .unwrap();
    assert_eq!(output["gender"], json!("unknown"));
}

#[test]
fn test_direction_mismatch_both_ways() {
    let engine = engine();
    let context = TransformationContext::new();

    let err = engine
        .fhir_to_json(&sample_record(), &patient_forward_mapping(), &context)
        .unwrap_err();
    assert!(matches!(err, TransformError::DirectionMismatch { .. }));

    let err = engine
        .json_to_fhir(&sample_record(), &patient_reverse_mapping(), &context)
        .unwrap_err();
    assert!(matches!(err, TransformError::DirectionMismatch { .. }));
}

// =============================================================================
// Conditions and transforms
// =============================================================================

#[test]
fn test_condition_gates_second_identifier() {
    let mapping = patient_forward_mapping().with_field(
        FieldMapping::new("patient-ssn", "identifier[1].value")
            .with_source_path("ssn")
            .with_condition("ssn != null"),
    );
    let registry = MappingRegistry::new("4.0.1", vec![mapping.clone()], vec![gender_lookup()]);
    let engine = TransformationEngine::new(Arc::new(registry));

    let without_ssn = engine
        .json_to_fhir(&sample_record(), &mapping, &intake_context())
        .unwrap();
    assert_eq!(without_ssn["identifier"].as_array().unwrap().len(), 1);

    let mut with_ssn = sample_record();
    with_ssn["ssn"] = json!("123-45-6789");
    let output = engine
        .json_to_fhir(&with_ssn, &mapping, &intake_context())
        .unwrap();
    let identifiers = output["identifier"].as_array().unwrap();
    assert_eq!(identifiers.len(), 2);
    assert_eq!(identifiers[1]["value"], json!("123-45-6789"));
}

#[test]
fn test_transform_uppercases_family_name() {
    let mapping = ResourceMapping::new(
        "patient-shouting",
        "PatientRecord",
        "Patient",
        MappingDirection::JsonToFhir,
    )
    .with_field(
        FieldMapping::new("last-name", "name[0].family")
            .with_source_path("lastName")
            .with_transform("fn:uppercase(value)"),
    );
    let registry = MappingRegistry::new("4.0.1", vec![mapping.clone()], vec![]);
    let engine = TransformationEngine::new(Arc::new(registry));

    let output = engine
        .json_to_fhir(&sample_record(), &mapping, &TransformationContext::new())
        .unwrap();
    assert_eq!(output["name"][0]["family"], json!("DOE"));
}

#[test]
fn test_optional_field_with_no_value_is_omitted() {
    let engine = engine();
    let mut record = sample_record();
    record.as_object_mut().unwrap().remove("firstName");

    let output = engine
        .json_to_fhir(&record, &patient_forward_mapping(), &intake_context())
        .unwrap();
    // name[0] exists (family written) but has no 'given'.
    assert_eq!(output["name"][0], json!({"family": "Doe"}));
}

// =============================================================================
// Loading from disk
// =============================================================================

mod loading {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_fixture_tree(base: &Path) {
        fs::create_dir_all(base.join("lookups")).unwrap();
        fs::create_dir_all(base.join("resources")).unwrap();

        fs::write(
            base.join("lookups/gender-lookup.json"),
            serde_json::to_string_pretty(&json!({
                "id": "gender-lookup",
                "name": "Gender Code Mapping",
                "sourceSystem": "internal",
                "targetSystem": "http://hl7.org/fhir/administrative-gender",
                "bidirectional": true,
                "mappings": [
                    {"sourceCode": "M", "targetCode": "male", "display": "Male"},
                    {"sourceCode": "F", "targetCode": "female", "display": "Female"}
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        fs::write(
            base.join("resources/patient-json-to-fhir.json"),
            serde_json::to_string_pretty(&json!({
                "id": "patient-json-to-fhir",
                "name": "Patient intake",
                "version": "1.0.0",
                "sourceType": "PatientRecord",
                "targetType": "Patient",
                "direction": "JSON_TO_FHIR",
                "fieldMappings": [
                    {
                        "id": "patient-identifier",
                        "sourcePath": "patientId",
                        "targetPath": "identifier[0].value",
                        "dataType": "string",
                        "required": true
                    },
                    {
                        "id": "identifier-system",
                        "targetPath": "identifier[0].system",
                        "defaultValue": "$ctx.settings['identifierSystem']"
                    },
                    {
                        "id": "patient-gender",
                        "sourcePath": "gender",
                        "targetPath": "gender",
                        "dataType": "code",
                        "lookupTable": "gender-lookup",
                        "required": true
                    }
                ]
            }))
            .unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_load_all_and_transform() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_tree(dir.path());

        let registry = MappingLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.fhir_version(), "4.0.1");

        let mapping = registry
            .find_by_source_and_direction("PatientRecord", MappingDirection::JsonToFhir)
            .unwrap()
            .clone();
        let engine = TransformationEngine::new(Arc::new(registry));

        let output = engine
            .json_to_fhir(&sample_record(), &mapping, &intake_context())
            .unwrap();
        assert_eq!(output["gender"], json!("male"));
        assert_eq!(output["identifier"][0]["system"], json!(IDENTIFIER_SYSTEM));
    }

    #[test]
    fn test_missing_lookups_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_tree(dir.path());
        fs::remove_file(dir.path().join("lookups/gender-lookup.json")).unwrap();
        fs::remove_dir(dir.path().join("lookups")).unwrap();

        // The mapping references gender-lookup, so strict loading now
        // fails validation rather than IO.
        let err = MappingLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("lookup table not found"));

        // Without the reference it loads cleanly.
        fs::write(
            dir.path().join("resources/patient-json-to-fhir.json"),
            serde_json::to_string(&json!({
                "id": "patient-json-to-fhir",
                "sourceType": "PatientRecord",
                "targetType": "Patient",
                "direction": "JSON_TO_FHIR",
                "fieldMappings": [
                    {"id": "g", "sourcePath": "gender", "targetPath": "gender"}
                ]
            }))
            .unwrap(),
        )
        .unwrap();
        let registry = MappingLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(registry.lookup_tables().count(), 0);
    }

    #[test]
    fn test_missing_resources_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lookups")).unwrap();

        let err = MappingLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("resources directory not found"));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_element() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_tree(dir.path());
        fs::write(
            dir.path().join("resources/broken.json"),
            serde_json::to_string(&json!({
                "id": "broken",
                "sourceType": "Record",
                "targetType": "Patient",
                "direction": "JSON_TO_FHIR",
                "fieldMappings": [
                    {"id": "f", "sourcePath": "x", "targetPath": "frobnicate"}
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let err = MappingLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("'frobnicate' does not exist in Patient"));

        // Non-strict mode logs and still returns a usable registry.
        let registry = MappingLoader::new(dir.path())
            .with_strict(false)
            .load_all()
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_validate_only_reports_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_tree(dir.path());
        fs::write(
            dir.path().join("resources/broken.json"),
            serde_json::to_string(&json!({
                "id": "broken",
                "sourceType": "Record",
                "targetType": "Patient",
                "direction": "JSON_TO_FHIR",
                "fieldMappings": [
                    {"id": "f", "sourcePath": "x", "targetPath": "frobnicate"}
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let report = MappingLoader::new(dir.path()).validate_only().unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.errors().len(), 1);
    }

    #[test]
    fn test_unparseable_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_tree(dir.path());
        fs::write(dir.path().join("resources/garbage.json"), "{not json").unwrap();

        let err = MappingLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("garbage.json"));
    }

    #[test]
    fn test_hot_reload_swaps_generation() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_tree(dir.path());

        let loader = MappingLoader::new(dir.path());
        let handle = ReloadableRegistry::new(loader.load_all().unwrap());

        let snapshot = handle.load();
        assert!(snapshot.find_by_id("patient-json-to-fhir").is_some());

        // A new mapping file appears on disk; reload picks it up.
        fs::write(
            dir.path().join("resources/practitioner.json"),
            serde_json::to_string(&json!({
                "id": "practitioner-json-to-fhir",
                "sourceType": "PractitionerRecord",
                "targetType": "Practitioner",
                "direction": "JSON_TO_FHIR",
                "fieldMappings": [
                    {"id": "family", "sourcePath": "lastName", "targetPath": "name[0].family"}
                ]
            }))
            .unwrap(),
        )
        .unwrap();
        loader.reload(&handle).unwrap();

        // The old snapshot is unchanged; fresh loads see both mappings.
        assert!(snapshot.find_by_id("practitioner-json-to-fhir").is_none());
        assert!(handle.load().find_by_id("practitioner-json-to-fhir").is_some());
        assert_eq!(handle.load().len(), 2);
    }
}
